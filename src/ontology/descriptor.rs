//! Ontology descriptor file format.
//!
//! TOML key-value files declaring services and properties, following the
//! field names in spec §6 ("Parent, DataType, Embedded, MultipleValues,
//! Weight, KeyMetadata*, …"). GKeyFile `.ontology` sections are not used
//! here; TOML is substituted since the file format itself is left as an
//! implementation detail, and it matches how
//! `jamie8johnson-cqs/src/config.rs` already shapes comparable data.

use serde::Deserialize;
use std::path::Path;

use super::OntologyError;

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceDescriptor {
    pub uri: String,
    pub table_name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub has_metadata: bool,
    #[serde(default)]
    pub has_fulltext: bool,
    #[serde(default)]
    pub has_thumbs: bool,
    #[serde(default)]
    pub key_metadata: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PropertyDescriptor {
    pub uri: String,
    pub data_type: String,
    #[serde(default)]
    pub multi_valued: bool,
    #[serde(default)]
    pub embedded: bool,
    #[serde(default)]
    pub filtered: bool,
    #[serde(default)]
    pub delimited: bool,
    #[serde(default = "default_weight")]
    pub weight: i32,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

fn default_weight() -> i32 {
    1
}

#[derive(Deserialize)]
struct ServiceFile {
    #[serde(default, rename = "service")]
    services: Vec<ServiceDescriptor>,
}

#[derive(Deserialize)]
struct PropertyFile {
    #[serde(default, rename = "property")]
    properties: Vec<PropertyDescriptor>,
}

pub fn load_services(path: &Path) -> Result<Vec<ServiceDescriptor>, OntologyError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| OntologyError::Io(path.display().to_string(), e))?;
    let file: ServiceFile = toml::from_str(&content)
        .map_err(|e| OntologyError::Parse(path.display().to_string(), e))?;
    Ok(file.services)
}

pub fn load_properties(path: &Path) -> Result<Vec<PropertyDescriptor>, OntologyError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| OntologyError::Io(path.display().to_string(), e))?;
    let file: PropertyFile = toml::from_str(&content)
        .map_err(|e| OntologyError::Parse(path.display().to_string(), e))?;
    Ok(file.properties)
}

/// Properties shipped with `Registry::builtin()`.
pub fn builtin_properties() -> Vec<PropertyDescriptor> {
    vec![
        PropertyDescriptor {
            uri: "rdf:type".into(),
            data_type: "resource".into(),
            multi_valued: true,
            embedded: false,
            filtered: false,
            delimited: false,
            weight: 0,
            column: Some("ServiceTypeID".into()),
            parents: vec![],
            domain: None,
        },
        PropertyDescriptor {
            uri: "rdfs:label".into(),
            data_type: "indexed-text".into(),
            multi_valued: false,
            embedded: false,
            filtered: false,
            delimited: false,
            weight: 5,
            column: Some("Name".into()),
            parents: vec![],
            domain: None,
        },
        PropertyDescriptor {
            uri: "nie:title".into(),
            data_type: "indexed-text".into(),
            multi_valued: false,
            embedded: true,
            filtered: false,
            delimited: false,
            weight: 10,
            column: None,
            parents: vec!["rdfs:label".into()],
            domain: None,
        },
        PropertyDescriptor {
            uri: "nie:mimeType".into(),
            data_type: "string".into(),
            multi_valued: false,
            embedded: true,
            filtered: true,
            delimited: false,
            weight: 0,
            column: Some("Mime".into()),
            parents: vec![],
            domain: Some("nfo:FileDataObject".into()),
        },
        PropertyDescriptor {
            uri: "nfo:fileSize".into(),
            data_type: "integer".into(),
            multi_valued: false,
            embedded: true,
            filtered: false,
            delimited: false,
            weight: 0,
            column: Some("Size".into()),
            parents: vec![],
            domain: Some("nfo:FileDataObject".into()),
        },
        PropertyDescriptor {
            uri: "nie:contentLastModified".into(),
            data_type: "datetime".into(),
            multi_valued: false,
            embedded: true,
            filtered: false,
            delimited: false,
            weight: 0,
            column: Some("Mtime".into()),
            parents: vec![],
            domain: None,
        },
        PropertyDescriptor {
            uri: "nie:plainTextContent".into(),
            data_type: "fulltext".into(),
            multi_valued: false,
            embedded: true,
            filtered: false,
            delimited: false,
            weight: 1,
            column: None,
            parents: vec![],
            domain: None,
        },
        PropertyDescriptor {
            uri: "nao:hasTag".into(),
            data_type: "keyword".into(),
            multi_valued: true,
            embedded: false,
            filtered: false,
            delimited: true,
            weight: 3,
            column: None,
            parents: vec![],
            domain: None,
        },
        PropertyDescriptor {
            uri: "nmo:from".into(),
            data_type: "string".into(),
            multi_valued: false,
            embedded: true,
            filtered: false,
            delimited: false,
            weight: 0,
            column: Some("nmo_from".into()),
            parents: vec![],
            domain: Some("nmo:Email".into()),
        },
        PropertyDescriptor {
            uri: "nie:isStoredAs".into(),
            data_type: "resource".into(),
            multi_valued: false,
            embedded: false,
            filtered: false,
            delimited: false,
            weight: 0,
            column: None,
            parents: vec![],
            domain: None,
        },
        PropertyDescriptor {
            uri: "nco:creator".into(),
            data_type: "resource".into(),
            multi_valued: false,
            embedded: false,
            filtered: false,
            delimited: false,
            weight: 0,
            column: None,
            parents: vec![],
            domain: None,
        },
    ]
}
