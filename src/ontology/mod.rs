//! Ontology registry (C1).
//!
//! An immutable catalogue of classes and properties, loaded once from
//! descriptor files (or the compiled-in baseline) and consulted by every
//! other component for storage-table routing, data types, and weights.
//! Follows the `Language`/`ChunkType` enums in spirit (a small, closed,
//! `FromStr`-able vocabulary) but is data-driven rather than compiled in,
//! since the ontology is meant to be extensible per spec §4.1.

mod descriptor;

use std::collections::HashMap;

use thiserror::Error;

pub use descriptor::{PropertyDescriptor, ServiceDescriptor};

#[derive(Error, Debug)]
pub enum OntologyError {
    #[error("unknown class: {0}")]
    UnknownClass(String),
    #[error("unknown property: {0}")]
    UnknownProperty(String),
    #[error("failed to read descriptor file {0}: {1}")]
    Io(String, std::io::Error),
    #[error("failed to parse descriptor file {0}: {1}")]
    Parse(String, toml::de::Error),
    #[error("duplicate service definition for class {0}")]
    DuplicateService(String),
    #[error("duplicate property definition for {0}")]
    DuplicateProperty(String),
    #[error("property {0} declares parent {1} which is not registered")]
    UnknownParentProperty(String, String),
    #[error("service {0} declares parent {1} which is not registered")]
    UnknownParentService(String, String),
    #[error("property {0} declares unknown data type {1}")]
    InvalidDataType(String, String),
}

/// Property value data type, per spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Resource,
    String,
    IndexedText,
    Fulltext,
    Integer,
    Double,
    Date,
    DateTime,
    Boolean,
    Keyword,
}

impl DataType {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        Some(match s {
            "resource" => DataType::Resource,
            "string" => DataType::String,
            "indexed-text" => DataType::IndexedText,
            "fulltext" => DataType::Fulltext,
            "integer" => DataType::Integer,
            "double" => DataType::Double,
            "date" => DataType::Date,
            "datetime" => DataType::DateTime,
            "boolean" => DataType::Boolean,
            "keyword" => DataType::Keyword,
            _ => return None,
        })
    }

    /// Is this value text that gets pushed through the term parser and
    /// indexed (indexed-text and fulltext both participate in C3/C5's
    /// differential update; keyword participates too but via exact terms).
    pub fn is_indexed(self) -> bool {
        matches!(
            self,
            DataType::IndexedText | DataType::Fulltext | DataType::Keyword
        )
    }
}

/// Storage table a property's values live in, per the routing rules in
/// spec §4.1: string/index/double → ServiceMetaData; integer/date →
/// ServiceNumericMetaData; keyword → ServiceKeywordMetaData; fulltext →
/// the external FTS5 table; resource values live on side tables too
/// (ServiceMetaData, storing the referenced Resource ID).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageTable {
    ServiceMetaData,
    ServiceNumericMetaData,
    ServiceKeywordMetaData,
    Fulltext,
}

impl StorageTable {
    pub fn of(data_type: DataType) -> StorageTable {
        match data_type {
            DataType::String | DataType::IndexedText | DataType::Double | DataType::Resource => {
                StorageTable::ServiceMetaData
            }
            DataType::Integer | DataType::Date | DataType::DateTime | DataType::Boolean => {
                StorageTable::ServiceNumericMetaData
            }
            DataType::Keyword => StorageTable::ServiceKeywordMetaData,
            DataType::Fulltext => StorageTable::Fulltext,
        }
    }

    pub fn table_name(self) -> &'static str {
        match self {
            StorageTable::ServiceMetaData => "ServiceMetaData",
            StorageTable::ServiceNumericMetaData => "ServiceNumericMetaData",
            StorageTable::ServiceKeywordMetaData => "ServiceKeywordMetaData",
            StorageTable::Fulltext => "fts_index",
        }
    }
}

/// Property definition (spec §3 "Property (from the ontology)").
#[derive(Debug, Clone)]
pub struct PropertyDef {
    pub id: i64,
    pub uri: String,
    pub data_type: DataType,
    pub multi_valued: bool,
    pub embedded: bool,
    pub filtered: bool,
    pub delimited: bool,
    pub weight: i32,
    /// Column/side-table slot this property occupies on its domain's table,
    /// when the property is single-valued and has a dedicated column.
    pub column: Option<String>,
    /// Parent (alias) properties: querying any child also satisfies the
    /// parent triple pattern (e.g. `nie:title` aliasing `rdfs:label`).
    pub parents: Vec<String>,
    pub domain: Option<String>,
}

impl PropertyDef {
    pub fn storage_table(&self) -> StorageTable {
        StorageTable::of(self.data_type)
    }
}

/// Service (class) definition (spec §3 "Service").
#[derive(Debug, Clone)]
pub struct ServiceDef {
    pub id: i64,
    pub uri: String,
    pub table_name: String,
    pub parent: Option<String>,
    pub has_metadata: bool,
    pub has_fulltext: bool,
    pub has_thumbs: bool,
    /// Ordered key-metadata column names, indexed 1..N by `key_index_of`.
    pub key_metadata: Vec<String>,
}

/// Process-wide, immutable-after-init catalogue of classes and properties.
#[derive(Debug, Default)]
pub struct Registry {
    properties_by_uri: HashMap<String, PropertyDef>,
    properties_by_id: HashMap<i64, String>,
    services_by_uri: HashMap<String, ServiceDef>,
    services_by_id: HashMap<i64, String>,
    next_property_id: i64,
    next_service_id: i64,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            next_property_id: 1,
            next_service_id: 1,
            ..Default::default()
        }
    }

    /// Compiled-in baseline ontology so the crate is usable without
    /// external descriptor files, analogous to the always-present
    /// `Language`/`ChunkType` enums it's modeled on.
    pub fn builtin() -> Self {
        let mut reg = Registry::new();
        reg.register_service(ServiceDescriptor {
            uri: "rdfs:Resource".into(),
            table_name: "Resource".into(),
            parent: None,
            has_metadata: true,
            has_fulltext: false,
            has_thumbs: false,
            key_metadata: vec![],
        })
        .expect("builtin ontology is self-consistent");
        reg.register_service(ServiceDescriptor {
            uri: "nfo:FileDataObject".into(),
            table_name: "Files".into(),
            parent: Some("rdfs:Resource".into()),
            has_metadata: true,
            has_fulltext: true,
            has_thumbs: true,
            key_metadata: vec!["nie:mimeType".into(), "nfo:fileSize".into()],
        })
        .expect("builtin ontology is self-consistent");
        reg.register_service(ServiceDescriptor {
            uri: "nmo:Email".into(),
            table_name: "Emails".into(),
            parent: Some("rdfs:Resource".into()),
            has_metadata: true,
            has_fulltext: true,
            has_thumbs: false,
            key_metadata: vec!["nmo:from".into()],
        })
        .expect("builtin ontology is self-consistent");

        for p in descriptor::builtin_properties() {
            reg.register_property(p)
                .expect("builtin ontology is self-consistent");
        }
        reg
    }

    /// Load descriptor files from a directory (`*.ontology.toml` for
    /// services, `*.property.toml` for properties), merging into whatever
    /// is already registered.
    pub fn load_dir(&mut self, dir: &std::path::Path) -> Result<(), OntologyError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| OntologyError::Io(dir.display().to_string(), e))?;
        let mut service_files = vec![];
        let mut property_files = vec![];
        for entry in entries.flatten() {
            let path = entry.path();
            let name = path.to_string_lossy();
            if name.ends_with(".ontology.toml") {
                service_files.push(path);
            } else if name.ends_with(".property.toml") {
                property_files.push(path);
            }
        }
        service_files.sort();
        property_files.sort();

        for path in service_files {
            let descs = descriptor::load_services(&path)?;
            for d in descs {
                self.register_service(d)?;
            }
        }
        for path in property_files {
            let descs = descriptor::load_properties(&path)?;
            for d in descs {
                self.register_property(d)?;
            }
        }
        Ok(())
    }

    pub fn register_service(&mut self, d: ServiceDescriptor) -> Result<i64, OntologyError> {
        if self.services_by_uri.contains_key(&d.uri) {
            return Err(OntologyError::DuplicateService(d.uri));
        }
        if let Some(parent) = &d.parent {
            if !self.services_by_uri.contains_key(parent) {
                return Err(OntologyError::UnknownParentService(
                    d.uri.clone(),
                    parent.clone(),
                ));
            }
        }
        let id = self.next_service_id;
        self.next_service_id += 1;
        self.services_by_id.insert(id, d.uri.clone());
        self.services_by_uri.insert(
            d.uri.clone(),
            ServiceDef {
                id,
                uri: d.uri,
                table_name: d.table_name,
                parent: d.parent,
                has_metadata: d.has_metadata,
                has_fulltext: d.has_fulltext,
                has_thumbs: d.has_thumbs,
                key_metadata: d.key_metadata,
            },
        );
        Ok(id)
    }

    pub fn register_property(&mut self, d: PropertyDescriptor) -> Result<i64, OntologyError> {
        if self.properties_by_uri.contains_key(&d.uri) {
            return Err(OntologyError::DuplicateProperty(d.uri));
        }
        for parent in &d.parents {
            if !self.properties_by_uri.contains_key(parent) {
                return Err(OntologyError::UnknownParentProperty(
                    d.uri.clone(),
                    parent.clone(),
                ));
            }
        }
        let data_type = DataType::from_str_loose(&d.data_type)
            .ok_or_else(|| OntologyError::InvalidDataType(d.uri.clone(), d.data_type.clone()))?;
        let id = self.next_property_id;
        self.next_property_id += 1;
        self.properties_by_id.insert(id, d.uri.clone());
        self.properties_by_uri.insert(
            d.uri.clone(),
            PropertyDef {
                id,
                uri: d.uri,
                data_type,
                multi_valued: d.multi_valued,
                embedded: d.embedded,
                filtered: d.filtered,
                delimited: d.delimited,
                weight: d.weight,
                column: d.column,
                parents: d.parents,
                domain: d.domain,
            },
        );
        Ok(id)
    }

    pub fn property_of(&self, uri: &str) -> Option<&PropertyDef> {
        self.properties_by_uri.get(uri)
    }

    pub fn property_by_id(&self, id: i64) -> Option<&PropertyDef> {
        self.properties_by_id
            .get(&id)
            .and_then(|uri| self.properties_by_uri.get(uri))
    }

    pub fn service_of(&self, uri: &str) -> Option<&ServiceDef> {
        self.services_by_uri.get(uri)
    }

    pub fn service_by_id(&self, id: i64) -> Option<&ServiceDef> {
        self.services_by_id
            .get(&id)
            .and_then(|uri| self.services_by_uri.get(uri))
    }

    pub fn storage_table_of(&self, property: &PropertyDef) -> StorageTable {
        property.storage_table()
    }

    /// Returns the 1-based key-metadata column slot for `(service,
    /// property)`, or `0` if the property isn't denormalised on that
    /// service's primary table.
    pub fn key_index_of(&self, service: &ServiceDef, property: &PropertyDef) -> usize {
        service
            .key_metadata
            .iter()
            .position(|p| p == &property.uri)
            .map(|idx| idx + 1)
            .unwrap_or(0)
    }

    pub fn services(&self) -> impl Iterator<Item = &ServiceDef> {
        self.services_by_uri.values()
    }

    pub fn properties(&self) -> impl Iterator<Item = &PropertyDef> {
        self.properties_by_uri.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registers_rdf_type_and_file_service() {
        let reg = Registry::builtin();
        assert!(reg.service_of("nfo:FileDataObject").is_some());
        assert!(reg.property_of("rdfs:label").is_some());
    }

    #[test]
    fn storage_table_routes_by_data_type() {
        assert_eq!(StorageTable::of(DataType::Integer), StorageTable::ServiceNumericMetaData);
        assert_eq!(StorageTable::of(DataType::Keyword), StorageTable::ServiceKeywordMetaData);
        assert_eq!(StorageTable::of(DataType::Fulltext), StorageTable::Fulltext);
        assert_eq!(StorageTable::of(DataType::String), StorageTable::ServiceMetaData);
    }

    #[test]
    fn key_index_of_returns_one_based_slot() {
        let reg = Registry::builtin();
        let service = reg.service_of("nfo:FileDataObject").unwrap();
        let mime = reg.property_of("nie:mimeType").unwrap();
        assert_eq!(reg.key_index_of(service, mime), 1);
        let size = reg.property_of("nfo:fileSize").unwrap();
        assert_eq!(reg.key_index_of(service, size), 2);
    }

    #[test]
    fn duplicate_service_registration_errors() {
        let mut reg = Registry::builtin();
        let err = reg.register_service(ServiceDescriptor {
            uri: "nfo:FileDataObject".into(),
            table_name: "Files".into(),
            parent: None,
            has_metadata: true,
            has_fulltext: false,
            has_thumbs: false,
            key_metadata: vec![],
        });
        assert!(matches!(err, Err(OntologyError::DuplicateService(_))));
    }
}
