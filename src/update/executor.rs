//! Per-triple execution and the `InsertData`/`DeleteData`/`DeleteInsert`
//! dispatch (C5), per spec §4.5.
//!
//! `spargebra::Update::parse` hands back a flat list of
//! `GraphUpdateOperation`s; everything beyond the first four (`Load`,
//! `Clear`, `Create`, `Drop`, `Add`, `Move`, `Copy`) is out of scope and
//! fails with `Unsupported`.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};
use spargebra::algebra::GraphUpdateOperation;
use spargebra::term::{
    GroundQuadPattern, GroundSubject, GroundTerm, GroundTermPattern, NamedNodePattern, Subject,
    Term, TermPattern,
};
use thiserror::Error;

use crate::cancel::CancellationToken;
use crate::index::InvertedIndex;
use crate::ontology::{DataType, PropertyDef, Registry, ServiceDef, StorageTable};
use crate::sparql::cursor::Solution;
use crate::sparql::{translate_graph_pattern, var_col, TranslateError};
use crate::term::{TermParser, TermParserConfig};

const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

#[derive(Error, Debug)]
pub enum UpdateError {
    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
    #[error(transparent)]
    Translate(#[from] TranslateError),
    #[error(transparent)]
    Index(#[from] crate::index::IndexError),
    #[error("unsupported construct: {0}")]
    Unsupported(String),
    #[error("unknown class: {0}")]
    UnknownClass(String),
    #[error("unknown property: {0}")]
    UnknownProperty(String),
    #[error("variable ?{0} used in update template but never bound")]
    UnboundVariable(String),
    #[error("interrupted")]
    Interrupted,
}

/// What an `InsertData`/`DeleteData`/`Modify` run produced, returned to the
/// caller for bookkeeping — mainly the blank-node label → generated-URI map
/// spec §4.5 says should be reported back.
#[derive(Debug, Default)]
pub struct UpdateReport {
    pub minted_blank_nodes: HashMap<String, String>,
}

/// One resolved write: a subject Resource ID, a property URI, and the
/// value to store (a nested resource reference, or a literal).
enum WriteValue {
    Resource(i64),
    Literal(String),
}

pub fn execute_update(
    conn: &Connection,
    registry: &Registry,
    index: &InvertedIndex,
    term_config: &TermParserConfig,
    sparql: &str,
) -> Result<UpdateReport, UpdateError> {
    execute_update_cancellable(conn, registry, index, term_config, sparql, &CancellationToken::new())
}

/// Like [`execute_update`], but polls `token` between per-triple/per-row
/// write steps — the update-side suspension point of the cooperative-
/// cancellation protocol.
pub fn execute_update_cancellable(
    conn: &Connection,
    registry: &Registry,
    index: &InvertedIndex,
    term_config: &TermParserConfig,
    sparql: &str,
    token: &CancellationToken,
) -> Result<UpdateReport, UpdateError> {
    let update = spargebra::Update::parse(sparql, None).map_err(TranslateError::Parse)?;
    let parser = TermParser::new(term_config.clone());
    let mut report = UpdateReport::default();

    for operation in &update.operations {
        if token.is_cancelled() {
            return Err(UpdateError::Interrupted);
        }
        match operation {
            GraphUpdateOperation::InsertData { data } => {
                let mut bnodes = HashMap::new();
                for quad in data {
                    if token.is_cancelled() {
                        return Err(UpdateError::Interrupted);
                    }
                    let subject_id = resolve_subject(conn, &mut bnodes, &quad.subject)?;
                    let object = resolve_object(conn, &mut bnodes, &quad.object)?;
                    apply_triple(conn, registry, index, &parser, subject_id, quad.predicate.as_str(), object, true)?;
                }
                report.minted_blank_nodes.extend(bnodes);
            }

            GraphUpdateOperation::DeleteData { data } => {
                for quad in data {
                    if token.is_cancelled() {
                        return Err(UpdateError::Interrupted);
                    }
                    let Some(subject_id) = lookup_ground_subject(conn, &quad.subject)? else {
                        continue;
                    };
                    let Some(object) = lookup_ground_object(conn, &quad.object)? else {
                        continue;
                    };
                    apply_triple(conn, registry, index, &parser, subject_id, quad.predicate.as_str(), object, false)?;
                }
            }

            GraphUpdateOperation::DeleteInsert {
                delete,
                insert,
                pattern,
                ..
            } => {
                let sub = translate_graph_pattern(registry, pattern)?;
                let prepared_sql = format!("SELECT * FROM {}", sub.sql);
                let columns: Vec<String> = sub.variables.iter().map(var_col).collect();
                let mut stmt = conn.prepare(&prepared_sql)?;
                let mut rows = stmt.query([])?;
                let mut solutions = Vec::new();
                while let Some(row) = rows.next()? {
                    let mut values = Vec::with_capacity(columns.len());
                    for i in 0..columns.len() {
                        values.push(row.get(i)?);
                    }
                    solutions.push(Solution { values });
                }
                drop(rows);
                drop(stmt);

                let var_index: HashMap<String, usize> = sub
                    .variables
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (v.as_str().to_string(), i))
                    .collect();

                for solution in &solutions {
                    if token.is_cancelled() {
                        return Err(UpdateError::Interrupted);
                    }
                    let mut bnodes = HashMap::new();
                    for qp in delete {
                        if let Some((subject_id, predicate, object)) =
                            resolve_ground_quad_pattern(conn, &var_index, solution, qp)?
                        {
                            apply_triple(conn, registry, index, &parser, subject_id, &predicate, object, false)?;
                        }
                    }
                    for qp in insert {
                        let subject_id =
                            resolve_quad_pattern_subject(conn, &mut bnodes, &var_index, solution, &qp.subject)?;
                        let predicate = resolve_predicate_pattern(&var_index, solution, &qp.predicate)?;
                        let object =
                            resolve_quad_pattern_object(conn, &mut bnodes, &var_index, solution, &qp.object)?;
                        apply_triple(conn, registry, index, &parser, subject_id, &predicate, object, true)?;
                    }
                    report.minted_blank_nodes.extend(bnodes);
                }
            }

            other => {
                return Err(UpdateError::Unsupported(format!("{other:?}")));
            }
        }
    }

    Ok(report)
}

fn resolve_resource_id(conn: &Connection, uri: &str) -> Result<i64, rusqlite::Error> {
    if let Some(id) = conn
        .query_row("SELECT ID FROM Resource WHERE Uri = ?1", params![uri], |r| r.get(0))
        .optional()?
    {
        return Ok(id);
    }
    conn.execute("INSERT INTO Resource (Uri) VALUES (?1)", params![uri])?;
    Ok(conn.last_insert_rowid())
}

fn lookup_resource_id(conn: &Connection, uri: &str) -> Result<Option<i64>, rusqlite::Error> {
    conn.query_row("SELECT ID FROM Resource WHERE Uri = ?1", params![uri], |r| r.get(0))
        .optional()
}

fn mint_blank_node(bnodes: &mut HashMap<String, String>, label: &str) -> String {
    bnodes
        .entry(label.to_string())
        .or_insert_with(|| format!("urn:tracker:bnode:{}", uuid::Uuid::new_v4()))
        .clone()
}

fn resolve_subject(
    conn: &Connection,
    bnodes: &mut HashMap<String, String>,
    subject: &Subject,
) -> Result<i64, UpdateError> {
    match subject {
        Subject::NamedNode(n) => Ok(resolve_resource_id(conn, n.as_str())?),
        Subject::BlankNode(b) => {
            let uri = mint_blank_node(bnodes, b.as_str());
            Ok(resolve_resource_id(conn, &uri)?)
        }
        other => Err(UpdateError::Unsupported(format!("subject term {other:?}"))),
    }
}

fn resolve_object(
    conn: &Connection,
    bnodes: &mut HashMap<String, String>,
    object: &Term,
) -> Result<WriteValue, UpdateError> {
    match object {
        Term::NamedNode(n) => Ok(WriteValue::Resource(resolve_resource_id(conn, n.as_str())?)),
        Term::BlankNode(b) => {
            let uri = mint_blank_node(bnodes, b.as_str());
            Ok(WriteValue::Resource(resolve_resource_id(conn, &uri)?))
        }
        Term::Literal(l) => Ok(WriteValue::Literal(l.value().to_string())),
        other => Err(UpdateError::Unsupported(format!("object term {other:?}"))),
    }
}

fn lookup_ground_subject(conn: &Connection, subject: &GroundSubject) -> Result<Option<i64>, UpdateError> {
    match subject {
        GroundSubject::NamedNode(n) => Ok(lookup_resource_id(conn, n.as_str())?),
        other => Err(UpdateError::Unsupported(format!("ground subject {other:?}"))),
    }
}

fn lookup_ground_object(conn: &Connection, object: &GroundTerm) -> Result<Option<WriteValue>, UpdateError> {
    match object {
        GroundTerm::NamedNode(n) => Ok(lookup_resource_id(conn, n.as_str())?.map(WriteValue::Resource)),
        GroundTerm::Literal(l) => Ok(Some(WriteValue::Literal(l.value().to_string()))),
        other => Err(UpdateError::Unsupported(format!("ground object {other:?}"))),
    }
}

fn solution_value<'a>(
    var_index: &HashMap<String, usize>,
    solution: &'a Solution,
    name: &str,
) -> Option<&'a rusqlite::types::Value> {
    var_index.get(name).and_then(|&i| solution.values.get(i))
}

fn resolve_quad_pattern_subject(
    conn: &Connection,
    bnodes: &mut HashMap<String, String>,
    var_index: &HashMap<String, usize>,
    solution: &Solution,
    term: &TermPattern,
) -> Result<i64, UpdateError> {
    match term {
        TermPattern::NamedNode(n) => Ok(resolve_resource_id(conn, n.as_str())?),
        TermPattern::BlankNode(b) => {
            let uri = mint_blank_node(bnodes, b.as_str());
            Ok(resolve_resource_id(conn, &uri)?)
        }
        TermPattern::Variable(v) => {
            let value = solution_value(var_index, solution, v.as_str())
                .ok_or_else(|| UpdateError::UnboundVariable(v.as_str().to_string()))?;
            match value {
                rusqlite::types::Value::Integer(id) => Ok(*id),
                rusqlite::types::Value::Text(uri) => Ok(resolve_resource_id(conn, uri)?),
                _ => Err(UpdateError::Unsupported(format!(
                    "variable ?{} is not resource-typed in subject position",
                    v.as_str()
                ))),
            }
        }
        TermPattern::Literal(_) => Err(UpdateError::Unsupported("literal in subject position".into())),
    }
}

fn resolve_quad_pattern_object(
    conn: &Connection,
    bnodes: &mut HashMap<String, String>,
    var_index: &HashMap<String, usize>,
    solution: &Solution,
    term: &TermPattern,
) -> Result<WriteValue, UpdateError> {
    match term {
        TermPattern::NamedNode(n) => Ok(WriteValue::Resource(resolve_resource_id(conn, n.as_str())?)),
        TermPattern::BlankNode(b) => {
            let uri = mint_blank_node(bnodes, b.as_str());
            Ok(WriteValue::Resource(resolve_resource_id(conn, &uri)?))
        }
        TermPattern::Literal(l) => Ok(WriteValue::Literal(l.value().to_string())),
        TermPattern::Variable(v) => {
            let value = solution_value(var_index, solution, v.as_str())
                .ok_or_else(|| UpdateError::UnboundVariable(v.as_str().to_string()))?;
            Ok(match value {
                rusqlite::types::Value::Integer(id) => WriteValue::Resource(*id),
                rusqlite::types::Value::Text(s) => WriteValue::Literal(s.clone()),
                rusqlite::types::Value::Real(r) => WriteValue::Literal(r.to_string()),
                rusqlite::types::Value::Null => WriteValue::Literal(String::new()),
                rusqlite::types::Value::Blob(_) => {
                    return Err(UpdateError::Unsupported("blob-valued binding".into()))
                }
            })
        }
    }
}

fn resolve_predicate_pattern(
    var_index: &HashMap<String, usize>,
    solution: &Solution,
    predicate: &NamedNodePattern,
) -> Result<String, UpdateError> {
    match predicate {
        NamedNodePattern::NamedNode(n) => Ok(n.as_str().to_string()),
        NamedNodePattern::Variable(v) => {
            let value = solution_value(var_index, solution, v.as_str())
                .ok_or_else(|| UpdateError::UnboundVariable(v.as_str().to_string()))?;
            match value {
                rusqlite::types::Value::Text(s) => Ok(s.clone()),
                _ => Err(UpdateError::Unsupported("variable predicate not URI-valued".into())),
            }
        }
    }
}

fn resolve_ground_quad_pattern(
    conn: &Connection,
    var_index: &HashMap<String, usize>,
    solution: &Solution,
    qp: &GroundQuadPattern,
) -> Result<Option<(i64, String, WriteValue)>, UpdateError> {
    let subject_id = match resolve_ground_term_pattern_as_id(conn, var_index, solution, &qp.subject)? {
        Some(id) => id,
        None => return Ok(None),
    };
    let predicate = resolve_predicate_pattern(var_index, solution, &qp.predicate)?;
    let object = match resolve_ground_term_pattern_as_value(conn, var_index, solution, &qp.object)? {
        Some(v) => v,
        None => return Ok(None),
    };
    Ok(Some((subject_id, predicate, object)))
}

fn resolve_ground_term_pattern_as_id(
    conn: &Connection,
    var_index: &HashMap<String, usize>,
    solution: &Solution,
    term: &GroundTermPattern,
) -> Result<Option<i64>, UpdateError> {
    match term {
        GroundTermPattern::NamedNode(n) => Ok(lookup_resource_id(conn, n.as_str())?),
        GroundTermPattern::Variable(v) => {
            let Some(value) = solution_value(var_index, solution, v.as_str()) else {
                return Ok(None);
            };
            Ok(match value {
                rusqlite::types::Value::Integer(id) => Some(*id),
                rusqlite::types::Value::Text(uri) => lookup_resource_id(conn, uri)?,
                _ => None,
            })
        }
        other => Err(UpdateError::Unsupported(format!("delete template term {other:?}"))),
    }
}

fn resolve_ground_term_pattern_as_value(
    conn: &Connection,
    var_index: &HashMap<String, usize>,
    solution: &Solution,
    term: &GroundTermPattern,
) -> Result<Option<WriteValue>, UpdateError> {
    match term {
        GroundTermPattern::NamedNode(n) => Ok(lookup_resource_id(conn, n.as_str())?.map(WriteValue::Resource)),
        GroundTermPattern::Literal(l) => Ok(Some(WriteValue::Literal(l.value().to_string()))),
        GroundTermPattern::Variable(v) => {
            let Some(value) = solution_value(var_index, solution, v.as_str()) else {
                return Ok(None);
            };
            Ok(Some(match value {
                rusqlite::types::Value::Integer(id) => WriteValue::Resource(*id),
                rusqlite::types::Value::Text(s) => WriteValue::Literal(s.clone()),
                rusqlite::types::Value::Real(r) => WriteValue::Literal(r.to_string()),
                rusqlite::types::Value::Null => return Ok(None),
                rusqlite::types::Value::Blob(_) => return Ok(None),
            }))
        }
        other => Err(UpdateError::Unsupported(format!("delete template term {other:?}"))),
    }
}

/// The five-step per-triple execution from spec §4.5.
fn apply_triple(
    conn: &Connection,
    registry: &Registry,
    index: &InvertedIndex,
    parser: &TermParser,
    subject_id: i64,
    predicate_uri: &str,
    object: WriteValue,
    insert: bool,
) -> Result<(), UpdateError> {
    if predicate_uri == RDF_TYPE {
        return apply_type_triple(conn, registry, subject_id, object, insert);
    }

    let property = registry
        .property_of(predicate_uri)
        .ok_or_else(|| UpdateError::UnknownProperty(predicate_uri.to_string()))?;

    let old_value = if insert && !property.multi_valued {
        take_existing_value(conn, registry, subject_id, property)?
    } else {
        None
    };

    let object_value = match &object {
        WriteValue::Resource(id) => *id,
        WriteValue::Literal(_) => 0,
    };
    let literal_value = match &object {
        WriteValue::Literal(s) => Some(s.as_str()),
        WriteValue::Resource(_) => None,
    };

    match property.storage_table() {
        StorageTable::Fulltext => {
            write_fulltext(conn, subject_id, literal_value.unwrap_or_default(), insert, property.multi_valued)?;
        }
        StorageTable::ServiceMetaData => {
            if insert {
                conn.execute(
                    "INSERT INTO ServiceMetaData (SubjectID, PropertyID, ObjectID, MetaDataValue) VALUES (?1, ?2, ?3, ?4)",
                    params![
                        subject_id,
                        property.id,
                        if literal_value.is_none() { Some(object_value) } else { None },
                        literal_value
                    ],
                )?;
            } else {
                conn.execute(
                    "DELETE FROM ServiceMetaData WHERE SubjectID = ?1 AND PropertyID = ?2 AND \
                     (ObjectID IS ?3 AND MetaDataValue IS ?4)",
                    params![
                        subject_id,
                        property.id,
                        if literal_value.is_none() { Some(object_value) } else { None },
                        literal_value
                    ],
                )?;
            }
        }
        StorageTable::ServiceNumericMetaData => {
            if insert {
                conn.execute(
                    "INSERT INTO ServiceNumericMetaData (SubjectID, PropertyID, MetaDataValue) VALUES (?1, ?2, ?3)",
                    params![subject_id, property.id, literal_value],
                )?;
            } else {
                conn.execute(
                    "DELETE FROM ServiceNumericMetaData WHERE SubjectID = ?1 AND PropertyID = ?2 AND MetaDataValue = ?3",
                    params![subject_id, property.id, literal_value],
                )?;
            }
        }
        StorageTable::ServiceKeywordMetaData => {
            if insert {
                conn.execute(
                    "INSERT INTO ServiceKeywordMetaData (SubjectID, PropertyID, MetaDataValue) VALUES (?1, ?2, ?3)",
                    params![subject_id, property.id, literal_value],
                )?;
            } else {
                conn.execute(
                    "DELETE FROM ServiceKeywordMetaData WHERE SubjectID = ?1 AND PropertyID = ?2 AND MetaDataValue = ?3",
                    params![subject_id, property.id, literal_value],
                )?;
            }
        }
    }

    if property.data_type.is_indexed() {
        let weight = property.weight.max(1) as u32;
        let old_terms = old_value
            .as_deref()
            .map(|v| parser.parse(v, weight))
            .unwrap_or_default();
        let new_terms = match (&object, insert) {
            (WriteValue::Literal(v), true) => parser.parse(v, weight),
            _ => Default::default(),
        };
        let service_type = resolve_service_type(conn, subject_id)?;
        if insert {
            index.apply_diff(&old_terms, &new_terms, subject_id as u32, service_type)?;
        } else if let WriteValue::Literal(v) = &object {
            let removed_terms = parser.parse(v, weight);
            index.apply_diff(&removed_terms, &HashMap::new(), subject_id as u32, service_type)?;
        }
    }

    maybe_backup_overlay(conn, registry, subject_id, property, predicate_uri, &object, insert)?;

    Ok(())
}

/// Look up the current single value stored for a single-valued property
/// (used to compute the old/new term diff and to delete the prior row
/// before writing the new one, giving single-valued properties SET rather
/// than APPEND semantics).
fn take_existing_value(
    conn: &Connection,
    _registry: &Registry,
    subject_id: i64,
    property: &PropertyDef,
) -> Result<Option<String>, UpdateError> {
    let existing: Option<String> = match property.storage_table() {
        StorageTable::Fulltext => conn
            .query_row(
                "SELECT content FROM fts_index WHERE rowid = ?1",
                params![subject_id],
                |r| r.get(0),
            )
            .optional()?,
        StorageTable::ServiceMetaData => conn
            .query_row(
                "SELECT MetaDataValue FROM ServiceMetaData WHERE SubjectID = ?1 AND PropertyID = ?2",
                params![subject_id, property.id],
                |r| r.get(0),
            )
            .optional()?,
        StorageTable::ServiceNumericMetaData => conn
            .query_row(
                "SELECT MetaDataValue FROM ServiceNumericMetaData WHERE SubjectID = ?1 AND PropertyID = ?2",
                params![subject_id, property.id],
                |r| r.get(0),
            )
            .optional()?,
        StorageTable::ServiceKeywordMetaData => conn
            .query_row(
                "SELECT MetaDataValue FROM ServiceKeywordMetaData WHERE SubjectID = ?1 AND PropertyID = ?2",
                params![subject_id, property.id],
                |r| r.get(0),
            )
            .optional()?,
    };

    match property.storage_table() {
        StorageTable::Fulltext => {
            conn.execute("DELETE FROM fts_index WHERE rowid = ?1", params![subject_id])?;
        }
        StorageTable::ServiceMetaData => {
            conn.execute(
                "DELETE FROM ServiceMetaData WHERE SubjectID = ?1 AND PropertyID = ?2",
                params![subject_id, property.id],
            )?;
        }
        StorageTable::ServiceNumericMetaData => {
            conn.execute(
                "DELETE FROM ServiceNumericMetaData WHERE SubjectID = ?1 AND PropertyID = ?2",
                params![subject_id, property.id],
            )?;
        }
        StorageTable::ServiceKeywordMetaData => {
            conn.execute(
                "DELETE FROM ServiceKeywordMetaData WHERE SubjectID = ?1 AND PropertyID = ?2",
                params![subject_id, property.id],
            )?;
        }
    }
    Ok(existing)
}

fn write_fulltext(
    conn: &Connection,
    subject_id: i64,
    value: &str,
    insert: bool,
    multi_valued: bool,
) -> Result<(), rusqlite::Error> {
    if insert {
        let existing: Option<String> = conn
            .query_row(
                "SELECT content FROM fts_index WHERE rowid = ?1",
                params![subject_id],
                |r| r.get(0),
            )
            .optional()?;
        let content = match existing {
            Some(old) if multi_valued => format!("{old} {value}"),
            _ => value.to_string(),
        };
        conn.execute("DELETE FROM fts_index WHERE rowid = ?1", params![subject_id])?;
        conn.execute(
            "INSERT INTO fts_index (rowid, content) VALUES (?1, ?2)",
            params![subject_id, content],
        )?;
    } else {
        conn.execute("DELETE FROM fts_index WHERE rowid = ?1", params![subject_id])?;
    }
    Ok(())
}

fn apply_type_triple(
    conn: &Connection,
    registry: &Registry,
    subject_id: i64,
    object: WriteValue,
    insert: bool,
) -> Result<(), UpdateError> {
    let class_uri = match &object {
        WriteValue::Resource(id) => conn
            .query_row("SELECT Uri FROM Resource WHERE ID = ?1", params![id], |r| r.get::<_, String>(0))
            .optional()?
            .ok_or_else(|| UpdateError::UnknownClass(format!("resource id {id}")))?,
        WriteValue::Literal(_) => {
            return Err(UpdateError::Unsupported("rdf:type object must be a resource".into()))
        }
    };
    let service = registry
        .service_of(&class_uri)
        .ok_or_else(|| UpdateError::UnknownClass(class_uri.clone()))?;

    if insert {
        conn.execute(
            "UPDATE Resource SET TypeID = ?1 WHERE ID = ?2",
            params![service.id, subject_id],
        )?;
        conn.execute(
            &format!("INSERT OR IGNORE INTO \"{}\" (ID) VALUES (?1)", service.table_name),
            params![subject_id],
        )?;
    } else {
        conn.execute(
            "UPDATE Resource SET TypeID = 0 WHERE ID = ?1 AND TypeID = ?2",
            params![subject_id, service.id],
        )?;
        conn.execute(
            &format!("DELETE FROM \"{}\" WHERE ID = ?1", service.table_name),
            params![subject_id],
        )?;
    }
    Ok(())
}

fn resolve_service_type(conn: &Connection, subject_id: i64) -> Result<u8, rusqlite::Error> {
    let type_id: i64 = conn
        .query_row("SELECT TypeID FROM Resource WHERE ID = ?1", params![subject_id], |r| r.get(0))
        .optional()?
        .unwrap_or(0);
    Ok((type_id & 0xFF) as u8)
}

fn service_of_subject<'a>(
    conn: &Connection,
    registry: &'a Registry,
    subject_id: i64,
) -> Result<Option<&'a ServiceDef>, rusqlite::Error> {
    let type_id: Option<i64> = conn
        .query_row("SELECT TypeID FROM Resource WHERE ID = ?1", params![subject_id], |r| r.get(0))
        .optional()?;
    Ok(type_id.and_then(|id| registry.service_by_id(id)))
}

/// Step 5: overlay user-asserted, non-embedded metadata on file-derived
/// services into `MetadataBackup`, so a later re-index (which wipes and
/// recomputes embedded properties wholesale) can restore it.
fn maybe_backup_overlay(
    conn: &Connection,
    registry: &Registry,
    subject_id: i64,
    property: &PropertyDef,
    predicate_uri: &str,
    object: &WriteValue,
    insert: bool,
) -> Result<(), UpdateError> {
    if property.embedded || property.data_type == DataType::Fulltext {
        return Ok(());
    }
    let Some(service) = service_of_subject(conn, registry, subject_id)? else {
        return Ok(());
    };
    if !service.has_fulltext {
        return Ok(());
    }
    let subject_uri: String = conn.query_row(
        "SELECT Uri FROM Resource WHERE ID = ?1",
        params![subject_id],
        |r| r.get(0),
    )?;
    let value_text = match object {
        WriteValue::Literal(s) => s.clone(),
        WriteValue::Resource(id) => conn
            .query_row("SELECT Uri FROM Resource WHERE ID = ?1", params![id], |r| r.get(0))
            .unwrap_or_default(),
    };
    if insert {
        conn.execute(
            "INSERT INTO MetadataBackup (SubjectUri, PropertyUri, MetaDataValue) VALUES (?1, ?2, ?3)",
            params![subject_uri, predicate_uri, value_text],
        )?;
    } else {
        conn.execute(
            "DELETE FROM MetadataBackup WHERE SubjectUri = ?1 AND PropertyUri = ?2 AND MetaDataValue = ?3",
            params![subject_uri, predicate_uri, value_text],
        )?;
    }
    Ok(())
}
