//! DDL and runtime SQL function registration.
//!
//! The relational shape follows spec §3/§4.1: a `Resource` table mapping
//! URI↔ID, per-class tables created from the ontology (`Registry`), the
//! generic `ServiceMetaData`/`ServiceNumericMetaData`/`ServiceKeywordMetaData`
//! side tables, an FTS5 virtual table for full text, and a `tracker_triples`
//! view flattening all of the above into one `(SubjectID, PropertyID,
//! ObjectID)` relation the translator joins against uniformly.
//!
//! Scalar functions and the `TRACKER` collation are registered once per
//! pooled connection via `ConnectionCustomizer`, the same place the
//! teacher's sqlx-based store ran its `after_connect` pragmas.

use md5::{Digest, Md5};
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, Error as SqlError};
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};

use crate::ontology::Registry;

const CORE_DDL: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS Resource (
    ID INTEGER PRIMARY KEY AUTOINCREMENT,
    Uri TEXT NOT NULL UNIQUE,
    TypeID INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_resource_type ON Resource(TypeID);

CREATE TABLE IF NOT EXISTS ServiceMetaData (
    SubjectID INTEGER NOT NULL REFERENCES Resource(ID) ON DELETE CASCADE,
    PropertyID INTEGER NOT NULL,
    ObjectID INTEGER,
    MetaDataValue TEXT
);
CREATE INDEX IF NOT EXISTS idx_smd_subject_prop ON ServiceMetaData(SubjectID, PropertyID);
CREATE INDEX IF NOT EXISTS idx_smd_prop_value ON ServiceMetaData(PropertyID, MetaDataValue);

CREATE TABLE IF NOT EXISTS ServiceNumericMetaData (
    SubjectID INTEGER NOT NULL REFERENCES Resource(ID) ON DELETE CASCADE,
    PropertyID INTEGER NOT NULL,
    MetaDataValue NUMERIC
);
CREATE INDEX IF NOT EXISTS idx_snmd_subject_prop ON ServiceNumericMetaData(SubjectID, PropertyID);
CREATE INDEX IF NOT EXISTS idx_snmd_prop_value ON ServiceNumericMetaData(PropertyID, MetaDataValue);

CREATE TABLE IF NOT EXISTS ServiceKeywordMetaData (
    SubjectID INTEGER NOT NULL REFERENCES Resource(ID) ON DELETE CASCADE,
    PropertyID INTEGER NOT NULL,
    MetaDataValue TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_skmd_subject_prop ON ServiceKeywordMetaData(SubjectID, PropertyID);
CREATE INDEX IF NOT EXISTS idx_skmd_value ON ServiceKeywordMetaData(PropertyID, MetaDataValue);

CREATE VIRTUAL TABLE IF NOT EXISTS fts_index USING fts5(
    content,
    content_rowid='SubjectID',
    tokenize='unicode61'
);

CREATE TABLE IF NOT EXISTS OntologyMetadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Overlay store for user-asserted (non-embedded) metadata on services whose
-- primary content is file-derived. Re-indexing a file replaces its embedded
-- properties wholesale; values recorded here survive that and are replayed
-- back on top.
CREATE TABLE IF NOT EXISTS MetadataBackup (
    SubjectUri TEXT NOT NULL,
    PropertyUri TEXT NOT NULL,
    MetaDataValue TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_backup_subject ON MetadataBackup(SubjectUri, PropertyUri);
"#;

/// The view the translator's generic (variable-predicate or
/// unrecognised-but-registered-predicate) triple matches join against:
/// all three metadata side tables, flattened with their property's URI
/// resolved back to `PropertyID` (already the property's `Registry` id, so
/// no extra join is needed at read time). `ServiceMetaData` rows split two
/// ways since it holds both resource-valued properties (`ObjectID`, an
/// integer Resource id) and string/indexed-text/double-valued ones
/// (`MetaDataValue`, text) — both need to surface as this view's single
/// `ObjectID` output column, not just the resource-valued half.
const TRIPLES_VIEW_DDL: &str = r#"
CREATE VIEW IF NOT EXISTS tracker_triples AS
    SELECT SubjectID, PropertyID, ObjectID FROM ServiceMetaData WHERE ObjectID IS NOT NULL
    UNION ALL
    SELECT SubjectID, PropertyID, MetaDataValue AS ObjectID FROM ServiceMetaData WHERE ObjectID IS NULL
    UNION ALL
    SELECT SubjectID, PropertyID, MetaDataValue AS ObjectID FROM ServiceNumericMetaData
    UNION ALL
    SELECT SubjectID, PropertyID, MetaDataValue AS ObjectID FROM ServiceKeywordMetaData;
"#;

pub fn apply_schema(conn: &Connection, registry: &Registry) -> rusqlite::Result<()> {
    conn.execute_batch(CORE_DDL)?;
    for service in registry.services() {
        create_service_table(conn, &service.table_name)?;
    }
    conn.execute_batch(TRIPLES_VIEW_DDL)?;
    Ok(())
}

fn create_service_table(conn: &Connection, table_name: &str) -> rusqlite::Result<()> {
    // Per-class tables only need to exist to satisfy `rdf:type`-scoped
    // joins the ontology may route through them directly (thumbnails,
    // class-specific indexes); generic property storage always goes
    // through the three side tables regardless of the subject's class.
    let ddl = format!(
        "CREATE TABLE IF NOT EXISTS \"{table_name}\" (\n\
             ID INTEGER PRIMARY KEY REFERENCES Resource(ID) ON DELETE CASCADE\n\
         );"
    );
    conn.execute(&ddl, [])?;
    Ok(())
}

/// Registers every `Sparql*` scalar function the translator's built-in
/// function table (`sparql::expr`) emits calls to, plus the `TRACKER`
/// collation used for locale-aware text ordering.
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    conn.create_scalar_function("SparqlRegex", 3, flags, |ctx| {
        let text: String = ctx.get(0)?;
        let pattern: String = ctx.get(1)?;
        let flags_arg: String = ctx.get(2)?;
        let pattern = if flags_arg.contains('i') {
            format!("(?i){pattern}")
        } else {
            pattern
        };
        let re = regex::Regex::new(&pattern)
            .map_err(|e| SqlError::UserFunctionError(Box::new(e)))?;
        Ok(re.is_match(&text))
    })?;

    conn.create_scalar_function("SparqlRegexReplace", 3, flags, |ctx| {
        let text: String = ctx.get(0)?;
        let pattern: String = ctx.get(1)?;
        let replacement: String = ctx.get(2)?;
        let re = regex::Regex::new(&pattern)
            .map_err(|e| SqlError::UserFunctionError(Box::new(e)))?;
        Ok(re.replace_all(&text, replacement.as_str()).into_owned())
    })?;

    conn.create_scalar_function("SparqlChecksum", 2, flags, |ctx| {
        let text: String = ctx.get(0)?;
        let algorithm: String = ctx.get(1)?;
        Ok(match algorithm.as_str() {
            "md5" => hex(&Md5::digest(text.as_bytes())),
            "sha1" => hex(&Sha1::digest(text.as_bytes())),
            "sha256" => hex(&Sha256::digest(text.as_bytes())),
            "sha384" => hex(&Sha384::digest(text.as_bytes())),
            "sha512" => hex(&Sha512::digest(text.as_bytes())),
            other => {
                return Err(SqlError::UserFunctionError(
                    format!("unsupported checksum algorithm {other}").into(),
                ))
            }
        })
    })?;

    conn.create_scalar_function("SparqlCeil", 1, flags, |ctx| {
        let n: f64 = ctx.get(0)?;
        Ok(n.ceil())
    })?;
    conn.create_scalar_function("SparqlFloor", 1, flags, |ctx| {
        let n: f64 = ctx.get(0)?;
        Ok(n.floor())
    })?;

    conn.create_scalar_function("SparqlUriEncode", 1, flags, |ctx| {
        let text: String = ctx.get(0)?;
        Ok(percent_encode(&text))
    })?;

    conn.create_scalar_function("SparqlStrBefore", 2, flags, |ctx| {
        let text: String = ctx.get(0)?;
        let needle: String = ctx.get(1)?;
        Ok(text.find(&needle).map(|i| text[..i].to_string()).unwrap_or_default())
    })?;
    conn.create_scalar_function("SparqlStrAfter", 2, flags, |ctx| {
        let text: String = ctx.get(0)?;
        let needle: String = ctx.get(1)?;
        Ok(text
            .find(&needle)
            .map(|i| text[i + needle.len()..].to_string())
            .unwrap_or_default())
    })?;

    conn.create_scalar_function("SparqlLangMatches", 2, flags, |ctx| {
        let lang_tag: String = ctx.get(0)?;
        let range: String = ctx.get(1)?;
        Ok(range == "*" || lang_tag.eq_ignore_ascii_case(&range))
    })?;

    // Literal datatype/language metadata aren't modelled as separate
    // columns (spec §3 only stores lexical values); these always answer
    // the plain-literal case, which is what every value this store holds
    // actually is.
    conn.create_scalar_function("SparqlLang", 1, flags, |_ctx| Ok(String::new()))?;
    conn.create_scalar_function("SparqlDatatype", 1, flags, |_ctx| {
        Ok("http://www.w3.org/2001/XMLSchema#string".to_string())
    })?;
    conn.create_scalar_function("SparqlIsResource", 1, flags, |ctx| {
        Ok(matches!(ctx.get_raw(0), rusqlite::types::ValueRef::Integer(_)))
    })?;
    conn.create_scalar_function("SparqlUuid", 0, flags, |_ctx| {
        Ok(uuid::Uuid::new_v4().to_string())
    })?;

    // `fts:rank` reads FTS5's own `rank` hidden column directly (see
    // `sparql::translate`'s `fts:match` handling); `tracker_offsets` has no
    // fts5-native equivalent (fts5 dropped fts3/4's `offsets()`), so this is
    // a deliberately minimal stand-in rather than real match-position data.
    conn.create_scalar_function("tracker_offsets", 1, flags, |_ctx| Ok(String::new()))?;

    conn.create_scalar_function("SparqlCartesianDistance", 4, flags, |ctx| {
        let (lat1, lon1, lat2, lon2): (f64, f64, f64, f64) =
            (ctx.get(0)?, ctx.get(1)?, ctx.get(2)?, ctx.get(3)?);
        let (dlat, dlon) = (lat2 - lat1, lon2 - lon1);
        Ok((dlat * dlat + dlon * dlon).sqrt())
    })?;
    conn.create_scalar_function("SparqlHaversineDistance", 4, flags, |ctx| {
        const EARTH_RADIUS_METERS: f64 = 6_371_000.0;
        let (lat1, lon1, lat2, lon2): (f64, f64, f64, f64) =
            (ctx.get(0)?, ctx.get(1)?, ctx.get(2)?, ctx.get(3)?);
        let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
        let (dphi, dlambda) = ((lat2 - lat1).to_radians(), (lon2 - lon1).to_radians());
        let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
        Ok(EARTH_RADIUS_METERS * 2.0 * a.sqrt().asin())
    })?;

    // Datetime-typed properties store seconds-since-epoch (spec §4.1); the
    // outer projection (spec §4.4) wraps them in this instead of
    // `strftime`, matching the source's `SparqlFormatTime` rather than
    // dropping down to sub-second precision SQLite's own formatter lacks.
    conn.create_scalar_function("SparqlFormatTime", 1, flags, |ctx| {
        let epoch: Option<i64> = ctx.get(0)?;
        Ok(epoch.map(format_time))
    })?;

    conn.create_collation("TRACKER", |a, b| {
        a.to_lowercase().cmp(&b.to_lowercase())
    })?;

    Ok(())
}

/// Seconds-since-epoch to `YYYY-MM-DDTHH:MM:SSZ`.
fn format_time(epoch_seconds: i64) -> String {
    match chrono::DateTime::from_timestamp(epoch_seconds, 0) {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        None => String::new(),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
