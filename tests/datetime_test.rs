//! Date/time built-in functions over a stored seconds-since-epoch value.

mod common;

use common::{col, TestEngine};

#[test]
fn year_month_day_hours_minutes_seconds_read_stored_epoch_seconds() {
    let engine = TestEngine::new();
    engine.update(
        "INSERT DATA { <file:///tmp/a.txt> a <nfo:FileDataObject> ; \
         <nie:contentLastModified> \"1700000000\" }",
    );

    let result = engine.query(
        "SELECT ?y ?mo ?d ?h ?mi ?s WHERE { \
         <file:///tmp/a.txt> <nie:contentLastModified> ?m . \
         BIND(YEAR(?m) AS ?y) BIND(MONTH(?m) AS ?mo) BIND(DAY(?m) AS ?d) \
         BIND(HOURS(?m) AS ?h) BIND(MINUTES(?m) AS ?mi) BIND(SECONDS(?m) AS ?s) }",
    );
    assert_eq!(result.rows.len(), 1);
    let row = &result.rows[0];
    assert_eq!(row.text(col(&result, "y")).as_deref(), Some("2023"));
    assert_eq!(row.text(col(&result, "mo")).as_deref(), Some("11"));
    assert_eq!(row.text(col(&result, "d")).as_deref(), Some("14"));
    assert_eq!(row.text(col(&result, "h")).as_deref(), Some("22"));
    assert_eq!(row.text(col(&result, "mi")).as_deref(), Some("13"));
    assert_eq!(row.text(col(&result, "s")).as_deref(), Some("20"));
}
