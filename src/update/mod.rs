//! Update executor (C5): `INSERT DATA`/`DELETE DATA`/`DELETE WHERE`/`MODIFY`
//! against the schema `db::schema` creates, with differential indexing into
//! C3 and the user-metadata backup overlay, per spec §4.5.

mod executor;

pub use executor::{execute_update, execute_update_cancellable, UpdateError, UpdateReport};
