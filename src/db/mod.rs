// src/db/mod.rs

//! Operation journal for packman
//!
//! Every package operation records a changeset row before touching the
//! filesystem and marks it applied or failed afterwards. A row still pending
//! on a later run means the process died mid-operation; `doctor` reports it.

pub mod models;
pub mod schema;

use crate::error::{Error, Result};
use rusqlite::{Connection, Transaction};
use std::path::Path;
use tracing::{debug, info};

/// Create the journal at `db_path` and bring its schema up to date.
///
/// Idempotent: calling it on an existing journal only applies missing
/// migrations.
pub fn init(db_path: &Path) -> Result<()> {
    debug!("Initializing journal at: {}", db_path.display());

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(db_path)?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )?;

    schema::migrate(&conn)?;

    info!("Journal ready at {}", db_path.display());
    Ok(())
}

/// Open an existing journal
pub fn open(db_path: &Path) -> Result<Connection> {
    if !db_path.exists() {
        return Err(Error::NotFound(db_path.display().to_string()));
    }

    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA busy_timeout = 5000;")?;

    Ok(conn)
}

/// Run `f` inside a transaction, committing on success and rolling back on
/// error
pub fn transaction<F, T>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Transaction) -> Result<T>,
{
    let tx = conn.transaction()?;
    let result = f(&tx)?;
    tx.commit()?;
    Ok(result)
}
