// src/db/models.rs

//! Journal records

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::fmt;
use std::str::FromStr;

/// Changeset status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangesetStatus {
    Pending,
    Applied,
    Failed,
}

impl ChangesetStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ChangesetStatus::Pending => "pending",
            ChangesetStatus::Applied => "applied",
            ChangesetStatus::Failed => "failed",
        }
    }
}

impl FromStr for ChangesetStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ChangesetStatus::Pending),
            "applied" => Ok(ChangesetStatus::Applied),
            "failed" => Ok(ChangesetStatus::Failed),
            _ => Err(format!("Invalid changeset status: {}", s)),
        }
    }
}

impl fmt::Display for ChangesetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One journaled package operation, such as `add web`
#[derive(Debug, Clone)]
pub struct Changeset {
    pub id: Option<i64>,
    pub description: String,
    pub status: ChangesetStatus,
    pub created_at: Option<String>,
    pub finished_at: Option<String>,
    pub error: Option<String>,
}

const COLUMNS: &str = "id, description, status, created_at, finished_at, error";

impl Changeset {
    pub fn new(description: String) -> Self {
        Self {
            id: None,
            description,
            status: ChangesetStatus::Pending,
            created_at: None,
            finished_at: None,
            error: None,
        }
    }

    /// Insert this changeset into the journal
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO changesets (description, status) VALUES (?1, ?2)",
            params![&self.description, self.status.as_str()],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!("SELECT {} FROM changesets WHERE id = ?1", COLUMNS))?;
        let changeset = stmt.query_row([id], Self::from_row).optional()?;
        Ok(changeset)
    }

    /// All changesets, newest first
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!("SELECT {} FROM changesets ORDER BY id DESC", COLUMNS))?;
        let changesets = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(changesets)
    }

    /// Changesets that never finished, oldest first
    pub fn list_pending(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM changesets WHERE status = 'pending' ORDER BY id",
            COLUMNS
        ))?;
        let changesets = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(changesets)
    }

    /// Finish this changeset. `error` is kept for failed changesets.
    pub fn finish(&mut self, conn: &Connection, status: ChangesetStatus, error: Option<String>) -> Result<()> {
        let id = self
            .id
            .ok_or_else(|| Error::InvalidArgument("Cannot update changeset without ID".to_string()))?;

        conn.execute(
            "UPDATE changesets SET status = ?1, error = ?2, finished_at = CURRENT_TIMESTAMP WHERE id = ?3",
            params![status.as_str(), &error, id],
        )?;

        self.status = status;
        self.error = error;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let status_str: String = row.get(2)?;
        let status = status_str.parse::<ChangesetStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            )
        })?;

        Ok(Self {
            id: Some(row.get(0)?),
            description: row.get(1)?,
            status,
            created_at: row.get(3)?,
            finished_at: row.get(4)?,
            error: row.get(5)?,
        })
    }
}
