//! Revisioned, reversible schema migrations.
//!
//! A [`Revision`] is one schema change identified by an id and the id of the
//! revision it builds on. The built-in chain ([`REVISIONS`]) is linear:
//! every revision depends on all earlier ones having been applied, in order,
//! exactly once.
//!
//! [`Migrator`] records the applied revision in the `flow_version` table and
//! moves the database up or down the chain. Each revision is applied or
//! reverted in its own transaction together with its bookkeeping update.
//!
//! # Example
//!
//! ```no_run
//! use flow_sqlite::{Migrator, Target};
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("flow.db").unwrap();
//! let mut migrator = Migrator::new(conn).unwrap();
//!
//! // Bring the schema up to date
//! let applied = migrator.upgrade(&Target::Head).unwrap();
//! println!("Applied {} revision(s)", applied.len());
//!
//! // Check status
//! let status = migrator.status().unwrap();
//! assert!(status.pending.is_empty());
//!
//! // Tear everything down again
//! migrator.downgrade(&Target::Base).unwrap();
//! ```

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::schema::{
    INITIAL_DROP_SQL, INITIAL_SCHEMA_SQL, REVIEW_INDEXES_DROP_SQL, REVIEW_INDEXES_SQL, Table,
    count_rows, table_exists,
};

/// Name of the bookkeeping table holding the applied revision.
pub const VERSION_TABLE: &str = "flow_version";

/// One reversible schema change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revision {
    /// Unique revision id.
    pub id: &'static str,
    /// Id of the revision this one builds on; `None` for the first.
    pub parent: Option<&'static str>,
    /// Short human-readable summary.
    pub message: &'static str,
    /// SQL applying the change.
    pub upgrade: &'static str,
    /// SQL reverting the change.
    pub downgrade: &'static str,
}

/// The built-in revision chain, oldest first.
pub static REVISIONS: &[Revision] = &[
    Revision {
        id: "0be90626e582",
        parent: None,
        message: "init",
        upgrade: INITIAL_SCHEMA_SQL,
        downgrade: INITIAL_DROP_SQL,
    },
    Revision {
        id: "5a1c3e9b7d20",
        parent: Some("0be90626e582"),
        message: "index review parents",
        upgrade: REVIEW_INDEXES_SQL,
        downgrade: REVIEW_INDEXES_DROP_SQL,
    },
];

/// Where to move the schema to.
///
/// # Examples
///
/// ```
/// use flow_sqlite::Target;
///
/// assert_eq!("head".parse::<Target>().unwrap(), Target::Head);
/// assert_eq!("base".parse::<Target>().unwrap(), Target::Base);
/// assert_eq!(
///     "0be90626e582".parse::<Target>().unwrap(),
///     Target::Revision("0be90626e582".to_string())
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The newest revision of the chain.
    Head,
    /// The state before the first revision.
    Base,
    /// A specific revision id.
    Revision(String),
}

impl FromStr for Target {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" => Err(StoreError::Migration("empty migration target".to_string())),
            "head" => Ok(Target::Head),
            "base" => Ok(Target::Base),
            id => Ok(Target::Revision(id.to_string())),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Head => f.write_str("head"),
            Target::Base => f.write_str("base"),
            Target::Revision(id) => f.write_str(id),
        }
    }
}

/// The revision currently recorded in the bookkeeping table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedRevision {
    pub id: String,
    pub applied_at: DateTime<Utc>,
}

/// Snapshot of the migration state.
///
/// Returned by [`Migrator::status`].
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Currently applied revision, if any.
    pub current: Option<AppliedRevision>,
    /// Newest revision of the chain.
    pub head: &'static str,
    /// Revisions not yet applied, oldest first.
    pub pending: Vec<&'static str>,
    /// Row count per existing application table.
    pub row_counts: Vec<(Table, usize)>,
}

/// Moves a database along a linear revision chain.
///
/// Owns its connection, like every other long-lived store handle in this
/// crate. Use [`connection`](Self::connection) or
/// [`into_connection`](Self::into_connection) to get it back.
pub struct Migrator {
    conn: Connection,
    revisions: &'static [Revision],
}

impl Migrator {
    /// Creates a migrator over the built-in [`REVISIONS`].
    pub fn new(conn: Connection) -> Result<Self> {
        Self::with_revisions(conn, REVISIONS)
    }

    /// Creates a migrator over a custom chain.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Migration`] if the chain is empty, repeats an
    /// id, or is not linear (a revision whose parent is not its predecessor).
    pub fn with_revisions(conn: Connection, revisions: &'static [Revision]) -> Result<Self> {
        validate_chain(revisions)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {VERSION_TABLE} (
                version_num TEXT NOT NULL PRIMARY KEY,
                applied_at TEXT NOT NULL
            );"
        ))?;
        Ok(Self { conn, revisions })
    }

    /// Returns the chain, oldest first.
    pub fn history(&self) -> &'static [Revision] {
        self.revisions
    }

    /// Returns the newest revision of the chain.
    pub fn head(&self) -> &'static Revision {
        &self.revisions[self.revisions.len() - 1]
    }

    /// Returns the applied revision, or `None` at base.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Migration`] if the recorded revision is not part
    /// of this migrator's chain.
    pub fn current(&self) -> Result<Option<AppliedRevision>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT version_num, applied_at FROM {VERSION_TABLE}"))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let Some((id, applied_at)) = rows.into_iter().next() else {
            return Ok(None);
        };
        self.position(&id)?;
        let applied_at = DateTime::parse_from_rfc3339(&applied_at)
            .map_err(|e| StoreError::Conversion(format!("bad applied_at '{applied_at}': {e}")))?
            .with_timezone(&Utc);
        Ok(Some(AppliedRevision { id, applied_at }))
    }

    /// Applies every revision after the current one up to `target`.
    ///
    /// Returns the ids applied, oldest first. Already being at `target` is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Migration`] if `target` is unknown, is `base`,
    /// or is older than the current revision, or if a revision's SQL fails.
    /// Revisions applied before the failure stay applied.
    pub fn upgrade(&mut self, target: &Target) -> Result<Vec<&'static str>> {
        let current = self.current_position()?;
        let goal = match target {
            Target::Head => self.revisions.len() - 1,
            Target::Base => {
                return Err(StoreError::Migration(
                    "cannot upgrade to base; use downgrade".to_string(),
                ));
            }
            Target::Revision(id) => self.position(id)?,
        };
        if let Some(current) = current {
            if goal < current {
                return Err(StoreError::Migration(format!(
                    "target {target} is older than current revision {}; use downgrade",
                    self.revisions[current].id
                )));
            }
        }

        let revisions = self.revisions;
        let start = current.map_or(0, |c| c + 1);
        let mut applied = Vec::new();
        for revision in &revisions[start..=goal] {
            let tx = self.conn.transaction()?;
            tx.execute_batch(revision.upgrade).map_err(|e| {
                StoreError::Migration(format!("upgrade to {} failed: {e}", revision.id))
            })?;
            tx.execute(&format!("DELETE FROM {VERSION_TABLE}"), [])?;
            tx.execute(
                &format!("INSERT INTO {VERSION_TABLE} (version_num, applied_at) VALUES (?1, ?2)"),
                params![revision.id, Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            debug!(revision = revision.id, message = revision.message, "Applied revision");
            applied.push(revision.id);
        }

        if !applied.is_empty() {
            info!(count = applied.len(), target = %target, "Upgrade complete");
        }
        Ok(applied)
    }

    /// Reverts every revision newer than `target`, newest first.
    ///
    /// Returns the ids reverted. Already being at or below `target` is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Migration`] if `target` is unknown or `head`, or
    /// if a revision's downgrade SQL fails.
    pub fn downgrade(&mut self, target: &Target) -> Result<Vec<&'static str>> {
        let Some(current) = self.current_position()? else {
            return Ok(Vec::new());
        };
        let keep = match target {
            Target::Head => {
                return Err(StoreError::Migration(
                    "cannot downgrade to head; use upgrade".to_string(),
                ));
            }
            Target::Base => None,
            Target::Revision(id) => Some(self.position(id)?),
        };
        let stop = keep.map_or(0, |k| k + 1);
        if stop > current {
            return Ok(Vec::new());
        }

        let revisions = self.revisions;
        let mut reverted = Vec::new();
        for revision in revisions[stop..=current].iter().rev() {
            let tx = self.conn.transaction()?;
            tx.execute_batch(revision.downgrade).map_err(|e| {
                StoreError::Migration(format!("downgrade of {} failed: {e}", revision.id))
            })?;
            tx.execute(&format!("DELETE FROM {VERSION_TABLE}"), [])?;
            if let Some(parent) = revision.parent {
                tx.execute(
                    &format!(
                        "INSERT INTO {VERSION_TABLE} (version_num, applied_at) VALUES (?1, ?2)"
                    ),
                    params![parent, Utc::now().to_rfc3339()],
                )?;
            }
            tx.commit()?;
            debug!(revision = revision.id, message = revision.message, "Reverted revision");
            reverted.push(revision.id);
        }

        info!(count = reverted.len(), target = %target, "Downgrade complete");
        Ok(reverted)
    }

    /// Returns the current revision, pending revisions, and table row counts.
    pub fn status(&self) -> Result<MigrationStatus> {
        let current = self.current()?;
        let start = match &current {
            Some(applied) => self.position(&applied.id)? + 1,
            None => 0,
        };
        let pending = self.revisions[start..].iter().map(|r| r.id).collect();

        let mut row_counts = Vec::new();
        for table in Table::ALL {
            if table_exists(&self.conn, table.name())? {
                row_counts.push((table, count_rows(&self.conn, table)?));
            }
        }

        Ok(MigrationStatus {
            current,
            head: self.head().id,
            pending,
            row_counts,
        })
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Consumes the migrator and returns the underlying connection.
    pub fn into_connection(self) -> Connection {
        self.conn
    }

    fn current_position(&self) -> Result<Option<usize>> {
        match self.current()? {
            Some(applied) => Ok(Some(self.position(&applied.id)?)),
            None => Ok(None),
        }
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.revisions
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| StoreError::Migration(format!("unknown revision: {id}")))
    }
}

fn validate_chain(revisions: &[Revision]) -> Result<()> {
    let Some(first) = revisions.first() else {
        return Err(StoreError::Migration("revision chain is empty".to_string()));
    };
    if let Some(parent) = first.parent {
        return Err(StoreError::Migration(format!(
            "first revision {} must not have a parent (found {parent})",
            first.id
        )));
    }

    let mut seen = HashSet::new();
    for pair in revisions.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.parent != Some(prev.id) {
            return Err(StoreError::Migration(format!(
                "revision {} must build on {}, found {}",
                next.id,
                prev.id,
                next.parent.unwrap_or("none")
            )));
        }
    }
    for revision in revisions {
        if !seen.insert(revision.id) {
            return Err(StoreError::Migration(format!(
                "duplicate revision id: {}",
                revision.id
            )));
        }
    }
    Ok(())
}
