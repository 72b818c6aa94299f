//! SQL schema for the review store and its foreign-key graph.
//!
//! # Table structure
//!
//! The schema consists of 7 tables, listed in dependency order:
//!
//! - `course`: courses, unique `code` (index `ix_course_code`)
//! - `prof`: professors
//! - `"user"`: users with an optional program
//! - `course_review`: course reviews, nullable parent keys
//! - `prof_review`: professor reviews, nullable parent keys
//! - `course_review_vote`: one vote per (course review, user)
//! - `prof_review_vote`: one vote per (prof review, user)
//!
//! Every table carries `created`/`modified` timestamps. An `AFTER UPDATE`
//! trigger per table refreshes `modified` unless the update set it itself.
//!
//! Deleting a review or a user cascades to its votes. Deleting a course,
//! prof, or user nulls the matching key on reviews.

use std::collections::HashSet;

use rusqlite::Connection;
use tracing::debug;

use crate::error::{Result, StoreError};

/// A table of the review schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Course,
    Prof,
    User,
    CourseReview,
    ProfReview,
    CourseReviewVote,
    ProfReviewVote,
}

impl Table {
    /// Every table, parents before children.
    pub const ALL: [Table; 7] = [
        Table::Course,
        Table::Prof,
        Table::User,
        Table::CourseReview,
        Table::ProfReview,
        Table::CourseReviewVote,
        Table::ProfReviewVote,
    ];

    /// Bare table name.
    pub fn name(self) -> &'static str {
        match self {
            Table::Course => "course",
            Table::Prof => "prof",
            Table::User => "user",
            Table::CourseReview => "course_review",
            Table::ProfReview => "prof_review",
            Table::CourseReviewVote => "course_review_vote",
            Table::ProfReviewVote => "prof_review_vote",
        }
    }

    /// Table name quoted for use in SQL text.
    pub fn ident(self) -> String {
        format!("\"{}\"", self.name())
    }

    /// Tables this table holds foreign keys into.
    pub fn references(self) -> &'static [Table] {
        match self {
            Table::Course | Table::Prof | Table::User => &[],
            Table::CourseReview | Table::ProfReview => &[Table::Course, Table::Prof, Table::User],
            Table::CourseReviewVote => &[Table::CourseReview, Table::User],
            Table::ProfReviewVote => &[Table::ProfReview, Table::User],
        }
    }
}

/// Returns `table` plus every table that transitively references it,
/// children first, so deleting in the returned order never violates a
/// foreign key.
pub fn cascade_order(table: Table) -> Vec<Table> {
    let mut reached: HashSet<Table> = HashSet::from([table]);

    // ALL is in dependency order, so a single forward pass sees every parent
    // before any of its children.
    for candidate in Table::ALL {
        if candidate.references().iter().any(|r| reached.contains(r)) {
            reached.insert(candidate);
        }
    }

    Table::ALL
        .into_iter()
        .rev()
        .filter(|t| reached.contains(t))
        .collect()
}

/// Deletes every row of `table` and of all tables that depend on it.
///
/// This is the store's equivalent of `TRUNCATE table CASCADE`. Returns the
/// tables that were cleared, children first.
pub fn truncate_cascade(conn: &Connection, table: Table) -> Result<Vec<Table>> {
    let order = cascade_order(table);
    for t in &order {
        let removed = conn.execute(&format!("DELETE FROM {}", t.ident()), [])?;
        debug!(table = t.name(), rows = removed, "Truncated table");
    }
    Ok(order)
}

/// Counts the rows of one table.
pub fn count_rows(conn: &Connection, table: Table) -> Result<usize> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", table.ident()),
        [],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Returns `true` if a table with the given bare name exists.
pub fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Creates every table, trigger, and the `ix_course_code` index.
///
/// Not idempotent: fails if any of the tables already exists. Callers that
/// need to track what has been applied should go through
/// [`Migrator`](crate::Migrator) instead.
pub fn apply_initial_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(INITIAL_SCHEMA_SQL)
        .map_err(|e| StoreError::Migration(format!("failed to create initial schema: {e}")))
}

/// DDL of the initial schema revision.
pub const INITIAL_SCHEMA_SQL: &str = r#"
CREATE TABLE course (
    created TEXT NOT NULL DEFAULT (datetime('now')),
    modified TEXT NOT NULL DEFAULT (datetime('now')),
    id INTEGER PRIMARY KEY,
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT
);

CREATE UNIQUE INDEX ix_course_code ON course(code);

CREATE TABLE prof (
    created TEXT NOT NULL DEFAULT (datetime('now')),
    modified TEXT NOT NULL DEFAULT (datetime('now')),
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE "user" (
    created TEXT NOT NULL DEFAULT (datetime('now')),
    modified TEXT NOT NULL DEFAULT (datetime('now')),
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    program TEXT
);

CREATE TABLE course_review (
    created TEXT NOT NULL DEFAULT (datetime('now')),
    modified TEXT NOT NULL DEFAULT (datetime('now')),
    id INTEGER PRIMARY KEY,
    course_id INTEGER,
    prof_id INTEGER,
    user_id INTEGER,
    text TEXT,
    easy INTEGER CHECK (easy IN (0, 1)),
    liked INTEGER CHECK (liked IN (0, 1)),
    useful INTEGER CHECK (useful IN (0, 1)),
    FOREIGN KEY (course_id) REFERENCES course(id) ON DELETE SET NULL,
    FOREIGN KEY (prof_id) REFERENCES prof(id) ON DELETE SET NULL,
    FOREIGN KEY (user_id) REFERENCES "user"(id) ON DELETE SET NULL
);

CREATE TABLE prof_review (
    created TEXT NOT NULL DEFAULT (datetime('now')),
    modified TEXT NOT NULL DEFAULT (datetime('now')),
    id INTEGER PRIMARY KEY,
    course_id INTEGER,
    prof_id INTEGER,
    user_id INTEGER,
    text TEXT,
    clear INTEGER CHECK (clear IN (0, 1)),
    engaging INTEGER CHECK (engaging IN (0, 1)),
    FOREIGN KEY (course_id) REFERENCES course(id) ON DELETE SET NULL,
    FOREIGN KEY (prof_id) REFERENCES prof(id) ON DELETE SET NULL,
    FOREIGN KEY (user_id) REFERENCES "user"(id) ON DELETE SET NULL
);

CREATE TABLE course_review_vote (
    created TEXT NOT NULL DEFAULT (datetime('now')),
    modified TEXT NOT NULL DEFAULT (datetime('now')),
    review_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    vote INTEGER NOT NULL CHECK (vote IN (-1, 1)),
    PRIMARY KEY (review_id, user_id),
    FOREIGN KEY (review_id) REFERENCES course_review(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id) REFERENCES "user"(id) ON DELETE CASCADE
);

CREATE TABLE prof_review_vote (
    created TEXT NOT NULL DEFAULT (datetime('now')),
    modified TEXT NOT NULL DEFAULT (datetime('now')),
    review_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    vote INTEGER NOT NULL CHECK (vote IN (-1, 1)),
    PRIMARY KEY (review_id, user_id),
    FOREIGN KEY (review_id) REFERENCES prof_review(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id) REFERENCES "user"(id) ON DELETE CASCADE
);

CREATE TRIGGER course_touch AFTER UPDATE ON course
FOR EACH ROW WHEN NEW.modified = OLD.modified
BEGIN
    UPDATE course SET modified = datetime('now') WHERE rowid = NEW.rowid;
END;

CREATE TRIGGER prof_touch AFTER UPDATE ON prof
FOR EACH ROW WHEN NEW.modified = OLD.modified
BEGIN
    UPDATE prof SET modified = datetime('now') WHERE rowid = NEW.rowid;
END;

CREATE TRIGGER user_touch AFTER UPDATE ON "user"
FOR EACH ROW WHEN NEW.modified = OLD.modified
BEGIN
    UPDATE "user" SET modified = datetime('now') WHERE rowid = NEW.rowid;
END;

CREATE TRIGGER course_review_touch AFTER UPDATE ON course_review
FOR EACH ROW WHEN NEW.modified = OLD.modified
BEGIN
    UPDATE course_review SET modified = datetime('now') WHERE rowid = NEW.rowid;
END;

CREATE TRIGGER prof_review_touch AFTER UPDATE ON prof_review
FOR EACH ROW WHEN NEW.modified = OLD.modified
BEGIN
    UPDATE prof_review SET modified = datetime('now') WHERE rowid = NEW.rowid;
END;

CREATE TRIGGER course_review_vote_touch AFTER UPDATE ON course_review_vote
FOR EACH ROW WHEN NEW.modified = OLD.modified
BEGIN
    UPDATE course_review_vote SET modified = datetime('now') WHERE rowid = NEW.rowid;
END;

CREATE TRIGGER prof_review_vote_touch AFTER UPDATE ON prof_review_vote
FOR EACH ROW WHEN NEW.modified = OLD.modified
BEGIN
    UPDATE prof_review_vote SET modified = datetime('now') WHERE rowid = NEW.rowid;
END;
"#;

/// Reverts [`INITIAL_SCHEMA_SQL`], children first.
///
/// Dropping a table drops its triggers and indexes with it.
pub const INITIAL_DROP_SQL: &str = r#"
DROP TABLE prof_review_vote;
DROP TABLE course_review_vote;
DROP TABLE prof_review;
DROP TABLE course_review;
DROP TABLE "user";
DROP TABLE prof;
DROP INDEX ix_course_code;
DROP TABLE course;
"#;

/// Secondary indexes on review parent keys.
pub const REVIEW_INDEXES_SQL: &str = r#"
CREATE INDEX ix_course_review_course_id ON course_review(course_id);
CREATE INDEX ix_course_review_prof_id ON course_review(prof_id);
CREATE INDEX ix_prof_review_course_id ON prof_review(course_id);
CREATE INDEX ix_prof_review_prof_id ON prof_review(prof_id);
"#;

/// Reverts [`REVIEW_INDEXES_SQL`].
pub const REVIEW_INDEXES_DROP_SQL: &str = r#"
DROP INDEX ix_prof_review_prof_id;
DROP INDEX ix_prof_review_course_id;
DROP INDEX ix_course_review_prof_id;
DROP INDEX ix_course_review_course_id;
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        apply_initial_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_all_is_dependency_ordered() {
        for (i, table) in Table::ALL.iter().enumerate() {
            for parent in table.references() {
                let pos = Table::ALL.iter().position(|t| t == parent).unwrap();
                assert!(pos < i, "{} must come after {}", table.name(), parent.name());
            }
        }
    }

    #[test]
    fn test_cascade_order_for_course() {
        assert_eq!(
            cascade_order(Table::Course),
            vec![
                Table::ProfReviewVote,
                Table::CourseReviewVote,
                Table::ProfReview,
                Table::CourseReview,
                Table::Course,
            ]
        );
    }

    #[test]
    fn test_cascade_order_for_leaf() {
        assert_eq!(cascade_order(Table::ProfReviewVote), vec![Table::ProfReviewVote]);
        assert_eq!(
            cascade_order(Table::CourseReview),
            vec![Table::CourseReviewVote, Table::CourseReview]
        );
    }

    #[test]
    fn test_initial_schema_creates_all_tables() {
        let conn = open();
        for table in Table::ALL {
            assert!(table_exists(&conn, table.name()).unwrap(), "{}", table.name());
        }
    }

    #[test]
    fn test_initial_schema_is_not_idempotent() {
        let conn = open();
        let err = apply_initial_schema(&conn).unwrap_err();
        assert!(matches!(err, StoreError::Migration(_)));
    }

    #[test]
    fn test_duplicate_course_code_rejected() {
        let conn = open();
        conn.execute("INSERT INTO course (code, name) VALUES ('cs135', 'A')", [])
            .unwrap();
        let err = conn
            .execute("INSERT INTO course (code, name) VALUES ('cs135', 'B')", [])
            .unwrap_err();
        assert!(err.to_string().contains("UNIQUE"));
    }

    #[test]
    fn test_vote_value_checked() {
        let conn = open();
        conn.execute("INSERT INTO \"user\" (id, name) VALUES (1, 'u')", [])
            .unwrap();
        conn.execute("INSERT INTO course_review (id) VALUES (1)", [])
            .unwrap();
        assert!(conn
            .execute(
                "INSERT INTO course_review_vote (review_id, user_id, vote) VALUES (1, 1, 0)",
                [],
            )
            .is_err());
        assert!(conn
            .execute(
                "INSERT INTO course_review_vote (review_id, user_id, vote) VALUES (1, 1, -1)",
                [],
            )
            .is_ok());
    }

    #[test]
    fn test_truncate_cascade_clears_dependents_only() {
        let conn = open();
        conn.execute_batch(
            r#"
            INSERT INTO course (id, code, name) VALUES (1, 'cs135', 'A');
            INSERT INTO prof (id, name) VALUES (1, 'P');
            INSERT INTO "user" (id, name) VALUES (1, 'U');
            INSERT INTO course_review (id, course_id, prof_id, user_id) VALUES (1, 1, 1, 1);
            INSERT INTO prof_review (id, course_id, prof_id, user_id) VALUES (1, 1, 1, 1);
            INSERT INTO course_review_vote (review_id, user_id, vote) VALUES (1, 1, 1);
            "#,
        )
        .unwrap();

        let cleared = truncate_cascade(&conn, Table::Prof).unwrap();
        assert_eq!(cleared.last(), Some(&Table::Prof));

        assert_eq!(count_rows(&conn, Table::Prof).unwrap(), 0);
        assert_eq!(count_rows(&conn, Table::CourseReview).unwrap(), 0);
        assert_eq!(count_rows(&conn, Table::CourseReviewVote).unwrap(), 0);
        assert_eq!(count_rows(&conn, Table::Course).unwrap(), 1);
        assert_eq!(count_rows(&conn, Table::User).unwrap(), 1);
    }

    #[test]
    fn test_modified_refreshed_on_update() {
        let conn = open();
        conn.execute(
            "INSERT INTO prof (id, name, created, modified) VALUES (1, 'P', '2000-01-01 00:00:00', '2000-01-01 00:00:00')",
            [],
        )
        .unwrap();
        conn.execute("UPDATE prof SET name = 'Q' WHERE id = 1", [])
            .unwrap();
        let (created, modified): (String, String) = conn
            .query_row("SELECT created, modified FROM prof WHERE id = 1", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(created, "2000-01-01 00:00:00");
        assert_ne!(modified, "2000-01-01 00:00:00");
    }
}
