//! SQLite store for course and professor reviews.
//!
//! This crate owns the relational schema, the revisioned migrations that
//! create it, the row conversions used by the bulk tools, and the read-only
//! query interface behind the HTTP API.
//!
//! # Architecture
//!
//! - **`schema`**: table catalog, DDL, and cascade-aware truncation
//! - **`migration`**: the revision chain and the [`Migrator`] driving it
//! - **`convert`**: entity ↔ row conversion and insert/load helpers
//! - **`query`**: course lookups for API handlers
//! - **`config`**: environment-driven connection settings
//!
//! # Quick start: migrations
//!
//! ```no_run
//! use flow_sqlite::{DatabaseConfig, Migrator, Target};
//!
//! let conn = DatabaseConfig::from_env().unwrap().open().unwrap();
//! let mut migrator = Migrator::new(conn).unwrap();
//! migrator.upgrade(&Target::Head).unwrap();
//!
//! let status = migrator.status().unwrap();
//! println!("at {:?}, {} pending", status.current, status.pending.len());
//! ```
//!
//! # Quick start: queries
//!
//! ```no_run
//! use flow_core::Page;
//! use flow_sqlite::CourseQuery;
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("flow.db").unwrap();
//! let query = CourseQuery::new(&conn);
//!
//! for course in query.list_courses(Page::default()).unwrap() {
//!     println!("{} {}", course.code, course.name);
//! }
//! ```

mod config;
mod convert;
mod error;
mod migration;
mod query;
mod schema;

pub use config::{BUSY_TIMEOUT_ENV, DATABASE_ENV, DatabaseConfig};
pub use convert::{
    insert_course, insert_course_review, insert_prof, insert_prof_review, insert_review_vote,
    insert_user, load_course_reviews, load_prof_reviews, load_review_votes,
};
pub use error::{Result, StoreError};
pub use migration::{
    AppliedRevision, MigrationStatus, Migrator, REVISIONS, Revision, Target, VERSION_TABLE,
};
pub use query::CourseQuery;
pub use schema::{Table, apply_initial_schema, cascade_order, count_rows, table_exists, truncate_cascade};
