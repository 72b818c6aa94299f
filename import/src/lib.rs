//! Bulk loading tools for the course review store.
//!
//! Two ways to fill a freshly migrated store:
//!
//! - [`Importer`] replays a document-store dump (one `.bson` file per
//!   collection), translating document ids into store keys through an
//!   [`IdMap`].
//! - [`Populator`] generates synthetic rows for load testing, sized by a
//!   [`PopulateConfig`].
//!
//! # Quick start
//!
//! ```no_run
//! use flow_import::{Dump, Importer, PopulateConfig, Populator};
//! use rusqlite::Connection;
//!
//! // Import a dump
//! let dump = Dump::open("/var/backups/rmc").unwrap();
//! let mut importer = Importer::new(Connection::open("flow.db").unwrap(), dump).unwrap();
//! let report = importer.run().unwrap();
//! for stage in &report.stages {
//!     println!("{}: {} rows", stage.stage.name(), stage.rows);
//! }
//!
//! // Or generate data into an empty store
//! let config = PopulateConfig::load("populate.yml").unwrap();
//! let mut populator =
//!     Populator::new(Connection::open("load.db").unwrap(), config, rand::rng()).unwrap();
//! populator.run().unwrap();
//! ```

mod config;
mod dump;
mod error;
mod idmap;
mod pipeline;
mod populate;
mod progress;
mod transform;

pub use config::{MAX_COURSE_CODES, PopulateConfig};
pub use dump::{Collection, Dump, decode_all};
pub use error::{ImportError, Result};
pub use idmap::{ExternalId, IdMap};
pub use pipeline::{ImportReport, Importer, Stage, StageReport};
pub use populate::{PopulateReport, Populator};
pub use transform::{MAX_PROGRAM_LEN, trinary};
