//! The bulk import pipeline.
//!
//! Loads a document-store dump into the relational store in five stages:
//! courses, profs, users, course reviews, prof reviews. Every stage clears
//! its table (and everything depending on it), inserts one row per
//! document, and commits, all in a single transaction. A failing stage
//! rolls back and leaves earlier stages committed.
//!
//! # Example
//!
//! ```no_run
//! use flow_import::{Dump, Importer};
//! use rusqlite::Connection;
//!
//! let dump = Dump::open("/var/backups/rmc").unwrap();
//! let conn = Connection::open("flow.db").unwrap();
//! let mut importer = Importer::new(conn, dump).unwrap();
//!
//! let report = importer.run().unwrap();
//! println!("{} unresolved references", report.unresolved());
//! ```

use bson::{Bson, Document};
use flow_core::{NewCourse, NewCourseReview, NewProf, NewProfReview, NewUser};
use flow_sqlite::{
    Table, cascade_order, insert_course, insert_course_review, insert_prof, insert_prof_review,
    insert_user, truncate_cascade,
};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use crate::dump::{Collection, Dump};
use crate::error::{ImportError, Result};
use crate::idmap::{ExternalId, IdMap};
use crate::progress::Progress;
use crate::transform::{full_name, non_blank, program, required_str, sub_document, trinary};

/// One step of the import, in the order [`Importer::run`] executes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Courses,
    Profs,
    Users,
    CourseReviews,
    ProfReviews,
}

impl Stage {
    /// Every stage in execution order. Later stages resolve references
    /// through ids assigned by earlier ones.
    pub const ALL: [Stage; 5] = [
        Stage::Courses,
        Stage::Profs,
        Stage::Users,
        Stage::CourseReviews,
        Stage::ProfReviews,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Courses => "courses",
            Stage::Profs => "profs",
            Stage::Users => "users",
            Stage::CourseReviews => "course_reviews",
            Stage::ProfReviews => "prof_reviews",
        }
    }

    /// Table this stage fills.
    pub fn table(self) -> Table {
        match self {
            Stage::Courses => Table::Course,
            Stage::Profs => Table::Prof,
            Stage::Users => Table::User,
            Stage::CourseReviews => Table::CourseReview,
            Stage::ProfReviews => Table::ProfReview,
        }
    }

    /// Dump collection this stage reads.
    pub fn collection(self) -> Collection {
        match self {
            Stage::Courses => Collection::Course,
            Stage::Profs => Collection::Professor,
            Stage::Users => Collection::User,
            Stage::CourseReviews | Stage::ProfReviews => Collection::UserCourse,
        }
    }
}

/// Outcome of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    /// Rows inserted.
    pub rows: usize,
    /// References to a course, prof or user that is not in the dump.
    /// Each one was stored as null.
    pub unresolved: usize,
    /// Values discarded as implausible (over-long program names).
    pub dropped: usize,
}

impl StageReport {
    fn new(stage: Stage) -> Self {
        Self {
            stage,
            rows: 0,
            unresolved: 0,
            dropped: 0,
        }
    }
}

/// Outcome of a full import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub stages: Vec<StageReport>,
}

impl ImportReport {
    /// Rows inserted by `stage`, or 0 if it did not run.
    pub fn rows(&self, stage: Stage) -> usize {
        self.stages
            .iter()
            .find(|s| s.stage == stage)
            .map_or(0, |s| s.rows)
    }

    /// Unresolved references across all stages.
    pub fn unresolved(&self) -> usize {
        self.stages.iter().map(|s| s.unresolved).sum()
    }
}

/// Runs import stages against one connection.
pub struct Importer {
    conn: Connection,
    dump: Dump,
    idmap: IdMap,
}

impl Importer {
    /// Creates an importer writing through `conn`.
    pub fn new(conn: Connection, dump: Dump) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn,
            dump,
            idmap: IdMap::new(),
        })
    }

    /// Runs every stage in order, stopping at the first failure.
    pub fn run(&mut self) -> Result<ImportReport> {
        let mut report = ImportReport::default();
        for stage in Stage::ALL {
            report.stages.push(self.run_stage(stage)?);
        }
        Ok(report)
    }

    /// Runs a single stage in its own transaction.
    ///
    /// On failure the stage's table and its identifier map keep their
    /// previous contents. Running a review stage before the parent stages
    /// leaves every reference unresolved. On success the identifier maps of
    /// dependent stages are emptied along with their rows.
    pub fn run_stage(&mut self, stage: Stage) -> Result<StageReport> {
        let saved = self.idmap.take(stage.table());
        let report = match self.load_stage(stage) {
            Ok(report) => report,
            Err(err) => {
                self.idmap.restore(stage.table(), saved);
                return Err(err);
            }
        };

        // The truncation emptied every dependent table too.
        for table in cascade_order(stage.table()) {
            if table != stage.table() && Stage::ALL.iter().any(|s| s.table() == table) {
                self.idmap.clear(table);
            }
        }
        Ok(report)
    }

    fn load_stage(&mut self, stage: Stage) -> Result<StageReport> {
        let documents = self.dump.read(stage.collection())?;
        info!(stage = stage.name(), documents = documents.len(), "Starting stage");

        let progress = Progress::bar(documents.len() as u64, stage.name());
        let tx = self.conn.transaction()?;
        truncate_cascade(&tx, stage.table())?;

        let mut report = StageReport::new(stage);
        for doc in &documents {
            match stage {
                Stage::Courses => import_course(&tx, &mut self.idmap, doc)?,
                Stage::Profs => import_prof(&tx, &mut self.idmap, doc)?,
                Stage::Users => import_user(&tx, &mut self.idmap, doc, &mut report)?,
                Stage::CourseReviews => {
                    import_course_review(&tx, &mut self.idmap, doc, &mut report)?
                }
                Stage::ProfReviews => import_prof_review(&tx, &mut self.idmap, doc, &mut report)?,
            }
            report.rows += 1;
            progress.inc(1);
        }
        tx.commit()?;
        progress.finish();

        if report.unresolved > 0 {
            warn!(
                stage = stage.name(),
                count = report.unresolved,
                "References to unknown documents stored as null"
            );
        }
        if report.dropped > 0 {
            warn!(
                stage = stage.name(),
                count = report.dropped,
                "Discarded over-long program names"
            );
        }
        info!(stage = stage.name(), rows = report.rows, "Finished stage");
        Ok(report)
    }

    /// Identifier map built by the stages run so far.
    pub fn idmap(&self) -> &IdMap {
        &self.idmap
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Consumes the importer and returns the underlying connection.
    pub fn into_connection(self) -> Connection {
        self.conn
    }
}

fn document_id(doc: &Document, collection: Collection) -> Result<ExternalId> {
    doc.get("_id")
        .and_then(ExternalId::from_bson)
        .ok_or(ImportError::MissingField {
            collection: collection.name(),
            field: "_id",
        })
}

/// Resolves a reference field, counting ids that are present but unknown.
fn reference(
    idmap: &IdMap,
    table: Table,
    doc: &Document,
    field: &str,
    report: &mut StageReport,
) -> Option<i64> {
    match doc.get(field) {
        None | Some(Bson::Null) => None,
        Some(value) => {
            let id = idmap.resolve_bson(table, Some(value));
            if id.is_none() {
                report.unresolved += 1;
            }
            id
        }
    }
}

fn import_course(conn: &Connection, idmap: &mut IdMap, doc: &Document) -> Result<()> {
    let collection = Collection::Course.name();
    let code = required_str(doc, collection, "_id")?;
    let name = required_str(doc, collection, "name")?;
    let id = idmap.assign(Table::Course, ExternalId::from(code));
    insert_course(
        conn,
        &NewCourse {
            id: Some(id),
            code: code.to_string(),
            name: name.to_string(),
            description: doc.get_str("description").ok().map(str::to_string),
        },
    )?;
    Ok(())
}

fn import_prof(conn: &Connection, idmap: &mut IdMap, doc: &Document) -> Result<()> {
    let external = document_id(doc, Collection::Professor)?;
    let id = idmap.assign(Table::Prof, external);
    insert_prof(
        conn,
        &NewProf {
            id: Some(id),
            name: full_name(doc),
        },
    )?;
    Ok(())
}

fn import_user(
    conn: &Connection,
    idmap: &mut IdMap,
    doc: &Document,
    report: &mut StageReport,
) -> Result<()> {
    let external = document_id(doc, Collection::User)?;
    let id = idmap.assign(Table::User, external);
    let program = program(doc);
    if program.is_none() && non_blank(doc, "program_name").is_some() {
        report.dropped += 1;
    }
    insert_user(
        conn,
        &NewUser {
            id: Some(id),
            name: full_name(doc),
            program,
        },
    )?;
    Ok(())
}

fn import_course_review(
    conn: &Connection,
    idmap: &mut IdMap,
    doc: &Document,
    report: &mut StageReport,
) -> Result<()> {
    let external = document_id(doc, Collection::UserCourse)?;
    let id = idmap.assign(Table::CourseReview, external);
    let review = sub_document(doc, "course_review");
    let new = NewCourseReview {
        id: Some(id),
        course_id: reference(idmap, Table::Course, doc, "course_id", report),
        prof_id: reference(idmap, Table::Prof, doc, "professor_id", report),
        user_id: reference(idmap, Table::User, doc, "user_id", report),
        text: non_blank(review, "comment"),
        easy: trinary(review.get("easiness")),
        liked: trinary(review.get("interest")),
        useful: trinary(review.get("usefulness")),
    };
    insert_course_review(conn, &new)?;
    Ok(())
}

fn import_prof_review(
    conn: &Connection,
    idmap: &mut IdMap,
    doc: &Document,
    report: &mut StageReport,
) -> Result<()> {
    let external = document_id(doc, Collection::UserCourse)?;
    let id = idmap.assign(Table::ProfReview, external);
    let review = sub_document(doc, "professor_review");
    let new = NewProfReview {
        id: Some(id),
        course_id: reference(idmap, Table::Course, doc, "course_id", report),
        prof_id: reference(idmap, Table::Prof, doc, "professor_id", report),
        user_id: reference(idmap, Table::User, doc, "user_id", report),
        text: non_blank(review, "comment"),
        clear: trinary(review.get("clarity")),
        engaging: trinary(review.get("passion")),
    };
    insert_prof_review(conn, &new)?;
    Ok(())
}
