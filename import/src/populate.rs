//! Synthetic data generator for load testing.
//!
//! Fills an empty store with random but referentially valid rows. Parent
//! rows are inserted without explicit ids, so on an empty store they are
//! numbered `1..=count`; child rows draw their foreign keys from those
//! ranges without looking them up.

use std::collections::HashSet;

use fake::Fake;
use fake::faker::lorem::en::{Paragraph, Words};
use fake::faker::name::en::Name;
use flow_core::{
    Answer, NewCourse, NewCourseReview, NewProf, NewProfReview, NewUser, ReviewVote, Vote,
};
use flow_sqlite::{
    Table, count_rows, insert_course, insert_course_review, insert_prof, insert_prof_review,
    insert_review_vote, insert_user,
};
use rand::Rng;
use rusqlite::Connection;
use serde::Serialize;
use tracing::info;

use crate::config::PopulateConfig;
use crate::error::{ImportError, Result};
use crate::progress::Progress;

/// Share of courses that get a description.
const DESCRIPTION_RATE: f64 = 0.9;
/// Share of reviews that get text.
const REVIEW_TEXT_RATE: f64 = 0.5;

/// Rows inserted per table by one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PopulateReport {
    pub courses: usize,
    pub profs: usize,
    pub users: usize,
    pub course_reviews: usize,
    pub prof_reviews: usize,
    pub course_review_votes: usize,
    pub prof_review_votes: usize,
}

/// Generates synthetic rows with an injectable random source.
///
/// # Examples
///
/// ```no_run
/// use flow_import::{PopulateConfig, Populator};
/// use rand::SeedableRng;
/// use rand::rngs::StdRng;
/// use rusqlite::Connection;
///
/// let conn = Connection::open("flow.db").unwrap();
/// let config = PopulateConfig { courses: 50, ..PopulateConfig::default() };
/// let mut populator = Populator::new(conn, config, StdRng::seed_from_u64(7)).unwrap();
/// let report = populator.run().unwrap();
/// assert_eq!(report.courses, 50);
/// ```
pub struct Populator<R: Rng> {
    conn: Connection,
    config: PopulateConfig,
    rng: R,
}

impl<R: Rng> Populator<R> {
    /// Creates a populator after validating `config`.
    pub fn new(conn: Connection, config: PopulateConfig, rng: R) -> Result<Self> {
        config.validate()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn, config, rng })
    }

    /// Generates every table in dependency order, one transaction each.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::NotEmpty`] before inserting anything if any
    /// application table already holds rows.
    pub fn run(&mut self) -> Result<PopulateReport> {
        for table in Table::ALL {
            if count_rows(&self.conn, table)? > 0 {
                return Err(ImportError::NotEmpty(table));
            }
        }

        let config = self.config.clone();
        let mut report = PopulateReport::default();

        report.courses = self.stage(
            "courses",
            config.courses,
            |conn, rng, seen: &mut HashSet<String>| {
                let code = loop {
                    let code = course_code(rng);
                    if seen.insert(code.clone()) {
                        break code;
                    }
                };
                insert_course(
                    conn,
                    &NewCourse {
                        id: None,
                        code,
                        name: course_name(rng),
                        description: rng
                            .random_bool(DESCRIPTION_RATE)
                            .then(|| Paragraph(2..5).fake_with_rng(rng)),
                    },
                )?;
                Ok(())
            },
        )?;

        report.profs = self.stage("profs", config.profs, |conn, rng, _: &mut ()| {
            let name: String = Name().fake_with_rng(rng);
            insert_prof(conn, &NewProf { id: None, name })?;
            Ok(())
        })?;

        report.users = self.stage("users", config.users, |conn, rng, _: &mut ()| {
            let name: String = Name().fake_with_rng(rng);
            insert_user(conn, &NewUser { id: None, name, program: None })?;
            Ok(())
        })?;

        report.course_reviews =
            self.stage("course_reviews", config.course_reviews, |conn, rng, _: &mut ()| {
                insert_course_review(
                    conn,
                    &NewCourseReview {
                        id: None,
                        course_id: Some(pick(rng, config.courses)),
                        prof_id: Some(pick(rng, config.profs)),
                        user_id: Some(pick(rng, config.users)),
                        text: review_text(rng),
                        easy: answer(rng),
                        liked: answer(rng),
                        useful: answer(rng),
                    },
                )?;
                Ok(())
            })?;

        report.prof_reviews =
            self.stage("prof_reviews", config.prof_reviews, |conn, rng, _: &mut ()| {
                insert_prof_review(
                    conn,
                    &NewProfReview {
                        id: None,
                        course_id: Some(pick(rng, config.courses)),
                        prof_id: Some(pick(rng, config.profs)),
                        user_id: Some(pick(rng, config.users)),
                        text: review_text(rng),
                        clear: answer(rng),
                        engaging: answer(rng),
                    },
                )?;
                Ok(())
            })?;

        report.course_review_votes = self.votes(
            Table::CourseReviewVote,
            config.course_review_votes,
            config.course_reviews,
        )?;
        report.prof_review_votes = self.votes(
            Table::ProfReviewVote,
            config.prof_review_votes,
            config.prof_reviews,
        )?;

        Ok(report)
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Consumes the populator and returns the underlying connection.
    pub fn into_connection(self) -> Connection {
        self.conn
    }

    fn votes(&mut self, table: Table, count: usize, reviews: usize) -> Result<usize> {
        let users = self.config.users;
        self.stage(table.name(), count, |conn, rng, seen: &mut HashSet<(i64, i64)>| {
            let (review_id, user_id) = loop {
                let pair = (pick(rng, reviews), pick(rng, users));
                if seen.insert(pair) {
                    break pair;
                }
            };
            let vote = if rng.random_bool(0.5) { Vote::Up } else { Vote::Down };
            insert_review_vote(conn, table, &ReviewVote { review_id, user_id, vote })?;
            Ok(())
        })
    }

    /// Runs `row` `count` times inside one transaction. `S` is per-stage
    /// scratch state, such as the set of values already generated.
    fn stage<S, F>(&mut self, name: &str, count: usize, mut row: F) -> Result<usize>
    where
        S: Default,
        F: FnMut(&Connection, &mut R, &mut S) -> Result<()>,
    {
        info!(stage = name, rows = count, "Generating");
        let progress = Progress::bar(count as u64, name);
        let mut scratch = S::default();

        let tx = self.conn.transaction()?;
        for _ in 0..count {
            row(&tx, &mut self.rng, &mut scratch)?;
            progress.inc(1);
        }
        tx.commit()?;
        progress.finish();
        Ok(count)
    }
}

/// Three lowercase letters followed by a number in `100..=999`.
fn course_code<R: Rng>(rng: &mut R) -> String {
    let mut code: String = (0..3)
        .map(|_| char::from(b'a' + rng.random_range(0..26u8)))
        .collect();
    code.push_str(&rng.random_range(100..=999).to_string());
    code
}

/// One to four capitalized words.
fn course_name<R: Rng>(rng: &mut R) -> String {
    let words: Vec<String> = Words(1..5).fake_with_rng(rng);
    words
        .iter()
        .map(|word| capitalize(word))
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn review_text<R: Rng>(rng: &mut R) -> Option<String> {
    rng.random_bool(REVIEW_TEXT_RATE)
        .then(|| Paragraph(1..4).fake_with_rng(rng))
}

fn answer<R: Rng>(rng: &mut R) -> Answer {
    Answer::ALL[rng.random_range(0..Answer::ALL.len())]
}

/// Uniform key in `1..=count`.
fn pick<R: Rng>(rng: &mut R, count: usize) -> i64 {
    rng.random_range(1..=count as i64)
}
