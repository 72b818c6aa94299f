//! Read-only course lookups for the API layer.
//!
//! Provides [`CourseQuery`], the data-access object an HTTP handler calls.
//! Every lookup is one query against the store. Absent entities and bad
//! input come back as [`StoreError`] variants with an HTTP status attached
//! (see [`StoreError::status_code`]), never as a store fault.
//!
//! # Example
//!
//! ```no_run
//! use flow_core::Page;
//! use flow_sqlite::CourseQuery;
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("flow.db").unwrap();
//! let query = CourseQuery::new(&conn);
//!
//! let course = query.course_by_code("cs135").unwrap();
//! let reviews = query.course_reviews_by_code(&course.code, Page::default()).unwrap();
//! println!("{} has {} reviews", course.name, reviews.len());
//! ```

use std::collections::BTreeSet;

use flow_core::{Course, CourseReview, Page};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use crate::convert::{self, COURSE_COLUMNS};
use crate::error::{Result, StoreError};

/// Query interface for reading courses and their reviews.
pub struct CourseQuery<'a> {
    conn: &'a Connection,
}

impl<'a> CourseQuery<'a> {
    /// Creates a query interface over the given connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Lists courses in insertion (id) order.
    pub fn list_courses(&self, page: Page) -> Result<Vec<Course>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COURSE_COLUMNS} FROM course ORDER BY id LIMIT ?1 OFFSET ?2"
        ))?;
        let courses = stmt
            .query_map(params![page.limit, page.offset], |row| {
                convert::course_from_row(row, 0)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(courses)
    }

    /// Looks a course up by its exact code.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no course has this code.
    pub fn course_by_code(&self, code: &str) -> Result<Course> {
        self.conn
            .query_row(
                &format!("SELECT {COURSE_COLUMNS} FROM course WHERE code = ?1"),
                params![code],
                |row| convert::course_from_row(row, 0),
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("course {code}")))
    }

    /// Fetches the courses named by a comma-separated id list.
    ///
    /// Whitespace around each id is ignored and repeated ids are collapsed.
    /// Results are ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MalformedInput`] if any element is not an
    /// integer, or [`StoreError::MissingIds`] naming every requested id that
    /// does not exist.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use flow_sqlite::{CourseQuery, StoreError};
    /// # use rusqlite::Connection;
    /// # let conn = Connection::open("flow.db").unwrap();
    /// # let query = CourseQuery::new(&conn);
    /// match query.courses_by_ids("1,2,9999") {
    ///     Ok(courses) => println!("{} courses", courses.len()),
    ///     Err(StoreError::MissingIds(ids)) => println!("missing: {ids:?}"),
    ///     Err(e) => eprintln!("{e}"),
    /// }
    /// ```
    pub fn courses_by_ids(&self, ids: &str) -> Result<Vec<Course>> {
        let requested = parse_id_list(ids)?;

        let placeholders = vec!["?"; requested.len()].join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COURSE_COLUMNS} FROM course WHERE id IN ({placeholders}) ORDER BY id"
        ))?;
        let courses = stmt
            .query_map(params_from_iter(requested.iter()), |row| {
                convert::course_from_row(row, 0)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if courses.len() < requested.len() {
            let found: BTreeSet<i64> = courses.iter().map(|c| c.id).collect();
            let missing = requested.difference(&found).copied().collect();
            return Err(StoreError::MissingIds(missing));
        }
        Ok(courses)
    }

    /// Lists the reviews of one course, each with the course attached.
    ///
    /// The parent course comes from the same joined query, so callers never
    /// need a second lookup per review. Reviews are ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no course has this code. A known
    /// course without reviews yields an empty list.
    pub fn course_reviews_by_code(&self, code: &str, page: Page) -> Result<Vec<CourseReview>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.id, r.course_id, r.prof_id, r.user_id, r.text, r.easy, r.liked, r.useful, \
                    c.id, c.code, c.name, c.description \
             FROM course_review r JOIN course c ON c.id = r.course_id \
             WHERE c.code = ?1 \
             ORDER BY r.id LIMIT ?2 OFFSET ?3",
        )?;
        let reviews = stmt
            .query_map(params![code, page.limit, page.offset], |row| {
                let mut review = convert::course_review_from_row(row, 0)?;
                review.course = Some(convert::course_from_row(row, 8)?);
                Ok(review)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if reviews.is_empty() {
            // Distinguish "no such course" from "course without reviews".
            self.course_by_code(code)?;
        }
        Ok(reviews)
    }
}

/// Parses `"1, 2,3"` into a set of ids.
fn parse_id_list(raw: &str) -> Result<BTreeSet<i64>> {
    raw.split(',')
        .map(|part| {
            let part = part.trim();
            part.parse::<i64>().map_err(|_| {
                if part.is_empty() {
                    StoreError::MalformedInput(format!("empty id in list '{raw}'"))
                } else {
                    StoreError::MalformedInput(format!("invalid course id '{part}'"))
                }
            })
        })
        .collect()
}
