//! Conversion between [`flow_core`] entities and SQLite rows.
//!
//! Insert helpers take the `New*` structs and return the row id. When the
//! struct's `id` is `None` the store assigns the next key.
//!
//! Row readers take the column offset at which the entity's columns start,
//! so joined queries can decode several entities from one row.

use flow_core::{
    Answer, Course, CourseReview, NewCourse, NewCourseReview, NewProf, NewProfReview, NewUser,
    ProfReview, ReviewVote, Vote,
};
use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};

use crate::error::{Result, StoreError};
use crate::schema::Table;

/// Columns read by [`course_from_row`], in order.
pub(crate) const COURSE_COLUMNS: &str = "id, code, name, description";

/// Columns read by [`course_review_from_row`], in order.
pub(crate) const COURSE_REVIEW_COLUMNS: &str =
    "id, course_id, prof_id, user_id, text, easy, liked, useful";

/// Columns read by [`prof_review_from_row`], in order.
pub(crate) const PROF_REVIEW_COLUMNS: &str =
    "id, course_id, prof_id, user_id, text, clear, engaging";

pub(crate) fn answer_to_sql(answer: Answer) -> Option<bool> {
    answer.into()
}

fn answer_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Answer> {
    Ok(Answer::from(row.get::<_, Option<bool>>(idx)?))
}

pub(crate) fn course_from_row(row: &Row<'_>, start: usize) -> rusqlite::Result<Course> {
    Ok(Course {
        id: row.get(start)?,
        code: row.get(start + 1)?,
        name: row.get(start + 2)?,
        description: row.get(start + 3)?,
    })
}

pub(crate) fn course_review_from_row(row: &Row<'_>, start: usize) -> rusqlite::Result<CourseReview> {
    Ok(CourseReview {
        id: row.get(start)?,
        course_id: row.get(start + 1)?,
        prof_id: row.get(start + 2)?,
        user_id: row.get(start + 3)?,
        text: row.get(start + 4)?,
        easy: answer_at(row, start + 5)?,
        liked: answer_at(row, start + 6)?,
        useful: answer_at(row, start + 7)?,
        course: None,
    })
}

pub(crate) fn prof_review_from_row(row: &Row<'_>, start: usize) -> rusqlite::Result<ProfReview> {
    Ok(ProfReview {
        id: row.get(start)?,
        course_id: row.get(start + 1)?,
        prof_id: row.get(start + 2)?,
        user_id: row.get(start + 3)?,
        text: row.get(start + 4)?,
        clear: answer_at(row, start + 5)?,
        engaging: answer_at(row, start + 6)?,
    })
}

fn review_vote_from_row(row: &Row<'_>) -> rusqlite::Result<ReviewVote> {
    let raw: i64 = row.get(2)?;
    let vote = Vote::try_from(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Integer, Box::new(e)))?;
    Ok(ReviewVote {
        review_id: row.get(0)?,
        user_id: row.get(1)?,
        vote,
    })
}

/// Inserts a course and returns its id.
pub fn insert_course(conn: &Connection, course: &NewCourse) -> Result<i64> {
    conn.prepare_cached(
        "INSERT INTO course (id, code, name, description) VALUES (?1, ?2, ?3, ?4)",
    )?
        .execute(params![course.id, course.code, course.name, course.description])?;
    Ok(conn.last_insert_rowid())
}

/// Inserts a professor and returns its id.
pub fn insert_prof(conn: &Connection, prof: &NewProf) -> Result<i64> {
    conn.prepare_cached("INSERT INTO prof (id, name) VALUES (?1, ?2)")?
        .execute(params![prof.id, prof.name])?;
    Ok(conn.last_insert_rowid())
}

/// Inserts a user and returns its id.
pub fn insert_user(conn: &Connection, user: &NewUser) -> Result<i64> {
    conn.prepare_cached("INSERT INTO \"user\" (id, name, program) VALUES (?1, ?2, ?3)")?
        .execute(params![user.id, user.name, user.program])?;
    Ok(conn.last_insert_rowid())
}

/// Inserts a course review and returns its id.
pub fn insert_course_review(conn: &Connection, review: &NewCourseReview) -> Result<i64> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO course_review (id, course_id, prof_id, user_id, text, easy, liked, useful) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    stmt.execute(params![
        review.id,
        review.course_id,
        review.prof_id,
        review.user_id,
        review.text,
        answer_to_sql(review.easy),
        answer_to_sql(review.liked),
        answer_to_sql(review.useful),
    ])?;
    Ok(conn.last_insert_rowid())
}

/// Inserts a prof review and returns its id.
pub fn insert_prof_review(conn: &Connection, review: &NewProfReview) -> Result<i64> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO prof_review (id, course_id, prof_id, user_id, text, clear, engaging) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    stmt.execute(params![
        review.id,
        review.course_id,
        review.prof_id,
        review.user_id,
        review.text,
        answer_to_sql(review.clear),
        answer_to_sql(review.engaging),
    ])?;
    Ok(conn.last_insert_rowid())
}

/// Inserts a vote into one of the two vote tables.
///
/// # Errors
///
/// Returns [`StoreError::Conversion`] if `table` is not a vote table, or a
/// database error if the `(review_id, user_id)` pair already voted.
pub fn insert_review_vote(conn: &Connection, table: Table, vote: &ReviewVote) -> Result<()> {
    check_vote_table(table)?;
    let sql = format!(
        "INSERT INTO {} (review_id, user_id, vote) VALUES (?1, ?2, ?3)",
        table.ident()
    );
    conn.prepare_cached(&sql)?
        .execute(params![vote.review_id, vote.user_id, vote.vote.value()])?;
    Ok(())
}

/// Loads every course review ordered by id, without attached courses.
pub fn load_course_reviews(conn: &Connection) -> Result<Vec<CourseReview>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COURSE_REVIEW_COLUMNS} FROM course_review ORDER BY id"
    ))?;
    let reviews = stmt
        .query_map([], |row| course_review_from_row(row, 0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(reviews)
}

/// Loads every prof review ordered by id.
pub fn load_prof_reviews(conn: &Connection) -> Result<Vec<ProfReview>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PROF_REVIEW_COLUMNS} FROM prof_review ORDER BY id"
    ))?;
    let reviews = stmt
        .query_map([], |row| prof_review_from_row(row, 0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(reviews)
}

/// Loads every vote of one vote table ordered by `(review_id, user_id)`.
pub fn load_review_votes(conn: &Connection, table: Table) -> Result<Vec<ReviewVote>> {
    check_vote_table(table)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT review_id, user_id, vote FROM {} ORDER BY review_id, user_id",
        table.ident()
    ))?;
    let votes = stmt
        .query_map([], review_vote_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(votes)
}

fn check_vote_table(table: Table) -> Result<()> {
    match table {
        Table::CourseReviewVote | Table::ProfReviewVote => Ok(()),
        other => Err(StoreError::Conversion(format!(
            "{} is not a vote table",
            other.name()
        ))),
    }
}
