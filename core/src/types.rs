//! Entity type definitions for the review store.
//!
//! Rows read back from the store use the plain entity structs ([`Course`],
//! [`CourseReview`], ...). Rows about to be written use the `New*` structs,
//! whose `id` is optional: `None` lets the store assign the next key, `Some`
//! pins it (the bulk importer assigns its own sequential keys).

use serde::{Deserialize, Serialize};

use crate::answer::{Answer, Vote};

/// Default page size for list queries.
pub const DEFAULT_PAGE_LIMIT: u32 = 100;

/// A course, identified by a unique code such as `cs135`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
}

/// A professor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prof {
    pub id: i64,
    pub name: String,
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub program: Option<String>,
}

/// A review of a course.
///
/// Parent keys are optional: a review outlives a deleted parent, and the
/// importer keeps reviews whose parent never resolved. `course` is filled in
/// by lookups that join the parent course in the same query.
///
/// Serializes as `{id, text, easy, liked, useful}`. Parent keys and the
/// attached course stay in memory only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseReview {
    pub id: i64,
    #[serde(default, skip_serializing)]
    pub course_id: Option<i64>,
    #[serde(default, skip_serializing)]
    pub prof_id: Option<i64>,
    #[serde(default, skip_serializing)]
    pub user_id: Option<i64>,
    pub text: Option<String>,
    pub easy: Answer,
    pub liked: Answer,
    pub useful: Answer,
    #[serde(default, skip_serializing)]
    pub course: Option<Course>,
}

/// A review of a professor, given in the context of a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfReview {
    pub id: i64,
    pub course_id: Option<i64>,
    pub prof_id: Option<i64>,
    pub user_id: Option<i64>,
    pub text: Option<String>,
    pub clear: Answer,
    pub engaging: Answer,
}

/// A user's vote on a review. At most one per `(review_id, user_id)`.
///
/// The same shape is used for course review votes and prof review votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewVote {
    pub review_id: i64,
    pub user_id: i64,
    pub vote: Vote,
}

/// A course row to insert.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewCourse {
    pub id: Option<i64>,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
}

/// A professor row to insert.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewProf {
    pub id: Option<i64>,
    pub name: String,
}

/// A user row to insert.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewUser {
    pub id: Option<i64>,
    pub name: String,
    pub program: Option<String>,
}

/// A course review row to insert.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewCourseReview {
    pub id: Option<i64>,
    pub course_id: Option<i64>,
    pub prof_id: Option<i64>,
    pub user_id: Option<i64>,
    pub text: Option<String>,
    pub easy: Answer,
    pub liked: Answer,
    pub useful: Answer,
}

/// A prof review row to insert.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewProfReview {
    pub id: Option<i64>,
    pub course_id: Option<i64>,
    pub prof_id: Option<i64>,
    pub user_id: Option<i64>,
    pub text: Option<String>,
    pub clear: Answer,
    pub engaging: Answer,
}

/// Offset/limit window for list queries.
///
/// # Examples
///
/// ```
/// use flow_core::Page;
///
/// let page = Page::default();
/// assert_eq!(page.limit, 100);
/// assert_eq!(page.offset, 0);
///
/// let next = Page::new(20, 40);
/// assert_eq!(next.offset, 40);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}
