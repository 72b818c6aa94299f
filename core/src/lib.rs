//! Core entity types for the course and professor review store.
//!
//! This crate defines the value objects every other crate in the workspace
//! passes around:
//!
//! - [`Course`], [`Prof`], [`User`]: the parent entities.
//! - [`CourseReview`], [`ProfReview`]: reviews with optional parent keys.
//! - [`ReviewVote`]: one user's [`Vote`] on one review.
//! - [`Answer`]: a three-valued survey answer (yes / no / not answered).
//! - [`Page`]: an offset/limit window for list queries.
//!
//! The `New*` structs describe rows about to be inserted.
//!
//! # Example
//!
//! ```
//! use flow_core::*;
//!
//! let review = NewCourseReview {
//!     course_id: Some(1),
//!     text: Some("Heavy workload, worth it".to_string()),
//!     easy: Answer::No,
//!     liked: Answer::Yes,
//!     ..Default::default()
//! };
//!
//! assert!(review.easy.is_answered());
//! assert!(!review.useful.is_answered());
//! ```

mod answer;
mod types;

pub use answer::{Answer, InvalidVote, Vote};
pub use types::*;
