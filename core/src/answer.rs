//! Three-valued survey answers and review votes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Answer to a yes/no review question.
///
/// `Unknown` means the reviewer skipped the question, which is different
/// from answering `No`. Serializes as `true`, `false`, or `null`.
///
/// # Examples
///
/// ```
/// use flow_core::Answer;
///
/// assert_eq!(Answer::from(Some(false)), Answer::No);
/// assert_eq!(Answer::from(None), Answer::Unknown);
/// assert_eq!(Option::<bool>::from(Answer::Yes), Some(true));
/// assert!(!Answer::Unknown.is_answered());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum Answer {
    Yes,
    No,
    #[default]
    Unknown,
}

impl Answer {
    /// All three answers, in a fixed order.
    pub const ALL: [Answer; 3] = [Answer::Yes, Answer::No, Answer::Unknown];

    /// Returns `true` unless the question was skipped.
    pub fn is_answered(self) -> bool {
        self != Answer::Unknown
    }
}

impl From<Option<bool>> for Answer {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => Answer::Yes,
            Some(false) => Answer::No,
            None => Answer::Unknown,
        }
    }
}

impl From<bool> for Answer {
    fn from(value: bool) -> Self {
        Answer::from(Some(value))
    }
}

impl From<Answer> for Option<bool> {
    fn from(value: Answer) -> Self {
        match value {
            Answer::Yes => Some(true),
            Answer::No => Some(false),
            Answer::Unknown => None,
        }
    }
}

/// A single up or down vote on a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Vote {
    Up,
    Down,
}

impl Vote {
    /// Stored integer value: `1` for up, `-1` for down.
    pub fn value(self) -> i64 {
        match self {
            Vote::Up => 1,
            Vote::Down => -1,
        }
    }
}

/// Error returned when an integer is not a valid vote.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid vote value {0}: must be 1 or -1")]
pub struct InvalidVote(pub i64);

impl TryFrom<i64> for Vote {
    type Error = InvalidVote;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Vote::Up),
            -1 => Ok(Vote::Down),
            other => Err(InvalidVote(other)),
        }
    }
}

impl From<Vote> for i64 {
    fn from(value: Vote) -> Self {
        value.value()
    }
}
