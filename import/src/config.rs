//! Synthetic data generator configuration.
//!
//! Defines the YAML-serializable row counts that control how much data
//! [`Populator`](crate::Populator) generates. Missing keys take their
//! defaults.
//!
//! # Example YAML
//!
//! ```yaml
//! courses: 7000
//! profs: 1000
//! users: 5000
//! course_reviews: 10000
//! prof_reviews: 10000
//! course_review_votes: 10000
//! prof_review_votes: 10000
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ImportError, Result};

/// Number of distinct course codes the generator can produce
/// (26³ letter prefixes × 900 numbers).
pub const MAX_COURSE_CODES: usize = 26 * 26 * 26 * 900;

/// Row counts for one generator run.
///
/// # Examples
///
/// ```
/// # use flow_import::PopulateConfig;
/// let config = PopulateConfig {
///     courses: 10,
///     course_reviews: 25,
///     ..PopulateConfig::default()
/// };
/// assert_eq!(config.profs, 1000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulateConfig {
    pub courses: usize,
    pub profs: usize,
    pub users: usize,
    pub course_reviews: usize,
    pub prof_reviews: usize,
    pub course_review_votes: usize,
    pub prof_review_votes: usize,
}

impl Default for PopulateConfig {
    fn default() -> Self {
        Self {
            courses: 7000,
            profs: 1000,
            users: 5000,
            course_reviews: 10000,
            prof_reviews: 10000,
            course_review_votes: 10000,
            prof_review_votes: 10000,
        }
    }
}

impl PopulateConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::ImportError::Io) if the file cannot be read, or
    /// [`Yaml`](crate::ImportError::Yaml) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Checks that the counts can be generated.
    ///
    /// Reviews need at least one course, prof and user to point at. Votes
    /// need enough distinct `(review, user)` pairs, and courses enough
    /// distinct codes.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidConfig`](crate::ImportError::InvalidConfig) naming the
    /// first unsatisfiable count.
    ///
    /// # Examples
    ///
    /// ```
    /// # use flow_import::PopulateConfig;
    /// let config = PopulateConfig {
    ///     course_reviews: 2,
    ///     users: 3,
    ///     course_review_votes: 7,
    ///     ..PopulateConfig::default()
    /// };
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        if self.courses > MAX_COURSE_CODES {
            return Err(ImportError::InvalidConfig(format!(
                "{} courses requested but only {MAX_COURSE_CODES} distinct codes exist",
                self.courses
            )));
        }

        for (label, reviews) in [
            ("course_reviews", self.course_reviews),
            ("prof_reviews", self.prof_reviews),
        ] {
            if reviews > 0 && (self.courses == 0 || self.profs == 0 || self.users == 0) {
                return Err(ImportError::InvalidConfig(format!(
                    "{label} needs at least one course, prof and user"
                )));
            }
        }

        for (label, votes, reviews) in [
            ("course_review_votes", self.course_review_votes, self.course_reviews),
            ("prof_review_votes", self.prof_review_votes, self.prof_reviews),
        ] {
            let pairs = reviews.saturating_mul(self.users);
            if votes > pairs {
                return Err(ImportError::InvalidConfig(format!(
                    "{label} = {votes} exceeds the {pairs} distinct (review, user) pairs"
                )));
            }
        }
        Ok(())
    }
}
