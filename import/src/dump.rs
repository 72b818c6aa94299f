//! Reading a document-store dump directory.
//!
//! A dump holds one `<collection>.bson` file per collection. Each file is a
//! plain concatenation of BSON documents with no framing beyond the length
//! prefix every document carries.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use bson::Document;
use tracing::debug;

use crate::error::{ImportError, Result};

/// A collection exported in the dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Course,
    Professor,
    User,
    /// One document per review pair (course review + professor review).
    UserCourse,
}

impl Collection {
    /// Collection name as it appears in the dump.
    pub fn name(self) -> &'static str {
        match self {
            Collection::Course => "course",
            Collection::Professor => "professor",
            Collection::User => "user",
            Collection::UserCourse => "user_course",
        }
    }

    /// File name of this collection inside the dump directory.
    pub fn file_name(self) -> String {
        format!("{}.bson", self.name())
    }
}

/// An opened dump directory.
#[derive(Debug, Clone)]
pub struct Dump {
    root: PathBuf,
}

impl Dump {
    /// Opens a dump rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::MissingDump`] if `root` is not a directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(ImportError::MissingDump(root.to_path_buf()));
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Reads every document of `collection` in file order.
    pub fn read(&self, collection: Collection) -> Result<Vec<Document>> {
        let path = self.root.join(collection.file_name());
        let bytes = fs::read(&path)?;
        let documents = decode_all(&bytes)?;
        debug!(
            collection = collection.name(),
            documents = documents.len(),
            "Decoded dump file"
        );
        Ok(documents)
    }
}

/// Decodes a buffer of back-to-back BSON documents.
pub fn decode_all(bytes: &[u8]) -> Result<Vec<Document>> {
    let mut cursor = Cursor::new(bytes);
    let mut documents = Vec::new();
    while (cursor.position() as usize) < bytes.len() {
        documents.push(Document::from_reader(&mut cursor)?);
    }
    Ok(documents)
}
