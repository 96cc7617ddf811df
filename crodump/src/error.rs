use std::error::Error;
use std::fmt;
use std::io;

use thiserror::Error;

/// Errors related to reading a Cronos database.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CronosErrorKind {
    /// The structure file does not start with the `CroFile` signature.
    NotAStructureFile,

    /// The data file does not start with the `CroFile` signature.
    NotADataFile,

    /// No cipher offset produced a section containing the primary-key
    /// sentinel.
    SectionsUnrecovered,

    /// One of the three database files is absent.
    MissingFile,

    /// The database path is not a directory.
    NotADirectory,

    /// Reading one of the database files failed.
    Io,
}

impl fmt::Display for CronosErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAStructureFile => write!(f, "not a CroStru.dat file"),
            Self::NotADataFile => write!(f, "not a CroBank.dat file"),
            Self::SectionsUnrecovered => {
                write!(f, "could not recover CroStru.dat sections")
            }
            Self::MissingFile => write!(f, "database file not found"),
            Self::NotADirectory => write!(f, "database path is not a directory"),
            Self::Io => write!(f, "failed to read database file"),
        }
    }
}

/// An error returned when reading a Cronos database.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct CronosError {
    kind: CronosErrorKind,
    #[source]
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl CronosError {
    /// Creates a new error from a known kind of error as well as an
    /// arbitrary error payload.
    pub(crate) fn new<E>(kind: CronosErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        let source = Some(source.into());
        Self { kind, source }
    }

    /// Returns the corresponding [`CronosErrorKind`] for this error.
    pub fn kind(&self) -> CronosErrorKind {
        self.kind
    }
}

impl From<CronosErrorKind> for CronosError {
    fn from(kind: CronosErrorKind) -> Self {
        Self { kind, source: None }
    }
}

impl From<io::Error> for CronosError {
    fn from(source: io::Error) -> Self {
        Self::new(CronosErrorKind::Io, source)
    }
}
