//! Error taxonomy for decoding a core file. Every error is fatal for the run: there is
//! nothing to retry because the input is a static file.
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Fewer bytes are available than a record declares.
    #[error(
        "truncated {what}: needed {needed} bytes at offset 0x{offset:x} \
         but only {available} are available"
    )]
    Truncated {
        what: &'static str,
        offset: u64,
        needed: u64,
        available: u64,
    },

    /// Internally inconsistent structure, e.g. AT_PHDR disagreeing with PT_PHDR.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// An exactly-one lookup matched zero or several candidates.
    #[error("expected exactly one {what} where {predicate} but found {count}")]
    NotFound {
        what: &'static str,
        predicate: String,
        count: usize,
    },

    /// No segment (or section) contains the address.
    #[error("address 0x{addr:x} is not mapped by any {table}")]
    UnmappedAddress { addr: u64, table: &'static str },

    /// A failure while reading one module's symbols.
    #[error("{module}: {source}")]
    InModule {
        module: String,
        source: Box<CoreError>,
    },

    #[error("couldn't open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl CoreError {
    pub fn malformed(mesg: impl Into<String>) -> Self {
        CoreError::MalformedInput(mesg.into())
    }
}

/// The pipeline stage an error came from, used to tell the user where things broke.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    Headers,
    Modules,
    Symbols,
}

impl fmt::Display for Stage {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Stage::Headers => fmt.write_str("decoding core headers"),
            Stage::Modules => fmt.write_str("locating loaded modules"),
            Stage::Symbols => fmt.write_str("resolving module symbols"),
        }
    }
}

#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: CoreError,
}

pub trait InStage<T> {
    fn in_stage(self, stage: Stage) -> std::result::Result<T, StageError>;
}

impl<T> InStage<T> for Result<T> {
    fn in_stage(self, stage: Stage) -> std::result::Result<T, StageError> {
        self.map_err(|source| StageError { stage, source })
    }
}

/// Returns the single item matching pred. Zero matches and multiple matches are both
/// errors and report how many candidates were found.
pub fn find_unique<'a, T, I, P>(
    items: I,
    what: &'static str,
    predicate: &str,
    pred: P,
) -> Result<&'a T>
where
    I: IntoIterator<Item = &'a T>,
    P: Fn(&T) -> bool,
{
    let mut found = None;
    let mut count = 0;
    for item in items {
        if pred(item) {
            count += 1;
            if found.is_none() {
                found = Some(item);
            }
        }
    }
    match (found, count) {
        (Some(item), 1) => Ok(item),
        _ => Err(CoreError::NotFound {
            what,
            predicate: predicate.to_string(),
            count,
        }),
    }
}
