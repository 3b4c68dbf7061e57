use std::fmt;

/// Crate-wide error type. Constructors and setters validate eagerly and
/// return one of these; hot-path kernels assume validated inputs and only
/// carry `debug_assert!`s.
#[derive(Debug)]
pub enum Error {
    /// A user-supplied value is outside its legal range or inconsistent
    /// with the rest of the model (duplicate parameter names, contact
    /// matrix rows not summing to one, negative probabilities, ...).
    InvalidArgument(String),
    /// An agent, virus, tool, entity or state id does not exist.
    OutOfRange(String),
    /// An operation was attempted in the wrong model phase, e.g. running
    /// before a population was constructed.
    InvalidState(String),
    /// An internal invariant was violated.
    Logic(String),
    Io(std::io::Error),
    Csv(csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Error::OutOfRange(msg) => write!(f, "out of range: {}", msg),
            Error::InvalidState(msg) => write!(f, "invalid state: {}", msg),
            Error::Logic(msg) => write!(f, "logic error: {}", msg),
            Error::Io(e) => write!(f, "io error: {}", e),
            Error::Csv(e) => write!(f, "csv error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Csv(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::Csv(e)
    }
}
