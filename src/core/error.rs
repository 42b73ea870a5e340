use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Format,
    UnsupportedVersion,
    InvalidArgument,
    Config,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error { kind, context }
    }

    /// Malformed or truncated header, table or blob
    pub fn format(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Format, context.into())
    }

    pub fn unsupported_version(found: u32, expected: u32) -> Self {
        Error::new(
            ErrorKind::UnsupportedVersion,
            format!("database version {} is not supported (expected {})", found, expected),
        )
    }

    pub fn invalid_argument(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidArgument, context.into())
    }

    pub fn is_unsupported_version(&self) -> bool {
        self.kind == ErrorKind::UnsupportedVersion
    }

    /// Prefix the context with where the failure happened (usually a path)
    pub fn at(mut self, location: impl fmt::Display) -> Self {
        self.context = format!("{}: {}", location, self.context);
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io,
            context: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::Config,
            context: format!("invalid config: {}", err),
        }
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error {
            kind: ErrorKind::Config,
            context: format!("invalid literal pattern: {}", err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
