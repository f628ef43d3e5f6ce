use std::fmt;

/// Comprehensive error types for linksure operations
#[derive(Debug)]
pub enum LinkSureError {
    /// IO error (config file operations, etc.)
    Io(std::io::Error),

    /// Configuration error
    Config(String),

    /// One or more links failed validation (raised by `assert_valid`)
    Validation(String),

    /// HTTP client error
    Http(reqwest::Error),

    /// Regex compilation error
    Regex(regex::Error),

    /// TOML parsing error
    TomlParsing(toml::de::Error),

    /// CSS selector parse error while locating a fragment
    Selector(String),

    /// Misconfigured link group (e.g. ending a parentless group)
    Group(String),
}

impl fmt::Display for LinkSureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkSureError::Io(err) => write!(f, "IO error: {err}"),
            LinkSureError::Config(msg) => write!(f, "Configuration error: {msg}"),
            LinkSureError::Validation(msg) => write!(f, "Validation error: {msg}"),
            LinkSureError::Http(err) => write!(f, "HTTP error: {err}"),
            LinkSureError::Regex(err) => write!(f, "Regex error: {err}"),
            LinkSureError::TomlParsing(err) => write!(f, "TOML parsing error: {err}"),
            LinkSureError::Selector(msg) => write!(f, "Selector error: {msg}"),
            LinkSureError::Group(msg) => write!(f, "Group error: {msg}"),
        }
    }
}

impl std::error::Error for LinkSureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LinkSureError::Io(err) => Some(err),
            LinkSureError::Http(err) => Some(err),
            LinkSureError::Regex(err) => Some(err),
            LinkSureError::TomlParsing(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LinkSureError {
    fn from(err: std::io::Error) -> Self {
        LinkSureError::Io(err)
    }
}

impl From<reqwest::Error> for LinkSureError {
    fn from(err: reqwest::Error) -> Self {
        LinkSureError::Http(err)
    }
}

impl From<regex::Error> for LinkSureError {
    fn from(err: regex::Error) -> Self {
        LinkSureError::Regex(err)
    }
}

impl From<toml::de::Error> for LinkSureError {
    fn from(err: toml::de::Error) -> Self {
        LinkSureError::TomlParsing(err)
    }
}

/// Type alias for Results using LinkSureError
pub type Result<T> = std::result::Result<T, LinkSureError>;
