use std::fmt;

/// Main error type for jobscaler
#[derive(Debug)]
pub enum Error {
    /// Configuration errors: catalog missing, unparseable, or malformed
    Config(String),

    /// Database errors (SQLx wrapped)
    Database(sqlx::Error),

    /// Broker (RabbitMQ) errors
    Broker(String),

    /// Orchestrator (Kubernetes) errors
    Orchestrator(String),

    /// HTTP/network errors
    Network(String),

    /// Authentication/authorization errors
    Unauthorized(String),

    /// Validation errors on inbound requests
    Validation(String),

    /// Not found errors
    NotFound(String),

    /// Log file path resolves outside the logs root
    PathEscape(String),

    /// Serialization/deserialization errors
    Serialization(serde_json::Error),

    /// IO errors
    Io(std::io::Error),

    /// Generic errors with description
    Other(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "configuration error: {msg}"),
            Error::Database(e) => write!(f, "database error: {e}"),
            Error::Broker(msg) => write!(f, "broker error: {msg}"),
            Error::Orchestrator(msg) => write!(f, "orchestrator error: {msg}"),
            Error::Network(msg) => write!(f, "network error: {msg}"),
            Error::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
            Error::Validation(msg) => write!(f, "validation error: {msg}"),
            Error::NotFound(msg) => write!(f, "not found: {msg}"),
            Error::PathEscape(msg) => write!(f, "path escape: {msg}"),
            Error::Serialization(e) => write!(f, "serialization error: {e}"),
            Error::Io(e) => write!(f, "io error: {e}"),
            Error::Other(msg) => write!(f, "error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Database(e) => Some(e),
            Error::Serialization(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(error: sqlx::Error) -> Self {
        Error::Database(error)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Serialization(error)
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io(error)
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::Config(error.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Error::Network(error.to_string())
    }
}

impl From<kube::Error> for Error {
    fn from(error: kube::Error) -> Self {
        Error::Orchestrator(error.to_string())
    }
}

impl Error {
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Error::Config(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        Error::Validation(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        Error::NotFound(msg.into())
    }

    pub fn unauthorized<T: Into<String>>(msg: T) -> Self {
        Error::Unauthorized(msg.into())
    }

    pub fn broker<T: Into<String>>(msg: T) -> Self {
        Error::Broker(msg.into())
    }

    pub fn orchestrator<T: Into<String>>(msg: T) -> Self {
        Error::Orchestrator(msg.into())
    }

    /// HTTP status code this error should be surfaced as
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Unauthorized(_) => 401,
            Error::Validation(_) => 400,
            Error::NotFound(_) => 404,
            Error::PathEscape(_) => 403,
            Error::Config(_) => 500,
            Error::Database(_) => 500,
            Error::Broker(_) => 503,
            Error::Orchestrator(_) => 503,
            Error::Serialization(_) => 500,
            Error::Io(_) => 500,
            Error::Network(_) => 503,
            Error::Other(_) => 500,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Database(_) => "database",
            Error::Broker(_) => "broker",
            Error::Orchestrator(_) => "orchestrator",
            Error::Unauthorized(_) => "auth",
            Error::Validation(_) => "validation",
            Error::NotFound(_) => "not_found",
            Error::PathEscape(_) => "path_escape",
            Error::Serialization(_) => "serialization",
            Error::Io(_) => "io",
            Error::Network(_) => "network",
            Error::Other(_) => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(Error::validation("x").status_code(), 400);
        assert_eq!(Error::unauthorized("x").status_code(), 401);
        assert_eq!(Error::not_found("x").status_code(), 404);
        assert_eq!(Error::Config("x".into()).status_code(), 500);
        assert_eq!(Error::PathEscape("x".into()).status_code(), 403);
    }
}
