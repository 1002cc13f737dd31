use thiserror::Error;

#[derive(Error, Debug)]
pub enum FactError {
    #[error("{0} does not exist")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("Invalid fact - {0}")]
    InvalidFact(String),

    #[error("Fact {fact} is not set on machine {machine}")]
    FactNotSet { machine: String, fact: String },

    #[error("Value {value} for fact {fact} is not valid")]
    InvalidValue { fact: String, value: String },

    #[error("Store error: {0}")]
    Infrastructure(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, FactError>;

/// Coarse classification of a [`FactError`], for callers that branch on the
/// failure class instead of the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidFact,
    InvalidValue,
    Infrastructure,
}

impl FactError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::InvalidFact(_) | Self::FactNotSet { .. } => ErrorKind::InvalidFact,
            Self::InvalidValue { .. } => ErrorKind::InvalidValue,
            Self::Infrastructure(_) | Self::Config(_) => ErrorKind::Infrastructure,
        }
    }

    /// Process exit code: 1 for missing or duplicate records, 2 for
    /// registry violations and infrastructure or configuration failures.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::NotFound(_) | Self::AlreadyExists(_) | Self::FactNotSet { .. } => 1,
            Self::InvalidFact(_) | Self::InvalidValue { .. } | Self::Infrastructure(_) | Self::Config(_) => 2,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<std::io::Error> for FactError {
    fn from(err: std::io::Error) -> Self {
        Self::Infrastructure(err.to_string())
    }
}

impl From<serde_json::Error> for FactError {
    fn from(err: serde_json::Error) -> Self {
        Self::Infrastructure(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for FactError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(format!("YAML error: {}", err))
    }
}

impl From<reqwest::Error> for FactError {
    fn from(err: reqwest::Error) -> Self {
        Self::Infrastructure(format!("HTTP error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(FactError::NotFound("Machine web01".into()).exit_code(), 1);
        assert_eq!(FactError::AlreadyExists("Machine web01".into()).exit_code(), 1);
        assert_eq!(
            FactError::FactNotSet { machine: "web01".into(), fact: "role".into() }.exit_code(),
            1
        );
        assert_eq!(FactError::InvalidFact("role".into()).exit_code(), 2);
        assert_eq!(
            FactError::InvalidValue { fact: "role".into(), value: "x".into() }.exit_code(),
            2
        );
        assert_eq!(FactError::Infrastructure("timeout".into()).exit_code(), 2);
        assert_eq!(FactError::Config("missing".into()).exit_code(), 2);
    }

    #[test]
    fn test_messages() {
        let err = FactError::NotFound("Machine web01".into());
        assert_eq!(err.to_string(), "Machine web01 does not exist");

        let err = FactError::InvalidValue { fact: "role".into(), value: "c".into() };
        assert_eq!(err.to_string(), "Value c for fact role is not valid");
    }

    #[test]
    fn test_io_error_is_infrastructure() {
        let err: FactError = std::io::Error::other("disk gone").into();
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
    }
}
