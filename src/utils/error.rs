use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Failed to persist saved numbers to {path}: {message}")]
    PersistenceError { path: String, message: String },

    #[error("Could not enumerate saved numbers for owner {owner}: {message}")]
    EnumerationError { owner: i64, message: String },

    #[error("Delivery failed: {message}")]
    DeliveryError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Storage,
    Delivery,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CheckError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CheckError::HttpError(_) => ErrorCategory::Network,
            CheckError::IoError(_) | CheckError::PersistenceError { .. } => ErrorCategory::Storage,
            CheckError::EnumerationError { .. } => ErrorCategory::Storage,
            CheckError::SerializationError(_) => ErrorCategory::Data,
            CheckError::ConfigError { .. }
            | CheckError::ConfigValidationError { .. }
            | CheckError::InvalidConfigValueError { .. }
            | CheckError::MissingConfigError { .. } => ErrorCategory::Configuration,
            CheckError::DeliveryError { .. } => ErrorCategory::Delivery,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // in-memory state is still authoritative
            CheckError::PersistenceError { .. } => ErrorSeverity::Low,
            CheckError::HttpError(_) | CheckError::DeliveryError { .. } => ErrorSeverity::Medium,
            CheckError::SerializationError(_) | CheckError::EnumerationError { .. } => {
                ErrorSeverity::High
            }
            CheckError::IoError(_)
            | CheckError::ConfigError { .. }
            | CheckError::ConfigValidationError { .. }
            | CheckError::InvalidConfigValueError { .. }
            | CheckError::MissingConfigError { .. } => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            CheckError::HttpError(_) => "Could not reach the remote page.".to_string(),
            CheckError::IoError(e) => format!("File access failed: {}", e),
            CheckError::SerializationError(_) => "Saved data could not be encoded.".to_string(),
            CheckError::ConfigError { message } => format!("Configuration problem: {}", message),
            CheckError::ConfigValidationError { field, message } => {
                format!("Configuration field '{}' is invalid: {}", field, message)
            }
            CheckError::InvalidConfigValueError { field, reason, .. } => {
                format!("Configuration field '{}' is invalid: {}", field, reason)
            }
            CheckError::MissingConfigError { field } => {
                format!("Configuration field '{}' is required", field)
            }
            CheckError::PersistenceError { .. } => {
                "Saved numbers were updated but could not be written to disk.".to_string()
            }
            CheckError::EnumerationError { .. } => {
                "Your saved numbers could not be loaded, so nothing was checked.".to_string()
            }
            CheckError::DeliveryError { message } => format!("Could not send results: {}", message),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check network connectivity and the probe url_template",
            ErrorCategory::Configuration => "Fix the configuration file and run `validate`",
            ErrorCategory::Storage => "Check that the store path is writable and not corrupted",
            ErrorCategory::Delivery => "Retry the command; results are cached for a while",
            ErrorCategory::Data => "Inspect the saved numbers file for unexpected content",
        }
    }
}

pub type Result<T> = std::result::Result<T, CheckError>;
