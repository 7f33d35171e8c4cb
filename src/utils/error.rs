use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

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

    #[error("Faltan columnas requeridas: {}", columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    #[error("Unknown import target: {name}")]
    UnknownTarget { name: String },

    #[error("Operation cancelled by user")]
    Cancelled,

    #[error("Store rejected request on '{table}'{}: {message}", status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    StoreError {
        table: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Duplicate check failed on '{table}': {message}")]
    DuplicateCheckFailed { table: String, message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

pub type Result<T> = std::result::Result<T, ImportError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Format,
    Store,
    Network,
    Cancellation,
    System,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ImportError {
    pub fn store(table: &str, status: Option<u16>, message: impl Into<String>) -> Self {
        ImportError::StoreError {
            table: table.to_string(),
            status,
            message: message.into(),
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        ImportError::ProcessingError {
            message: message.into(),
        }
    }

    /// 由資料庫拒絕的單批次錯誤，可記錄後繼續下一批
    pub fn is_store_rejection(&self) -> bool {
        matches!(
            self,
            ImportError::StoreError { .. }
                | ImportError::HttpError(_)
                | ImportError::DuplicateCheckFailed { .. }
        )
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ImportError::ConfigError { .. }
            | ImportError::ConfigValidationError { .. }
            | ImportError::InvalidConfigValueError { .. }
            | ImportError::MissingConfigError { .. }
            | ImportError::UnknownTarget { .. } => ErrorCategory::Configuration,
            ImportError::MissingColumns { .. } | ImportError::CsvError(_) => ErrorCategory::Format,
            ImportError::StoreError { .. } | ImportError::DuplicateCheckFailed { .. } => {
                ErrorCategory::Store
            }
            ImportError::HttpError(_) => ErrorCategory::Network,
            ImportError::Cancelled => ErrorCategory::Cancellation,
            ImportError::IoError(_) => ErrorCategory::System,
            ImportError::SerializationError(_) | ImportError::ProcessingError { .. } => {
                ErrorCategory::Processing
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Cancellation => ErrorSeverity::Low,
            ErrorCategory::Network | ErrorCategory::Store => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Format | ErrorCategory::Processing => {
                ErrorSeverity::High
            }
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            ImportError::MissingColumns { columns } => format!(
                "Check that the file is a ';'-separated export whose header includes: {}",
                columns.join(", ")
            ),
            ImportError::UnknownTarget { .. } => {
                "Run the 'targets' command to list the configured import targets".to_string()
            }
            ImportError::Cancelled => {
                "Rows committed before the stop were kept; re-run to import the rest".to_string()
            }
            ImportError::HttpError(_) => {
                "Check network connectivity and the store URL, then retry".to_string()
            }
            ImportError::StoreError { status: Some(401), .. }
            | ImportError::StoreError { status: Some(403), .. } => {
                "Check the store API key and its permissions on the table".to_string()
            }
            ImportError::StoreError { .. } | ImportError::DuplicateCheckFailed { .. } => {
                "Retry later; duplicates are skipped on re-run so it is safe to import again"
                    .to_string()
            }
            ImportError::IoError(_) => "Check the file path and its read permissions".to_string(),
            ImportError::CsvError(_) => {
                "Check the file encoding (UTF-8) and the delimiter".to_string()
            }
            ImportError::ConfigError { .. }
            | ImportError::ConfigValidationError { .. }
            | ImportError::InvalidConfigValueError { .. }
            | ImportError::MissingConfigError { .. } => {
                "Review the configuration file and command-line overrides".to_string()
            }
            ImportError::SerializationError(_) | ImportError::ProcessingError { .. } => {
                "Re-run with --verbose and report the log if it persists".to_string()
            }
        }
    }

    /// 給使用者看的訊息，欄位缺失時列出欄位名稱
    pub fn user_friendly_message(&self) -> String {
        match self {
            ImportError::MissingColumns { .. } | ImportError::UnknownTarget { .. } => {
                self.to_string()
            }
            ImportError::Cancelled => "Import stopped by user".to_string(),
            ImportError::HttpError(_) => "Could not reach the data store".to_string(),
            ImportError::StoreError { table, .. } => {
                format!("The data store rejected an operation on '{}'", table)
            }
            ImportError::DuplicateCheckFailed { table, .. } => {
                format!("Could not check existing rows in '{}'", table)
            }
            ImportError::IoError(e) => format!("Could not read the file: {}", e),
            ImportError::CsvError(_) => "The file format is not valid".to_string(),
            ImportError::ConfigError { .. }
            | ImportError::ConfigValidationError { .. }
            | ImportError::InvalidConfigValueError { .. }
            | ImportError::MissingConfigError { .. } => {
                format!("Configuration problem: {}", self)
            }
            ImportError::SerializationError(_) | ImportError::ProcessingError { .. } => {
                "An error occurred while processing the data".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_message_lists_names() {
        let err = ImportError::MissingColumns {
            columns: vec!["Numero".to_string(), "Cliente".to_string()],
        };
        assert_eq!(err.to_string(), "Faltan columnas requeridas: Numero, Cliente");
        assert_eq!(err.user_friendly_message(), err.to_string());
        assert_eq!(err.category(), ErrorCategory::Format);
    }

    #[test]
    fn test_store_error_is_recoverable() {
        let err = ImportError::store("incidencias", Some(409), "conflict");
        assert!(err.is_store_rejection());
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert!(err.to_string().contains("HTTP 409"));

        let err = ImportError::processing("boom");
        assert!(!err.is_store_rejection());
        assert_eq!(err.severity(), ErrorSeverity::High);
    }

    #[test]
    fn test_cancelled_is_low_severity() {
        assert_eq!(ImportError::Cancelled.severity(), ErrorSeverity::Low);
        assert_eq!(ImportError::Cancelled.category(), ErrorCategory::Cancellation);
    }
}
