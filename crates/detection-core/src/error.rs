use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Malformed context: {0}")]
    MalformedContext(String),

    #[error("Data source unavailable: {0}")]
    DataSourceUnavailable(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Invalid status transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: crate::types::AlertStatus,
        to: crate::types::AlertStatus,
    },

    #[error("Calculation error: {0}")]
    CalculationError(String),
}
