use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Evidence {id}: value is not finite")]
    NonFiniteValue { id: String },

    #[error("Evidence {id}: {field} {value} outside [{min}, {max}]")]
    OutOfRange {
        id: String,
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Evidence {id}: empty {field}")]
    EmptyField { id: String, field: &'static str },

    #[error("Evidence {id}: index evidence must use ticker GLOBAL, got {ticker}")]
    IndexTicker { id: String, ticker: String },

    #[error("Duplicate evidence id: {0}")]
    DuplicateEvidence(String),
}
