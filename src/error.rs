use thiserror::Error;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("camera unavailable: {reason}")]
    Unavailable { reason: String },
}

impl SensorError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("{control} is not supported on this display: {reason}")]
    Unsupported {
        control: &'static str,
        reason: String,
    },
    #[error("failed to set {control}: {reason}")]
    Transient {
        control: &'static str,
        reason: String,
    },
}

impl ActuatorError {
    pub fn is_unsupported(&self) -> bool {
        matches!(self, ActuatorError::Unsupported { .. })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("no open usage record to close")]
    NoOpenRecord,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("profile '{0}' not found")]
    NotFound(String),
}
