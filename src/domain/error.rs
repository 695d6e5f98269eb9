//! Domain error types.

/// Top-level error type for cryptotrader.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("malformed bar at index {index}: {reason}")]
    MalformedBar { index: usize, reason: String },

    #[error("insufficient data: have {bars} bars, need {minimum}")]
    InsufficientData { bars: usize, minimum: usize },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TraderError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        TraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. } => 2,
            TraderError::Data { .. } | TraderError::MalformedBar { .. } => 3,
            TraderError::InvalidInput { .. } => 4,
            TraderError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_message() {
        let err = TraderError::InsufficientData {
            bars: 10,
            minimum: 50,
        };
        assert_eq!(err.to_string(), "insufficient data: have 10 bars, need 50");
    }

    #[test]
    fn config_invalid_helper() {
        let err = TraderError::invalid("strategy", "ema_short", "must be positive");
        assert_eq!(
            err.to_string(),
            "invalid config value [strategy] ema_short: must be positive"
        );
    }
}
