use thiserror::Error;

pub type StockResult<T> = Result<T, StockError>;

#[derive(Debug, Error)]
pub enum StockError {
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("invalid json: {0}")]
    InvalidJson(String),
}

impl From<serde_json::Error> for StockError {
    fn from(err: serde_json::Error) -> Self {
        StockError::InvalidJson(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::StockError;

    #[test]
    fn error_display_includes_context() {
        let err = StockError::UnknownField("close".to_owned());
        assert_eq!(err.to_string(), "unknown field: close");
    }

    #[test]
    fn json_error_conversion() {
        let json_err = serde_json::from_str::<u32>("not json").expect_err("must fail");
        let err: StockError = json_err.into();
        assert!(matches!(err, StockError::InvalidJson(_)));
    }
}
