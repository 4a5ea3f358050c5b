use thiserror::Error;

/// Errors raised while building an IP whitelist.
///
/// Both variants are construction-time only. Once a whitelist exists, request
/// handling has no error path: an address that cannot be evaluated is denied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WhitelistError {
    /// No entries were supplied, or every entry was blank.
    #[error("no whitelists provided")]
    Empty,

    /// An entry is not valid `<address>/<prefix>` notation.
    ///
    /// `entry` holds the offending string exactly as it was supplied.
    #[error("parsing CIDR whitelist: invalid CIDR address: {entry}")]
    InvalidCidr { entry: String },
}

/// Application-level errors for the gateway binary.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid IP whitelist: {0}")]
    Whitelist(#[from] WhitelistError),

    #[error("Metrics error: {0}")]
    MetricsError(String),
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_error_message() {
        assert_eq!(WhitelistError::Empty.to_string(), "no whitelists provided");
    }

    #[test]
    fn test_invalid_cidr_message_embeds_entry_verbatim() {
        let err = WhitelistError::InvalidCidr {
            entry: " foo".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "parsing CIDR whitelist: invalid CIDR address:  foo"
        );
    }

    #[test]
    fn test_app_error_wraps_whitelist_error() {
        let err: AppError = WhitelistError::Empty.into();
        assert!(matches!(err, AppError::Whitelist(WhitelistError::Empty)));
        assert_eq!(
            err.to_string(),
            "Invalid IP whitelist: no whitelists provided"
        );
    }
}
