//! Centralized Error Handling Module
//!
//! Setiap kegagalan punya kode error yang unik untuk memudahkan
//! debugging dan monitoring di production.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - RPC_xxx: RPC-related errors
//! - ORACLE_xxx: price oracle errors
//! - CFG_xxx: configuration/validation errors
//! - SWEEP_xxx: transfer execution errors

use std::fmt;

/// Application-wide error type
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new AppError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create AppError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // RPC Errors
    // ============================================
    /// RPC connection failed
    RpcConnectionFailed,
    /// RPC request timeout
    RpcTimeout,
    /// RPC rate limited (HTTP 429)
    RpcRateLimited,
    /// RPC returned error response
    RpcError,
    /// Invalid RPC response
    RpcInvalidResponse,

    // ============================================
    // Price Oracle Errors
    // ============================================
    /// Oracle rate limited (HTTP 429)
    OracleRateLimited,
    /// Oracle request failed
    OracleError,

    // ============================================
    // Configuration Errors
    // ============================================
    /// Missing environment variable
    ConfigMissingEnv,
    /// Invalid configuration value
    ConfigInvalidValue,
    /// Unsupported chain key
    ConfigUnsupportedChain,
    /// Missing API key
    ConfigMissingApiKey,
    /// Recovery phrase did not derive a wallet
    ConfigInvalidSecret,
    /// Destination address failed to parse
    ConfigInvalidDestination,

    // ============================================
    // Sweep Execution Errors
    // ============================================
    /// Transfer submission failed
    TransferFailed,
    /// Gas estimation failed
    GasEstimationFailed,

    // ============================================
    // Generic Errors
    // ============================================
    /// Unknown error
    Unknown,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            // RPC Errors
            Self::RpcConnectionFailed => "RPC_CONNECTION_FAILED",
            Self::RpcTimeout => "RPC_TIMEOUT",
            Self::RpcRateLimited => "RPC_RATE_LIMITED",
            Self::RpcError => "RPC_ERROR",
            Self::RpcInvalidResponse => "RPC_INVALID_RESPONSE",

            // Oracle Errors
            Self::OracleRateLimited => "ORACLE_RATE_LIMITED",
            Self::OracleError => "ORACLE_ERROR",

            // Configuration Errors
            Self::ConfigMissingEnv => "CFG_MISSING_ENV",
            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",
            Self::ConfigUnsupportedChain => "CFG_UNSUPPORTED_CHAIN",
            Self::ConfigMissingApiKey => "CFG_MISSING_API_KEY",
            Self::ConfigInvalidSecret => "CFG_INVALID_SECRET",
            Self::ConfigInvalidDestination => "CFG_INVALID_DESTINATION",

            // Sweep Errors
            Self::TransferFailed => "SWEEP_TRANSFER_FAILED",
            Self::GasEstimationFailed => "SWEEP_GAS_ESTIMATION_FAILED",

            // Generic
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Check if error is retryable. Retryable errors never kill a
    /// sweep cycle; the tick is skipped and the loop reschedules.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RpcTimeout
                | Self::RpcRateLimited
                | Self::RpcConnectionFailed
                | Self::OracleRateLimited
                | Self::OracleError
        )
    }

    /// Configuration errors are rejected synchronously at the start
    /// boundary and never absorbed into the polling loop.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::ConfigMissingEnv
                | Self::ConfigInvalidValue
                | Self::ConfigUnsupportedChain
                | Self::ConfigMissingApiKey
                | Self::ConfigInvalidSecret
                | Self::ConfigInvalidDestination
        )
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    /// Unsupported chain key
    pub fn unsupported_chain(key: &str) -> Self {
        Self::new(
            ErrorCode::ConfigUnsupportedChain,
            format!("Unsupported chain key: {}", key),
        )
    }

    /// Missing API key
    pub fn missing_api_key(key_name: &str) -> Self {
        Self::new(
            ErrorCode::ConfigMissingApiKey,
            format!("Missing API key: {}", key_name),
        )
    }

    /// Recovery phrase rejected (message never echoes the phrase)
    pub fn invalid_secret() -> Self {
        Self::new(
            ErrorCode::ConfigInvalidSecret,
            "Recovery phrase could not derive a wallet",
        )
    }

    /// Destination address rejected
    pub fn invalid_destination(addr: &str) -> Self {
        Self::new(
            ErrorCode::ConfigInvalidDestination,
            format!("Invalid destination address: {}", addr),
        )
    }

    /// Missing environment variable
    pub fn missing_env(name: &str) -> Self {
        Self::new(
            ErrorCode::ConfigMissingEnv,
            format!("Missing environment variable: {}", name),
        )
    }

    /// Transfer submission failed
    pub fn transfer_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::TransferFailed, msg)
    }

    /// Internal/unknown error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unknown, msg)
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<eyre::Report> for AppError {
    fn from(err: eyre::Report) -> Self {
        Self::new(ErrorCode::Unknown, err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorCode::RpcTimeout, "Request timeout")
        } else if err.is_connect() {
            Self::new(ErrorCode::RpcConnectionFailed, "Connection failed")
        } else {
            Self::new(ErrorCode::Unknown, err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::RpcInvalidResponse, "JSON parse error", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = AppError::unsupported_chain("dogechain");
        assert_eq!(err.code, ErrorCode::ConfigUnsupportedChain);
        assert_eq!(err.code_str(), "CFG_UNSUPPORTED_CHAIN");
    }

    #[test]
    fn test_retryable() {
        assert!(ErrorCode::RpcTimeout.is_retryable());
        assert!(ErrorCode::OracleRateLimited.is_retryable());
        assert!(!ErrorCode::ConfigInvalidSecret.is_retryable());
    }

    #[test]
    fn test_config_classification() {
        assert!(ErrorCode::ConfigInvalidDestination.is_config());
        assert!(!ErrorCode::TransferFailed.is_config());
    }

    #[test]
    fn test_invalid_secret_never_echoes_phrase() {
        let err = AppError::invalid_secret();
        assert!(!err.message.contains("abandon"));
    }
}
