//! Unified error handling for the Legion EC control stack
//!
//! This crate provides the single error type used across all workspace
//! components. It uses thiserror for ergonomic error definitions with proper
//! Display and Error trait impls.

use std::io;

/// Result type alias using LegionError
pub type Result<T> = std::result::Result<T, LegionError>;

/// Unified error type for all Legion EC operations
#[derive(thiserror::Error, Debug)]
pub enum LegionError {
    // ============================================================================
    // EC Bus Errors
    // ============================================================================
    /// A single polling phase exceeded its iteration bound. Retried inside
    /// the session layer; callers normally see `TransactionFailed` instead.
    #[error("EC busy-wait timed out during {phase}")]
    BusTimeout { phase: &'static str },

    #[error("EC transaction failed after {attempts} attempts ({op} {register})")]
    TransactionFailed {
        op: &'static str,
        register: String,
        attempts: u32,
    },

    // ============================================================================
    // Firmware Method Errors
    // ============================================================================
    #[error("firmware method not present: {0}")]
    MethodNotFound(String),

    #[error("firmware method {method}({arg}) failed: {reason}")]
    MethodCallFailed {
        method: String,
        arg: i64,
        reason: String,
    },

    // ============================================================================
    // Capability and Input Errors
    // ============================================================================
    #[error("feature not available on this device: {0}")]
    CapabilityUnavailable(String),

    #[error("invalid value for {what}: {value} (allowed {min}..={max})")]
    InvalidInput {
        what: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("unrecognized token for {what}: {token:?}")]
    UnsupportedValue { what: &'static str, token: String },

    #[error("unexpected hardware value for {what}: {raw}")]
    UnexpectedHardwareValue { what: &'static str, raw: i64 },

    #[error("device not attached or already torn down")]
    DeviceNotReady,

    // ============================================================================
    // I/O and Configuration Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl LegionError {
    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a capability error for a feature name
    pub fn capability(feature: impl Into<String>) -> Self {
        Self::CapabilityUnavailable(feature.into())
    }

    /// True when the error means the hardware was never touched
    /// (validation and gating reject before any port or method access).
    pub fn rejected_before_hardware(&self) -> bool {
        matches!(
            self,
            Self::CapabilityUnavailable(_)
                | Self::InvalidInput { .. }
                | Self::UnsupportedValue { .. }
                | Self::DeviceNotReady
        )
    }
}
