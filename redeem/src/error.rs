//! Error types for redemption and code administration.

use thiserror::Error;

/// Result type alias for redemption operations.
pub type Result<T> = std::result::Result<T, RedeemError>;

/// Failure of a single key-value store operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No store is configured, or the connection could not be established.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store was reachable but the command failed.
    #[error("Store command failed: {0}")]
    Command(String),
}

/// Error taxonomy for the redemption coordinator and the code registry.
///
/// Variants are grouped by who can act on them: the redeemer (validation,
/// terminal code states), the redeemer later (`InUse`, upstream failures),
/// or an operator (corruption, misconfiguration, infrastructure).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RedeemError {
    // ═══════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════

    /// Email address is malformed.
    #[error("Invalid email address")]
    InvalidEmail,

    /// Code string is empty, too long, or outside the allowed alphabet.
    #[error("Invalid redemption code format")]
    InvalidCodeFormat,

    // ═══════════════════════════════════════════════════════════
    // Code State
    // ═══════════════════════════════════════════════════════════

    /// Another redemption of this code is in flight.
    #[error("Redemption code is in use, please retry later")]
    InUse,

    /// No record exists for this code.
    #[error("Redemption code is invalid")]
    InvalidCode,

    /// The code has already been consumed.
    #[error("Redemption code has already been used")]
    AlreadyUsed,

    /// The stored record could not be parsed.
    #[error("Redemption code record is corrupt, contact an administrator")]
    CorruptRecord,

    // ═══════════════════════════════════════════════════════════
    // Upstream
    // ═══════════════════════════════════════════════════════════

    /// The invite sender reported a failure. The code is still unused.
    #[error("{message}")]
    UpstreamSendFailure {
        /// Reason reported by the invite service, verbatim.
        message: String,
        /// Raw payload returned by the invite service, if any.
        data: Option<serde_json::Value>,
    },

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// Invite credentials are not configured.
    #[error("Service misconfigured: {0}")]
    Misconfigured(String),

    /// The key-value store is not configured or cannot be reached.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A store command failed.
    #[error("Store error: {0}")]
    Store(String),

    /// The invite was sent but the record could not be marked as used.
    #[error("Invite sent but the code record could not be updated: {0}")]
    RecordUpdateFailed(String),

    /// Random generation hit its attempt ceiling before creating enough codes.
    #[error("Generated {} of {requested} codes before exhausting attempts", .created.len())]
    GenerationExhausted {
        /// Number of codes requested.
        requested: usize,
        /// Codes that were created before giving up.
        created: Vec<String>,
    },
}

impl RedeemError {
    /// Returns `true` if the redeemer can fix this by changing their input.
    ///
    /// # Examples
    ///
    /// ```
    /// # use invite_redeem::RedeemError;
    /// assert!(RedeemError::InvalidEmail.is_user_error());
    /// assert!(!RedeemError::CorruptRecord.is_user_error());
    /// ```
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidEmail | Self::InvalidCodeFormat | Self::InvalidCode | Self::AlreadyUsed
        )
    }

    /// Returns `true` if repeating the same request later may succeed.
    ///
    /// Upstream failures leave the record unused, so a retry is safe.
    ///
    /// # Examples
    ///
    /// ```
    /// # use invite_redeem::RedeemError;
    /// assert!(RedeemError::InUse.is_retryable());
    /// assert!(!RedeemError::AlreadyUsed.is_retryable());
    /// ```
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InUse | Self::UpstreamSendFailure { .. } | Self::Store(_)
        )
    }

    /// Returns `true` if an operator has to look at this.
    #[must_use]
    pub const fn needs_operator(&self) -> bool {
        matches!(
            self,
            Self::CorruptRecord
                | Self::Misconfigured(_)
                | Self::StoreUnavailable(_)
                | Self::RecordUpdateFailed(_)
        )
    }
}

impl From<StoreError> for RedeemError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
            StoreError::Command(msg) => Self::Store(msg),
        }
    }
}
