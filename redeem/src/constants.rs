//! Redemption constants.
//!
//! Store key layout and code generation parameters shared by every
//! component.

/// Store key layout.
///
/// These prefixes are compatible with records written by earlier
/// deployments of the service, so they must not change.
pub mod keys {
    /// Prefix for code records: `code:{code}`.
    pub const CODE_PREFIX: &str = "code:";

    /// Prefix for per-code redemption locks: `code_lock:{code}`.
    pub const LOCK_PREFIX: &str = "code_lock:";

    /// List holding the operation log, newest entry first.
    pub const OPERATION_LOG: &str = "logs";
}

/// Code syntax and generation parameters.
pub mod codes {
    /// Longest accepted code string.
    pub const MAX_CODE_LEN: usize = 64;

    /// Alphabet for generated codes. Excludes `I`, `O`, `0` and `1`.
    pub const GENERATED_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

    /// Generated code length bounds and default.
    pub const MIN_GENERATED_LEN: usize = 6;
    /// Upper bound for generated code length.
    pub const MAX_GENERATED_LEN: usize = 32;
    /// Generated code length when none is requested.
    pub const DEFAULT_GENERATED_LEN: usize = 10;

    /// Largest batch a single generation request may ask for.
    pub const MAX_GENERATED_COUNT: usize = 200;
}
