//! Domain types: validated inputs, stored records, and operation outcomes.

use crate::constants::codes::MAX_CODE_LEN;
use crate::error::RedeemError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A syntactically valid redemption code.
///
/// Surrounding whitespace is trimmed; the remainder must be 1–64 ASCII
/// letters, digits, `_` or `-`. Anything else is rejected, never coerced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RedemptionCode(String);

impl RedemptionCode {
    /// Parse and validate a code string.
    ///
    /// # Errors
    ///
    /// Returns [`RedeemError::InvalidCodeFormat`] if the trimmed input is
    /// empty, longer than 64 characters, or contains other characters.
    ///
    /// # Examples
    ///
    /// ```
    /// use invite_redeem::RedemptionCode;
    ///
    /// assert_eq!(RedemptionCode::parse("  ABC-123_x ").unwrap().as_str(), "ABC-123_x");
    /// assert!(RedemptionCode::parse("").is_err());
    /// assert!(RedemptionCode::parse("has space").is_err());
    /// assert!(RedemptionCode::parse("code:injection").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, RedeemError> {
        let trimmed = raw.trim();
        let valid = !trimmed.is_empty()
            && trimmed.len() <= MAX_CODE_LEN
            && trimmed
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');

        if valid {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(RedeemError::InvalidCodeFormat)
        }
    }

    /// The code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RedemptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A syntactically plausible email address.
///
/// Shape check only: `local@domain.tld`, no whitespace, exactly one `@`,
/// and a dot inside the domain with text on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Parse and validate an email address.
    ///
    /// # Errors
    ///
    /// Returns [`RedeemError::InvalidEmail`] if the address does not have
    /// the expected shape.
    ///
    /// # Examples
    ///
    /// ```
    /// use invite_redeem::EmailAddress;
    ///
    /// assert!(EmailAddress::parse("user@example.com").is_ok());
    /// assert!(EmailAddress::parse(" user+tag@mail.example.org ").is_ok());
    /// assert!(EmailAddress::parse("user@localhost").is_err());
    /// assert!(EmailAddress::parse("a b@example.com").is_err());
    /// assert!(EmailAddress::parse("user@@example.com").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, RedeemError> {
        let trimmed = raw.trim();
        let Some((local, domain)) = trimmed.split_once('@') else {
            return Err(RedeemError::InvalidEmail);
        };

        let clean = |part: &str| !part.is_empty() && !part.contains(|c: char| c == '@' || c.is_whitespace());
        let dotted = domain
            .char_indices()
            .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len());

        if clean(local) && clean(domain) && dotted {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(RedeemError::InvalidEmail)
        }
    }

    /// The address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted state of a redemption code.
///
/// Serialized as JSON with camelCase keys. Any JSON object is a record:
/// missing fields take their defaults, and fields written by other tools
/// are kept in `extra` and survive the used transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeRecord {
    /// When the code was created. Never changes. Absent on records
    /// written without a timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Whether the code has been consumed. Only ever goes false → true.
    #[serde(default)]
    pub used: bool,

    /// When the code was consumed.
    #[serde(default)]
    pub used_at: Option<DateTime<Utc>>,

    /// Email the invite was sent to.
    #[serde(default)]
    pub used_by: Option<String>,

    /// Unrecognized fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CodeRecord {
    /// A fresh, unused record.
    #[must_use]
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            created_at: Some(created_at),
            used: false,
            used_at: None,
            used_by: None,
            extra: serde_json::Map::new(),
        }
    }

    /// The record after a successful redemption. `created_at` is preserved.
    #[must_use]
    pub fn redeemed(self, by: &EmailAddress, at: DateTime<Utc>) -> Self {
        Self {
            used: true,
            used_at: Some(at),
            used_by: Some(by.as_str().to_string()),
            ..self
        }
    }
}

/// One row of a registry listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CodeListing {
    /// A well-formed record.
    Record {
        /// The code.
        code: String,
        /// Its record, flattened beside the code.
        #[serde(flatten)]
        record: CodeRecord,
    },
    /// A stored value that could not be parsed, passed through untouched.
    Raw {
        /// The code.
        code: String,
        /// The raw stored value.
        raw: String,
    },
}

impl CodeListing {
    /// The code this row describes.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Record { code, .. } | Self::Raw { code, .. } => code,
        }
    }

    /// Creation time, if the row is a record that carries one.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Record { record, .. } => record.created_at,
            Self::Raw { .. } => None,
        }
    }

    /// Listing order, largest first: dated records newest first, then
    /// undated records, then raw values.
    #[must_use]
    pub fn sort_key(&self) -> (bool, Option<DateTime<Utc>>) {
        (matches!(self, Self::Record { .. }), self.created_at())
    }
}

/// Result of a single conditional create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The code did not exist and now does.
    Created,
    /// A record already existed and was left untouched.
    AlreadyExists,
}

/// Partition of a bulk create into created and skipped codes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateReport {
    /// Codes newly created, in request order.
    pub created: Vec<String>,
    /// Codes that already existed, in request order.
    pub skipped: Vec<String>,
}

impl CreateReport {
    /// Whether every requested code was created.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Result of an admin delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// A record existed and was removed.
    Removed,
    /// No record existed.
    NotFound,
}

/// Successful redemption, as reported by the invite sender.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedemptionOutcome {
    /// The code that was consumed.
    pub code: RedemptionCode,

    /// Message from the invite service, if it sent one.
    pub message: Option<String>,

    /// Raw payload from the invite service, if any.
    pub data: Option<serde_json::Value>,
}
