//! Code registry.
//!
//! Owns the `code:{code}` records: creation (explicit or random), listing,
//! deletion, and the two calls the coordinator makes inside its locked
//! section (`get` and `mark_used`).
//!
//! Creation is always a conditional set, so an existing record (used or
//! not) is never overwritten by a create.

use crate::config::RedeemConfig;
use crate::constants::{codes, keys};
use crate::error::{RedeemError, Result};
use crate::providers::{Clock, KeyValueStore};
use crate::types::{
    CodeListing, CodeRecord, CreateOutcome, CreateReport, DeleteOutcome, RedemptionCode,
};
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;

/// Store key for the record of `code`.
#[must_use]
pub fn record_key(code: &RedemptionCode) -> String {
    format!("{}{}", keys::CODE_PREFIX, code)
}

/// Draw one code of `length` characters from the unambiguous alphabet.
///
/// The thread-local RNG lives only for the duration of this call.
#[must_use]
pub fn random_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..codes::GENERATED_ALPHABET.len());
            char::from(codes::GENERATED_ALPHABET[idx])
        })
        .collect()
}

/// Registry of redemption code records.
#[derive(Debug)]
pub struct CodeRegistry<S, C> {
    store: Arc<S>,
    clock: Arc<C>,
    config: RedeemConfig,
}

impl<S, C> Clone for CodeRegistry<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
        }
    }
}

impl<S: KeyValueStore, C: Clock> CodeRegistry<S, C> {
    /// Create a registry over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<C>, config: RedeemConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Create a fresh unused record for `code` unless one exists.
    ///
    /// # Errors
    ///
    /// Returns a store error if the conditional set fails.
    pub async fn create_one(&self, code: &RedemptionCode) -> Result<CreateOutcome> {
        let record = CodeRecord::new(self.clock.now());
        let value = serde_json::to_string(&record)
            .map_err(|e| RedeemError::Store(format!("Failed to serialize record: {e}")))?;

        let created = self
            .store
            .set_if_absent(&record_key(code), &value, None)
            .await?;

        Ok(if created {
            CreateOutcome::Created
        } else {
            CreateOutcome::AlreadyExists
        })
    }

    /// Create every distinct code in `codes`, in input order.
    ///
    /// Duplicates after the first occurrence are ignored. The report lists
    /// exactly which codes were created and which already existed.
    ///
    /// # Errors
    ///
    /// Returns a store error if any conditional set fails. Codes created
    /// before the failure stay created.
    pub async fn create_many(&self, codes: &[RedemptionCode]) -> Result<CreateReport> {
        let mut seen = HashSet::new();
        let mut report = CreateReport::default();

        for code in codes {
            if !seen.insert(code.as_str()) {
                continue;
            }
            match self.create_one(code).await? {
                CreateOutcome::Created => report.created.push(code.to_string()),
                CreateOutcome::AlreadyExists => report.skipped.push(code.to_string()),
            }
        }

        tracing::info!(
            created = report.created.len(),
            skipped = report.skipped.len(),
            "Created redemption codes"
        );

        Ok(report)
    }

    /// Create `count` new random codes of `length` characters.
    ///
    /// `count` is clamped to 1–200 and `length` to 6–32.
    ///
    /// # Errors
    ///
    /// - [`RedeemError::GenerationExhausted`] if the attempt bound is hit
    /// - store errors
    pub async fn generate(&self, count: usize, length: usize) -> Result<Vec<String>> {
        self.generate_with(count, length, random_code).await
    }

    /// [`generate`](Self::generate) with a caller-supplied sampler.
    ///
    /// `sample(length)` is called once per attempt; samples that collide
    /// with an existing record count as spent attempts.
    ///
    /// # Errors
    ///
    /// Same as [`generate`](Self::generate).
    pub async fn generate_with<F>(
        &self,
        count: usize,
        length: usize,
        mut sample: F,
    ) -> Result<Vec<String>>
    where
        F: FnMut(usize) -> String + Send,
    {
        let count = count.clamp(1, codes::MAX_GENERATED_COUNT);
        let length = length.clamp(codes::MIN_GENERATED_LEN, codes::MAX_GENERATED_LEN);
        let max_attempts = count.saturating_mul(self.config.generation_attempt_factor);

        let mut created = Vec::with_capacity(count);
        let mut attempts = 0;

        while created.len() < count && attempts < max_attempts {
            attempts += 1;
            let code = RedemptionCode::parse(&sample(length))?;
            if self.create_one(&code).await? == CreateOutcome::Created {
                created.push(code.into_inner());
            }
        }

        if created.len() < count {
            tracing::error!(
                requested = count,
                created = created.len(),
                attempts,
                "Code generation exhausted its attempt bound"
            );
            return Err(RedeemError::GenerationExhausted {
                requested: count,
                created,
            });
        }

        tracing::info!(count, length, attempts, "Generated redemption codes");
        Ok(created)
    }

    /// Every code record, newest first.
    ///
    /// `SCAN` may return a key more than once; each code is listed once.
    /// Values that vanish between the scan and the read are skipped.
    /// Records without a creation time follow the dated ones, and values
    /// that do not parse are returned raw and sort last.
    ///
    /// # Errors
    ///
    /// Returns a store error if a scan or read fails.
    pub async fn list(&self) -> Result<Vec<CodeListing>> {
        let mut listings = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = 0;

        loop {
            let page = self
                .store
                .scan_prefix(keys::CODE_PREFIX, cursor, self.config.scan_batch)
                .await?;

            let fresh: Vec<String> = page
                .keys
                .into_iter()
                .filter(|key| seen.insert(key.clone()))
                .collect();

            if !fresh.is_empty() {
                let values = self.store.get_many(&fresh).await?;
                for (key, value) in fresh.iter().zip(values) {
                    let Some(value) = value else { continue };
                    let code = key
                        .strip_prefix(keys::CODE_PREFIX)
                        .unwrap_or(key)
                        .to_string();
                    listings.push(match serde_json::from_str::<CodeRecord>(&value) {
                        Ok(record) => CodeListing::Record { code, record },
                        Err(_) => CodeListing::Raw { code, raw: value },
                    });
                }
            }

            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }

        listings.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
        Ok(listings)
    }

    /// Remove the record for `code`, used or not.
    ///
    /// # Errors
    ///
    /// Returns a store error if the delete fails.
    pub async fn delete(&self, code: &RedemptionCode) -> Result<DeleteOutcome> {
        let removed = self.store.delete(&record_key(code)).await?;
        if removed {
            tracing::info!(code = %code, "Deleted redemption code");
            Ok(DeleteOutcome::Removed)
        } else {
            Ok(DeleteOutcome::NotFound)
        }
    }

    /// Read the record for `code`.
    ///
    /// # Errors
    ///
    /// - [`RedeemError::CorruptRecord`] if the stored value does not parse
    /// - store errors
    pub async fn get(&self, code: &RedemptionCode) -> Result<Option<CodeRecord>> {
        let Some(value) = self.store.get(&record_key(code)).await? else {
            return Ok(None);
        };

        serde_json::from_str(&value).map(Some).map_err(|e| {
            tracing::error!(code = %code, error = %e, "Stored code record is corrupt");
            RedeemError::CorruptRecord
        })
    }

    /// Overwrite the record for `code` with its used state.
    ///
    /// Only the coordinator calls this, while holding the code's lock.
    ///
    /// # Errors
    ///
    /// Returns a store error if the write fails.
    pub async fn mark_used(&self, code: &RedemptionCode, record: &CodeRecord) -> Result<()> {
        let value = serde_json::to_string(record)
            .map_err(|e| RedeemError::Store(format!("Failed to serialize record: {e}")))?;
        self.store.set(&record_key(code), &value).await?;
        Ok(())
    }
}
