//! Revoked refresh token storage.
//!
//! When a refresh token is rotated or logged out, its JTI is stored until the
//! token would have naturally expired. Refresh is refused for any JTI found
//! here, regardless of signature validity.
//!
//! # Security Considerations
//!
//! - Revoked JTIs must be stored with their original expiration time
//! - `revoke` must be atomic: exactly one caller observes the first revocation,
//!   which is what makes a refresh token single-use under concurrency
//! - Records may be dropped only after the token's own expiry (plus leeway),
//!   since an expired token is rejected by the codec anyway

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use coreroot_core::{Clock, SharedClock};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::{Duration, OffsetDateTime};

use crate::AuthResult;

/// Storage trait for revoked refresh token JTIs.
#[async_trait]
pub trait RevokedTokenStorage: Send + Sync {
    /// Marks a JTI as revoked.
    ///
    /// # Arguments
    ///
    /// * `jti` - The JWT ID of the refresh token to revoke
    /// * `expires_at` - When the token would have naturally expired
    ///
    /// # Returns
    ///
    /// `true` if this call revoked the JTI, `false` if it was already revoked.
    ///
    /// # Idempotency
    ///
    /// Revoking an already-revoked JTI succeeds without error and returns `false`.
    async fn revoke(&self, jti: &str, expires_at: OffsetDateTime) -> AuthResult<bool>;

    /// Checks if a JTI has been revoked.
    ///
    /// # Performance
    ///
    /// Called on every refresh, so implementations should keep it to a
    /// single keyed lookup.
    async fn is_revoked(&self, jti: &str) -> AuthResult<bool>;

    /// Deletes records whose tokens have naturally expired.
    ///
    /// # Returns
    ///
    /// Returns the number of records deleted.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}

/// A revocation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevocationRecord {
    pub revoked_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

/// Number of records above which `revoke` first sweeps expired entries.
const DEFAULT_SWEEP_THRESHOLD: usize = 10_000;

/// In-process revocation store.
///
/// Expired records are dropped passively: `revoke` sweeps the map when it
/// grows past a watermark, and `cleanup_expired` can be called on demand.
/// After each sweep the watermark moves to twice the surviving record count,
/// so sweeps stay amortized O(1) per revocation even when every record is
/// still live. There are no background timers.
pub struct InMemoryRevokedTokenStorage {
    records: DashMap<String, RevocationRecord>,
    clock: SharedClock,
    grace: Duration,
    sweep_threshold: usize,
    next_sweep_at: AtomicUsize,
    sweeps: AtomicU64,
}

impl InMemoryRevokedTokenStorage {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            records: DashMap::new(),
            clock,
            grace: Duration::ZERO,
            sweep_threshold: DEFAULT_SWEEP_THRESHOLD,
            next_sweep_at: AtomicUsize::new(DEFAULT_SWEEP_THRESHOLD),
            sweeps: AtomicU64::new(0),
        }
    }

    /// Keeps records for `grace` past expiry; set this to the codec leeway.
    #[must_use]
    pub fn with_grace(mut self, grace: std::time::Duration) -> Self {
        self.grace = Duration::try_from(grace).unwrap_or(Duration::ZERO);
        self
    }

    #[must_use]
    pub fn with_sweep_threshold(mut self, threshold: usize) -> Self {
        self.sweep_threshold = threshold.max(1);
        self.next_sweep_at = AtomicUsize::new(self.sweep_threshold);
        self
    }

    /// Number of records currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of opportunistic sweeps performed so far.
    pub fn sweep_count(&self) -> u64 {
        self.sweeps.load(Ordering::Relaxed)
    }

    pub fn record(&self, jti: &str) -> Option<RevocationRecord> {
        self.records.get(jti).map(|r| *r)
    }

    fn is_stale(&self, record: &RevocationRecord, now: OffsetDateTime) -> bool {
        now >= record.expires_at + self.grace
    }

    fn sweep(&self, now: OffsetDateTime) -> u64 {
        let before = self.records.len();
        self.records.retain(|_, record| !self.is_stale(record, now));
        (before.saturating_sub(self.records.len())) as u64
    }

    /// Sweeps once the map outgrows the watermark. Only the caller that
    /// claims the watermark sweeps; concurrent revokers skip.
    fn maybe_sweep(&self, now: OffsetDateTime) {
        let watermark = self.next_sweep_at.load(Ordering::Acquire);
        if self.records.len() <= watermark {
            return;
        }
        if self
            .next_sweep_at
            .compare_exchange(watermark, usize::MAX, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let removed = self.sweep(now);
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        let next = self
            .sweep_threshold
            .max(self.records.len().saturating_mul(2));
        self.next_sweep_at.store(next, Ordering::Release);
        tracing::debug!(removed, next_sweep_at = next, "Swept expired revocation records");
    }
}

impl std::fmt::Debug for InMemoryRevokedTokenStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRevokedTokenStorage")
            .field("records", &self.records.len())
            .field("grace", &self.grace)
            .finish()
    }
}

#[async_trait]
impl RevokedTokenStorage for InMemoryRevokedTokenStorage {
    async fn revoke(&self, jti: &str, expires_at: OffsetDateTime) -> AuthResult<bool> {
        let now = self.clock.now();
        let record = RevocationRecord {
            revoked_at: now,
            expires_at,
        };

        let newly_revoked = match self.records.entry(jti.to_string()) {
            Entry::Occupied(mut existing) => {
                // A stale record means the token expired long ago; keep it
                // revoked but do not report it as fresh.
                if self.is_stale(existing.get(), now) {
                    existing.insert(record);
                }
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
        };

        self.maybe_sweep(now);

        Ok(newly_revoked)
    }

    async fn is_revoked(&self, jti: &str) -> AuthResult<bool> {
        // Stale records still answer `true`: once revoked, always revoked
        // until the record is physically removed.
        Ok(self.records.contains_key(jti))
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let removed = self.sweep(self.clock.now());
        if removed > 0 {
            tracing::debug!(removed, "Cleaned up expired revocation records");
        }
        Ok(removed)
    }
}
