// libs/booking-cell/src/services/consistency.rs
//
// Distributed locking over the `scheduling_locks` table. A PostgREST insert
// is the acquire: the unique `lock_key` rejects the second writer. Lock rows
// carry an expiry so a crashed holder cannot wedge the scheduler.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::BookingError;

const LOCK_TIMEOUT_SECONDS: i64 = 30;
const MAX_ACQUIRE_ATTEMPTS: u32 = 3;

pub struct SchedulingLockService {
    supabase: SupabaseClient,
}

/// Guard for a held lock. Release is explicit; the row expiry is the
/// backstop when a holder dies mid-operation.
pub struct LockGuard {
    pub key: String,
}

pub fn booking_lock_key(booking_id: Uuid) -> String {
    format!("booking_{}", booking_id)
}

/// Day-scoped on purpose: windows at offset start times still overlap, so
/// every assignment touching this worker's calendar for the day must hold
/// the same key while it re-checks for conflicts.
pub fn staff_day_lock_key(staff_id: Uuid, date: NaiveDate) -> String {
    format!("staff_{}_{}", staff_id, date)
}

impl SchedulingLockService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Bounded acquisition: a few attempts with linear backoff, then `Busy`.
    /// Callers fail fast rather than queueing behind a contended slot.
    pub async fn acquire(&self, lock_key: &str) -> Result<LockGuard, BookingError> {
        for attempt in 1..=MAX_ACQUIRE_ATTEMPTS {
            if self.try_acquire(lock_key).await? {
                debug!("Lock acquired: {} (attempt {})", lock_key, attempt);
                return Ok(LockGuard {
                    key: lock_key.to_string(),
                });
            }
            if attempt < MAX_ACQUIRE_ATTEMPTS {
                tokio::time::sleep(tokio::time::Duration::from_millis(100 * attempt as u64)).await;
            }
        }

        warn!("Lock contention on {}, giving up", lock_key);
        Err(BookingError::Busy(format!(
            "Could not acquire scheduling lock {}",
            lock_key
        )))
    }

    /// Single acquisition attempt without waiting. Used when the caller has
    /// alternatives to fall through to instead of retrying.
    pub async fn try_take(&self, lock_key: &str) -> Result<Option<LockGuard>, BookingError> {
        if self.try_acquire(lock_key).await? {
            Ok(Some(LockGuard {
                key: lock_key.to_string(),
            }))
        } else {
            Ok(None)
        }
    }

    pub async fn release(&self, guard: LockGuard) -> Result<(), BookingError> {
        self.delete_lock(&guard.key).await?;
        debug!("Lock released: {}", guard.key);
        Ok(())
    }

    async fn try_acquire(&self, lock_key: &str) -> Result<bool, BookingError> {
        if self.insert_lock(lock_key).await {
            return Ok(true);
        }

        // The row exists. Reap it if its holder's lease ran out, then try
        // exactly once more.
        if self.reap_if_expired(lock_key).await? {
            return Ok(self.insert_lock(lock_key).await);
        }

        Ok(false)
    }

    async fn insert_lock(&self, lock_key: &str) -> bool {
        let now = Utc::now();
        let lock_data = json!({
            "lock_key": lock_key,
            "acquired_at": now.to_rfc3339(),
            "expires_at": (now + Duration::seconds(LOCK_TIMEOUT_SECONDS)).to_rfc3339(),
            "process_id": format!("scheduler_{}", Uuid::new_v4())
        });

        self.supabase
            .request::<Value>(
                reqwest::Method::POST,
                "/rest/v1/scheduling_locks",
                None,
                Some(lock_data),
            )
            .await
            .is_ok()
    }

    async fn reap_if_expired(&self, lock_key: &str) -> Result<bool, BookingError> {
        let response: Value = self
            .supabase
            .request(
                reqwest::Method::GET,
                &format!(
                    "/rest/v1/scheduling_locks?lock_key=eq.{}&select=expires_at",
                    lock_key
                ),
                None,
                None,
            )
            .await
            .map_err(|e| BookingError::DatabaseError(format!("Lock check failed: {}", e)))?;

        let expired = response
            .as_array()
            .and_then(|locks| locks.first())
            .and_then(|lock| lock.get("expires_at"))
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|expires_at| expires_at.with_timezone(&Utc) < Utc::now())
            .unwrap_or(false);

        if expired {
            self.delete_lock(lock_key).await?;
            debug!("Reaped expired lock: {}", lock_key);
        }
        Ok(expired)
    }

    async fn delete_lock(&self, lock_key: &str) -> Result<(), BookingError> {
        self.supabase
            .request::<Value>(
                reqwest::Method::DELETE,
                &format!("/rest/v1/scheduling_locks?lock_key=eq.{}", lock_key),
                None,
                None,
            )
            .await
            .map_err(|e| BookingError::DatabaseError(format!("Lock release failed: {}", e)))?;
        Ok(())
    }

    /// Delete every expired lock row. Exposed for the host's periodic
    /// maintenance schedule.
    pub async fn cleanup_expired_locks(&self) -> Result<u32, BookingError> {
        let response: Value = self
            .supabase
            .request(
                reqwest::Method::DELETE,
                &format!(
                    "/rest/v1/scheduling_locks?expires_at=lt.{}",
                    Utc::now().to_rfc3339()
                ),
                None,
                None,
            )
            .await
            .map_err(|e| BookingError::DatabaseError(format!("Lock cleanup failed: {}", e)))?;

        let cleaned = response.as_array().map(|arr| arr.len() as u32).unwrap_or(0);
        if cleaned > 0 {
            info!("Cleaned up {} expired scheduling locks", cleaned);
        }
        Ok(cleaned)
    }
}
