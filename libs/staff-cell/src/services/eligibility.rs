// libs/staff-cell/src/services/eligibility.rs
use chrono::{Datelike, NaiveDate};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::geo::haversine_km;
use crate::models::{GeoPoint, Staff, StaffCommitment, StaffError, TimeWindow};

/// Decides which staff members are structurally able to take a job at a
/// given date and time window. The predicates are pure; the service wraps
/// them with snapshot fetches from PostgREST.
pub struct EligibilityService {
    supabase: SupabaseClient,
}

/// Weekday index matching `work_schedules.day_of_week` (0 = Sunday).
pub fn day_of_week(date: NaiveDate) -> i32 {
    date.weekday().num_days_from_sunday() as i32
}

/// Full eligibility predicate for one staff member. All checks must pass:
/// skill, availability flag plus active account, work-schedule containment,
/// no conflicting commitment, and service radius when both coordinates are
/// known. An unknown staff location skips the radius check rather than
/// excluding the candidate.
pub fn is_eligible(
    staff: &Staff,
    service_id: Option<Uuid>,
    date: NaiveDate,
    window: &TimeWindow,
    target: Option<&GeoPoint>,
    commitments: &[StaffCommitment],
) -> bool {
    if let Some(service_id) = service_id {
        if !staff.has_active_skill(service_id) {
            return false;
        }
    }

    if !staff.is_available || !staff.is_active_account() {
        return false;
    }

    if !on_duty(staff, day_of_week(date), window) {
        return false;
    }

    if has_conflict(staff.id, date, window, commitments) {
        return false;
    }

    if let (Some(target), Some(location)) = (target, staff.location()) {
        if haversine_km(&location, target) > staff.service_radius_km {
            return false;
        }
    }

    true
}

pub fn filter_eligible<'a>(
    staff: &'a [Staff],
    service_id: Option<Uuid>,
    date: NaiveDate,
    window: &TimeWindow,
    target: Option<&GeoPoint>,
    commitments: &[StaffCommitment],
) -> Vec<&'a Staff> {
    staff
        .iter()
        .filter(|s| is_eligible(s, service_id, date, window, target, commitments))
        .collect()
}

/// An active schedule entry for the weekday must fully contain the window.
fn on_duty(staff: &Staff, day_of_week: i32, window: &TimeWindow) -> bool {
    staff
        .work_schedules
        .iter()
        .any(|entry| entry.is_active && entry.day_of_week == day_of_week && entry.covers(window))
}

fn has_conflict(
    staff_id: Uuid,
    date: NaiveDate,
    window: &TimeWindow,
    commitments: &[StaffCommitment],
) -> bool {
    commitments.iter().any(|commitment| {
        commitment.staff_id == staff_id
            && commitment.scheduled_date == date
            && commitment.blocks_scheduling()
            && commitment.window().overlaps(window)
    })
}

impl EligibilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Fetch a snapshot of candidate staff and their same-date commitments,
    /// then apply the pure filter. `restrict_to` narrows the candidate pool
    /// to a single staff member (staff-specific availability queries).
    pub async fn find_eligible(
        &self,
        service_id: Option<Uuid>,
        date: NaiveDate,
        window: &TimeWindow,
        target: Option<&GeoPoint>,
        restrict_to: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<Staff>, StaffError> {
        debug!(
            "Finding eligible staff for service {:?} on {} at {}-{}",
            service_id, date, window.start, window.end
        );

        let candidates = self.fetch_candidates(restrict_to, auth_token).await?;
        if candidates.is_empty() {
            return Ok(vec![]);
        }

        let commitments = self.fetch_commitments(date, auth_token).await?;

        let eligible: Vec<Staff> =
            filter_eligible(&candidates, service_id, date, window, target, &commitments)
                .into_iter()
                .cloned()
                .collect();

        debug!("{} of {} candidates eligible", eligible.len(), candidates.len());
        Ok(eligible)
    }

    /// One snapshot of candidates and same-date commitments, for callers that
    /// evaluate many windows against the same day (slot scans). Pair with
    /// [`filter_eligible`].
    pub async fn day_snapshot(
        &self,
        date: NaiveDate,
        restrict_to: Option<Uuid>,
        auth_token: &str,
    ) -> Result<(Vec<Staff>, Vec<StaffCommitment>), StaffError> {
        let candidates = self.fetch_candidates(restrict_to, auth_token).await?;
        if candidates.is_empty() {
            return Ok((vec![], vec![]));
        }
        let commitments = self.fetch_commitments(date, auth_token).await?;
        Ok((candidates, commitments))
    }

    /// Re-check a single staff member's calendar against a window. Called
    /// again under the assignment lock to close the check-then-act race.
    pub async fn staff_is_free(
        &self,
        staff_id: Uuid,
        date: NaiveDate,
        window: &TimeWindow,
        auth_token: &str,
    ) -> Result<bool, StaffError> {
        let path = format!(
            "/rest/v1/bookings?select=staff_id,scheduled_date,scheduled_time,estimated_duration_minutes,status&staff_id=eq.{}&scheduled_date=eq.{}&status=not.in.(cancelled,completed)",
            staff_id, date
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        let commitments: Vec<StaffCommitment> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()
            .map_err(|e| StaffError::DatabaseError(format!("Failed to parse bookings: {}", e)))?;

        Ok(!has_conflict(staff_id, date, window, &commitments))
    }

    async fn fetch_candidates(
        &self,
        restrict_to: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<Staff>, StaffError> {
        let mut path = "/rest/v1/staff?select=*,staff_skills(*),work_schedules(*)&is_available=eq.true&account_status=eq.active".to_string();
        if let Some(staff_id) = restrict_to {
            path.push_str(&format!("&id=eq.{}", staff_id));
        }

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()
            .map_err(|e| StaffError::DatabaseError(format!("Failed to parse staff: {}", e)))
    }

    async fn fetch_commitments(
        &self,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<StaffCommitment>, StaffError> {
        let path = format!(
            "/rest/v1/bookings?select=staff_id,scheduled_date,scheduled_time,estimated_duration_minutes,status&scheduled_date=eq.{}&staff_id=not.is.null&status=not.in.(cancelled,completed)",
            date
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()
            .map_err(|e| StaffError::DatabaseError(format!("Failed to parse bookings: {}", e)))
    }
}
