// libs/booking-cell/src/services/scheduling.rs
//
// Orchestrates booking creation, auto-assignment, and availability queries.
// All business rules live in the pure lifecycle/slots modules; this service
// fetches snapshots over PostgREST, applies the pure functions, and persists
// the outcome with a single PATCH so a failure leaves the row unchanged.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use staff_cell::models::{MatchQuery, StaffError, StaffSummary};
use staff_cell::services::eligibility::{day_of_week, filter_eligible, EligibilityService};
use staff_cell::services::matching::MatchingService;
use staff_cell::services::staff::StaffService;

use crate::models::{
    Actor, Booking, BookingError, BookingEvent, BookingStatus, BusinessHours,
    CreateBookingRequest, Service, ServicePackage, TimeSlot,
};
use crate::services::consistency::{
    booking_lock_key, staff_day_lock_key, SchedulingLockService,
};
use crate::services::{lifecycle, slots};

const DEFAULT_SLOT_DURATION_MINUTES: i32 = 60;
const NEXT_SLOT_HORIZON_DAYS: i64 = 30;

/// Cooperative cancellation for multi-day availability scans. The scan checks
/// the flag between days and returns whatever it has accumulated so far.
#[derive(Clone, Default)]
pub struct ScanControl(Arc<AtomicBool>);

impl ScanControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Result of booking creation. Auto-assignment is best-effort at this point:
/// a booking that found no staff stays `Pending` and the miss is reported
/// alongside, not as a creation failure.
#[derive(Debug)]
pub struct CreateBookingOutcome {
    pub booking: Booking,
    pub assignment_note: Option<String>,
}

pub struct SchedulingService {
    supabase: SupabaseClient,
    locks: SchedulingLockService,
    matching: MatchingService,
    eligibility: EligibilityService,
    staff: StaffService,
}

fn representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

fn from_staff_error(e: StaffError) -> BookingError {
    match e {
        StaffError::NotFound => BookingError::ValidationError("Staff member not found".to_string()),
        StaffError::ValidationError(msg) => BookingError::ValidationError(msg),
        StaffError::DatabaseError(msg) => BookingError::DatabaseError(msg),
    }
}

impl SchedulingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            locks: SchedulingLockService::new(config),
            matching: MatchingService::new(config),
            eligibility: EligibilityService::new(config),
            staff: StaffService::new(config),
        }
    }

    // ==========================================================================
    // BOOKING CREATION
    // ==========================================================================

    pub async fn create_booking(
        &self,
        request: CreateBookingRequest,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<CreateBookingOutcome, BookingError> {
        let scheduled_start: DateTime<Utc> = DateTime::from_naive_utc_and_offset(
            request.scheduled_date.and_time(request.scheduled_time),
            Utc,
        );
        if scheduled_start <= now {
            return Err(BookingError::ValidationError(
                "Booking must be scheduled in the future".to_string(),
            ));
        }

        let service = self.fetch_service(request.service_id, auth_token).await?;

        let mut total_amount = service.base_price;
        if let Some(package_id) = request.package_id {
            let package = self.fetch_package(package_id, auth_token).await?;
            if package.service_id != request.service_id {
                return Err(BookingError::ValidationError(
                    "Package does not belong to the requested service".to_string(),
                ));
            }
            total_amount = package.price;
        }

        // Pre-selected staff skips the matching round entirely.
        let (status, staff_id, staff_accepted_at) = match request.staff_id {
            Some(staff_id) => {
                let staff = self
                    .staff
                    .get_staff(staff_id, auth_token)
                    .await
                    .map_err(from_staff_error)?;
                if !staff.has_active_skill(request.service_id) {
                    return Err(BookingError::ValidationError(
                        "Selected staff member does not offer this service".to_string(),
                    ));
                }
                (BookingStatus::Confirmed, Some(staff_id), Some(now))
            }
            None => (BookingStatus::Pending, None, None),
        };

        let booking_number = self
            .next_booking_number(request.scheduled_date, auth_token)
            .await?;

        let row = json!({
            "id": Uuid::new_v4(),
            "booking_number": booking_number,
            "customer_id": request.customer_id,
            "service_id": request.service_id,
            "package_id": request.package_id,
            "staff_id": staff_id,
            "status": status,
            "scheduled_date": request.scheduled_date,
            "scheduled_time": request.scheduled_time,
            "estimated_duration_minutes": service.duration_minutes,
            "address_latitude": request.address_latitude,
            "address_longitude": request.address_longitude,
            "total_amount": total_amount,
            "final_amount": null,
            "staff_response_deadline": null,
            "staff_accepted_at": staff_accepted_at,
            "created_at": now,
            "updated_at": now,
        });

        let created: Vec<Booking> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/bookings",
                Some(auth_token),
                Some(row),
                Some(representation()),
            )
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;
        let booking = created
            .into_iter()
            .next()
            .ok_or_else(|| BookingError::DatabaseError("Booking insert returned no row".to_string()))?;

        info!("Created booking {} ({})", booking.booking_number, booking.id);

        if booking.status != BookingStatus::Pending {
            return Ok(CreateBookingOutcome {
                booking,
                assignment_note: None,
            });
        }

        match self.auto_assign(booking.id, now, auth_token).await {
            Ok(assigned) => Ok(CreateBookingOutcome {
                booking: assigned,
                assignment_note: None,
            }),
            Err(BookingError::NoAvailableStaff) => Ok(CreateBookingOutcome {
                booking,
                assignment_note: Some(
                    "No staff available yet; booking remains pending".to_string(),
                ),
            }),
            Err(BookingError::Busy(_)) => Ok(CreateBookingOutcome {
                booking,
                assignment_note: Some(
                    "Scheduler busy; assignment will be retried".to_string(),
                ),
            }),
            Err(e) => Err(e),
        }
    }

    /// Next `BK{yyyymmdd}-NNNN` number for the booking's date.
    async fn next_booking_number(
        &self,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<String, BookingError> {
        let prefix = format!("BK{}", date.format("%Y%m%d"));
        let path = format!(
            "/rest/v1/bookings?select=booking_number&booking_number=like.{}-*&order=booking_number.desc&limit=1",
            prefix
        );

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        let next_seq = rows
            .first()
            .and_then(|row| row.get("booking_number"))
            .and_then(|v| v.as_str())
            .and_then(|number| number.rsplit('-').next())
            .and_then(|suffix| suffix.parse::<u32>().ok())
            .map(|seq| seq + 1)
            .unwrap_or(1);

        Ok(format!("{}-{:04}", prefix, next_seq))
    }

    // ==========================================================================
    // AUTO-ASSIGNMENT
    // ==========================================================================

    /// Pick the best eligible staff member and commit the assignment. The
    /// booking lock serializes concurrent assigns of the same booking; the
    /// per-staff-day lock plus the calendar re-check under it close the
    /// check-then-act race between two bookings chasing the same worker.
    pub async fn auto_assign(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Booking, BookingError> {
        let guard = self.locks.acquire(&booking_lock_key(booking_id)).await?;
        let result = self.auto_assign_locked(booking_id, now, auth_token).await;
        self.release_quietly(guard).await;
        result
    }

    async fn auto_assign_locked(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Booking, BookingError> {
        let booking = self.get_booking(booking_id, auth_token).await?;
        if booking.status != BookingStatus::Pending {
            return Err(BookingError::InvalidTransition {
                from: booking.status,
                event: "auto_assign".to_string(),
            });
        }

        let query = MatchQuery {
            service_id: Some(booking.service_id),
            date: booking.scheduled_date,
            start_time: booking.scheduled_time,
            duration_minutes: Some(booking.estimated_duration_minutes),
            latitude: Some(booking.address_latitude),
            longitude: Some(booking.address_longitude),
        };
        let candidates = self
            .matching
            .find_candidates(&query, auth_token)
            .await
            .map_err(from_staff_error)?;

        let window = booking.window();
        for candidate in candidates {
            let staff_id = candidate.staff.id;
            let day_key = staff_day_lock_key(staff_id, booking.scheduled_date);

            let day_guard = match self.locks.try_take(&day_key).await? {
                Some(guard) => guard,
                // Another assignment holds this worker's day; fall through
                // to the next candidate.
                None => continue,
            };

            let free = self
                .matching
                .staff_is_free(staff_id, booking.scheduled_date, &window, auth_token)
                .await
                .map_err(from_staff_error);

            match free {
                Ok(true) => {
                    let updated = lifecycle::apply(
                        &booking,
                        &BookingEvent::AutoAssign { staff_id },
                        &Actor::System,
                        now,
                    )?;
                    let persisted = self.persist(&updated, auth_token).await;
                    self.release_quietly(day_guard).await;
                    let persisted = persisted?;
                    info!(
                        "Auto-assigned staff {} to booking {} (score {:.1})",
                        staff_id, booking.booking_number, candidate.score
                    );
                    return Ok(persisted);
                }
                Ok(false) => {
                    self.release_quietly(day_guard).await;
                }
                Err(e) => {
                    self.release_quietly(day_guard).await;
                    return Err(e);
                }
            }
        }

        Err(BookingError::NoAvailableStaff)
    }

    /// Same locking discipline as `auto_assign`: the booking lock keeps a
    /// concurrent auto-assignment from racing this write, the staff-day
    /// lock guards the availability re-check.
    pub async fn manual_assign(
        &self,
        booking_id: Uuid,
        staff_id: Uuid,
        actor: Actor,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Booking, BookingError> {
        let guard = self.locks.acquire(&booking_lock_key(booking_id)).await?;
        let result = self
            .manual_assign_locked(booking_id, staff_id, actor, now, auth_token)
            .await;
        self.release_quietly(guard).await;
        result
    }

    async fn manual_assign_locked(
        &self,
        booking_id: Uuid,
        staff_id: Uuid,
        actor: Actor,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Booking, BookingError> {
        let booking = self.get_booking(booking_id, auth_token).await?;
        let staff = self
            .staff
            .get_staff(staff_id, auth_token)
            .await
            .map_err(from_staff_error)?;
        if !staff.has_active_skill(booking.service_id) {
            return Err(BookingError::ValidationError(
                "Staff member does not offer this service".to_string(),
            ));
        }

        let window = booking.window();
        let day_key = staff_day_lock_key(staff_id, booking.scheduled_date);
        let guard = self.locks.acquire(&day_key).await?;

        let result = async {
            let free = self
                .matching
                .staff_is_free(staff_id, booking.scheduled_date, &window, auth_token)
                .await
                .map_err(from_staff_error)?;
            if !free {
                return Err(BookingError::ValidationError(
                    "Staff member is not available at the requested time".to_string(),
                ));
            }

            let updated = lifecycle::apply(
                &booking,
                &BookingEvent::ManualAssign { staff_id },
                &actor,
                now,
            )?;
            self.persist(&updated, auth_token).await
        }
        .await;

        self.release_quietly(guard).await;
        result
    }

    // ==========================================================================
    // LIFECYCLE OPERATIONS
    // ==========================================================================

    pub async fn staff_respond(
        &self,
        booking_id: Uuid,
        accept: bool,
        reason: Option<String>,
        actor: Actor,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Booking, BookingError> {
        let event = if accept {
            BookingEvent::StaffAccept
        } else {
            BookingEvent::StaffDecline { reason }
        };
        self.transition(booking_id, event, actor, now, auth_token)
            .await
    }

    pub async fn check_in(
        &self,
        booking_id: Uuid,
        actor: Actor,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Booking, BookingError> {
        self.transition(booking_id, BookingEvent::CheckIn, actor, now, auth_token)
            .await
    }

    pub async fn check_out(
        &self,
        booking_id: Uuid,
        actor: Actor,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Booking, BookingError> {
        self.transition(booking_id, BookingEvent::CheckOut, actor, now, auth_token)
            .await
    }

    pub async fn confirm_completion(
        &self,
        booking_id: Uuid,
        actor: Actor,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Booking, BookingError> {
        self.transition(
            booking_id,
            BookingEvent::ConfirmCompletion,
            actor,
            now,
            auth_token,
        )
        .await
    }

    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        reason: Option<String>,
        actor: Actor,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Booking, BookingError> {
        self.transition(
            booking_id,
            BookingEvent::Cancel { reason },
            actor,
            now,
            auth_token,
        )
        .await
    }

    pub async fn force_complete(
        &self,
        booking_id: Uuid,
        note: Option<String>,
        actor: Actor,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Booking, BookingError> {
        self.transition(
            booking_id,
            BookingEvent::ForceComplete { note },
            actor,
            now,
            auth_token,
        )
        .await
    }

    pub async fn reschedule_booking(
        &self,
        booking_id: Uuid,
        date: NaiveDate,
        time: chrono::NaiveTime,
        actor: Actor,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Booking, BookingError> {
        self.transition(
            booking_id,
            BookingEvent::Update { date, time },
            actor,
            now,
            auth_token,
        )
        .await
    }

    async fn transition(
        &self,
        booking_id: Uuid,
        event: BookingEvent,
        actor: Actor,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Booking, BookingError> {
        let booking = self.get_booking(booking_id, auth_token).await?;
        let updated = lifecycle::apply(&booking, &event, &actor, now)?;
        self.persist(&updated, auth_token).await
    }

    /// Revert every auto-assignment whose response deadline has passed.
    /// Returns the number of bookings swept back to `Pending`.
    pub async fn expire_stale_assignments(
        &self,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<u32, BookingError> {
        let path = format!(
            "/rest/v1/bookings?status=eq.auto_assigned&staff_response_deadline=lt.{}",
            now.to_rfc3339()
        );
        let stale: Vec<Booking> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        let mut swept = 0;
        for booking in stale {
            let event = BookingEvent::StaffDecline {
                reason: Some("Staff response deadline expired".to_string()),
            };
            match lifecycle::apply(&booking, &event, &Actor::System, now) {
                Ok(updated) => match self.persist(&updated, auth_token).await {
                    Ok(_) => swept += 1,
                    Err(e) => warn!("Failed to sweep booking {}: {}", booking.id, e),
                },
                Err(e) => warn!("Skipping booking {} in sweep: {}", booking.id, e),
            }
        }

        if swept > 0 {
            info!("Expired {} stale staff assignments", swept);
        }
        Ok(swept)
    }

    // ==========================================================================
    // AVAILABILITY
    // ==========================================================================

    pub async fn get_available_slots(
        &self,
        date: NaiveDate,
        service_id: Option<Uuid>,
        staff_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<TimeSlot>, BookingError> {
        let hours = self.fetch_business_hours(date, auth_token).await?;

        let duration = match service_id {
            Some(service_id) => {
                self.fetch_service(service_id, auth_token)
                    .await?
                    .duration_minutes
            }
            None => DEFAULT_SLOT_DURATION_MINUTES,
        };

        let windows = slots::generate_slots(&hours, duration);
        if windows.is_empty() {
            return Err(BookingError::InvalidSchedule(
                "No bookable window fits within business hours".to_string(),
            ));
        }

        let (pool, commitments) = self
            .eligibility
            .day_snapshot(date, staff_id, auth_token)
            .await
            .map_err(from_staff_error)?;

        let mut available = Vec::new();
        for window in windows {
            let eligible = filter_eligible(&pool, service_id, date, &window, None, &commitments);
            if eligible.is_empty() {
                continue;
            }
            available.push(TimeSlot {
                start_time: window.start,
                end_time: window.end,
                available_staff: eligible.into_iter().map(StaffSummary::from).collect(),
            });
        }

        Ok(available)
    }

    /// Day-by-day accumulation over a date range. Closed days and days with
    /// no open windows are omitted. The scan honors `control` between days
    /// and returns the partial map when cancelled.
    pub async fn get_available_slots_for_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        service_id: Option<Uuid>,
        staff_id: Option<Uuid>,
        control: &ScanControl,
        auth_token: &str,
    ) -> Result<BTreeMap<NaiveDate, Vec<TimeSlot>>, BookingError> {
        if end < start {
            return Err(BookingError::ValidationError(
                "Range end precedes range start".to_string(),
            ));
        }

        let mut by_date = BTreeMap::new();
        let mut date = start;
        while date <= end {
            if control.is_cancelled() {
                info!("Availability scan cancelled at {}", date);
                break;
            }

            match self
                .get_available_slots(date, service_id, staff_id, auth_token)
                .await
            {
                Ok(slots) if !slots.is_empty() => {
                    by_date.insert(date, slots);
                }
                Ok(_) => {}
                Err(BookingError::InvalidSchedule(_)) => {}
                Err(e) => return Err(e),
            }

            date += Duration::days(1);
        }

        Ok(by_date)
    }

    /// First open slot scanning forward from `from`, bounded by a 30-day
    /// horizon.
    pub async fn get_next_available_slot(
        &self,
        from: NaiveDate,
        service_id: Option<Uuid>,
        staff_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<(NaiveDate, TimeSlot), BookingError> {
        for offset in 0..NEXT_SLOT_HORIZON_DAYS {
            let date = from + Duration::days(offset);
            match self
                .get_available_slots(date, service_id, staff_id, auth_token)
                .await
            {
                Ok(slots) => {
                    if let Some(slot) = slots.into_iter().next() {
                        return Ok((date, slot));
                    }
                }
                Err(BookingError::InvalidSchedule(_)) => {}
                Err(e) => return Err(e),
            }
        }

        Err(BookingError::NotFound)
    }

    // ==========================================================================
    // PERSISTENCE HELPERS
    // ==========================================================================

    pub async fn get_booking(
        &self,
        booking_id: Uuid,
        auth_token: &str,
    ) -> Result<Booking, BookingError> {
        let path = format!("/rest/v1/bookings?id=eq.{}", booking_id);
        let rows: Vec<Booking> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;
        rows.into_iter().next().ok_or(BookingError::NotFound)
    }

    pub async fn cleanup_expired_locks(&self) -> Result<u32, BookingError> {
        self.locks.cleanup_expired_locks().await
    }

    /// Write back every column a transition may touch in one PATCH.
    async fn persist(&self, booking: &Booking, auth_token: &str) -> Result<Booking, BookingError> {
        let patch = json!({
            "status": booking.status,
            "staff_id": booking.staff_id,
            "scheduled_date": booking.scheduled_date,
            "scheduled_time": booking.scheduled_time,
            "final_amount": booking.final_amount,
            "staff_response_deadline": booking.staff_response_deadline,
            "staff_accepted_at": booking.staff_accepted_at,
            "staff_declined_at": booking.staff_declined_at,
            "declined_reason": booking.declined_reason,
            "started_at": booking.started_at,
            "completed_at": booking.completed_at,
            "cancelled_at": booking.cancelled_at,
            "cancellation_reason": booking.cancellation_reason,
            "admin_notes": booking.admin_notes,
            "updated_at": booking.updated_at,
        });

        let path = format!("/rest/v1/bookings?id=eq.{}", booking.id);
        let rows: Vec<Booking> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(patch),
                Some(representation()),
            )
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BookingError::DatabaseError("Booking update returned no row".to_string()))
    }

    async fn fetch_service(
        &self,
        service_id: Uuid,
        auth_token: &str,
    ) -> Result<Service, BookingError> {
        let path = format!("/rest/v1/services?id=eq.{}&is_active=eq.true", service_id);
        let rows: Vec<Service> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;
        rows.into_iter().next().ok_or_else(|| {
            BookingError::ValidationError("Unknown or inactive service".to_string())
        })
    }

    async fn fetch_package(
        &self,
        package_id: Uuid,
        auth_token: &str,
    ) -> Result<ServicePackage, BookingError> {
        let path = format!(
            "/rest/v1/service_packages?id=eq.{}&is_active=eq.true",
            package_id
        );
        let rows: Vec<ServicePackage> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;
        rows.into_iter().next().ok_or_else(|| {
            BookingError::ValidationError("Unknown or inactive package".to_string())
        })
    }

    async fn fetch_business_hours(
        &self,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<BusinessHours, BookingError> {
        let path = format!(
            "/rest/v1/business_hours?day_of_week=eq.{}&is_active=eq.true&limit=1",
            day_of_week(date)
        );
        let rows: Vec<BusinessHours> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        let hours = rows.into_iter().next().ok_or_else(|| {
            BookingError::InvalidSchedule(format!(
                "No business hours configured for {}",
                date.weekday()
            ))
        })?;
        if hours.is_closed {
            return Err(BookingError::InvalidSchedule(format!(
                "Business is closed on {}",
                date.weekday()
            )));
        }
        Ok(hours)
    }

    async fn release_quietly(&self, guard: crate::services::consistency::LockGuard) {
        let key = guard.key.clone();
        if let Err(e) = self.locks.release(guard).await {
            warn!("Failed to release lock {}: {}", key, e);
        }
    }
}
