// libs/booking-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use staff_cell::models::{StaffSummary, TimeWindow};

// ==============================================================================
// CORE BOOKING MODELS
// ==============================================================================

/// A customer's service booking. Rows are never deleted; cancellation and
/// completion are terminal statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub booking_number: String,
    pub customer_id: Uuid,
    pub service_id: Uuid,
    pub package_id: Option<Uuid>,
    pub staff_id: Option<Uuid>,
    pub status: BookingStatus,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub estimated_duration_minutes: i32,
    pub address_latitude: f64,
    pub address_longitude: f64,
    pub total_amount: f64,
    pub final_amount: Option<f64>,
    pub staff_response_deadline: Option<DateTime<Utc>>,
    pub staff_accepted_at: Option<DateTime<Utc>>,
    pub staff_declined_at: Option<DateTime<Utc>>,
    pub declined_reason: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn scheduled_start(&self) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(self.scheduled_date.and_time(self.scheduled_time), Utc)
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow::from_start(self.scheduled_time, self.estimated_duration_minutes as i64)
    }

    /// `staff_id` must be set exactly in the statuses where a worker is
    /// committed to the job. Admin force-completion of an unassigned booking
    /// is the one sanctioned exception.
    pub fn staff_invariant_holds(&self) -> bool {
        let requires_staff = matches!(
            self.status,
            BookingStatus::AutoAssigned
                | BookingStatus::Confirmed
                | BookingStatus::InProgress
                | BookingStatus::Completed
        );
        requires_staff == self.staff_id.is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    AutoAssigned,
    PendingSchedule,
    InProgress,
    Completed,
    Cancelled,
    Rejected,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::Rejected
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStatus::Pending => write!(f, "pending"),
            BookingStatus::Confirmed => write!(f, "confirmed"),
            BookingStatus::AutoAssigned => write!(f, "auto_assigned"),
            BookingStatus::PendingSchedule => write!(f, "pending_schedule"),
            BookingStatus::InProgress => write!(f, "in_progress"),
            BookingStatus::Completed => write!(f, "completed"),
            BookingStatus::Cancelled => write!(f, "cancelled"),
            BookingStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Who is asking for a transition. Identity guards compare against the
/// booking's `customer_id` / `staff_id`; `System` is the sweeper and the
/// auto-assignment path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Customer(Uuid),
    Staff(Uuid),
    Admin,
    System,
}

#[derive(Debug, Clone)]
pub enum BookingEvent {
    AutoAssign { staff_id: Uuid },
    StaffAccept,
    StaffDecline { reason: Option<String> },
    CheckIn,
    CheckOut,
    ConfirmCompletion,
    Cancel { reason: Option<String> },
    ForceComplete { note: Option<String> },
    ManualAssign { staff_id: Uuid },
    Reject { reason: Option<String> },
    Update { date: NaiveDate, time: NaiveTime },
}

impl BookingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BookingEvent::AutoAssign { .. } => "auto_assign",
            BookingEvent::StaffAccept => "staff_accept",
            BookingEvent::StaffDecline { .. } => "staff_decline",
            BookingEvent::CheckIn => "check_in",
            BookingEvent::CheckOut => "check_out",
            BookingEvent::ConfirmCompletion => "confirm_completion",
            BookingEvent::Cancel { .. } => "cancel",
            BookingEvent::ForceComplete { .. } => "force_complete",
            BookingEvent::ManualAssign { .. } => "manual_assign",
            BookingEvent::Reject { .. } => "reject",
            BookingEvent::Update { .. } => "update",
        }
    }
}

// ==============================================================================
// CATALOG MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessHours {
    pub id: Uuid,
    pub day_of_week: i32,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub is_closed: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub base_price: f64,
    pub duration_minutes: i32,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicePackage {
    pub id: Uuid,
    pub service_id: Uuid,
    pub name: String,
    pub price: f64,
    pub is_active: bool,
}

// ==============================================================================
// DERIVED / RESPONSE MODELS
// ==============================================================================

/// An open window plus the staff able to take it. Returned to callers,
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub available_staff: Vec<StaffSummary>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub customer_id: Uuid,
    pub service_id: Uuid,
    pub package_id: Option<Uuid>,
    pub staff_id: Option<Uuid>,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub address_latitude: f64,
    pub address_longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StaffResponseRequest {
    pub accept: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelBookingRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForceCompleteRequest {
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManualAssignRequest {
    pub staff_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleRequest {
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Booking not found")]
    NotFound,

    #[error("Invalid transition: {event} not allowed from {from}")]
    InvalidTransition { from: BookingStatus, event: String },

    #[error("Not authorized for this booking")]
    Unauthorized,

    #[error("No staff available for the requested time")]
    NoAvailableStaff,

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Resource busy: {0}")]
    Busy(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
