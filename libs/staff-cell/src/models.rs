// libs/staff-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// CORE STAFF MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A field worker. Skills and weekly work schedules are a composition: they
/// are fetched embedded with the staff row and have no independent lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staff {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub account_status: String,
    pub is_available: bool,
    pub current_latitude: Option<f64>,
    pub current_longitude: Option<f64>,
    pub service_radius_km: f64,
    pub average_rating: f64,
    pub total_completed_jobs: i32,
    #[serde(default)]
    pub staff_skills: Vec<StaffSkill>,
    #[serde(default)]
    pub work_schedules: Vec<WorkSchedule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Staff {
    pub fn location(&self) -> Option<GeoPoint> {
        match (self.current_latitude, self.current_longitude) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        }
    }

    pub fn has_active_skill(&self, service_id: Uuid) -> bool {
        self.staff_skills
            .iter()
            .any(|skill| skill.service_id == service_id && skill.is_active)
    }

    pub fn is_active_account(&self) -> bool {
        self.account_status == "active"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffSkill {
    pub id: Uuid,
    pub staff_id: Uuid,
    pub service_id: Uuid,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkSchedule {
    pub id: Uuid,
    pub staff_id: Uuid,
    pub day_of_week: i32, // 0 = Sunday, 1 = Monday, etc.
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_active: bool,
}

impl WorkSchedule {
    /// True when this schedule entry fully contains the window.
    pub fn covers(&self, window: &TimeWindow) -> bool {
        self.start_time <= window.start && self.end_time >= window.end
    }
}

// ==============================================================================
// TIME WINDOWS
// ==============================================================================

/// A same-day half-open interval `[start, end)`. The slot generator in the
/// booking cell produces these; the eligibility filter consumes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Window starting at `start` and lasting `minutes`. Clamped at midnight:
    /// schedules never cross a day boundary.
    pub fn from_start(start: NaiveTime, minutes: i64) -> Self {
        let (end, wrapped_days) = start.overflowing_add_signed(chrono::Duration::minutes(minutes));
        let end = if wrapped_days > 0 {
            NaiveTime::from_hms_opt(23, 59, 59).unwrap()
        } else {
            end
        };
        Self { start, end }
    }

    /// Half-open overlap: `[a, b)` and `[c, d)` overlap iff `a < d && c < b`.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A staff member's existing booking, projected down to the fields the
/// conflict check needs. Mirrors rows in `bookings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffCommitment {
    pub staff_id: Uuid,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub estimated_duration_minutes: i32,
    pub status: String,
}

impl StaffCommitment {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::from_start(self.scheduled_time, self.estimated_duration_minutes as i64)
    }

    /// Cancelled and completed bookings no longer block the calendar.
    pub fn blocks_scheduling(&self) -> bool {
        self.status != "cancelled" && self.status != "completed"
    }
}

// ==============================================================================
// MATCHING MODELS
// ==============================================================================

/// A scored candidate for one booking. Transient - never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub staff: Staff,
    pub distance_km: Option<f64>,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffSummary {
    pub id: Uuid,
    pub full_name: String,
    pub average_rating: f64,
}

impl From<&Staff> for StaffSummary {
    fn from(staff: &Staff) -> Self {
        Self {
            id: staff.id,
            full_name: staff.full_name.clone(),
            average_rating: staff.average_rating,
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct MatchQuery {
    pub service_id: Option<Uuid>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: Option<i32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl MatchQuery {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::from_start(self.start_time, self.duration_minutes.unwrap_or(60) as i64)
    }

    pub fn target(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        }
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StaffError {
    #[error("Staff member not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
