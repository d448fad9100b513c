// libs/booking-cell/src/services/slots.rs
use chrono::Duration;

use staff_cell::models::TimeWindow;

use crate::models::BusinessHours;

/// Candidate windows advance by a fixed half-hour step regardless of the
/// service duration.
const SLOT_STEP_MINUTES: i64 = 30;

/// Generate candidate windows for one day of business hours. Windows start at
/// `open_time`, last `duration_minutes`, and generation stops once a window
/// would run past `close_time`. Closed or inactive days, inverted hours, and
/// non-positive durations all yield an empty sequence. Never crosses midnight.
pub fn generate_slots(hours: &BusinessHours, duration_minutes: i32) -> Vec<TimeWindow> {
    if hours.is_closed || !hours.is_active || duration_minutes <= 0 {
        return vec![];
    }
    if hours.close_time <= hours.open_time {
        return vec![];
    }

    let duration = Duration::minutes(duration_minutes as i64);
    let step = Duration::minutes(SLOT_STEP_MINUTES);

    let mut windows = Vec::new();
    let mut start = hours.open_time;

    loop {
        let (end, wrapped) = start.overflowing_add_signed(duration);
        if wrapped > 0 || end > hours.close_time {
            break;
        }
        windows.push(TimeWindow::new(start, end));

        let (next_start, wrapped) = start.overflowing_add_signed(step);
        if wrapped > 0 {
            break;
        }
        start = next_start;
    }

    windows
}
