// libs/booking-cell/src/services/lifecycle.rs
//
// Pure booking state machine. `apply` consumes an immutable reference and
// returns a fresh Booking; a rejected transition leaves the input untouched.
// Time is always a parameter, never read from the clock.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::models::{Actor, Booking, BookingError, BookingEvent, BookingStatus};

/// Minimum notice a customer must give to cancel.
const CANCEL_LEAD_HOURS: i64 = 2;

/// Minimum notice a customer must give to reschedule.
const RESCHEDULE_LEAD_HOURS: i64 = 4;

/// How long an auto-assigned staff member has to accept or decline.
pub const STAFF_RESPONSE_HOURS: i64 = 2;

pub fn apply(
    booking: &Booking,
    event: &BookingEvent,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<Booking, BookingError> {
    debug!(
        "Applying {} to booking {} in {}",
        event.name(),
        booking.id,
        booking.status
    );

    let mut next = booking.clone();
    next.updated_at = now;

    match (booking.status, event) {
        (BookingStatus::Pending, BookingEvent::AutoAssign { staff_id }) => {
            require_system_or_admin(actor)?;
            next.status = BookingStatus::AutoAssigned;
            next.staff_id = Some(*staff_id);
            next.staff_response_deadline = Some(now + Duration::hours(STAFF_RESPONSE_HOURS));
            next.staff_declined_at = None;
            next.declined_reason = None;
        }

        (BookingStatus::AutoAssigned, BookingEvent::StaffAccept) => {
            require_assigned_staff(booking, actor)?;
            next.status = BookingStatus::Confirmed;
            next.staff_accepted_at = Some(now);
            next.staff_response_deadline = None;
        }

        (BookingStatus::AutoAssigned, BookingEvent::StaffDecline { reason }) => {
            if !matches!(actor, Actor::System) {
                require_assigned_staff(booking, actor)?;
            }
            next.status = BookingStatus::Pending;
            next.staff_id = None;
            next.staff_response_deadline = None;
            next.staff_declined_at = Some(now);
            next.declined_reason = reason.clone();
        }

        (BookingStatus::Confirmed, BookingEvent::CheckIn) => {
            require_assigned_staff(booking, actor)?;
            next.status = BookingStatus::InProgress;
            next.started_at = Some(now);
        }

        (BookingStatus::InProgress, BookingEvent::CheckOut) => {
            require_assigned_staff(booking, actor)?;
            next.status = BookingStatus::Completed;
            next.completed_at = Some(now);
        }

        (BookingStatus::Completed, BookingEvent::ConfirmCompletion) => {
            require_customer(booking, actor)?;
            if next.final_amount.is_none() {
                next.final_amount = Some(booking.total_amount);
            }
        }

        (status, BookingEvent::Cancel { reason })
            if !status.is_terminal() && status != BookingStatus::InProgress =>
        {
            match actor {
                Actor::Customer(id) => {
                    if *id != booking.customer_id {
                        return Err(BookingError::Unauthorized);
                    }
                    let lead = booking.scheduled_start() - now;
                    if lead < Duration::hours(CANCEL_LEAD_HOURS) {
                        return Err(BookingError::ValidationError(format!(
                            "Cancellation requires at least {} hours notice",
                            CANCEL_LEAD_HOURS
                        )));
                    }
                }
                Actor::Admin | Actor::System => {}
                Actor::Staff(_) => return Err(BookingError::Unauthorized),
            }
            next.status = BookingStatus::Cancelled;
            next.staff_id = None;
            next.staff_response_deadline = None;
            next.cancelled_at = Some(now);
            next.cancellation_reason = reason.clone();
        }

        (_, BookingEvent::ForceComplete { note }) => {
            if !matches!(actor, Actor::Admin) {
                return Err(BookingError::Unauthorized);
            }
            next.status = BookingStatus::Completed;
            next.completed_at = Some(now);
            if let Some(note) = note {
                next.admin_notes = Some(match &booking.admin_notes {
                    Some(existing) => format!("{}\n{}", existing, note),
                    None => note.clone(),
                });
            }
        }

        (BookingStatus::Pending, BookingEvent::ManualAssign { staff_id }) => {
            require_system_or_admin(actor)?;
            next.status = BookingStatus::Confirmed;
            next.staff_id = Some(*staff_id);
            next.staff_accepted_at = Some(now);
        }

        (
            BookingStatus::Pending | BookingStatus::PendingSchedule,
            BookingEvent::Reject { reason },
        ) => {
            if !matches!(actor, Actor::Admin) {
                return Err(BookingError::Unauthorized);
            }
            next.status = BookingStatus::Rejected;
            next.staff_id = None;
            if let Some(reason) = reason {
                next.admin_notes = Some(reason.clone());
            }
        }

        (
            BookingStatus::Pending | BookingStatus::PendingSchedule,
            BookingEvent::Update { date, time },
        ) => {
            match actor {
                Actor::Customer(id) => {
                    if *id != booking.customer_id {
                        return Err(BookingError::Unauthorized);
                    }
                    if booking.status == BookingStatus::Pending {
                        let lead = booking.scheduled_start() - now;
                        if lead < Duration::hours(RESCHEDULE_LEAD_HOURS) {
                            return Err(BookingError::ValidationError(format!(
                                "Rescheduling requires at least {} hours notice",
                                RESCHEDULE_LEAD_HOURS
                            )));
                        }
                    }
                }
                Actor::Admin | Actor::System => {}
                Actor::Staff(_) => return Err(BookingError::Unauthorized),
            }
            next.status = BookingStatus::Pending;
            next.scheduled_date = *date;
            next.scheduled_time = *time;
        }

        (from, event) => {
            warn!(
                "Rejected transition {} from {} on booking {}",
                event.name(),
                from,
                booking.id
            );
            return Err(BookingError::InvalidTransition {
                from,
                event: event.name().to_string(),
            });
        }
    }

    Ok(next)
}

fn require_assigned_staff(booking: &Booking, actor: &Actor) -> Result<(), BookingError> {
    match actor {
        Actor::Staff(id) if booking.staff_id == Some(*id) => Ok(()),
        _ => Err(BookingError::Unauthorized),
    }
}

fn require_customer(booking: &Booking, actor: &Actor) -> Result<(), BookingError> {
    match actor {
        Actor::Customer(id) if *id == booking.customer_id => Ok(()),
        Actor::Admin => Ok(()),
        _ => Err(BookingError::Unauthorized),
    }
}

fn require_system_or_admin(actor: &Actor) -> Result<(), BookingError> {
    match actor {
        Actor::System | Actor::Admin => Ok(()),
        _ => Err(BookingError::Unauthorized),
    }
}
