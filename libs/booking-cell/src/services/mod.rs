pub mod consistency;
pub mod lifecycle;
pub mod scheduling;
pub mod slots;

pub use consistency::SchedulingLockService;
pub use scheduling::{CreateBookingOutcome, ScanControl, SchedulingService};
