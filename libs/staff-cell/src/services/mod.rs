pub mod eligibility;
pub mod matching;
pub mod staff;

pub use eligibility::EligibilityService;
pub use matching::MatchingService;
pub use staff::StaffService;
