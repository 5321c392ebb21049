pub mod accounts;
pub mod availability;
pub mod booking;
pub mod conflict;
pub mod lifecycle;

pub use accounts::AccountRemovalService;
pub use availability::AvailabilityService;
pub use booking::BookingService;
pub use conflict::ConflictChecker;
