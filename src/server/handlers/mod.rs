pub mod bids;
pub mod bookings;
pub mod credits;
pub mod maintenance;
pub mod payments;
pub mod requests;
pub mod rides;
