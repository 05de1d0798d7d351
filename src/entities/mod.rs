mod bid;
mod booking;
pub mod credit;
mod ride;
mod ride_request;

pub use bid::{sort_bids, Bid, BidOffer, Sort as BidSort, Status as BidStatus, BID_TTL_HOURS};
pub use booking::{booked_seats, Booking, Status as BookingStatus};
pub use credit::{
    CreditAccount, CreditPackage, CreditTransaction, Debit, Deduction, DriverCredit,
    PaymentStatus, Source as CreditSource, TransactionType,
};
pub use ride::{NewRide, Ride, Status as RideStatus, SCHEDULE_CONFLICT_WINDOW_HOURS};
pub use ride_request::{NewRideRequest, RideRequest, Status as RequestStatus};
