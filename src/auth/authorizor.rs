use oso::{Oso, PolarClass, ToPolar};

use crate::auth::{Marketplace, User};
use crate::entities::{Bid, Booking, CreditAccount, Ride, RideRequest};
use crate::error::{forbidden_error, Error};

pub fn new() -> Result<Oso, Error> {
    let mut o = Oso::new();

    o.register_class(Marketplace::get_polar_class())?;
    o.register_class(User::get_polar_class())?;
    o.register_class(RideRequest::get_polar_class())?;
    o.register_class(Bid::get_polar_class())?;
    o.register_class(Ride::get_polar_class())?;
    o.register_class(Booking::get_polar_class())?;
    o.register_class(CreditAccount::get_polar_class())?;

    o.load_str(include_str!("rules.polar"))?;

    Ok(o)
}

/// Fails with a forbidden error unless the policy allows `actor` to `action` on `resource`.
pub fn authorize<Resource>(
    authorizor: &Oso,
    actor: User,
    action: &'static str,
    resource: Resource,
) -> Result<(), Error>
where
    Resource: ToPolar,
{
    if authorizor.is_allowed(actor, action, resource)? {
        return Ok(());
    }

    Err(forbidden_error())
}
