use oso::PolarClass;
use serde::Serialize;

/// Resource for role-gated actions that do not target an existing entity,
/// such as posting a ride or buying credits.
#[derive(Clone, Copy, Debug, Default, Serialize, PolarClass)]
pub struct Marketplace;
