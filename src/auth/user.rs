use oso::PolarClass;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{unauthenticated_error, Error};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Driver,
    Passenger,
    Admin,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Driver => "driver",
            Self::Passenger => "passenger",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "driver" => Ok(Self::Driver),
            "passenger" => Ok(Self::Passenger),
            "admin" => Ok(Self::Admin),
            _ => Err(unauthenticated_error()),
        }
    }
}

/// The authenticated caller, as vouched for by the upstream gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub role: Role,
    pub phone_verified: bool,
}

impl User {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self {
            id,
            role,
            phone_verified: true,
        }
    }

    pub fn new_system_user() -> Self {
        Self::new(Uuid::new_v4(), Role::Admin)
    }

    fn id_equals(&self, id: Uuid) -> bool {
        self.id == id
    }

    fn has_role(&self, role: String) -> bool {
        self.role.name() == role
    }

    fn is_phone_verified(&self) -> bool {
        self.phone_verified
    }
}

impl PolarClass for User {
    fn get_polar_class_builder() -> oso::ClassBuilder<User> {
        oso::Class::builder()
            .name("User")
            .add_attribute_getter("id", |recv: &User| recv.id)
            .add_method("id_equals", User::id_equals)
            .add_method("has_role", User::has_role)
            .add_method("is_phone_verified", User::is_phone_verified)
    }

    fn get_polar_class() -> oso::Class {
        let builder = User::get_polar_class_builder();
        builder.build()
    }
}
