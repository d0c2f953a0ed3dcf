//! Enum for resources available in ACLs
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Resource {
    Coupons,
    Claims,
    UserRoles,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Resource::Coupons => write!(f, "coupons"),
            Resource::Claims => write!(f, "claims"),
            Resource::UserRoles => write!(f, "user roles"),
        }
    }
}
