//! Repos is a module responsible for interacting with postgres db
#[macro_use]
pub mod acl;
pub mod claims;
pub mod coupons;
pub mod repo_factory;
pub mod types;
pub mod user_roles;

pub use self::acl::*;
pub use self::claims::*;
pub use self::coupons::*;
pub use self::repo_factory::*;
pub use self::types::*;
pub use self::user_roles::*;
