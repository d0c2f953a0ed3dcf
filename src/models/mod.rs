//! Models contains all structures that are used in different
//! modules of the app

pub mod authorization;
pub mod claims;
pub mod coupons;
pub mod identity;
pub mod user_role;
pub mod validation_rules;

pub use self::authorization::*;
pub use self::claims::*;
pub use self::coupons::*;
pub use self::identity::*;
pub use self::user_role::*;
pub use self::validation_rules::*;
