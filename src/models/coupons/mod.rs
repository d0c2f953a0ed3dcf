pub mod coupons;
pub mod discount;

pub use self::coupons::*;
pub use self::discount::*;
