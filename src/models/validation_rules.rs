use std::borrow::Cow;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use regex::Regex;
use validator::ValidationError;

use models::Discount;
use types::CouponCode;

pub fn validate_coupon_code(code: &CouponCode) -> Result<(), ValidationError> {
    lazy_static! {
        static ref COUPON_CODE_VALIDATION_RE: Regex = Regex::new(r"^[A-Z0-9_-]{3,32}$").unwrap();
    }

    if COUPON_CODE_VALIDATION_RE.is_match(&code.normalized().0) {
        Ok(())
    } else {
        Err(ValidationError {
            code: Cow::from("code"),
            message: Some(Cow::from(
                "Code must be 3 to 32 characters of latin letters, digits, '-' or '_'.",
            )),
            params: HashMap::new(),
        })
    }
}

pub fn validate_discount(discount: &Discount) -> Result<(), ValidationError> {
    let valid = match *discount {
        Discount::Percentage(value) => value > 0f64 && value <= 100f64,
        Discount::Absolute(value) => value > 0f64 && value.is_finite(),
    };

    if valid {
        Ok(())
    } else {
        Err(ValidationError {
            code: Cow::from("discount"),
            message: Some(Cow::from(
                "Percentage must be in (0, 100], absolute discount must be positive.",
            )),
            params: HashMap::new(),
        })
    }
}

pub fn validate_future_date(date: &DateTime<Utc>) -> Result<(), ValidationError> {
    if *date > Utc::now() {
        Ok(())
    } else {
        Err(ValidationError {
            code: Cow::from("expires_at"),
            message: Some(Cow::from("Expiry date must be in the future.")),
            params: HashMap::new(),
        })
    }
}
