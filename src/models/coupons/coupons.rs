//! Model coupons
use chrono::{DateTime, Utc};
use validator::Validate;

use types::{ClaimId, CouponCode, CouponId, DistributionOrder};

use models::validation_rules::*;
use models::{Discount, DiscountKind, Rejection};

use schema::coupons;

/// DB presenting by coupon
#[derive(Debug, Queryable, Clone, Identifiable)]
#[table_name = "coupons"]
pub struct RawCoupon {
    pub id: CouponId,
    pub code: CouponCode,
    pub description: String,
    pub discount_kind: DiscountKind,
    pub discount_value: f64,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub distribution_order: DistributionOrder,
    pub is_claimed: bool,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claim_id: Option<ClaimId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Coupon as seen by administrators
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: CouponId,
    pub code: CouponCode,
    pub description: String,
    pub discount: Discount,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub distribution_order: DistributionOrder,
    pub is_claimed: bool,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claim_id: Option<ClaimId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RawCoupon> for Coupon {
    fn from(raw: RawCoupon) -> Self {
        Self {
            id: raw.id,
            code: raw.code,
            description: raw.description,
            discount: Discount::from_parts(raw.discount_kind, raw.discount_value),
            expires_at: raw.expires_at,
            is_active: raw.is_active,
            distribution_order: raw.distribution_order,
            is_claimed: raw.is_claimed,
            claimed_at: raw.claimed_at,
            claim_id: raw.claim_id,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        }
    }
}

impl Coupon {
    pub const GENERATED_CODE_LENGTH: usize = 10;

    /// Reason this coupon cannot be claimed at `now`, if any
    pub fn unavailability(&self, now: DateTime<Utc>) -> Option<Rejection> {
        if self.is_claimed {
            Some(Rejection::AlreadyClaimed)
        } else if !self.is_active {
            Some(Rejection::Inactive)
        } else if self.expires_at <= now {
            Some(Rejection::Expired)
        } else {
            None
        }
    }

    pub fn is_available_at(&self, now: DateTime<Utc>) -> bool {
        self.unavailability(now).is_none()
    }

    pub fn preview(&self) -> CouponPreview {
        CouponPreview {
            code: self.code.clone(),
            discount: self.discount,
            description: self.description.clone(),
            expires_at: self.expires_at,
        }
    }
}

/// Redacted coupon handed out to visitors
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CouponPreview {
    pub code: CouponCode,
    pub discount: Discount,
    pub description: String,
    pub expires_at: DateTime<Utc>,
}

/// Payload for creating coupon
#[derive(Serialize, Deserialize, Clone, Validate, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NewCoupon {
    #[validate(custom = "validate_coupon_code")]
    pub code: CouponCode,
    #[validate(length(min = "1", max = "500"))]
    pub description: String,
    #[validate(custom = "validate_discount")]
    pub discount: Discount,
    #[validate(custom = "validate_future_date")]
    pub expires_at: DateTime<Utc>,
    pub is_active: Option<bool>,
}

/// Row inserted for a new coupon, distribution order already assigned
#[derive(Insertable, Clone, Debug)]
#[table_name = "coupons"]
pub struct InsertCoupon {
    pub code: CouponCode,
    pub description: String,
    pub discount_kind: DiscountKind,
    pub discount_value: f64,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub distribution_order: DistributionOrder,
}

impl InsertCoupon {
    pub fn new(payload: NewCoupon, distribution_order: DistributionOrder) -> Self {
        let (discount_kind, discount_value) = payload.discount.into_parts();
        Self {
            code: payload.code.normalized(),
            description: payload.description,
            discount_kind,
            discount_value,
            expires_at: payload.expires_at,
            is_active: payload.is_active.unwrap_or(true),
            distribution_order,
        }
    }
}

/// Payload for updating coupon
#[derive(Serialize, Deserialize, Clone, Default, Validate, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCoupon {
    #[validate(custom = "validate_coupon_code")]
    pub code: Option<CouponCode>,
    #[validate(length(min = "1", max = "500"))]
    pub description: Option<String>,
    #[validate(custom = "validate_discount")]
    pub discount: Option<Discount>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

impl UpdateCoupon {
    /// Once a coupon is claimed only the active flag may change
    pub fn into_changeset(self, is_claimed: bool) -> CouponChangeset {
        if is_claimed {
            return CouponChangeset {
                is_active: self.is_active,
                ..CouponChangeset::default()
            };
        }

        let (discount_kind, discount_value) = match self.discount.map(Discount::into_parts) {
            Some((kind, value)) => (Some(kind), Some(value)),
            None => (None, None),
        };

        CouponChangeset {
            code: self.code.map(|code| code.normalized()),
            description: self.description,
            discount_kind,
            discount_value,
            expires_at: self.expires_at,
            is_active: self.is_active,
        }
    }

    pub fn touches_locked_fields(&self) -> bool {
        self.code.is_some() || self.description.is_some() || self.discount.is_some() || self.expires_at.is_some()
    }
}

#[derive(AsChangeset, Clone, Default, Debug, PartialEq)]
#[table_name = "coupons"]
pub struct CouponChangeset {
    pub code: Option<CouponCode>,
    pub description: Option<String>,
    pub discount_kind: Option<DiscountKind>,
    pub discount_value: Option<f64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

impl CouponChangeset {
    pub fn is_empty(&self) -> bool {
        *self == CouponChangeset::default()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use serde_json;

    use super::*;

    fn create_coupon() -> Coupon {
        let now = Utc::now();
        Coupon {
            id: CouponId(1),
            code: CouponCode::from("SAVE10"),
            description: "Ten percent off".to_string(),
            discount: Discount::Percentage(10.0),
            expires_at: now + Duration::days(7),
            is_active: true,
            distribution_order: DistributionOrder(1),
            is_claimed: false,
            claimed_at: None,
            claim_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_unavailability() {
        let now = Utc::now();
        let coupon = create_coupon();
        assert_eq!(coupon.unavailability(now), None);

        let mut inactive = coupon.clone();
        inactive.is_active = false;
        assert_eq!(inactive.unavailability(now), Some(Rejection::Inactive));

        let mut expired = coupon.clone();
        expired.expires_at = now - Duration::seconds(1);
        assert_eq!(expired.unavailability(now), Some(Rejection::Expired));

        let mut claimed = coupon;
        claimed.is_claimed = true;
        claimed.is_active = false;
        assert_eq!(claimed.unavailability(now), Some(Rejection::AlreadyClaimed));
    }

    #[test]
    fn test_preview_hides_internal_fields() {
        let json = serde_json::to_value(&create_coupon().preview()).unwrap();
        assert!(json.get("distributionOrder").is_none());
        assert!(json.get("id").is_none());
        assert_eq!(json["code"], json!("SAVE10"));
        assert_eq!(json["discount"], json!({"kind": "percentage", "value": 10.0}));
    }

    #[test]
    fn test_claimed_changeset_only_toggles_active() {
        let payload = UpdateCoupon {
            code: Some(CouponCode::from("OTHER")),
            description: Some("changed".to_string()),
            discount: Some(Discount::Absolute(3.0)),
            expires_at: None,
            is_active: Some(false),
        };

        let changeset = payload.into_changeset(true);
        assert_eq!(
            changeset,
            CouponChangeset {
                is_active: Some(false),
                ..CouponChangeset::default()
            }
        );
    }

    #[test]
    fn test_unclaimed_changeset_normalizes_code() {
        let payload = UpdateCoupon {
            code: Some(CouponCode::from("save20")),
            ..UpdateCoupon::default()
        };

        let changeset = payload.into_changeset(false);
        assert_eq!(changeset.code, Some(CouponCode::from("SAVE20")));
        assert!(!changeset.is_empty());
    }
}
