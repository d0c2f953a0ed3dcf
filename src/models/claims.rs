//! Model claims and the outcomes of a claim attempt
use std::time::Duration;

use chrono::{DateTime, Utc};

use types::{ClaimId, CouponCode, CouponId, SessionMarker, UserId};

use models::{Coupon, CouponPreview, Identity};

use schema::claims;

/// DB presenting by claim. Claims are append-only.
#[derive(Debug, Serialize, Deserialize, Queryable, Clone, Identifiable, PartialEq)]
#[table_name = "claims"]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub id: ClaimId,
    pub coupon_id: CouponId,
    pub ip_address: String,
    pub session_marker: SessionMarker,
    pub user_id: Option<UserId>,
    pub is_guest: bool,
    pub user_agent: Option<String>,
    pub claimed_at: DateTime<Utc>,
}

/// Payload for creating claim
#[derive(Insertable, Clone, Debug)]
#[table_name = "claims"]
pub struct NewClaim {
    pub coupon_id: CouponId,
    pub ip_address: String,
    pub session_marker: SessionMarker,
    pub user_id: Option<UserId>,
    pub is_guest: bool,
    pub user_agent: Option<String>,
    pub claimed_at: DateTime<Utc>,
}

impl NewClaim {
    pub fn new(coupon_id: CouponId, identity: &Identity, user_agent: Option<String>, claimed_at: DateTime<Utc>) -> Self {
        Self {
            coupon_id,
            ip_address: identity.address.clone(),
            session_marker: identity.session_marker.clone(),
            user_id: identity.user_id,
            is_guest: identity.user_id.is_none(),
            user_agent,
            claimed_at,
        }
    }
}

/// Claim joined with the coupon it consumed, for audit
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClaimWithCoupon {
    #[serde(flatten)]
    pub claim: Claim,
    pub coupon: Coupon,
}

/// Confirmation sent back for a successful claim
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClaimReceipt {
    pub message: String,
    pub claim_id: ClaimId,
    pub claimed_at: DateTime<Utc>,
    pub coupon: CouponPreview,
}

impl ClaimReceipt {
    pub fn new(claim: &Claim, coupon: &Coupon) -> Self {
        Self {
            message: "Coupon claimed successfully!".to_string(),
            claim_id: claim.id,
            claimed_at: claim.claimed_at,
            coupon: coupon.preview(),
        }
    }
}

/// Which limit turned the request away
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Throttle {
    Cooldown,
    AddressQuota,
}

/// Expected, user-facing reasons a coupon request does not succeed
#[derive(Clone, Debug, PartialEq)]
pub enum Rejection {
    NotFound,
    AlreadyClaimed,
    Inactive,
    Expired,
    RateLimited { retry_after: Duration, throttle: Throttle },
}

impl Rejection {
    pub fn reason(&self) -> &'static str {
        match *self {
            Rejection::NotFound => "not_found",
            Rejection::AlreadyClaimed => "already_claimed",
            Rejection::Inactive => "inactive",
            Rejection::Expired => "expired",
            Rejection::RateLimited { .. } => "rate_limited",
        }
    }

    pub fn message(&self) -> String {
        match *self {
            Rejection::NotFound => "No coupons available at this time.".to_string(),
            Rejection::AlreadyClaimed => "This coupon has already been claimed.".to_string(),
            Rejection::Inactive => "This coupon is currently inactive.".to_string(),
            Rejection::Expired => "This coupon has expired.".to_string(),
            Rejection::RateLimited {
                retry_after,
                throttle: Throttle::Cooldown,
            } => format!(
                "You've already claimed a coupon recently. Please try again in {} minutes.",
                minutes_rounded_up(retry_after)
            ),
            Rejection::RateLimited {
                retry_after,
                throttle: Throttle::AddressQuota,
            } => format!(
                "Too many coupon claims from this IP, please try again in {} minutes.",
                minutes_rounded_up(retry_after)
            ),
        }
    }

    /// Whole seconds the client should wait, rounded up
    pub fn retry_after_secs(&self) -> Option<u64> {
        match *self {
            Rejection::RateLimited { retry_after, .. } => Some(retry_after.as_secs() + if retry_after.subsec_nanos() > 0 { 1 } else { 0 }),
            _ => None,
        }
    }

    /// Coupon-state rejections can be resolved by selecting another coupon
    pub fn is_reselectable(&self) -> bool {
        match *self {
            Rejection::AlreadyClaimed | Rejection::Inactive | Rejection::Expired => true,
            _ => false,
        }
    }
}

fn minutes_rounded_up(duration: Duration) -> u64 {
    let secs = duration.as_secs() + if duration.subsec_nanos() > 0 { 1 } else { 0 };
    (secs + 59) / 60
}

/// What the visitor asked to claim
#[derive(Clone, Debug, PartialEq)]
pub enum ClaimTarget {
    NextAvailable,
    Code(CouponCode),
}

/// Result of previewing the next coupon
#[derive(Clone, Debug, PartialEq)]
pub enum NextCoupon {
    Available(CouponPreview),
    Rejected(Rejection),
}

/// Result of a claim attempt
#[derive(Clone, Debug, PartialEq)]
pub enum ClaimOutcome {
    Claimed(ClaimReceipt),
    Rejected(Rejection),
}
