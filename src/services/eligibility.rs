//! Eligibility gate. Decides from claim history whether an identity may claim again.
//! This is an advisory fail-fast check; the conditional update in the coupons repo
//! is what keeps a coupon from being handed out twice.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use failure::Error as FailureError;

use models::{Claim, Identity, Rejection, Throttle};
use repos::ClaimsRepo;

/// A claim counts against the identity if any one of its keys matches
pub fn matches_identity(claim: &Claim, identity: &Identity) -> bool {
    claim.ip_address == identity.address
        || claim.session_marker == identity.session_marker
        || (identity.user_id.is_some() && claim.user_id == identity.user_id)
}

/// Rejection for an identity with a matching claim inside the cooldown window.
/// The wait is measured from the most recent matching claim and never negative.
pub fn cooldown_rejection(identity: &Identity, history: &[Claim], cooldown: Duration, now: DateTime<Utc>) -> Option<Rejection> {
    let window_start = now - cooldown;

    history
        .iter()
        .filter(|claim| claim.claimed_at > window_start)
        .filter(|claim| matches_identity(claim, identity))
        .map(|claim| claim.claimed_at)
        .max()
        .map(|last_claimed_at| Rejection::RateLimited {
            retry_after: (last_claimed_at + cooldown - now)
                .to_std()
                .unwrap_or_else(|_| StdDuration::from_secs(0)),
            throttle: Throttle::Cooldown,
        })
}

/// Looks the identity's recent claims up and runs the gate over them
pub fn check_eligibility(claims_repo: &ClaimsRepo, identity: &Identity, cooldown: StdDuration, now: DateTime<Utc>) -> Result<Option<Rejection>, FailureError> {
    let cooldown = Duration::from_std(cooldown)?;
    let history = claims_repo.find_recent(identity, now - cooldown)?;
    let rejection = cooldown_rejection(identity, &history, cooldown, now);

    if let Some(ref rejection) = rejection {
        debug!("Identity {:?} is in cooldown: {:?}.", identity, rejection);
    }

    Ok(rejection)
}
