//! Claims Services, arbitration of coupon claims and claim history

use chrono::Utc;
use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;
use failure::Error as FailureError;
use r2d2::ManageConnection;

use super::eligibility::check_eligibility;
use super::types::ServiceFuture;
use errors::Error;
use models::*;
use repos::{ClaimTransition, ReposFactory};
use services::Service;

pub trait ClaimsService {
    /// Coupon the identity would get next, without claiming it
    fn next_coupon(&self, identity: Identity) -> ServiceFuture<NextCoupon>;
    /// Claims the next available coupon or the one with the given code
    fn claim_coupon(&self, identity: Identity, target: ClaimTarget) -> ServiceFuture<ClaimOutcome>;
    /// All claims with their coupons, newest first
    fn list_claims(&self) -> ServiceFuture<Vec<ClaimWithCoupon>>;
    /// Claims of the authenticated account, newest first
    fn list_my_claims(&self) -> ServiceFuture<Vec<ClaimWithCoupon>>;
}

fn anonymous_history() -> FailureError {
    format_err!("Claims of an anonymous visitor requested")
        .context(Error::Unauthorized)
        .into()
}

impl<
        T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
        M: ManageConnection<Connection = T>,
        F: ReposFactory<T>,
    > ClaimsService for Service<T, M, F>
{
    fn next_coupon(&self, identity: Identity) -> ServiceFuture<NextCoupon> {
        let repo_factory = self.static_context.repo_factory.clone();
        let cooldown = self.static_context.config.cooldown();

        self.spawn_on_pool(move |conn| {
            let coupons_repo = repo_factory.create_coupons_repo_with_sys_acl(&*conn);
            let claims_repo = repo_factory.create_claims_repo_with_sys_acl(&*conn);
            let now = Utc::now();

            check_eligibility(&*claims_repo, &identity, cooldown, now)
                .and_then(|rejection| {
                    if let Some(rejection) = rejection {
                        return Ok(NextCoupon::Rejected(rejection));
                    }

                    Ok(match coupons_repo.next_available(now)? {
                        Some(coupon) => NextCoupon::Available(coupon.preview()),
                        None => NextCoupon::Rejected(Rejection::NotFound),
                    })
                }).map_err(|e: FailureError| e.context("Service Claims, next_coupon endpoint error occurred.").into())
        })
    }

    fn claim_coupon(&self, identity: Identity, target: ClaimTarget) -> ServiceFuture<ClaimOutcome> {
        let repo_factory = self.static_context.repo_factory.clone();
        let cooldown = self.static_context.config.cooldown();
        let rate_limiter = self.static_context.rate_limiter.clone();
        let user_agent = self.dynamic_context.user_agent.clone();

        self.spawn_on_pool(move |conn| {
            if let Some(retry_after) = rate_limiter.hit(&identity.address)? {
                warn!("Too many claim attempts from {}.", identity.address);
                return Ok(ClaimOutcome::Rejected(Rejection::RateLimited {
                    retry_after,
                    throttle: Throttle::AddressQuota,
                }));
            }

            let coupons_repo = repo_factory.create_coupons_repo_with_sys_acl(&*conn);
            let claims_repo = repo_factory.create_claims_repo_with_sys_acl(&*conn);
            conn.transaction::<ClaimOutcome, FailureError, _>(move || {
                let now = Utc::now();

                if let Some(rejection) = check_eligibility(&*claims_repo, &identity, cooldown, now)? {
                    info!("Claim by {:?} rejected: {}.", identity, rejection.reason());
                    return Ok(ClaimOutcome::Rejected(rejection));
                }

                let selected = match target {
                    ClaimTarget::NextAvailable => coupons_repo.next_available(now)?,
                    ClaimTarget::Code(code) => coupons_repo.get_by_code(code)?,
                };
                let selected = match selected {
                    Some(coupon) => coupon,
                    None => return Ok(ClaimOutcome::Rejected(Rejection::NotFound)),
                };

                match coupons_repo.try_claim(selected.id, now)? {
                    ClaimTransition::Rejected(rejection) => {
                        info!("Claim of coupon {} by {:?} rejected: {}.", selected.code, identity, rejection.reason());
                        Ok(ClaimOutcome::Rejected(rejection))
                    }
                    ClaimTransition::Claimed(coupon) => {
                        let claim = claims_repo.create(NewClaim::new(coupon.id, &identity, user_agent, now))?;
                        let coupon = coupons_repo.attach_claim(coupon.id, claim.id)?;
                        info!("Coupon {} claimed by {:?}, claim {}.", coupon.code, identity, claim.id);
                        Ok(ClaimOutcome::Claimed(ClaimReceipt::new(&claim, &coupon)))
                    }
                }
            }).map_err(|e| e.context("Service Claims, claim_coupon endpoint error occurred.").into())
        })
    }

    fn list_claims(&self) -> ServiceFuture<Vec<ClaimWithCoupon>> {
        let user_id = self.dynamic_context.user_id;
        let repo_factory = self.static_context.repo_factory.clone();

        self.spawn_on_pool(move |conn| {
            let claims_repo = repo_factory.create_claims_repo(&*conn, user_id);

            claims_repo
                .list_with_coupons()
                .map_err(|e| e.context("Service Claims, list_claims endpoint error occurred.").into())
        })
    }

    fn list_my_claims(&self) -> ServiceFuture<Vec<ClaimWithCoupon>> {
        let user_id = self.dynamic_context.user_id;
        let repo_factory = self.static_context.repo_factory.clone();

        self.spawn_on_pool(move |conn| {
            let user_id = user_id.ok_or_else(anonymous_history)?;
            let claims_repo = repo_factory.create_claims_repo(&*conn, Some(user_id));

            claims_repo
                .list_for_user(user_id)
                .map_err(|e| e.context("Service Claims, list_my_claims endpoint error occurred.").into())
        })
    }
}

#[cfg(test)]
pub mod tests {
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    use chrono::{Duration, Utc};
    use futures::future;
    use tokio_core::reactor::Core;

    use errors::Error;
    use models::*;
    use repos::repo_factory::tests::*;
    use services::rate_limit::MemoryRateLimiter;
    use services::*;
    use types::*;

    fn claimed(outcome: ClaimOutcome) -> ClaimReceipt {
        match outcome {
            ClaimOutcome::Claimed(receipt) => receipt,
            ClaimOutcome::Rejected(rejection) => panic!("Claim was rejected: {:?}", rejection),
        }
    }

    fn rejected(outcome: ClaimOutcome) -> Rejection {
        match outcome {
            ClaimOutcome::Rejected(rejection) => rejection,
            ClaimOutcome::Claimed(receipt) => panic!("Claim unexpectedly succeeded: {:?}", receipt),
        }
    }

    #[test]
    fn test_claims_follow_distribution_order() {
        let mut core = Core::new().unwrap();
        let service = create_service(None, MockStore::with_coupons(&["FIRST", "SECOND", "THIRD"]));

        let codes = ["10.0.0.1", "10.0.0.2", "10.0.0.3"]
            .iter()
            .map(|address| {
                let work = service.claim_coupon(create_identity(address, None), ClaimTarget::NextAvailable);
                claimed(core.run(work).unwrap()).coupon.code
            }).collect::<Vec<_>>();

        assert_eq!(
            codes,
            vec![CouponCode::from("FIRST"), CouponCode::from("SECOND"), CouponCode::from("THIRD")]
        );

        let work = service.claim_coupon(create_identity("10.0.0.4", None), ClaimTarget::NextAvailable);
        assert_eq!(rejected(core.run(work).unwrap()), Rejection::NotFound);
    }

    #[test]
    fn test_next_coupon_skips_unavailable() {
        let mut core = Core::new().unwrap();
        let store = MockStore::with_coupons(&["EXPIRED", "INACTIVE", "LIVE"]);
        {
            let mut guard = store.lock().unwrap();
            guard.coupon_mut("EXPIRED").unwrap().expires_at = Utc::now() - Duration::minutes(1);
            guard.coupon_mut("INACTIVE").unwrap().is_active = false;
        }
        let service = create_service(None, store.clone());

        let work = service.next_coupon(create_identity(MOCK_ADDRESS, None));
        match core.run(work).unwrap() {
            NextCoupon::Available(preview) => assert_eq!(preview.code, CouponCode::from("LIVE")),
            other => panic!("Unexpected preview result: {:?}", other),
        }

        // preview does not claim anything
        assert!(store.lock().unwrap().coupons.iter().all(|c| !c.is_claimed));
        assert!(store.lock().unwrap().claims.is_empty());
    }

    #[test]
    fn test_claim_by_code_reports_reason() {
        let mut core = Core::new().unwrap();
        let store = MockStore::with_coupons(&["SAVE10", "OFF"]);
        store.lock().unwrap().coupon_mut("OFF").unwrap().is_active = false;
        let service = create_service(None, store);

        let work = service.claim_coupon(create_identity("10.0.0.1", None), ClaimTarget::Code(CouponCode::from("off")));
        assert_eq!(rejected(core.run(work).unwrap()), Rejection::Inactive);

        let work = service.claim_coupon(create_identity("10.0.0.2", None), ClaimTarget::Code(CouponCode::from("missing")));
        assert_eq!(rejected(core.run(work).unwrap()), Rejection::NotFound);

        let work = service.claim_coupon(create_identity("10.0.0.3", None), ClaimTarget::Code(CouponCode::from("save10")));
        let receipt = claimed(core.run(work).unwrap());
        assert_eq!(receipt.coupon.code, CouponCode::from("SAVE10"));
        assert_eq!(receipt.message, "Coupon claimed successfully!");

        let work = service.claim_coupon(create_identity("10.0.0.4", None), ClaimTarget::Code(CouponCode::from("SAVE10")));
        assert_eq!(rejected(core.run(work).unwrap()), Rejection::AlreadyClaimed);
    }

    #[test]
    fn test_claim_records_identity_and_links_coupon() {
        let mut core = Core::new().unwrap();
        let store = MockStore::with_coupons(&["SAVE10"]);
        let service = create_service(Some(MOCK_USER_ID), store.clone());

        let identity = create_identity(MOCK_ADDRESS, Some(MOCK_USER_ID));
        let work = service.claim_coupon(identity.clone(), ClaimTarget::NextAvailable);
        let receipt = claimed(core.run(work).unwrap());

        let guard = store.lock().unwrap();
        assert_eq!(guard.claims.len(), 1);
        let claim = &guard.claims[0];
        assert_eq!(claim.id, receipt.claim_id);
        assert_eq!(claim.ip_address, identity.address);
        assert_eq!(claim.session_marker, identity.session_marker);
        assert_eq!(claim.user_id, Some(MOCK_USER_ID));
        assert!(!claim.is_guest);

        let coupon = &guard.coupons[0];
        assert!(coupon.is_claimed);
        assert_eq!(coupon.claim_id, Some(claim.id));
        assert_eq!(coupon.claimed_at, Some(claim.claimed_at));
    }

    #[test]
    fn test_cooldown_blocks_any_matching_key() {
        let mut core = Core::new().unwrap();
        let service = create_service(None, MockStore::with_coupons(&["FIRST", "SECOND"]));

        let first = create_identity("10.0.0.1", None);
        let work = service.claim_coupon(first.clone(), ClaimTarget::NextAvailable);
        claimed(core.run(work).unwrap());

        // same address, new session marker
        let mut same_address = create_identity("10.0.0.1", None);
        same_address.session_marker = SessionMarker::from("ffffffffffffffffffffffffffffffff");
        let work = service.claim_coupon(same_address, ClaimTarget::NextAvailable);
        let rejection = rejected(core.run(work).unwrap());
        match rejection {
            Rejection::RateLimited { throttle, .. } => assert_eq!(throttle, Throttle::Cooldown),
            ref other => panic!("Unexpected rejection: {:?}", other),
        }
        let retry_after = rejection.retry_after_secs().unwrap();
        assert!(retry_after > 3500 && retry_after <= 3600);

        // same session marker, new address
        let mut same_marker = create_identity("10.0.0.9", None);
        same_marker.session_marker = first.session_marker.clone();
        let work = service.claim_coupon(same_marker, ClaimTarget::NextAvailable);
        assert_eq!(rejected(core.run(work).unwrap()).reason(), "rate_limited");

        // the preview is gated too
        let work = service.next_coupon(first);
        match core.run(work).unwrap() {
            NextCoupon::Rejected(rejection) => assert_eq!(rejection.reason(), "rate_limited"),
            other => panic!("Unexpected preview result: {:?}", other),
        }

        let work = service.claim_coupon(create_identity("10.0.0.2", None), ClaimTarget::NextAvailable);
        assert_eq!(claimed(core.run(work).unwrap()).coupon.code, CouponCode::from("SECOND"));
    }

    #[test]
    fn test_cooldown_elapsed_allows_claim() {
        let mut core = Core::new().unwrap();
        let store = MockStore::with_coupons(&["FIRST", "SECOND"]);
        let service = create_service(None, store.clone());
        let identity = create_identity(MOCK_ADDRESS, None);

        let work = service.claim_coupon(identity.clone(), ClaimTarget::NextAvailable);
        claimed(core.run(work).unwrap());

        // move the claim back past the cooldown window
        store.lock().unwrap().claims[0].claimed_at = Utc::now() - Duration::seconds(3601);

        let work = service.claim_coupon(identity, ClaimTarget::NextAvailable);
        assert_eq!(claimed(core.run(work).unwrap()).coupon.code, CouponCode::from("SECOND"));
    }

    #[test]
    fn test_address_quota() {
        let mut core = Core::new().unwrap();
        let limiter = Arc::new(MemoryRateLimiter::new(1, StdDuration::from_secs(60)));
        let service = create_service_with(None, MockStore::with_coupons(&["FIRST", "SECOND"]), limiter, 1);

        let work = service.claim_coupon(create_identity(MOCK_ADDRESS, None), ClaimTarget::Code(CouponCode::from("NOPE")));
        assert_eq!(rejected(core.run(work).unwrap()), Rejection::NotFound);

        let work = service.claim_coupon(create_identity(MOCK_ADDRESS, None), ClaimTarget::NextAvailable);
        match rejected(core.run(work).unwrap()) {
            Rejection::RateLimited { throttle, retry_after } => {
                assert_eq!(throttle, Throttle::AddressQuota);
                assert!(retry_after <= StdDuration::from_secs(60));
            }
            other => panic!("Unexpected rejection: {:?}", other),
        }
    }

    #[test]
    fn test_concurrent_claims_of_one_coupon() {
        let attempts = 8;
        let mut core = Core::new().unwrap();
        let store = MockStore::with_coupons(&["ONLY"]);
        let limiter = Arc::new(MemoryRateLimiter::new(1000, StdDuration::from_secs(60)));
        let service = create_service_with(None, store.clone(), limiter, attempts);

        let works = (0..attempts)
            .map(|i| service.claim_coupon(create_identity(&format!("10.0.1.{}", i), None), ClaimTarget::Code(CouponCode::from("ONLY"))))
            .collect::<Vec<_>>();
        let outcomes = core.run(future::join_all(works)).unwrap();

        let winners = outcomes
            .iter()
            .filter(|outcome| match **outcome {
                ClaimOutcome::Claimed(_) => true,
                _ => false,
            }).count();
        let losers = outcomes
            .iter()
            .filter(|outcome| **outcome == ClaimOutcome::Rejected(Rejection::AlreadyClaimed))
            .count();

        assert_eq!(winners, 1);
        assert_eq!(losers, attempts - 1);
        assert_eq!(store.lock().unwrap().claims.len(), 1);
    }

    #[test]
    fn test_concurrent_claims_never_share_a_coupon() {
        let attempts = 6;
        let mut core = Core::new().unwrap();
        let store = MockStore::with_coupons(&["A1", "A2", "A3", "A4"]);
        let limiter = Arc::new(MemoryRateLimiter::new(1000, StdDuration::from_secs(60)));
        let service = create_service_with(None, store.clone(), limiter, attempts);

        let works = (0..attempts)
            .map(|i| service.claim_coupon(create_identity(&format!("10.0.2.{}", i), None), ClaimTarget::NextAvailable))
            .collect::<Vec<_>>();
        let outcomes = core.run(future::join_all(works)).unwrap();

        let mut codes = outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                ClaimOutcome::Claimed(receipt) => Some(receipt.coupon.code),
                ClaimOutcome::Rejected(rejection) => {
                    assert!(rejection == Rejection::AlreadyClaimed || rejection == Rejection::NotFound);
                    None
                }
            }).collect::<Vec<_>>();
        codes.sort_by(|a, b| a.0.cmp(&b.0));
        let total = codes.len();
        codes.dedup();

        assert_eq!(codes.len(), total);
        assert!(total >= 1 && total <= 4);
        let guard = store.lock().unwrap();
        assert_eq!(guard.claims.len(), total);
        assert_eq!(guard.coupons.iter().filter(|c| c.is_claimed).count(), total);
    }

    #[test]
    fn test_claim_history() {
        let mut core = Core::new().unwrap();
        let store = MockStore::with_coupons(&["FIRST", "SECOND"]);
        let guest = create_service(None, store.clone());

        let work = guest.claim_coupon(create_identity("10.0.0.1", Some(MOCK_USER_ID)), ClaimTarget::NextAvailable);
        claimed(core.run(work).unwrap());
        let work = guest.claim_coupon(create_identity("10.0.0.2", None), ClaimTarget::NextAvailable);
        claimed(core.run(work).unwrap());

        let admin = create_service(Some(MOCK_ADMIN_ID), store.clone());
        let all = core.run(admin.list_claims()).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].claim.claimed_at >= all[1].claim.claimed_at);

        let user = create_service(Some(MOCK_USER_ID), store.clone());
        let mine = core.run(user.list_my_claims()).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].coupon.code, CouponCode::from("FIRST"));

        let forbidden = core.run(user.list_claims()).unwrap_err();
        match Error::find_in(&forbidden) {
            Some(Error::Forbidden) => {}
            other => panic!("Unexpected error kind: {:?}", other),
        }

        let anonymous = core.run(guest.list_my_claims()).unwrap_err();
        match Error::find_in(&anonymous) {
            Some(Error::Unauthorized) => {}
            other => panic!("Unexpected error kind: {:?}", other),
        }
    }
}
