include!("integration_tests_setup.rs");

extern crate chrono;
extern crate diesel;
extern crate failure;

use chrono::{Duration, Utc};
use diesel::pg::PgConnection;
use diesel::Connection;
use failure::Error as FailureError;
use futures::future::join_all;
use hyper::{Method, Request, StatusCode, Uri};
use std::str::FromStr;

use coupons_lib::config::Config;
use coupons_lib::models::*;
use coupons_lib::repos::legacy_acl::{Acl, SystemACL};
use coupons_lib::repos::{CouponsRepo, CouponsRepoImpl};
use coupons_lib::types::CouponCode;

const CLAIMANTS: usize = 8;

fn create_coupon(code: &str) -> Coupon {
    let config = Config::with_env("test").expect("Can't load app config!");
    let conn = PgConnection::establish(&config.server.database).expect("Can't connect to test database");
    let repo = CouponsRepoImpl::new(
        &conn,
        Box::new(SystemACL::default()) as Box<Acl<Resource, Action, Scope, FailureError, Coupon>>,
    );

    conn.transaction::<Coupon, FailureError, _>(|| {
        repo.create(NewCoupon {
            code: CouponCode::from(code),
            description: "Contested coupon".to_string(),
            discount: Discount::Percentage(15.0),
            expires_at: Utc::now() + Duration::days(1),
            is_active: None,
        })
    }).unwrap()
}

#[test]
#[ignore]
fn concurrent_claims_of_one_code_have_single_winner() {
    let mut rng = rand::thread_rng();
    let code = format!("RACE-{}", rng.gen_range(100_000, 999_999));
    let subnet = rng.gen_range(0, 256);
    let coupon = create_coupon(&code);
    assert!(!coupon.is_claimed);

    let mut context = setup();
    let url = format!("{}/coupons/claim/{}", context.base_url, code);
    let requests = (0..CLAIMANTS)
        .map(|i| {
            let mut request = Request::new(Method::Post, Uri::from_str(&url).unwrap());
            request
                .headers_mut()
                .set_raw("X-Forwarded-For", format!("10.{}.{}.1", subnet, i + 1));
            context.client.request(request).and_then(|response| {
                let status = response.status();
                read_body(response.body()).map(move |body| (status, body))
            })
        }).collect::<Vec<_>>();

    let results = context.core.run(join_all(requests)).unwrap();

    let winners = results.iter().filter(|&&(status, _)| status == StatusCode::Created).count();
    assert_eq!(winners, 1);
    for &(status, ref body) in results.iter().filter(|&&(status, _)| status != StatusCode::Created) {
        assert_eq!(status, StatusCode::NotFound);
        assert!(body.contains("already_claimed"), "unexpected body: {}", body);
    }
}
