include!("integration_tests_setup.rs");

use hyper::header::SetCookie;
use hyper::{StatusCode, Uri};
use std::str::FromStr;

#[test]
#[ignore]
fn next_coupon_mints_session_cookie() {
    let mut context = setup();
    let url = Uri::from_str(&format!("{}/coupons/next", context.base_url)).unwrap();
    let response = context.core.run(context.client.get(url)).unwrap();

    assert!(response.status() == StatusCode::Ok || response.status() == StatusCode::NotFound);
    let cookie = response.headers().get::<SetCookie>().and_then(|cookies| cookies.0.first().cloned()).unwrap();
    assert!(cookie.starts_with("coupon_session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
}

#[test]
#[ignore]
fn admin_routes_require_token() {
    let mut context = setup();
    let url = Uri::from_str(&format!("{}/coupons", context.base_url)).unwrap();
    let response = context.core.run(context.client.get(url)).unwrap();

    assert_eq!(response.status(), StatusCode::Unauthorized);
}
