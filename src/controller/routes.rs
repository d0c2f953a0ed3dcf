use regex::Regex;

use types::{CouponCode, CouponId};

type ParamsConverter<R> = Fn(Vec<&str>) -> Option<R> + Send + Sync;

/// Matches request paths against regexes registered in order, first match wins
pub struct RouteParser<R> {
    regex_and_converters: Vec<(Regex, Box<ParamsConverter<R>>)>,
}

impl<R> Default for RouteParser<R> {
    fn default() -> Self {
        Self {
            regex_and_converters: Vec::new(),
        }
    }
}

impl<R> RouteParser<R> {
    /// Adds a route without params. Panics on an invalid pattern.
    pub fn add_route<F>(&mut self, regex_pattern: &str, f: F)
    where
        F: Fn() -> R + Send + Sync + 'static,
    {
        self.add_route_with_params(regex_pattern, move |_| Some(f()));
    }

    /// Adds a route whose capture groups are handed to `converter` in order
    pub fn add_route_with_params<F>(&mut self, regex_pattern: &str, converter: F)
    where
        F: Fn(Vec<&str>) -> Option<R> + Send + Sync + 'static,
    {
        let regex = Regex::new(regex_pattern).expect("Route pattern must be a valid regex");
        self.regex_and_converters.push((regex, Box::new(converter)));
    }

    pub fn test(&self, route: &str) -> Option<R> {
        self.regex_and_converters.iter().filter_map(|&(ref regex, ref converter)| {
            let captures = regex.captures(route)?;
            let params = captures.iter().skip(1).filter_map(|param| param.map(|param| param.as_str())).collect();
            converter(params)
        }).next()
    }
}

/// List of all routes with params for the app
#[derive(Clone, Debug, PartialEq)]
pub enum Route {
    Healthcheck,
    CouponsNext,
    CouponsClaim,
    CouponsClaimByCode(CouponCode),
    ClaimsMine,
    Coupons,
    Coupon(CouponId),
    CouponsClaims,
    CouponsGenerateCode,
}

impl Route {
    /// Routes that make no sense without an authenticated account
    pub fn requires_account(&self) -> bool {
        match *self {
            Route::Coupons | Route::Coupon(_) | Route::CouponsClaims | Route::CouponsGenerateCode | Route::ClaimsMine => true,
            Route::Healthcheck | Route::CouponsNext | Route::CouponsClaim | Route::CouponsClaimByCode(_) => false,
        }
    }
}

pub fn create_route_parser() -> RouteParser<Route> {
    let mut router = RouteParser::default();

    // Healthcheck
    router.add_route(r"^/healthcheck$", || Route::Healthcheck);

    // Visitor routes
    router.add_route(r"^/coupons/next$", || Route::CouponsNext);
    router.add_route(r"^/coupons/claim$", || Route::CouponsClaim);
    router.add_route_with_params(r"^/coupons/claim/([A-Za-z0-9_-]+)$", |params| {
        params.get(0).map(|code| Route::CouponsClaimByCode(CouponCode::from(*code)))
    });
    router.add_route(r"^/claims/mine$", || Route::ClaimsMine);

    // Admin routes
    router.add_route(r"^/coupons$", || Route::Coupons);
    router.add_route(r"^/coupons/claims$", || Route::CouponsClaims);
    router.add_route(r"^/coupons/generate_code$", || Route::CouponsGenerateCode);
    router.add_route_with_params(r"^/coupons/(\d+)$", |params| {
        params
            .get(0)
            .and_then(|string_id| string_id.parse::<i32>().ok())
            .map(|coupon_id| Route::Coupon(CouponId(coupon_id)))
    });

    router
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_routes() {
        let router = create_route_parser();
        assert_eq!(router.test("/healthcheck"), Some(Route::Healthcheck));
        assert_eq!(router.test("/coupons/next"), Some(Route::CouponsNext));
        assert_eq!(router.test("/coupons/claim"), Some(Route::CouponsClaim));
        assert_eq!(router.test("/claims/mine"), Some(Route::ClaimsMine));
        assert_eq!(router.test("/coupons"), Some(Route::Coupons));
        assert_eq!(router.test("/coupons/claims"), Some(Route::CouponsClaims));
        assert_eq!(router.test("/coupons/generate_code"), Some(Route::CouponsGenerateCode));
    }

    #[test]
    fn test_routes_with_params() {
        let router = create_route_parser();
        assert_eq!(router.test("/coupons/42"), Some(Route::Coupon(CouponId(42))));
        assert_eq!(
            router.test("/coupons/claim/save10"),
            Some(Route::CouponsClaimByCode(CouponCode::from("save10")))
        );
    }

    #[test]
    fn test_unknown_routes() {
        let router = create_route_parser();
        assert_eq!(router.test("/coupons/abc"), None);
        assert_eq!(router.test("/coupons/claim/bad code"), None);
        assert_eq!(router.test("/coupons/99999999999"), None);
        assert_eq!(router.test("/stores"), None);
    }

    #[test]
    fn test_admin_routes_require_account() {
        assert!(Route::Coupon(CouponId(1)).requires_account());
        assert!(Route::ClaimsMine.requires_account());
        assert!(!Route::CouponsNext.requires_account());
        assert!(!Route::CouponsClaimByCode(CouponCode::from("SAVE10")).requires_account());
    }
}
