//! Coupons is a microservice handing out single use discount coupons.
//! This crate is for running the service from `coupons_lib`. See `coupons_lib` for details.

extern crate coupons_lib;

fn main() {
    let config = coupons_lib::config::Config::new().expect("Can't load app config!");

    // Prepare logger
    coupons_lib::logging::init(config.log.as_ref());

    // Prepare sentry integration
    let _sentry = coupons_lib::sentry_integration::init(config.sentry.as_ref());

    coupons_lib::start_server(config, &None, || ());
}
