//! Coupons is a microservice handing out single use discount coupons.
//! Visitors preview and claim coupons subject to a cooldown per visitor identity,
//! administrators manage the coupon ledger. The layered structure of the app is
//!
//! `Application -> Controller -> Service -> Repo`
//!
//! Each layer can throw Error with context or cover occurred error with
//! Error in the context. When error is not covered with Error it will
//! be translated to code 500 in the http answer "Internal server error" of microservice.

#![allow(proc_macro_derive_resolution_fallback)]
#![recursion_limit = "128"]
extern crate chrono;
extern crate config as config_crate;
#[macro_use]
extern crate diesel;
#[macro_use]
extern crate failure;
extern crate futures;
extern crate futures_cpupool;
extern crate hyper;
extern crate jsonwebtoken;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
extern crate r2d2;
extern crate r2d2_redis;
extern crate rand;
extern crate regex;
extern crate serde;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate serde_json;
extern crate sentry;
extern crate tokio_core;
extern crate tokio_signal;
extern crate tracing_subscriber;
extern crate uuid;
extern crate validator;
#[macro_use]
extern crate validator_derive;

#[macro_use]
pub mod macros;
pub mod config;
pub mod controller;
pub mod errors;
pub mod logging;
pub mod models;
pub mod repos;
pub mod schema;
pub mod sentry_integration;
pub mod services;
pub mod types;

use std::process;
use std::sync::Arc;

use diesel::pg::PgConnection;
use diesel::r2d2::ConnectionManager;
use futures::{future, Future, Stream};
use futures_cpupool::CpuPool;
use hyper::server::Http;
use r2d2_redis::RedisConnectionManager;
use tokio_core::reactor::Core;

use config::Config;
use controller::application::Application;
use controller::context::StaticContext;
use repos::repo_factory::ReposFactoryImpl;
use services::rate_limit::{MemoryRateLimiter, RateLimiter, RedisRateLimiter};

/// Starts new web service from provided `Config`
pub fn start_server<F: FnOnce() + 'static>(config: Config, port: &Option<String>, callback: F) {
    // Prepare reactor
    let mut core = Core::new().expect("Unexpected error creating event loop core");
    let handle = Arc::new(core.handle());

    // Prepare database pool
    let database_url: String = config.server.database.parse().expect("Database URL must be set in configuration");
    let db_manager = ConnectionManager::<PgConnection>::new(database_url);
    let db_pool = r2d2::Pool::builder()
        .build(db_manager)
        .expect("Failed to create DB connection pool");

    let thread_count = config.server.thread_count;

    // Prepare CPU pool
    let cpu_pool = CpuPool::new(thread_count);

    // Prepare server
    let address = {
        let port = port.as_ref().unwrap_or(&config.server.port);
        format!("{}:{}", config.server.host, port).parse().expect("Could not parse address")
    };

    // Prepare claim attempts limiter
    let max_claims = config.rate_limit.max_claims;
    let window = config.rate_limit_window();
    let rate_limiter = match &config.server.redis {
        Some(redis_url) => {
            // Prepare Redis pool
            let redis_manager = RedisConnectionManager::new(redis_url.as_ref()).expect("Failed to create Redis connection manager");
            let redis_pool = r2d2::Pool::builder()
                .build(redis_manager)
                .expect("Failed to create Redis connection pool");

            Arc::new(RedisRateLimiter::new(redis_pool, max_claims, window)) as Arc<RateLimiter>
        }
        None => {
            warn!("Redis is not configured, claim attempts are counted in process memory");
            Arc::new(MemoryRateLimiter::new(max_claims, window)) as Arc<RateLimiter>
        }
    };

    // Repo factory
    let repo_factory = ReposFactoryImpl::new();

    let context = StaticContext::new(db_pool, cpu_pool, Arc::new(config), repo_factory, rate_limiter);

    let serve = Http::new()
        .serve_addr_handle(&address, &handle, move || {
            // Prepare application
            let controller = controller::ControllerImpl::new(context.clone());
            let app = Application::new(controller);

            Ok(app)
        }).unwrap_or_else(|why| {
            error!("Http Server Initialization Error: {}", why);
            process::exit(1);
        });

    let handle_arc2 = handle.clone();
    handle.spawn(
        serve
            .for_each(move |conn| {
                handle_arc2.spawn(conn.map(|_| ()).map_err(|why| error!("Server Error: {}", why)));
                Ok(())
            }).map_err(|_| ()),
    );

    info!("Listening on http://{}, threads: {}", address, thread_count);
    handle.spawn_fn(move || {
        callback();
        future::ok(())
    });

    if let Err(e) = core.run(tokio_signal::ctrl_c().flatten_stream().take(1u64).for_each(|()| {
        info!("Ctrl+C received. Exit");

        Ok(())
    })) {
        error!("Signal handling error: {}", e);
    }
}
