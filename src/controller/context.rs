//! `Context` is a top level struct carrying what controllers and services need
use std::sync::Arc;

use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;
use futures_cpupool::CpuPool;
use r2d2::{ManageConnection, Pool};

use config::Config;
use controller::routes::{create_route_parser, Route, RouteParser};
use models::RequestMeta;
use repos::repo_factory::*;
use services::rate_limit::RateLimiter;
use types::UserId;

/// Static context for all app
pub struct StaticContext<T, M, F>
where
    T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
    M: ManageConnection<Connection = T>,
    F: ReposFactory<T>,
{
    pub db_pool: Pool<M>,
    pub cpu_pool: CpuPool,
    pub config: Arc<Config>,
    pub route_parser: Arc<RouteParser<Route>>,
    pub repo_factory: F,
    pub rate_limiter: Arc<RateLimiter>,
}

impl<
        T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
        M: ManageConnection<Connection = T>,
        F: ReposFactory<T>,
    > StaticContext<T, M, F>
{
    /// Create a new static context
    pub fn new(db_pool: Pool<M>, cpu_pool: CpuPool, config: Arc<Config>, repo_factory: F, rate_limiter: Arc<RateLimiter>) -> Self {
        let route_parser = Arc::new(create_route_parser());
        Self {
            db_pool,
            cpu_pool,
            config,
            route_parser,
            repo_factory,
            rate_limiter,
        }
    }
}

impl<
        T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
        M: ManageConnection<Connection = T>,
        F: ReposFactory<T>,
    > Clone for StaticContext<T, M, F>
{
    fn clone(&self) -> Self {
        Self {
            db_pool: self.db_pool.clone(),
            cpu_pool: self.cpu_pool.clone(),
            config: self.config.clone(),
            route_parser: self.route_parser.clone(),
            repo_factory: self.repo_factory.clone(),
            rate_limiter: self.rate_limiter.clone(),
        }
    }
}

/// Dynamic context for each request
#[derive(Clone, Debug, Default)]
pub struct DynamicContext {
    pub user_id: Option<UserId>,
    pub address: Option<String>,
    pub session_marker: Option<String>,
    pub user_agent: Option<String>,
}

impl DynamicContext {
    /// Create a new dynamic context
    pub fn new(user_id: Option<UserId>, address: Option<String>, session_marker: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            user_id,
            address,
            session_marker,
            user_agent,
        }
    }

    /// Facts the claim identity is resolved from
    pub fn request_meta(&self) -> RequestMeta {
        RequestMeta {
            address: self.address.clone(),
            session_marker: self.session_marker.clone(),
            user_id: self.user_id,
        }
    }
}
