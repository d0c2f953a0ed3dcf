//! Services is a core layer for the app business logic like
//! validation, authorization, etc.

pub mod claims;
pub mod coupons;
pub mod eligibility;
pub mod identity;
pub mod rate_limit;
pub mod system;
pub mod types;

pub use self::claims::*;
pub use self::coupons::*;
pub use self::system::*;

use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;
use failure::Error as FailureError;
use failure::Fail;
use r2d2::{ManageConnection, Pool, PooledConnection};

use self::types::ServiceFuture;
use controller::context::{DynamicContext, StaticContext};
use errors::Error;
use repos::ReposFactory;

/// Service
pub struct Service<
    T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
    M: ManageConnection<Connection = T>,
    F: ReposFactory<T>,
> {
    pub static_context: StaticContext<T, M, F>,
    pub dynamic_context: DynamicContext,
}

impl<
        T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
        M: ManageConnection<Connection = T>,
        F: ReposFactory<T>,
    > Service<T, M, F>
{
    /// Create a new service
    pub fn new(static_context: StaticContext<T, M, F>, dynamic_context: DynamicContext) -> Self {
        Self {
            static_context,
            dynamic_context,
        }
    }

    /// Runs `f` on the cpu pool with a connection checked out of the db pool
    pub fn spawn_on_pool<R, Func>(&self, f: Func) -> ServiceFuture<R>
    where
        Func: FnOnce(PooledConnection<M>) -> Result<R, FailureError> + Send + 'static,
        R: Send + 'static,
    {
        let db_pool = self.static_context.db_pool.clone();
        let cpu_pool = self.static_context.cpu_pool.clone();
        Box::new(cpu_pool.spawn_fn(move || run_with_connection(&db_pool, f)))
    }
}

fn run_with_connection<M, R, Func>(db_pool: &Pool<M>, f: Func) -> Result<R, FailureError>
where
    M: ManageConnection,
    Func: FnOnce(PooledConnection<M>) -> Result<R, FailureError>,
{
    db_pool
        .get()
        .map_err(|e| e.context(Error::Connection).into())
        .and_then(f)
}
