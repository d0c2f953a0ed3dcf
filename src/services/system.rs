//! System service, liveness of the app

use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;
use futures::future;
use r2d2::ManageConnection;

use super::types::ServiceFuture;
use repos::ReposFactory;
use services::Service;

pub trait SystemService {
    /// Healthcheck endpoint, always returns OK status
    fn healthcheck(&self) -> ServiceFuture<String>;
}

impl<
        T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
        M: ManageConnection<Connection = T>,
        F: ReposFactory<T>,
    > SystemService for Service<T, M, F>
{
    fn healthcheck(&self) -> ServiceFuture<String> {
        debug!("Healthcheck");
        Box::new(future::ok("Ok".to_string()))
    }
}
