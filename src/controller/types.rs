use failure::Error as FailureError;
use futures::future::Future;
use hyper::server::Response;

pub type ControllerFuture = Box<Future<Item = Response, Error = FailureError>>;
