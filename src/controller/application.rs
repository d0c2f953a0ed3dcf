//! Hyper service wrapping the controller. Turns failed controller futures
//! into JSON error responses and reports unexpected ones.

use failure::Error as FailureError;
use futures::Future;
use hyper;
use hyper::server::{Request, Response, Service};
use hyper::StatusCode;
use sentry::integrations::failure::capture_error;

use super::responses::error_response;
use super::Controller;

pub struct Application<C: Controller> {
    controller: C,
}

impl<C: Controller> Application<C> {
    pub fn new(controller: C) -> Self {
        Self { controller }
    }
}

fn log_error(e: &FailureError) {
    let chain = e.iter_chain().map(|cause| cause.to_string()).collect::<Vec<_>>().join(" => ");
    error!("Internal server error: {}", chain);
    capture_error(e);
}

impl<C: Controller> Service for Application<C> {
    type Request = Request;
    type Response = Response;
    type Error = hyper::Error;
    type Future = Box<Future<Item = Response, Error = hyper::Error>>;

    fn call(&self, req: Request) -> Self::Future {
        let method = req.method().clone();
        let path = req.path().to_string();
        debug!("Received request {} {}", method, path);

        Box::new(self.controller.call(req).then(move |result| {
            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    let response = error_response(&e);
                    if response.status() == StatusCode::InternalServerError {
                        log_error(&e);
                    } else {
                        debug!("{} {} failed: {}", method, path, e);
                    }
                    response
                }
            };
            info!("{} {} => {}", method, path, response.status());
            Ok::<_, hyper::Error>(response)
        }))
    }
}
