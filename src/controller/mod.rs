//! `Controller` is a top layer that handles all http-related
//! stuff like reading bodies, parsing params, forming a response.
//! Basically it provides inputs to `Service` layer and converts outputs
//! of `Service` layer to http responses

pub mod application;
pub mod context;
pub mod responses;
pub mod routes;
pub mod types;
pub mod utils;

use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;
use failure::Error as FailureError;
use futures::future;
use futures::Future;
use hyper::server::Request;
use hyper::{Delete, Get, Post, Put, StatusCode};
use r2d2::ManageConnection;
use serde::Serialize;
use validator::Validate;

use self::context::StaticContext;
use self::responses::*;
use self::routes::Route;
use self::types::ControllerFuture;
use self::utils::{dynamic_context, parse_body};
use errors::Error;
use models::*;
use repos::repo_factory::*;
use services::identity::resolve_identity;
use services::types::ServiceFuture;
use services::*;

pub trait Controller {
    fn call(&self, req: Request) -> ControllerFuture;
}

/// Controller handles route parsing and calling `Service` layer
pub struct ControllerImpl<T, M, F>
where
    T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
    M: ManageConnection<Connection = T>,
    F: ReposFactory<T>,
{
    pub static_context: StaticContext<T, M, F>,
}

impl<
        T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
        M: ManageConnection<Connection = T>,
        F: ReposFactory<T>,
    > ControllerImpl<T, M, F>
{
    /// Create a new controller based on services
    pub fn new(static_context: StaticContext<T, M, F>) -> Self {
        Self { static_context }
    }

    /// Resolves the visitor identity for `f` and sets the session cookie if a marker was minted
    fn with_identity<Func>(&self, meta: RequestMeta, f: Func) -> ControllerFuture
    where
        Func: FnOnce(Identity) -> ControllerFuture,
    {
        let claims_config = self.static_context.config.claims.clone();
        match resolve_identity(&meta) {
            Ok(ResolvedIdentity { identity, minted }) => {
                Box::new(f(identity).map(move |response| with_session_cookie(response, minted.as_ref(), &claims_config)))
            }
            Err(e) => Box::new(future::err(e.context("Could not resolve claim identity").into())),
        }
    }
}

fn serialize_future<T>(status: StatusCode, future: ServiceFuture<T>) -> ControllerFuture
where
    T: Serialize + 'static,
{
    Box::new(future.and_then(move |value| json_response(status, &value)))
}

fn next_coupon_future(future: ServiceFuture<NextCoupon>) -> ControllerFuture {
    Box::new(future.and_then(|next| match next {
        NextCoupon::Available(preview) => json_response(StatusCode::Ok, &preview),
        NextCoupon::Rejected(rejection) => rejection_response(&rejection),
    }))
}

fn claim_outcome_future(future: ServiceFuture<ClaimOutcome>) -> ControllerFuture {
    Box::new(future.and_then(|outcome| match outcome {
        ClaimOutcome::Claimed(receipt) => json_response(StatusCode::Created, &receipt),
        ClaimOutcome::Rejected(rejection) => rejection_response(&rejection),
    }))
}

fn validated<P: Validate>(payload: P, name: &str) -> Result<P, FailureError> {
    match payload.validate() {
        Ok(()) => Ok(payload),
        Err(e) => Err(format_err!("Validation of {} failed!", name).context(Error::Validate(e)).into()),
    }
}

impl<
        T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
        M: ManageConnection<Connection = T>,
        F: ReposFactory<T>,
    > Controller for ControllerImpl<T, M, F>
{
    /// Handle a request and get future response
    fn call(&self, req: Request) -> ControllerFuture {
        let dynamic_context = match dynamic_context(&req, &self.static_context.config) {
            Ok(dynamic_context) => dynamic_context,
            Err(e) => return Box::new(future::err(e)),
        };
        let meta = dynamic_context.request_meta();
        let service = Service::new(self.static_context.clone(), dynamic_context.clone());

        let method = req.method().clone();
        let path = req.path().to_string();
        let route = self.static_context.route_parser.test(&path);

        if route.as_ref().map(Route::requires_account).unwrap_or(false) && dynamic_context.user_id.is_none() {
            return Box::new(future::err(
                format_err!("{} {} requires an authenticated account", method, path)
                    .context(Error::Unauthorized)
                    .into(),
            ));
        }

        match (&method, route) {
            // GET /healthcheck
            (&Get, Some(Route::Healthcheck)) => serialize_future(StatusCode::Ok, service.healthcheck()),

            // GET /coupons/next
            (&Get, Some(Route::CouponsNext)) => self.with_identity(meta, move |identity| next_coupon_future(service.next_coupon(identity))),

            // POST /coupons/claim
            (&Post, Some(Route::CouponsClaim)) => self.with_identity(meta, move |identity| {
                claim_outcome_future(service.claim_coupon(identity, ClaimTarget::NextAvailable))
            }),

            // POST /coupons/claim/<code>
            (&Post, Some(Route::CouponsClaimByCode(code))) => self.with_identity(meta, move |identity| {
                claim_outcome_future(service.claim_coupon(identity, ClaimTarget::Code(code)))
            }),

            // GET /claims/mine
            (&Get, Some(Route::ClaimsMine)) => serialize_future(StatusCode::Ok, service.list_my_claims()),

            // GET /coupons
            (&Get, Some(Route::Coupons)) => serialize_future(StatusCode::Ok, service.list_coupons()),

            // POST /coupons
            (&Post, Some(Route::Coupons)) => Box::new(
                parse_body::<NewCoupon>(req.body())
                    .map_err(|e| FailureError::from(e.context("Parsing body // POST /coupons in NewCoupon failed!")))
                    .and_then(|payload| validated(payload, "NewCoupon"))
                    .and_then(move |payload| service.create_coupon(payload))
                    .and_then(|coupon| json_response(StatusCode::Created, &coupon)),
            ),

            // GET /coupons/claims
            (&Get, Some(Route::CouponsClaims)) => serialize_future(StatusCode::Ok, service.list_claims()),

            // GET /coupons/generate_code
            (&Get, Some(Route::CouponsGenerateCode)) => serialize_future(StatusCode::Ok, service.generate_coupon_code()),

            // GET /coupons/<coupon_id>
            (&Get, Some(Route::Coupon(coupon_id))) => serialize_future(StatusCode::Ok, service.get_coupon(coupon_id)),

            // PUT /coupons/<coupon_id>
            (&Put, Some(Route::Coupon(coupon_id))) => Box::new(
                parse_body::<UpdateCoupon>(req.body())
                    .map_err(move |e| FailureError::from(e.context(format!("Parsing body // PUT /coupons/{} in UpdateCoupon failed!", coupon_id))))
                    .and_then(|payload| validated(payload, "UpdateCoupon"))
                    .and_then(move |payload| service.update_coupon(coupon_id, payload))
                    .and_then(|coupon| json_response(StatusCode::Ok, &coupon)),
            ),

            // DELETE /coupons/<coupon_id>
            (&Delete, Some(Route::Coupon(coupon_id))) => serialize_future(StatusCode::Ok, service.delete_coupon(coupon_id)),

            // Fallback
            (method, _) => Box::new(future::err(
                format_err!("Request to non existing endpoint in coupons microservice! {:?} {:?}", method, path)
                    .context(Error::NotFound)
                    .into(),
            )),
        }
    }
}
