//! Coupons Services, presents CRUD operations with coupons for administrators

use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;
use failure::Error as FailureError;
use r2d2::ManageConnection;
use uuid::Uuid;

use super::types::ServiceFuture;
use errors::Error;
use models::*;
use repos::{code_taken, ReposFactory};
use services::Service;
use types::{CouponCode, CouponId};

pub trait CouponsService {
    /// Creates new coupon at the end of the distribution order
    fn create_coupon(&self, payload: NewCoupon) -> ServiceFuture<Coupon>;
    /// Returns all coupons in distribution order
    fn list_coupons(&self) -> ServiceFuture<Vec<Coupon>>;
    /// Returns coupon by id
    fn get_coupon(&self, id_arg: CouponId) -> ServiceFuture<Coupon>;
    /// Update coupon. Once claimed only the active flag changes.
    fn update_coupon(&self, id_arg: CouponId, payload: UpdateCoupon) -> ServiceFuture<Coupon>;
    /// Deletes an unclaimed coupon
    fn delete_coupon(&self, id_arg: CouponId) -> ServiceFuture<Coupon>;
    /// Generate coupon code
    fn generate_coupon_code(&self) -> ServiceFuture<CouponCode>;
}

fn coupon_not_found(id_arg: CouponId) -> FailureError {
    format_err!("Coupon with id {} not found", id_arg).context(Error::NotFound).into()
}

impl<
        T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
        M: ManageConnection<Connection = T>,
        F: ReposFactory<T>,
    > CouponsService for Service<T, M, F>
{
    fn create_coupon(&self, payload: NewCoupon) -> ServiceFuture<Coupon> {
        let user_id = self.dynamic_context.user_id;
        let repo_factory = self.static_context.repo_factory.clone();

        self.spawn_on_pool(move |conn| {
            let coupons_repo = repo_factory.create_coupons_repo(&*conn, user_id);
            conn.transaction::<Coupon, FailureError, _>(move || {
                coupons_repo.lock_table()?;
                if coupons_repo.get_by_code(payload.code.clone())?.is_some() {
                    return Err(code_taken(&payload.code.normalized()));
                }
                coupons_repo.create(payload)
            }).map_err(|e| e.context("Service Coupons, create endpoint error occurred.").into())
        })
    }

    fn list_coupons(&self) -> ServiceFuture<Vec<Coupon>> {
        let user_id = self.dynamic_context.user_id;
        let repo_factory = self.static_context.repo_factory.clone();

        self.spawn_on_pool(move |conn| {
            let coupons_repo = repo_factory.create_coupons_repo(&*conn, user_id);

            coupons_repo
                .list()
                .map_err(|e| e.context("Service Coupons, list endpoint error occurred.").into())
        })
    }

    fn get_coupon(&self, id_arg: CouponId) -> ServiceFuture<Coupon> {
        let user_id = self.dynamic_context.user_id;
        let repo_factory = self.static_context.repo_factory.clone();

        self.spawn_on_pool(move |conn| {
            let coupons_repo = repo_factory.create_coupons_repo(&*conn, user_id);

            coupons_repo
                .get(id_arg)
                .and_then(|coupon| coupon.ok_or_else(|| coupon_not_found(id_arg)))
                .map_err(|e| e.context("Service Coupons, get_coupon endpoint error occurred.").into())
        })
    }

    fn update_coupon(&self, id_arg: CouponId, payload: UpdateCoupon) -> ServiceFuture<Coupon> {
        let user_id = self.dynamic_context.user_id;
        let repo_factory = self.static_context.repo_factory.clone();

        self.spawn_on_pool(move |conn| {
            let coupons_repo = repo_factory.create_coupons_repo(&*conn, user_id);
            conn.transaction::<Coupon, FailureError, _>(move || {
                let coupon = coupons_repo.get_for_update(id_arg)?.ok_or_else(|| coupon_not_found(id_arg))?;

                if coupon.is_claimed && payload.touches_locked_fields() {
                    warn!("Coupon {} is claimed, only its active flag is updated.", coupon.code);
                }

                let changeset = payload.into_changeset(coupon.is_claimed);
                if changeset.is_empty() {
                    return Ok(coupon);
                }

                if let Some(ref code) = changeset.code {
                    if let Some(other) = coupons_repo.get_by_code(code.clone())? {
                        if other.id != coupon.id {
                            return Err(code_taken(code));
                        }
                    }
                }

                coupons_repo.update(id_arg, changeset)
            }).map_err(|e| e.context("Service Coupons, update endpoint error occurred.").into())
        })
    }

    fn delete_coupon(&self, id_arg: CouponId) -> ServiceFuture<Coupon> {
        let user_id = self.dynamic_context.user_id;
        let repo_factory = self.static_context.repo_factory.clone();

        self.spawn_on_pool(move |conn| {
            let coupons_repo = repo_factory.create_coupons_repo(&*conn, user_id);
            conn.transaction::<Coupon, FailureError, _>(move || {
                let coupon = coupons_repo.get_for_update(id_arg)?.ok_or_else(|| coupon_not_found(id_arg))?;

                if coupon.is_claimed {
                    return Err(format_err!("Coupon {} is claimed", coupon.code)
                        .context(Error::Validate(validation_errors!({
                            "coupon": ["claimed" => "Cannot delete a claimed coupon"]
                        }))).into());
                }

                coupons_repo.delete(id_arg)?.ok_or_else(|| coupon_not_found(id_arg))
            }).map_err(|e| e.context("Service Coupons, delete endpoint error occurred.").into())
        })
    }

    fn generate_coupon_code(&self) -> ServiceFuture<CouponCode> {
        let user_id = self.dynamic_context.user_id;
        let repo_factory = self.static_context.repo_factory.clone();

        self.spawn_on_pool(move |conn| {
            let coupons_repo = repo_factory.create_coupons_repo(&*conn, user_id);

            coupons_repo
                .check_create()
                .map(|_| {
                    let new_uuid = Uuid::new_v4().simple().to_string().to_uppercase();
                    CouponCode(new_uuid.chars().take(Coupon::GENERATED_CODE_LENGTH).collect::<String>())
                }).map_err(|e| e.context("Service Coupons, generate_coupon_code endpoint error occurred.").into())
        })
    }
}
