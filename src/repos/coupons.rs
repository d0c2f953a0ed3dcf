//! Coupons repo, the ledger of coupons and their claimed state.
//! This is the only place where the claimed flag of a coupon is flipped.
use chrono::{DateTime, Utc};
use diesel;
use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_dsl::RunQueryDsl;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::Connection;
use failure::Error as FailureError;

use errors::Error;

use types::{ClaimId, CouponCode, CouponId, DistributionOrder, UserId};

use models::*;
use repos::acl;
use repos::legacy_acl::{Acl, CheckScope};
use repos::types::RepoResult;
use schema::coupons::dsl as Coupons;

/// Result of the conditional claimed-state transition
#[derive(Clone, Debug, PartialEq)]
pub enum ClaimTransition {
    Claimed(Coupon),
    Rejected(Rejection),
}

/// Name of the unique index on coupon codes
pub const CODE_INDEX: &str = "coupons_code_idx";

pub fn code_taken(code: &CouponCode) -> FailureError {
    format_err!("Coupon code {} is already in use", code)
        .context(Error::Validate(validation_errors!({
            "code": ["code" => "Coupon with this code already exists"]
        }))).into()
}

/// A concurrent create that slipped past the duplicate check still lands on the code index
pub fn create_error(e: DieselError, code: &CouponCode) -> FailureError {
    let code_violation = match e {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info) => info.constraint_name() == Some(CODE_INDEX),
        _ => false,
    };

    if code_violation {
        code_taken(&code.normalized())
    } else {
        e.into()
    }
}

/// Coupons repository, responsible for handling coupon
pub struct CouponsRepoImpl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> {
    pub db_conn: &'a T,
    pub acl: Box<Acl<Resource, Action, Scope, FailureError, Coupon>>,
}

pub trait CouponsRepo {
    /// Creates new coupon at the tail of the distribution order
    fn create(&self, payload: NewCoupon) -> RepoResult<Coupon>;

    /// Locks the table against concurrent creates until the transaction ends
    fn lock_table(&self) -> RepoResult<()>;

    /// Fails with `Forbidden` unless the caller may create coupons
    fn check_create(&self) -> RepoResult<()>;

    /// List all coupons in distribution order
    fn list(&self) -> RepoResult<Vec<Coupon>>;

    /// Get coupon
    fn get(&self, id_arg: CouponId) -> RepoResult<Option<Coupon>>;

    /// Get coupon and lock its row until the end of the transaction
    fn get_for_update(&self, id_arg: CouponId) -> RepoResult<Option<Coupon>>;

    /// Get coupon by code, case-insensitive
    fn get_by_code(&self, code_arg: CouponCode) -> RepoResult<Option<Coupon>>;

    /// First claimable coupon in distribution order. Does not mutate anything.
    fn next_available(&self, now: DateTime<Utc>) -> RepoResult<Option<Coupon>>;

    /// Marks coupon as claimed if it is still unclaimed, active and not expired at `now`.
    /// Of any number of concurrent calls for the same coupon at most one gets `Claimed`.
    fn try_claim(&self, id_arg: CouponId, now: DateTime<Utc>) -> RepoResult<ClaimTransition>;

    /// Links a claimed coupon with the claim that consumed it
    fn attach_claim(&self, id_arg: CouponId, claim_id_arg: ClaimId) -> RepoResult<Coupon>;

    /// Update coupon
    fn update(&self, id_arg: CouponId, payload: CouponChangeset) -> RepoResult<Coupon>;

    /// Delete coupon, only while it is unclaimed. Returns `None` when nothing was deleted.
    fn delete(&self, id_arg: CouponId) -> RepoResult<Option<Coupon>>;
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> CouponsRepoImpl<'a, T> {
    pub fn new(db_conn: &'a T, acl: Box<Acl<Resource, Action, Scope, FailureError, Coupon>>) -> Self {
        Self { db_conn, acl }
    }

    fn next_distribution_order(&self) -> RepoResult<DistributionOrder> {
        // serializes concurrent creates so two coupons never share a slot
        self.lock_table()?;

        let max = Coupons::coupons
            .select(diesel::dsl::max(Coupons::distribution_order))
            .first::<Option<i32>>(self.db_conn)?;

        Ok(match max {
            Some(value) => DistributionOrder(value).next(),
            None => DistributionOrder::first(),
        })
    }
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> CouponsRepo for CouponsRepoImpl<'a, T> {
    fn create(&self, payload: NewCoupon) -> RepoResult<Coupon> {
        debug!("Create new coupon {:?}.", payload);
        let code = payload.code.clone();

        self.next_distribution_order()
            .and_then(|distribution_order| {
                let insert = InsertCoupon::new(payload, distribution_order);
                let query = diesel::insert_into(Coupons::coupons).values(&insert);
                query.get_result::<RawCoupon>(self.db_conn).map_err(|e| create_error(e, &code))
            }).map(Coupon::from)
            .and_then(|value| {
                acl::check(&*self.acl, Resource::Coupons, Action::Create, self, Some(&value))?;

                Ok(value)
            }).map_err(|e: FailureError| e.context(format!("Creates new coupon: {} error occurred", code)).into())
    }

    fn lock_table(&self) -> RepoResult<()> {
        diesel::sql_query("LOCK TABLE coupons IN SHARE ROW EXCLUSIVE MODE")
            .execute(self.db_conn)
            .map(|_| ())
            .map_err(|e| FailureError::from(e).context("Lock coupons table").into())
    }

    fn check_create(&self) -> RepoResult<()> {
        acl::check(&*self.acl, Resource::Coupons, Action::Create, self, None)
    }

    fn list(&self) -> RepoResult<Vec<Coupon>> {
        debug!("Find all coupons.");
        let query = Coupons::coupons.order(Coupons::distribution_order.asc());

        query
            .get_results::<RawCoupon>(self.db_conn)
            .map_err(From::from)
            .and_then(|values| {
                let values: Vec<Coupon> = values.into_iter().map(Coupon::from).collect();
                for value in &values {
                    acl::check(&*self.acl, Resource::Coupons, Action::Read, self, Some(&value))?;
                }

                Ok(values)
            }).map_err(|e: FailureError| e.context("List all coupons").into())
    }

    fn get(&self, id_arg: CouponId) -> RepoResult<Option<Coupon>> {
        debug!("Find in coupon with id {}.", id_arg);
        let query = Coupons::coupons.filter(Coupons::id.eq(&id_arg));
        query
            .get_result::<RawCoupon>(self.db_conn)
            .optional()
            .map_err(From::from)
            .and_then(|value| {
                let value = value.map(Coupon::from);
                if let Some(value) = value.as_ref() {
                    acl::check(&*self.acl, Resource::Coupons, Action::Read, self, Some(value))?;
                };

                Ok(value)
            }).map_err(|e: FailureError| e.context(format!("Find coupon by id: {} error occurred", id_arg)).into())
    }

    fn get_for_update(&self, id_arg: CouponId) -> RepoResult<Option<Coupon>> {
        debug!("Lock coupon with id {}.", id_arg);
        let query = Coupons::coupons.filter(Coupons::id.eq(&id_arg)).for_update();
        query
            .get_result::<RawCoupon>(self.db_conn)
            .optional()
            .map_err(From::from)
            .and_then(|value| {
                let value = value.map(Coupon::from);
                if let Some(value) = value.as_ref() {
                    acl::check(&*self.acl, Resource::Coupons, Action::Update, self, Some(value))?;
                };

                Ok(value)
            }).map_err(|e: FailureError| e.context(format!("Lock coupon by id: {} error occurred", id_arg)).into())
    }

    fn get_by_code(&self, code_arg: CouponCode) -> RepoResult<Option<Coupon>> {
        let code_arg = code_arg.normalized();
        debug!("Find in coupon with by coupon code: {}.", code_arg);
        let query = Coupons::coupons.filter(Coupons::code.eq(&code_arg));
        query
            .get_result::<RawCoupon>(self.db_conn)
            .optional()
            .map_err(From::from)
            .and_then(|value| {
                let value = value.map(Coupon::from);
                if let Some(value) = value.as_ref() {
                    acl::check(&*self.acl, Resource::Coupons, Action::Read, self, Some(value))?;
                };

                Ok(value)
            }).map_err(|e: FailureError| e.context(format!("Find in coupon with by coupon code: {}.", code_arg)).into())
    }

    fn next_available(&self, now: DateTime<Utc>) -> RepoResult<Option<Coupon>> {
        debug!("Find next available coupon at {}.", now);
        let query = Coupons::coupons
            .filter(Coupons::is_claimed.eq(false))
            .filter(Coupons::is_active.eq(true))
            .filter(Coupons::expires_at.gt(now))
            .order(Coupons::distribution_order.asc());

        query
            .first::<RawCoupon>(self.db_conn)
            .optional()
            .map_err(From::from)
            .and_then(|value| {
                let value = value.map(Coupon::from);
                if let Some(value) = value.as_ref() {
                    acl::check(&*self.acl, Resource::Coupons, Action::Read, self, Some(value))?;
                };

                Ok(value)
            }).map_err(|e: FailureError| e.context("Find next available coupon error occurred").into())
    }

    fn try_claim(&self, id_arg: CouponId, now: DateTime<Utc>) -> RepoResult<ClaimTransition> {
        debug!("Try to claim coupon with id {} at {}.", id_arg, now);
        acl::check(&*self.acl, Resource::Coupons, Action::Update, self, None)?;

        let filtered = Coupons::coupons
            .filter(Coupons::id.eq(&id_arg))
            .filter(Coupons::is_claimed.eq(false))
            .filter(Coupons::is_active.eq(true))
            .filter(Coupons::expires_at.gt(now));
        let query = diesel::update(filtered).set((Coupons::is_claimed.eq(true), Coupons::claimed_at.eq(now)));

        query
            .get_result::<RawCoupon>(self.db_conn)
            .optional()
            .map_err(From::from)
            .and_then(|value| match value {
                Some(raw) => Ok(ClaimTransition::Claimed(raw.into())),
                None => {
                    // lost the race or the coupon was never claimable, report why
                    let current = Coupons::coupons
                        .filter(Coupons::id.eq(&id_arg))
                        .get_result::<RawCoupon>(self.db_conn)
                        .optional()?
                        .map(Coupon::from);
                    let rejection = match current {
                        None => Rejection::NotFound,
                        Some(coupon) => coupon.unavailability(now).unwrap_or(Rejection::AlreadyClaimed),
                    };
                    Ok(ClaimTransition::Rejected(rejection))
                }
            }).map_err(|e: FailureError| e.context(format!("Claim coupon with id: {} error occurred", id_arg)).into())
    }

    fn attach_claim(&self, id_arg: CouponId, claim_id_arg: ClaimId) -> RepoResult<Coupon> {
        debug!("Attach claim {} to coupon with id {}.", claim_id_arg, id_arg);
        acl::check(&*self.acl, Resource::Coupons, Action::Update, self, None)?;

        let filtered = Coupons::coupons
            .filter(Coupons::id.eq(&id_arg))
            .filter(Coupons::is_claimed.eq(true));
        let query = diesel::update(filtered).set(Coupons::claim_id.eq(claim_id_arg));

        query
            .get_result::<RawCoupon>(self.db_conn)
            .map(Coupon::from)
            .map_err(From::from)
            .map_err(|e: FailureError| {
                e.context(format!("Attach claim {} to coupon with id: {} error occurred", claim_id_arg, id_arg))
                    .into()
            })
    }

    fn update(&self, id_arg: CouponId, payload: CouponChangeset) -> RepoResult<Coupon> {
        debug!("Updating coupon with id {} and payload {:?}.", id_arg, payload);
        let query = Coupons::coupons.find(&id_arg);

        query
            .get_result::<RawCoupon>(self.db_conn)
            .map_err(From::from)
            .and_then(|value| acl::check(&*self.acl, Resource::Coupons, Action::Update, self, Some(&value.into())))
            .and_then(|_| {
                let filtered = Coupons::coupons.filter(Coupons::id.eq(&id_arg));
                let query = diesel::update(filtered).set(&payload);

                query.get_result::<RawCoupon>(self.db_conn).map(Coupon::from).map_err(From::from)
            }).map_err(|e: FailureError| {
                e.context(format!(
                    "Updates specific coupon: id: {}, payload: {:?},  error occurred",
                    id_arg, payload
                )).into()
            })
    }

    fn delete(&self, id_arg: CouponId) -> RepoResult<Option<Coupon>> {
        debug!("Delete coupon with id {:?}.", id_arg);
        acl::check(&*self.acl, Resource::Coupons, Action::Delete, self, None)?;

        let filtered = Coupons::coupons
            .filter(Coupons::id.eq(&id_arg))
            .filter(Coupons::is_claimed.eq(false));
        let query = diesel::delete(filtered);

        query
            .get_result::<RawCoupon>(self.db_conn)
            .optional()
            .map(|value| value.map(Coupon::from))
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Delete coupon: {:?} error occurred", id_arg)).into())
    }
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> CheckScope<Scope, Coupon>
    for CouponsRepoImpl<'a, T>
{
    fn is_in_scope(&self, _user_id: UserId, scope: &Scope, _obj: Option<&Coupon>) -> bool {
        match *scope {
            Scope::All => true,
            Scope::Owned => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};

    use super::*;
    use errors::Error;

    struct UniqueViolation(&'static str);

    impl DatabaseErrorInformation for UniqueViolation {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }
        fn details(&self) -> Option<&str> {
            None
        }
        fn hint(&self) -> Option<&str> {
            None
        }
        fn table_name(&self) -> Option<&str> {
            Some("coupons")
        }
        fn column_name(&self) -> Option<&str> {
            None
        }
        fn constraint_name(&self) -> Option<&str> {
            Some(self.0)
        }
    }

    fn unique_violation(index: &'static str) -> DieselError {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, Box::new(UniqueViolation(index)))
    }

    #[test]
    fn test_code_index_violation_is_validation_error() {
        let error = create_error(unique_violation(CODE_INDEX), &CouponCode::from("save10"));
        match Error::find_in(&error) {
            Some(Error::Validate(_)) => {}
            other => panic!("Unexpected error kind: {:?}", other),
        }
    }

    #[test]
    fn test_other_database_errors_stay_untyped() {
        let error = create_error(unique_violation("coupons_distribution_order_idx"), &CouponCode::from("save10"));
        assert!(Error::find_in(&error).is_none());

        let error = create_error(DieselError::NotFound, &CouponCode::from("save10"));
        assert!(Error::find_in(&error).is_none());
    }
}
