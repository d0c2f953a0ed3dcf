//! Claims repo. Claims are append-only; nothing here updates or deletes a claim.
use chrono::{DateTime, Utc};
use diesel;
use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_dsl::RunQueryDsl;
use diesel::sql_types::Bool;
use diesel::Connection;
use failure::Error as FailureError;

use types::UserId;

use models::*;
use repos::acl;
use repos::legacy_acl::{Acl, CheckScope};
use repos::types::RepoResult;
use schema::claims::dsl as Claims;
use schema::coupons::dsl as Coupons;

/// Claims repository, responsible for handling claims
pub struct ClaimsRepoImpl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> {
    pub db_conn: &'a T,
    pub acl: Box<Acl<Resource, Action, Scope, FailureError, Claim>>,
}

pub trait ClaimsRepo {
    /// Records a claim
    fn create(&self, payload: NewClaim) -> RepoResult<Claim>;

    /// Claims made after `since` matching the address, the session marker or the account
    /// of the identity, newest first
    fn find_recent(&self, identity: &Identity, since: DateTime<Utc>) -> RepoResult<Vec<Claim>>;

    /// All claims with their coupons, newest first
    fn list_with_coupons(&self) -> RepoResult<Vec<ClaimWithCoupon>>;

    /// Claims made by an account with their coupons, newest first
    fn list_for_user(&self, user_id_arg: UserId) -> RepoResult<Vec<ClaimWithCoupon>>;
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> ClaimsRepoImpl<'a, T> {
    pub fn new(db_conn: &'a T, acl: Box<Acl<Resource, Action, Scope, FailureError, Claim>>) -> Self {
        Self { db_conn, acl }
    }

    fn check_joined(&self, values: Vec<(Claim, RawCoupon)>) -> RepoResult<Vec<ClaimWithCoupon>> {
        let mut result = Vec::with_capacity(values.len());
        for (claim, coupon) in values {
            acl::check(&*self.acl, Resource::Claims, Action::Read, self, Some(&claim))?;
            result.push(ClaimWithCoupon {
                claim,
                coupon: coupon.into(),
            });
        }
        Ok(result)
    }
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> ClaimsRepo for ClaimsRepoImpl<'a, T> {
    fn create(&self, payload: NewClaim) -> RepoResult<Claim> {
        debug!("Create new claim {:?}.", payload);
        let query = diesel::insert_into(Claims::claims).values(&payload);
        query
            .get_result::<Claim>(self.db_conn)
            .map_err(From::from)
            .and_then(|value| {
                acl::check(&*self.acl, Resource::Claims, Action::Create, self, Some(&value))?;

                Ok(value)
            }).map_err(|e: FailureError| e.context(format!("Creates new claim: {:?} error occurred", payload)).into())
    }

    fn find_recent(&self, identity: &Identity, since: DateTime<Utc>) -> RepoResult<Vec<Claim>> {
        debug!("Find claims of {:?} since {}.", identity, since);

        let by_address = Claims::ip_address.eq(identity.address.clone());
        let by_session = Claims::session_marker.eq(identity.session_marker.clone());
        let matches: Box<BoxableExpression<Claims::claims, Pg, SqlType = Bool>> = match identity.user_id {
            Some(user_id_arg) => Box::new(by_address.or(by_session).or(Claims::user_id.eq(user_id_arg))),
            None => Box::new(by_address.or(by_session)),
        };

        let query = Claims::claims
            .filter(matches)
            .filter(Claims::claimed_at.gt(since))
            .order(Claims::claimed_at.desc());

        query
            .get_results::<Claim>(self.db_conn)
            .map_err(From::from)
            .and_then(|values| {
                for value in &values {
                    acl::check(&*self.acl, Resource::Claims, Action::Read, self, Some(&value))?;
                }

                Ok(values)
            }).map_err(|e: FailureError| e.context(format!("Find recent claims of {:?} error occurred", identity)).into())
    }

    fn list_with_coupons(&self) -> RepoResult<Vec<ClaimWithCoupon>> {
        debug!("Find all claims.");
        let query = Claims::claims
            .inner_join(Coupons::coupons)
            .order((Claims::claimed_at.desc(), Claims::id.desc()));

        query
            .get_results::<(Claim, RawCoupon)>(self.db_conn)
            .map_err(From::from)
            .and_then(|values| self.check_joined(values))
            .map_err(|e: FailureError| e.context("List all claims").into())
    }

    fn list_for_user(&self, user_id_arg: UserId) -> RepoResult<Vec<ClaimWithCoupon>> {
        debug!("Find claims of user {}.", user_id_arg);
        let query = Claims::claims
            .inner_join(Coupons::coupons)
            .filter(Claims::user_id.eq(user_id_arg))
            .order((Claims::claimed_at.desc(), Claims::id.desc()));

        query
            .get_results::<(Claim, RawCoupon)>(self.db_conn)
            .map_err(From::from)
            .and_then(|values| self.check_joined(values))
            .map_err(|e: FailureError| e.context(format!("List claims of user {} error occurred", user_id_arg)).into())
    }
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> CheckScope<Scope, Claim>
    for ClaimsRepoImpl<'a, T>
{
    fn is_in_scope(&self, user_id_arg: UserId, scope: &Scope, obj: Option<&Claim>) -> bool {
        match *scope {
            Scope::All => true,
            Scope::Owned => {
                if let Some(claim) = obj {
                    claim.user_id == Some(user_id_arg)
                } else {
                    false
                }
            }
        }
    }
}
