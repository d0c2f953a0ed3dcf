use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;
use failure::Error as FailureError;

use types::{CouponsRole, UserId};

use models::*;
use repos::legacy_acl::{Acl, SystemACL};
use repos::*;

pub trait ReposFactory<C: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static>: Clone + Send + 'static {
    fn create_coupons_repo<'a>(&self, db_conn: &'a C, user_id: Option<UserId>) -> Box<CouponsRepo + 'a>;
    fn create_coupons_repo_with_sys_acl<'a>(&self, db_conn: &'a C) -> Box<CouponsRepo + 'a>;
    fn create_claims_repo<'a>(&self, db_conn: &'a C, user_id: Option<UserId>) -> Box<ClaimsRepo + 'a>;
    fn create_claims_repo_with_sys_acl<'a>(&self, db_conn: &'a C) -> Box<ClaimsRepo + 'a>;
    fn create_user_roles_repo_with_sys_acl<'a>(&self, db_conn: &'a C) -> Box<UserRolesRepo + 'a>;
}

#[derive(Clone, Default)]
pub struct ReposFactoryImpl;

impl ReposFactoryImpl {
    pub fn new() -> Self {
        ReposFactoryImpl
    }

    /// Every authenticated account holds the user role, stored roles come on top of it
    pub fn get_roles<'a, C: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static>(
        &self,
        id: UserId,
        db_conn: &'a C,
    ) -> Vec<CouponsRole> {
        let mut roles = self
            .create_user_roles_repo_with_sys_acl(db_conn)
            .list_for_user(id)
            .ok()
            .unwrap_or_default();
        if !roles.contains(&CouponsRole::User) {
            roles.push(CouponsRole::User);
        }
        roles
    }

    fn get_acl<'a, T, C: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static>(
        &self,
        db_conn: &'a C,
        user_id: Option<UserId>,
    ) -> Box<Acl<Resource, Action, Scope, FailureError, T>> {
        user_id.map_or(
            Box::new(UnauthorizedAcl::default()) as Box<Acl<Resource, Action, Scope, FailureError, T>>,
            |id| {
                let roles = self.get_roles(id, db_conn);
                (Box::new(ApplicationAcl::new(roles, id)) as Box<Acl<Resource, Action, Scope, FailureError, T>>)
            },
        )
    }
}

impl<C: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> ReposFactory<C> for ReposFactoryImpl {
    fn create_coupons_repo<'a>(&self, db_conn: &'a C, user_id: Option<UserId>) -> Box<CouponsRepo + 'a> {
        let acl = self.get_acl(db_conn, user_id);
        Box::new(CouponsRepoImpl::new(db_conn, acl)) as Box<CouponsRepo>
    }
    fn create_coupons_repo_with_sys_acl<'a>(&self, db_conn: &'a C) -> Box<CouponsRepo + 'a> {
        Box::new(CouponsRepoImpl::new(
            db_conn,
            Box::new(SystemACL::default()) as Box<Acl<Resource, Action, Scope, FailureError, Coupon>>,
        )) as Box<CouponsRepo>
    }
    fn create_claims_repo<'a>(&self, db_conn: &'a C, user_id: Option<UserId>) -> Box<ClaimsRepo + 'a> {
        let acl = self.get_acl(db_conn, user_id);
        Box::new(ClaimsRepoImpl::new(db_conn, acl)) as Box<ClaimsRepo>
    }
    fn create_claims_repo_with_sys_acl<'a>(&self, db_conn: &'a C) -> Box<ClaimsRepo + 'a> {
        Box::new(ClaimsRepoImpl::new(
            db_conn,
            Box::new(SystemACL::default()) as Box<Acl<Resource, Action, Scope, FailureError, Claim>>,
        )) as Box<ClaimsRepo>
    }
    fn create_user_roles_repo_with_sys_acl<'a>(&self, db_conn: &'a C) -> Box<UserRolesRepo + 'a> {
        Box::new(UserRolesRepoImpl::new(
            db_conn,
            Box::new(SystemACL::default()) as Box<Acl<Resource, Action, Scope, FailureError, UserRole>>,
        )) as Box<UserRolesRepo>
    }
}
