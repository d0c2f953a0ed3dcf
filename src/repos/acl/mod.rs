//! Authorization module contains authorization logic for the repo layer app

#[macro_use]
pub mod macros;
pub mod legacy_acl;

use std::collections::HashMap;
use std::rc::Rc;

use errors::Error;
use failure::Error as FailureError;

use types::{CouponsRole, UserId};

use self::legacy_acl::{Acl, CheckScope};

use models::authorization::*;

pub fn check<T>(
    acl: &Acl<Resource, Action, Scope, FailureError, T>,
    resource: Resource,
    action: Action,
    scope_checker: &CheckScope<Scope, T>,
    obj: Option<&T>,
) -> Result<(), FailureError> {
    acl.allows(resource, action, scope_checker, obj).and_then(|allowed| {
        if allowed {
            Ok(())
        } else {
            Err(format_err!("Denied request to do {:?} on {:?}", action, resource)
                .context(Error::Forbidden)
                .into())
        }
    })
}

/// ApplicationAcl contains main logic for manipulation with resources
#[derive(Clone)]
pub struct ApplicationAcl {
    acls: Rc<HashMap<CouponsRole, Vec<Permission>>>,
    roles: Vec<CouponsRole>,
    user_id: UserId,
}

impl ApplicationAcl {
    pub fn new(roles: Vec<CouponsRole>, user_id: UserId) -> Self {
        let mut hash = ::std::collections::HashMap::new();
        hash.insert(
            CouponsRole::Superuser,
            vec![
                permission!(Resource::Coupons),
                permission!(Resource::Claims),
                permission!(Resource::UserRoles),
            ],
        );
        hash.insert(
            CouponsRole::User,
            vec![
                permission!(Resource::Claims, Action::Read, Scope::Owned),
                permission!(Resource::UserRoles, Action::Read, Scope::Owned),
            ],
        );

        ApplicationAcl {
            acls: Rc::new(hash),
            roles,
            user_id,
        }
    }
}

impl<T> Acl<Resource, Action, Scope, FailureError, T> for ApplicationAcl {
    fn allows(&self, resource: Resource, action: Action, scope_checker: &CheckScope<Scope, T>, obj: Option<&T>) -> Result<bool, FailureError> {
        let empty: Vec<Permission> = Vec::new();
        let user_id = &self.user_id;
        let hashed_acls = self.acls.clone();
        let acls = self
            .roles
            .iter()
            .flat_map(|role| hashed_acls.get(role).unwrap_or(&empty))
            .filter(|permission| (permission.resource == resource) && ((permission.action == action) || (permission.action == Action::All)))
            .filter(|permission| scope_checker.is_in_scope(*user_id, &permission.scope, obj));

        if acls.count() > 0 {
            Ok(true)
        } else {
            error!("Denied request from user {} to do {} on {}.", user_id, action, resource);
            Ok(false)
        }
    }
}

/// UnauthorizedAcl contains main logic for manipulation with resources
#[derive(Clone, Default)]
pub struct UnauthorizedAcl;

impl<T> Acl<Resource, Action, Scope, FailureError, T> for UnauthorizedAcl {
    fn allows(&self, resource: Resource, action: Action, _scope_checker: &CheckScope<Scope, T>, _obj: Option<&T>) -> Result<bool, FailureError> {
        error!("Denied unauthorized request to do {} on {}.", action, resource);
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use repos::legacy_acl::{Acl, CheckScope};

    use models::*;
    use repos::*;
    use types::*;

    fn create_claim(user_id: Option<UserId>) -> Claim {
        Claim {
            id: ClaimId(1),
            coupon_id: CouponId(1),
            ip_address: "10.0.0.1".to_string(),
            session_marker: SessionMarker::from("0123456789abcdef0123456789abcdef"),
            user_id,
            is_guest: user_id.is_none(),
            user_agent: None,
            claimed_at: Utc::now(),
        }
    }

    #[derive(Default)]
    struct ScopeChecker;

    impl CheckScope<Scope, Claim> for ScopeChecker {
        fn is_in_scope(&self, user_id: UserId, scope: &Scope, obj: Option<&Claim>) -> bool {
            match *scope {
                Scope::All => true,
                Scope::Owned => {
                    if let Some(claim) = obj {
                        claim.user_id == Some(user_id)
                    } else {
                        false
                    }
                }
            }
        }
    }

    impl CheckScope<Scope, UserRole> for ScopeChecker {
        fn is_in_scope(&self, user_id: UserId, scope: &Scope, obj: Option<&UserRole>) -> bool {
            match *scope {
                Scope::All => true,
                Scope::Owned => {
                    if let Some(user_role) = obj {
                        user_role.user_id == user_id
                    } else {
                        false
                    }
                }
            }
        }
    }

    #[test]
    fn test_super_user_for_claims() {
        let acl = ApplicationAcl::new(vec![CouponsRole::Superuser], UserId(1232));
        let s = ScopeChecker::default();
        let resource = create_claim(None);

        assert_eq!(
            acl.allows(Resource::Claims, Action::All, &s, Some(&resource)).unwrap(),
            true,
            "ACL does not allow all actions on claim for superuser."
        );
        assert_eq!(
            acl.allows(Resource::Claims, Action::Read, &s, Some(&resource)).unwrap(),
            true,
            "ACL does not allow read action on claim for superuser."
        );
        assert_eq!(
            acl.allows(Resource::Coupons, Action::Delete, &s, Some(&resource)).unwrap(),
            true,
            "ACL does not allow delete actions on coupons for superuser."
        );
    }

    #[test]
    fn test_ordinary_user_for_claims() {
        let user_id = UserId(2);
        let acl = ApplicationAcl::new(vec![CouponsRole::User], user_id);
        let s = ScopeChecker::default();

        assert_eq!(
            acl.allows(Resource::Claims, Action::Read, &s, Some(&create_claim(Some(user_id))))
                .unwrap(),
            true,
            "ACL does not allow read action on own claim for ordinary_user."
        );
        assert_eq!(
            acl.allows(Resource::Claims, Action::Read, &s, Some(&create_claim(Some(UserId(3)))))
                .unwrap(),
            false,
            "ACL allows read action on foreign claim for ordinary_user."
        );
        assert_eq!(
            acl.allows(Resource::Claims, Action::Read, &s, Some(&create_claim(None))).unwrap(),
            false,
            "ACL allows read action on guest claim for ordinary_user."
        );
        assert_eq!(
            acl.allows(Resource::Coupons, Action::Create, &s, Some(&create_claim(Some(user_id))))
                .unwrap(),
            false,
            "ACL allows create actions on coupons for ordinary_user."
        );
    }

    #[test]
    fn test_user_for_user_roles() {
        let acl = ApplicationAcl::new(vec![CouponsRole::User], UserId(2));
        let s = ScopeChecker::default();

        let resource = UserRole {
            id: RoleId(1),
            user_id: UserId(1),
            role: CouponsRole::User,
        };

        assert_eq!(acl.allows(Resource::UserRoles, Action::All, &s, Some(&resource)).unwrap(), false);
        assert_eq!(acl.allows(Resource::UserRoles, Action::Read, &s, Some(&resource)).unwrap(), false);
    }

    #[test]
    fn test_unauthorized_denies_everything() {
        let acl = UnauthorizedAcl::default();
        let s = ScopeChecker::default();
        let resource = create_claim(None);

        assert_eq!(acl.allows(Resource::Claims, Action::Read, &s, Some(&resource)).unwrap(), false);
        assert_eq!(acl.allows(Resource::Coupons, Action::Read, &s, Some(&resource)).unwrap(), false);
    }
}
