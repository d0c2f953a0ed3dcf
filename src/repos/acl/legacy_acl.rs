//! Generic access control traits used by the repos

use types::UserId;

/// Access control layer for repos. It tells if a user can do a certain action with
/// a certain resource. All logic for roles and permissions should be hardcoded into
/// implementation of this trait.
pub trait Acl<Resource, Action, Scope, Error, T> {
    /// Tells if a user with id `user_id` can do `action` on `resource`.
    /// `scope_checker` can tell if this resource is in some scope, which is also a part of `acl` for some
    /// permissions. E.g. You can say that a user can do `Create` (`Action`) on `Coupons` (`Resource`) only if
    /// they are the owner (`Scope`).
    fn allows(&self, resource: Resource, action: Action, scope_checker: &CheckScope<Scope, T>, obj: Option<&T>) -> Result<bool, Error>;
}

/// CheckScope tells if a record is inside a scope for a given user
pub trait CheckScope<Scope, T> {
    fn is_in_scope(&self, user_id: UserId, scope: &Scope, obj: Option<&T>) -> bool;
}

/// `SystemACL` allows all manipulation with resources in all cases.
/// Used by the claim arbitration path, which acts on behalf of anonymous visitors.
#[derive(Clone, Debug, Default)]
pub struct SystemACL;

impl<Resource, Action, Scope, Error, T> Acl<Resource, Action, Scope, Error, T> for SystemACL {
    fn allows(&self, _resource: Resource, _action: Action, _scope_checker: &CheckScope<Scope, T>, _obj: Option<&T>) -> Result<bool, Error> {
        Ok(true)
    }
}
