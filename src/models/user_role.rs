//! Models for managing Roles
use types::{CouponsRole, RoleId, UserId};

#[derive(Serialize, Queryable, Debug, Clone)]
pub struct UserRole {
    pub id: RoleId,
    pub user_id: UserId,
    pub role: CouponsRole,
}
