// 存储层
// 业务服务只依赖这里的 trait，具体实现有 Postgres 和内存两种

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::{
    Membership, MembershipChanges, MembershipStatus, NewMembership, NewOrder, NewUser, Order,
    User, UserChanges,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// 用户名、邮箱、手机号重复时返回 `Conflict`
    async fn insert_user(&self, user: &NewUser) -> Result<User, AppError>;

    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, AppError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn update_user(&self, user_id: i64, changes: &UserChanges) -> Result<User, AppError>;

    async fn update_password_hash(&self, user_id: i64, password_hash: &str)
    -> Result<(), AppError>;

    /// 级联删除该用户的会员与订单记录
    async fn delete_user(&self, user_id: i64) -> Result<(), AppError>;
}

#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// 插入与“同一用户至多一条 active 记录”的检查在存储层原子完成，
    /// 冲突时返回 `Conflict`，用户不存在时返回 `NotFound`
    async fn insert_membership(&self, membership: &NewMembership)
    -> Result<Membership, AppError>;

    async fn find_membership(&self, membership_id: i64) -> Result<Option<Membership>, AppError>;

    /// 最多返回 `limit` 条 active 记录，调用方据此检测数据完整性问题
    async fn find_active_memberships(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<Membership>, AppError>;

    /// 仅当记录当前状态仍为 `expected_status` 时才更新，否则返回 `Conflict`
    async fn update_membership(
        &self,
        membership_id: i64,
        expected_status: MembershipStatus,
        changes: &MembershipChanges,
    ) -> Result<Membership, AppError>;

    async fn delete_membership(&self, membership_id: i64) -> Result<(), AppError>;

    async fn list_memberships(&self) -> Result<Vec<Membership>, AppError>;

    /// 将 `end_date <= now` 的 active 记录置为 expired，返回受影响行数
    async fn expire_overdue(
        &self,
        now: DateTime<Utc>,
        user_id: Option<i64>,
    ) -> Result<u64, AppError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, AppError>;

    /// 按购买时间倒序，`limit` 为 `None` 时返回全部
    async fn list_orders(&self, user_id: i64, limit: Option<i64>) -> Result<Vec<Order>, AppError>;
}

#[async_trait]
pub trait Store: UserStore + MembershipStore + OrderStore {
    async fn ping(&self) -> Result<(), AppError>;
}
