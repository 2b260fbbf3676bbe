use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{MembershipStore, OrderStore, Store, UserStore};
use crate::error::AppError;
use crate::models::{
    Membership, MembershipChanges, MembershipStatus, NewMembership, NewOrder, NewUser, Order,
    User, UserChanges, round_to_cents,
};

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    memberships: BTreeMap<i64, Membership>,
    orders: BTreeMap<i64, Order>,
    next_user_id: i64,
    next_membership_id: i64,
    next_order_id: i64,
}

impl Tables {
    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    /// 与 users 表上的三个唯一约束对应
    fn check_user_unique(
        &self,
        skip: Option<i64>,
        username: Option<&str>,
        email: Option<&str>,
        phone_number: Option<&str>,
    ) -> Result<(), AppError> {
        for user in self.users.values().filter(|u| Some(u.user_id) != skip) {
            if username == Some(user.username.as_str()) {
                return Err(AppError::conflict("用户名已被占用"));
            }
            if email == Some(user.email.as_str()) {
                return Err(AppError::conflict("邮箱已被占用"));
            }
            if phone_number == Some(user.phone_number.as_str()) {
                return Err(AppError::conflict("手机号已被占用"));
            }
        }
        Ok(())
    }

    fn has_active(&self, user_id: i64, skip: Option<i64>) -> bool {
        self.memberships.values().any(|m| {
            m.user_id == user_id
                && m.status == MembershipStatus::Active
                && Some(m.membership_id) != skip
        })
    }
}

/// 进程内存储，所有写操作在同一把写锁内完成检查与写入
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 绕过 active 唯一性检查直接写入，用于构造损坏数据
    #[cfg(test)]
    pub(crate) async fn force_insert_membership(&self, membership: &NewMembership) -> Membership {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let membership_id = Tables::next_id(&mut tables.next_membership_id);
        let row = Membership {
            membership_id,
            user_id: membership.user_id,
            membership_type: membership.membership_type.clone(),
            start_date: membership.start_date,
            end_date: membership.end_date,
            status: membership.status,
            created_at: now,
            updated_at: now,
        };
        tables.memberships.insert(membership_id, row.clone());
        row
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &NewUser) -> Result<User, AppError> {
        let mut tables = self.tables.write().await;
        tables.check_user_unique(
            None,
            Some(&user.username),
            Some(&user.email),
            Some(&user.phone_number),
        )?;

        let now = Utc::now();
        let user_id = Tables::next_id(&mut tables.next_user_id);
        let row = User {
            user_id,
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            phone_number: user.phone_number.clone(),
            password_hash: user.password_hash.clone(),
            security_question1: user.security_question1.clone(),
            security_answer1_hash: user.security_answer1_hash.clone(),
            security_question2: user.security_question2.clone(),
            security_answer2_hash: user.security_answer2_hash.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user_id, row.clone());
        Ok(row)
    }

    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, AppError> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn update_user(&self, user_id: i64, changes: &UserChanges) -> Result<User, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(AppError::not_found("用户"));
        }
        tables.check_user_unique(
            Some(user_id),
            None,
            changes.email.as_deref(),
            changes.phone_number.as_deref(),
        )?;

        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::not_found("用户"))?;
        if let Some(full_name) = &changes.full_name {
            user.full_name = Some(full_name.clone());
        }
        if let Some(email) = &changes.email {
            user.email = email.clone();
        }
        if let Some(phone_number) = &changes.phone_number {
            user.phone_number = phone_number.clone();
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn update_password_hash(
        &self,
        user_id: i64,
        password_hash: &str,
    ) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::not_found("用户"))?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_user(&self, user_id: i64) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&user_id).is_none() {
            return Err(AppError::not_found("用户"));
        }
        tables.memberships.retain(|_, m| m.user_id != user_id);
        tables.orders.retain(|_, o| o.user_id != user_id);
        Ok(())
    }
}

#[async_trait]
impl MembershipStore for MemoryStore {
    async fn insert_membership(
        &self,
        membership: &NewMembership,
    ) -> Result<Membership, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&membership.user_id) {
            return Err(AppError::not_found("用户"));
        }
        if membership.status == MembershipStatus::Active
            && tables.has_active(membership.user_id, None)
        {
            return Err(AppError::conflict("该用户已有生效中的会员"));
        }

        let now = Utc::now();
        let membership_id = Tables::next_id(&mut tables.next_membership_id);
        let row = Membership {
            membership_id,
            user_id: membership.user_id,
            membership_type: membership.membership_type.clone(),
            start_date: membership.start_date,
            end_date: membership.end_date,
            status: membership.status,
            created_at: now,
            updated_at: now,
        };
        tables.memberships.insert(membership_id, row.clone());
        Ok(row)
    }

    async fn find_membership(&self, membership_id: i64) -> Result<Option<Membership>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .memberships
            .get(&membership_id)
            .cloned())
    }

    async fn find_active_memberships(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<Membership>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .memberships
            .values()
            .filter(|m| m.user_id == user_id && m.status == MembershipStatus::Active)
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn update_membership(
        &self,
        membership_id: i64,
        expected_status: MembershipStatus,
        changes: &MembershipChanges,
    ) -> Result<Membership, AppError> {
        let mut tables = self.tables.write().await;
        let (user_id, current_status) = match tables.memberships.get(&membership_id) {
            Some(m) => (m.user_id, m.status),
            None => return Err(AppError::not_found("会员记录")),
        };
        if current_status != expected_status {
            return Err(AppError::conflict("会员状态已被修改，请重试"));
        }
        if changes.status == Some(MembershipStatus::Active)
            && tables.has_active(user_id, Some(membership_id))
        {
            return Err(AppError::conflict("该用户已有生效中的会员"));
        }

        let membership = tables
            .memberships
            .get_mut(&membership_id)
            .ok_or_else(|| AppError::not_found("会员记录"))?;
        if let Some(membership_type) = &changes.membership_type {
            membership.membership_type = membership_type.clone();
        }
        if let Some(start_date) = changes.start_date {
            membership.start_date = start_date;
        }
        if let Some(end_date) = changes.end_date {
            membership.end_date = end_date;
        }
        if let Some(status) = changes.status {
            membership.status = status;
        }
        membership.updated_at = Utc::now();
        Ok(membership.clone())
    }

    async fn delete_membership(&self, membership_id: i64) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        match tables.memberships.remove(&membership_id) {
            Some(_) => Ok(()),
            None => Err(AppError::not_found("会员记录")),
        }
    }

    async fn list_memberships(&self) -> Result<Vec<Membership>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .memberships
            .values()
            .cloned()
            .collect())
    }

    async fn expire_overdue(
        &self,
        now: DateTime<Utc>,
        user_id: Option<i64>,
    ) -> Result<u64, AppError> {
        let mut tables = self.tables.write().await;
        let mut expired = 0;
        for membership in tables.memberships.values_mut() {
            if user_id.is_some_and(|id| id != membership.user_id) {
                continue;
            }
            if membership.is_overdue(now) {
                membership.status = MembershipStatus::Expired;
                membership.updated_at = Utc::now();
                expired += 1;
            }
        }
        Ok(expired)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&order.user_id) {
            return Err(AppError::not_found("用户"));
        }

        let order_id = Tables::next_id(&mut tables.next_order_id);
        let row = Order {
            order_id,
            user_id: order.user_id,
            purchase_date: order.purchase_date,
            duration_months: order.duration_months,
            amount: round_to_cents(order.amount),
            payment_method: order.payment_method,
        };
        tables.orders.insert(order_id, row.clone());
        Ok(row)
    }

    async fn list_orders(&self, user_id: i64, limit: Option<i64>) -> Result<Vec<Order>, AppError> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            b.purchase_date
                .cmp(&a.purchase_date)
                .then(b.order_id.cmp(&a.order_id))
        });
        if let Some(limit) = limit {
            orders.truncate(usize::try_from(limit).unwrap_or(0));
        }
        Ok(orders)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
