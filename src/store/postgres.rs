use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::{MembershipStore, OrderStore, Store, UserStore};
use crate::error::AppError;
use crate::models::{
    Membership, MembershipChanges, MembershipStatus, NewMembership, NewOrder, NewUser, Order,
    PlanTier, User, UserChanges,
};

const USER_COLUMNS: &str = "user_id, username, full_name, email, phone_number, password_hash, \
     security_question1, security_answer1_hash, security_question2, security_answer2_hash, \
     created_at, updated_at";

const MEMBERSHIP_COLUMNS: &str =
    "membership_id, user_id, membership_type, start_date, end_date, status, created_at, updated_at";

// amount 以 NUMERIC(10,2) 存储，读取时转为 float8
const ORDER_COLUMNS: &str =
    "order_id, user_id, purchase_date, duration_months, amount::float8 AS amount, payment_method";

const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Postgres 存储实现
pub struct PgStore {
    db: Arc<PgPool>,
}

impl PgStore {
    pub fn new(db: Arc<PgPool>) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    user_id: i64,
    username: String,
    full_name: Option<String>,
    email: String,
    phone_number: String,
    password_hash: String,
    security_question1: String,
    security_answer1_hash: String,
    security_question2: String,
    security_answer2_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            user_id: row.user_id,
            username: row.username,
            full_name: row.full_name,
            email: row.email,
            phone_number: row.phone_number,
            password_hash: row.password_hash,
            security_question1: row.security_question1,
            security_answer1_hash: row.security_answer1_hash,
            security_question2: row.security_question2,
            security_answer2_hash: row.security_answer2_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct MembershipRow {
    membership_id: i64,
    user_id: i64,
    membership_type: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MembershipRow> for Membership {
    type Error = AppError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        let membership_type = PlanTier::parse(&row.membership_type).map_err(|_| {
            AppError::Integrity(format!(
                "membership {} has invalid type {:?}",
                row.membership_id, row.membership_type
            ))
        })?;
        let status = row.status.parse::<MembershipStatus>().map_err(|_| {
            AppError::Integrity(format!(
                "membership {} has invalid status {:?}",
                row.membership_id, row.status
            ))
        })?;

        Ok(Membership {
            membership_id: row.membership_id,
            user_id: row.user_id,
            membership_type,
            start_date: row.start_date,
            end_date: row.end_date,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderRow {
    order_id: i64,
    user_id: i64,
    purchase_date: DateTime<Utc>,
    duration_months: i32,
    amount: f64,
    payment_method: String,
}

impl TryFrom<OrderRow> for Order {
    type Error = AppError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let payment_method = row.payment_method.parse().map_err(|_| {
            AppError::Integrity(format!(
                "order {} has invalid payment method {:?}",
                row.order_id, row.payment_method
            ))
        })?;

        Ok(Order {
            order_id: row.order_id,
            user_id: row.user_id,
            purchase_date: row.purchase_date,
            duration_months: row.duration_months,
            amount: row.amount,
            payment_method,
        })
    }
}

/// 把约束冲突翻译成业务错误，其余数据库错误原样返回
fn map_write_error(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.constraint() {
            Some("users_username_key") => return AppError::conflict("用户名已被占用"),
            Some("users_email_key") => return AppError::conflict("邮箱已被占用"),
            Some("users_phone_number_key") => return AppError::conflict("手机号已被占用"),
            Some("memberships_one_active_per_user") => {
                return AppError::conflict("该用户已有生效中的会员");
            }
            Some(
                "membership_orders_duration_check"
                | "membership_orders_amount_check"
                | "membership_orders_payment_method_check",
            ) => return AppError::invalid("订单参数不合法"),
            Some("memberships_status_check" | "memberships_dates_check") => {
                return AppError::invalid("会员参数不合法");
            }
            _ => {}
        }
        if db_err.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) {
            return AppError::not_found("用户");
        }
    }
    tracing::error!("Database write failed: {}", err);
    AppError::Database(err)
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: &NewUser) -> Result<User, AppError> {
        let query = format!(
            r#"
            INSERT INTO users (
                username, full_name, email, phone_number, password_hash,
                security_question1, security_answer1_hash,
                security_question2, security_answer2_hash
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {USER_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(&user.username)
            .bind(&user.full_name)
            .bind(&user.email)
            .bind(&user.phone_number)
            .bind(&user.password_hash)
            .bind(&user.security_question1)
            .bind(&user.security_answer1_hash)
            .bind(&user.security_question2)
            .bind(&user.security_answer2_hash)
            .fetch_one(&*self.db)
            .await
            .map_err(map_write_error)?;

        Ok(row.into())
    }

    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, AppError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = $1");
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(user_id)
            .fetch_optional(&*self.db)
            .await?;

        Ok(row.map(User::from))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(username)
            .fetch_optional(&*self.db)
            .await?;

        Ok(row.map(User::from))
    }

    async fn update_user(&self, user_id: i64, changes: &UserChanges) -> Result<User, AppError> {
        let query = format!(
            r#"
            UPDATE users SET
                full_name = COALESCE($2, full_name),
                email = COALESCE($3, email),
                phone_number = COALESCE($4, phone_number),
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING {USER_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(user_id)
            .bind(&changes.full_name)
            .bind(&changes.email)
            .bind(&changes.phone_number)
            .fetch_optional(&*self.db)
            .await
            .map_err(map_write_error)?;

        row.map(User::from).ok_or_else(|| AppError::not_found("用户"))
    }

    async fn update_password_hash(
        &self,
        user_id: i64,
        password_hash: &str,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(password_hash)
        .execute(&*self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("用户"));
        }
        Ok(())
    }

    async fn delete_user(&self, user_id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("用户"));
        }
        Ok(())
    }
}

#[async_trait]
impl MembershipStore for PgStore {
    async fn insert_membership(
        &self,
        membership: &NewMembership,
    ) -> Result<Membership, AppError> {
        let query = format!(
            r#"
            INSERT INTO memberships (user_id, membership_type, start_date, end_date, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {MEMBERSHIP_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, MembershipRow>(&query)
            .bind(membership.user_id)
            .bind(membership.membership_type.as_str())
            .bind(membership.start_date)
            .bind(membership.end_date)
            .bind(membership.status.as_str())
            .fetch_one(&*self.db)
            .await
            .map_err(map_write_error)?;

        row.try_into()
    }

    async fn find_membership(&self, membership_id: i64) -> Result<Option<Membership>, AppError> {
        let query = format!("SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE membership_id = $1");
        let row = sqlx::query_as::<_, MembershipRow>(&query)
            .bind(membership_id)
            .fetch_optional(&*self.db)
            .await?;

        row.map(Membership::try_from).transpose()
    }

    async fn find_active_memberships(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<Membership>, AppError> {
        let query = format!(
            r#"
            SELECT {MEMBERSHIP_COLUMNS} FROM memberships
            WHERE user_id = $1 AND status = 'active'
            ORDER BY membership_id
            LIMIT $2
            "#
        );

        let rows = sqlx::query_as::<_, MembershipRow>(&query)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&*self.db)
            .await?;

        rows.into_iter().map(Membership::try_from).collect()
    }

    async fn update_membership(
        &self,
        membership_id: i64,
        expected_status: MembershipStatus,
        changes: &MembershipChanges,
    ) -> Result<Membership, AppError> {
        let query = format!(
            r#"
            UPDATE memberships SET
                membership_type = COALESCE($3, membership_type),
                start_date = COALESCE($4, start_date),
                end_date = COALESCE($5, end_date),
                status = COALESCE($6, status),
                updated_at = NOW()
            WHERE membership_id = $1 AND status = $2
            RETURNING {MEMBERSHIP_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, MembershipRow>(&query)
            .bind(membership_id)
            .bind(expected_status.as_str())
            .bind(changes.membership_type.as_ref().map(|t| t.as_str()))
            .bind(changes.start_date)
            .bind(changes.end_date)
            .bind(changes.status.map(|s| s.as_str()))
            .fetch_optional(&*self.db)
            .await
            .map_err(map_write_error)?;

        match row {
            Some(row) => row.try_into(),
            // 记录存在但状态已被并发修改
            None if self.find_membership(membership_id).await?.is_some() => {
                Err(AppError::conflict("会员状态已被修改，请重试"))
            }
            None => Err(AppError::not_found("会员记录")),
        }
    }

    async fn delete_membership(&self, membership_id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM memberships WHERE membership_id = $1")
            .bind(membership_id)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("会员记录"));
        }
        Ok(())
    }

    async fn list_memberships(&self) -> Result<Vec<Membership>, AppError> {
        let query = format!("SELECT {MEMBERSHIP_COLUMNS} FROM memberships ORDER BY membership_id");
        let rows = sqlx::query_as::<_, MembershipRow>(&query)
            .fetch_all(&*self.db)
            .await?;

        rows.into_iter().map(Membership::try_from).collect()
    }

    async fn expire_overdue(
        &self,
        now: DateTime<Utc>,
        user_id: Option<i64>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE memberships SET status = 'expired', updated_at = NOW()
            WHERE status = 'active'
              AND end_date <= $1
              AND ($2::BIGINT IS NULL OR user_id = $2)
            "#,
        )
        .bind(now)
        .bind(user_id)
        .execute(&*self.db)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, AppError> {
        let query = format!(
            r#"
            INSERT INTO membership_orders (
                user_id, purchase_date, duration_months, amount, payment_method
            ) VALUES ($1, $2, $3, $4::NUMERIC, $5)
            RETURNING {ORDER_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, OrderRow>(&query)
            .bind(order.user_id)
            .bind(order.purchase_date)
            .bind(order.duration_months)
            .bind(order.amount)
            .bind(order.payment_method.as_str())
            .fetch_one(&*self.db)
            .await
            .map_err(map_write_error)?;

        row.try_into()
    }

    async fn list_orders(&self, user_id: i64, limit: Option<i64>) -> Result<Vec<Order>, AppError> {
        // LIMIT NULL 等价于不限制
        let query = format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM membership_orders
            WHERE user_id = $1
            ORDER BY purchase_date DESC, order_id DESC
            LIMIT $2
            "#
        );

        let rows = sqlx::query_as::<_, OrderRow>(&query)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&*self.db)
            .await?;

        rows.into_iter().map(Order::try_from).collect()
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&*self.db).await?;
        Ok(())
    }
}
