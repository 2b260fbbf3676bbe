use std::sync::Arc;

use chrono::Utc;

use crate::error::AppError;
use crate::models::{NewOrder, Order, PaymentMethod};
use crate::store::Store;

/// 订单账本：只追加、按时间倒序查询
///
/// 下单不会自动续费或创建会员，两者由调用方分别触发。
#[derive(Clone)]
pub struct OrderLedger {
    store: Arc<dyn Store>,
}

impl OrderLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// 用户不存在与“没有订单”是两种结果
    async fn ensure_user(&self, user_id: i64) -> Result<(), AppError> {
        match self.store.find_user_by_id(user_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::not_found("用户")),
        }
    }

    pub async fn record_order(
        &self,
        user_id: i64,
        duration_months: i32,
        amount: f64,
        payment_method: &str,
    ) -> Result<Order, AppError> {
        let payment_method = payment_method.parse::<PaymentMethod>()?;
        let mut order = NewOrder {
            user_id,
            purchase_date: Utc::now(),
            duration_months,
            amount,
            payment_method,
        };
        order.validate()?;

        let order = self.store.insert_order(&order).await?;
        tracing::info!(
            user_id,
            order_id = order.order_id,
            duration_months,
            payment_method = %order.payment_method,
            "Order recorded"
        );
        Ok(order)
    }

    pub async fn list_orders(&self, user_id: i64) -> Result<Vec<Order>, AppError> {
        self.ensure_user(user_id).await?;
        self.store.list_orders(user_id, None).await
    }

    pub async fn latest_order(&self, user_id: i64) -> Result<Order, AppError> {
        self.ensure_user(user_id).await?;
        self.store
            .list_orders(user_id, Some(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::not_found("订单"))
    }

    pub async fn recent_orders(&self, user_id: i64, n: u32) -> Result<Vec<Order>, AppError> {
        if n == 0 {
            return Err(AppError::invalid("n必须为正数"));
        }
        self.ensure_user(user_id).await?;
        self.store.list_orders(user_id, Some(i64::from(n))).await
    }
}
