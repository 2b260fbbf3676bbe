use serde::Deserialize;

use crate::error::AppError;

pub const DEFAULT_RECENT_ORDERS: i64 = 5;
pub const MAX_RECENT_ORDERS: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct RecordOrderRequest {
    /// 仅管理员可为他人记录
    pub user_id: Option<i64>,
    pub duration_months: i32,
    pub amount: f64,
    pub payment_method: String,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub n: Option<i64>,
}

impl RecentQuery {
    /// n 默认 5，取值范围 [1, 100]
    pub fn limit(&self) -> Result<u32, AppError> {
        let n = self.n.unwrap_or(DEFAULT_RECENT_ORDERS);
        if !(1..=MAX_RECENT_ORDERS).contains(&n) {
            return Err(AppError::invalid(format!(
                "n必须在1到{}之间",
                MAX_RECENT_ORDERS
            )));
        }
        u32::try_from(n).map_err(|_| AppError::invalid("n超出范围"))
    }
}
