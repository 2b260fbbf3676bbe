use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Wechat,
    Alipay,
    Card,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Wechat => "wechat",
            PaymentMethod::Alipay => "alipay",
            PaymentMethod::Card => "card",
            PaymentMethod::Other => "other",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wechat" => Ok(PaymentMethod::Wechat),
            "alipay" => Ok(PaymentMethod::Alipay),
            "card" => Ok(PaymentMethod::Card),
            "other" => Ok(PaymentMethod::Other),
            other => Err(AppError::invalid(format!("不支持的支付方式: {}", other))),
        }
    }
}

/// 不可变的购买记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub order_id: i64,
    pub user_id: i64,
    pub purchase_date: DateTime<Utc>,
    pub duration_months: i32,
    pub amount: f64,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: i64,
    pub purchase_date: DateTime<Utc>,
    pub duration_months: i32,
    pub amount: f64,
    pub payment_method: PaymentMethod,
}

/// 金额上限与 NUMERIC(10,2) 列保持一致
const MAX_AMOUNT: f64 = 99_999_999.99;

/// 按分四舍五入，与 NUMERIC(10,2) 的舍入规则一致
pub fn round_to_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

impl NewOrder {
    /// 金额先按分取整再校验，校验通过后订单中保存的就是取整后的金额
    pub fn validate(&mut self) -> Result<(), AppError> {
        if self.duration_months <= 0 {
            return Err(AppError::invalid("购买时长必须为正数"));
        }
        if !self.amount.is_finite() {
            return Err(AppError::invalid("订单金额必须为正数"));
        }
        let amount = round_to_cents(self.amount);
        if amount <= 0.0 {
            return Err(AppError::invalid("订单金额必须为正数"));
        }
        if amount > MAX_AMOUNT {
            return Err(AppError::invalid("订单金额超出上限"));
        }
        self.amount = amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(duration_months: i32, amount: f64) -> NewOrder {
        NewOrder {
            user_id: 1,
            purchase_date: Utc::now(),
            duration_months,
            amount,
            payment_method: PaymentMethod::Card,
        }
    }

    #[test]
    fn payment_methods_are_a_closed_set() {
        assert_eq!("WeChat".parse::<PaymentMethod>().unwrap(), PaymentMethod::Wechat);
        assert_eq!("alipay".parse::<PaymentMethod>().unwrap(), PaymentMethod::Alipay);
        assert!(matches!(
            "paypal".parse::<PaymentMethod>(),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn order_amounts_and_durations_must_be_positive() {
        assert!(order(1, 9.99).validate().is_ok());
        assert!(order(0, 9.99).validate().is_err());
        assert!(order(-3, 9.99).validate().is_err());
        assert!(order(1, 0.0).validate().is_err());
        assert!(order(1, -1.0).validate().is_err());
        assert!(order(1, f64::NAN).validate().is_err());
        assert!(order(1, f64::INFINITY).validate().is_err());
        assert!(order(1, 1e12).validate().is_err());
    }

    #[test]
    fn amounts_are_checked_after_rounding_to_cents() {
        assert!(matches!(
            order(1, 0.004).validate(),
            Err(AppError::InvalidArgument(_))
        ));
        assert!(matches!(
            order(1, 99_999_999.999).validate(),
            Err(AppError::InvalidArgument(_))
        ));

        let mut smallest = order(1, 0.005);
        smallest.validate().unwrap();
        assert_eq!(smallest.amount, 0.01);

        let mut rounded = order(1, 9.999);
        rounded.validate().unwrap();
        assert_eq!(rounded.amount, 10.0);
    }
}
