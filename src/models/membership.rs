use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// 会员状态
///
/// `active -> expired`、`active -> cancelled`、`expired -> cancelled` 是仅有的状态迁移，
/// 结束的记录不会回到 `active`。续费会创建新的会员记录。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Active,
    Expired,
    Cancelled,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Active => "active",
            MembershipStatus::Expired => "expired",
            MembershipStatus::Cancelled => "cancelled",
        }
    }

    /// 保持原状态视为合法（无操作）；已过期的记录仍可被取消
    pub fn can_transition_to(&self, target: MembershipStatus) -> bool {
        use MembershipStatus::*;
        matches!(
            (self, target),
            (Active, Active)
                | (Active, Expired)
                | (Active, Cancelled)
                | (Expired, Expired)
                | (Expired, Cancelled)
                | (Cancelled, Cancelled)
        )
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(MembershipStatus::Active),
            "expired" => Ok(MembershipStatus::Expired),
            "cancelled" => Ok(MembershipStatus::Cancelled),
            other => Err(AppError::invalid(format!("未知的会员状态: {}", other))),
        }
    }
}

/// 会员等级，决定默认订阅时长
///
/// 除 basic/premium/vip 外的等级名按自定义等级保存，默认时长与 basic 相同。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PlanTier {
    Basic,
    Premium,
    Vip,
    Custom(String),
}

const MAX_TIER_NAME_LEN: usize = 32;

impl PlanTier {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let name = raw.trim().to_lowercase();
        match name.as_str() {
            "" => Err(AppError::invalid("会员类型不能为空")),
            "basic" => Ok(PlanTier::Basic),
            "premium" => Ok(PlanTier::Premium),
            "vip" => Ok(PlanTier::Vip),
            _ if name.len() > MAX_TIER_NAME_LEN
                || !name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') =>
            {
                Err(AppError::invalid(format!("会员类型格式无效: {}", raw)))
            }
            _ => Ok(PlanTier::Custom(name)),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PlanTier::Basic => "basic",
            PlanTier::Premium => "premium",
            PlanTier::Vip => "vip",
            PlanTier::Custom(name) => name,
        }
    }

    /// 未指定结束日期时的默认订阅月数
    pub fn default_term_months(&self) -> u32 {
        match self {
            PlanTier::Basic => 1,
            PlanTier::Premium => 3,
            PlanTier::Vip => 12,
            PlanTier::Custom(_) => 1,
        }
    }

    pub fn default_end_date(&self, start: DateTime<Utc>) -> Result<DateTime<Utc>, AppError> {
        start
            .checked_add_months(Months::new(self.default_term_months()))
            .ok_or_else(|| AppError::invalid("开始日期超出可表示范围"))
    }
}

impl From<PlanTier> for String {
    fn from(tier: PlanTier) -> Self {
        tier.as_str().to_string()
    }
}

impl TryFrom<String> for PlanTier {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PlanTier::parse(&value)
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Membership {
    pub membership_id: i64,
    pub user_id: i64,
    pub membership_type: PlanTier,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: MembershipStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == MembershipStatus::Active && self.end_date <= now
    }
}

#[derive(Debug, Clone)]
pub struct NewMembership {
    pub user_id: i64,
    pub membership_type: PlanTier,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: MembershipStatus,
}

/// 会员记录的部分更新，`None` 表示保持原值
#[derive(Debug, Clone, Default)]
pub struct MembershipChanges {
    pub membership_type: Option<PlanTier>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<MembershipStatus>,
}

impl MembershipChanges {
    pub fn is_empty(&self) -> bool {
        self.membership_type.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.status.is_none()
    }

    pub fn status_only(status: MembershipStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 8, 30, 0).unwrap()
    }

    #[test]
    fn default_terms_follow_the_tier_table() {
        let start = at(2025, 3, 15);
        assert_eq!(PlanTier::Basic.default_end_date(start).unwrap(), at(2025, 4, 15));
        assert_eq!(PlanTier::Premium.default_end_date(start).unwrap(), at(2025, 6, 15));
        assert_eq!(PlanTier::Vip.default_end_date(start).unwrap(), at(2026, 3, 15));
        assert_eq!(
            PlanTier::parse("gold").unwrap().default_end_date(start).unwrap(),
            at(2025, 4, 15)
        );
    }

    #[test]
    fn month_end_is_clamped() {
        assert_eq!(
            PlanTier::Basic.default_end_date(at(2025, 1, 31)).unwrap(),
            at(2025, 2, 28)
        );
        assert_eq!(
            PlanTier::Premium.default_end_date(at(2023, 11, 30)).unwrap(),
            at(2024, 2, 29)
        );
    }

    #[test]
    fn tier_names_are_normalized() {
        assert_eq!(PlanTier::parse(" VIP ").unwrap(), PlanTier::Vip);
        assert_eq!(
            PlanTier::parse("Gold").unwrap(),
            PlanTier::Custom("gold".into())
        );
        assert!(PlanTier::parse("").is_err());
        assert!(PlanTier::parse("two words").is_err());
        assert!(PlanTier::parse(&"x".repeat(33)).is_err());
    }

    #[test]
    fn ended_memberships_never_return_to_active() {
        use MembershipStatus::*;
        assert!(Active.can_transition_to(Expired));
        assert!(Active.can_transition_to(Cancelled));
        assert!(!Expired.can_transition_to(Active));
        assert!(!Cancelled.can_transition_to(Active));
        assert!(Expired.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Expired));
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            MembershipStatus::Active,
            MembershipStatus::Expired,
            MembershipStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<MembershipStatus>().unwrap(), status);
        }
        assert!("paused".parse::<MembershipStatus>().is_err());
    }

    #[test]
    fn overdue_only_applies_to_active_rows() {
        let now = at(2025, 5, 1);
        let mut m = Membership {
            membership_id: 1,
            user_id: 1,
            membership_type: PlanTier::Basic,
            start_date: at(2025, 3, 1),
            end_date: at(2025, 4, 1),
            status: MembershipStatus::Active,
            created_at: now,
            updated_at: now,
        };
        assert!(m.is_overdue(now));
        m.status = MembershipStatus::Cancelled;
        assert!(!m.is_overdue(now));
    }
}
