use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::UpdateMembership;

#[derive(Debug, Deserialize)]
pub struct CreateMembershipRequest {
    /// 仅管理员可为他人开通，或指定起止日期与状态
    pub user_id: Option<i64>,
    pub membership_type: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMembershipRequest {
    pub membership_type: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
}

impl From<UpdateMembershipRequest> for UpdateMembership {
    fn from(req: UpdateMembershipRequest) -> Self {
        UpdateMembership {
            membership_type: req.membership_type,
            start_date: req.start_date,
            end_date: req.end_date,
            status: req.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExpireResponse {
    pub expired: u64,
}
