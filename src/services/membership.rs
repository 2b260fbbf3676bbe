use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::{Membership, MembershipChanges, MembershipStatus, NewMembership, PlanTier};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct CreateMembership {
    pub user_id: i64,
    pub membership_type: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
}

/// 部分更新，`None` 字段保持原值
#[derive(Debug, Clone, Default)]
pub struct UpdateMembership {
    pub membership_type: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
}

/// 会员生命周期
///
/// 每个用户同时至多一条 `active` 记录。该约束最终由存储层保证，
/// 这里的预检查只用于给出更早、更明确的错误。过期判定是惰性的：
/// 读取或创建前先把已到期的 `active` 记录置为 `expired`。
#[derive(Clone)]
pub struct MembershipLifecycle {
    store: Arc<dyn Store>,
}

impl MembershipLifecycle {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn expire_for_user(&self, user_id: i64, now: DateTime<Utc>) -> Result<(), AppError> {
        let expired = self.store.expire_overdue(now, Some(user_id)).await?;
        if expired > 0 {
            tracing::info!(user_id, expired, "Expired overdue memberships");
        }
        Ok(())
    }

    pub async fn get_active(&self, user_id: i64) -> Result<Membership, AppError> {
        self.expire_for_user(user_id, Utc::now()).await?;

        let mut rows = self.store.find_active_memberships(user_id, 2).await?;
        match rows.len() {
            0 => Err(AppError::not_found("生效中的会员")),
            1 => Ok(rows.remove(0)),
            _ => {
                let ids: Vec<i64> = rows.iter().map(|m| m.membership_id).collect();
                tracing::error!(user_id, ?ids, "Multiple active memberships for one user");
                Err(AppError::Integrity(format!(
                    "user {} has more than one active membership",
                    user_id
                )))
            }
        }
    }

    pub async fn create(&self, input: CreateMembership) -> Result<Membership, AppError> {
        tracing::debug!(
            user_id = input.user_id,
            membership_type = %input.membership_type,
            "Creating membership"
        );

        let membership_type = PlanTier::parse(&input.membership_type)?;
        let status = match input.status.as_deref() {
            Some(raw) => raw.parse::<MembershipStatus>()?,
            None => MembershipStatus::Active,
        };
        let now = Utc::now();
        let start_date = input.start_date.unwrap_or(now);
        let end_date = match input.end_date {
            Some(end) => end,
            None => membership_type.default_end_date(start_date)?,
        };
        if end_date <= start_date {
            return Err(AppError::invalid("结束日期必须晚于开始日期"));
        }

        self.expire_for_user(input.user_id, now).await?;

        if status == MembershipStatus::Active
            && !self
                .store
                .find_active_memberships(input.user_id, 1)
                .await?
                .is_empty()
        {
            tracing::warn!(user_id = input.user_id, "User already has an active membership");
            return Err(AppError::conflict("该用户已有生效中的会员"));
        }

        let membership = self
            .store
            .insert_membership(&NewMembership {
                user_id: input.user_id,
                membership_type,
                start_date,
                end_date,
                status,
            })
            .await
            .inspect_err(|e| {
                tracing::warn!(user_id = input.user_id, error = %e, "Membership insert rejected");
            })?;

        tracing::info!(
            user_id = membership.user_id,
            membership_id = membership.membership_id,
            membership_type = %membership.membership_type,
            end_date = %membership.end_date,
            "Membership created"
        );
        Ok(membership)
    }

    pub async fn find(&self, membership_id: i64) -> Result<Membership, AppError> {
        self.store
            .find_membership(membership_id)
            .await?
            .ok_or_else(|| AppError::not_found("会员记录"))
    }

    pub async fn update(
        &self,
        membership_id: i64,
        update: UpdateMembership,
    ) -> Result<Membership, AppError> {
        let changes = MembershipChanges {
            membership_type: update
                .membership_type
                .as_deref()
                .map(PlanTier::parse)
                .transpose()?,
            start_date: update.start_date,
            end_date: update.end_date,
            status: update
                .status
                .as_deref()
                .map(str::parse::<MembershipStatus>)
                .transpose()?,
        };
        if changes.is_empty() {
            return Err(AppError::invalid("没有需要更新的字段"));
        }

        let current = self.find(membership_id).await?;

        if let Some(target) = changes.status {
            if !current.status.can_transition_to(target) {
                tracing::warn!(
                    membership_id,
                    from = %current.status,
                    to = %target,
                    "Illegal membership transition"
                );
                return Err(AppError::conflict(format!(
                    "会员状态不能从{}变更为{}",
                    current.status, target
                )));
            }
        }

        let start_date = changes.start_date.unwrap_or(current.start_date);
        let end_date = changes.end_date.unwrap_or(current.end_date);
        if end_date <= start_date {
            return Err(AppError::invalid("结束日期必须晚于开始日期"));
        }

        let membership = self
            .store
            .update_membership(membership_id, current.status, &changes)
            .await?;
        tracing::info!(membership_id, status = %membership.status, "Membership updated");
        Ok(membership)
    }

    /// 任何状态都取消为 cancelled；已取消的记录直接返回
    pub async fn cancel(&self, membership_id: i64) -> Result<Membership, AppError> {
        let cancel = MembershipChanges::status_only(MembershipStatus::Cancelled);
        let mut current = self.find(membership_id).await?;

        // 条件更新失败说明状态被并发修改，按最新状态重试一次
        for _ in 0..2 {
            if current.status == MembershipStatus::Cancelled {
                tracing::debug!(membership_id, "Cancel is a no-op");
                return Ok(current);
            }
            match self
                .store
                .update_membership(membership_id, current.status, &cancel)
                .await
            {
                Ok(membership) => {
                    tracing::info!(
                        membership_id,
                        user_id = membership.user_id,
                        previous = %current.status,
                        "Membership cancelled"
                    );
                    return Ok(membership);
                }
                Err(AppError::Conflict(_)) => current = self.find(membership_id).await?,
                Err(e) => return Err(e),
            }
        }

        if current.status == MembershipStatus::Cancelled {
            return Ok(current);
        }
        Err(AppError::conflict("会员状态已被修改，请重试"))
    }

    pub async fn delete(&self, membership_id: i64) -> Result<(), AppError> {
        self.store.delete_membership(membership_id).await?;
        tracing::info!(membership_id, "Membership deleted");
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<Membership>, AppError> {
        self.store.list_memberships().await
    }

    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let expired = self.store.expire_overdue(now, None).await?;
        tracing::info!(expired, "Expired overdue memberships");
        Ok(expired)
    }
}
