use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Client as RedisClient};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::AppError;

const RESET_TOKEN_PREFIX: &str = "reset_token:";

/// 重置令牌绑定的服务端记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResetTokenRecord {
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

/// 生成一次性重置令牌（32位十六进制随机串）
pub fn generate_reset_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// 存储层只保存令牌摘要，不保存明文
pub fn reset_token_digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

#[async_trait]
pub trait ResetTokenStore: Send + Sync {
    async fn save(
        &self,
        digest: &str,
        record: &ResetTokenRecord,
        ttl: Duration,
    ) -> Result<(), AppError>;

    /// 原子地取出并删除，同一令牌只能被取出一次
    async fn take(&self, digest: &str) -> Result<Option<ResetTokenRecord>, AppError>;
}

pub struct RedisResetTokenStore {
    redis: Arc<RedisClient>,
}

impl RedisResetTokenStore {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl ResetTokenStore for RedisResetTokenStore {
    async fn save(
        &self,
        digest: &str,
        record: &ResetTokenRecord,
        ttl: Duration,
    ) -> Result<(), AppError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let json = serde_json::to_string(record).map_err(|e| {
            redis::RedisError::from((redis::ErrorKind::IoError, "序列化错误", e.to_string()))
        })?;

        let key = format!("{}{}", RESET_TOKEN_PREFIX, digest);
        let _: () = conn.set_ex(key, json, ttl.as_secs().max(1)).await?;

        Ok(())
    }

    async fn take(&self, digest: &str) -> Result<Option<ResetTokenRecord>, AppError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let key = format!("{}{}", RESET_TOKEN_PREFIX, digest);
        let result: Option<String> = conn.get_del(key).await?;

        match result {
            Some(json) => {
                let record = serde_json::from_str(&json).map_err(|e| {
                    redis::RedisError::from((
                        redis::ErrorKind::IoError,
                        "反序列化错误",
                        e.to_string(),
                    ))
                })?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }
}

/// 进程内实现，供测试与本地调试使用
#[derive(Default)]
pub struct MemoryResetTokenStore {
    records: Mutex<HashMap<String, ResetTokenRecord>>,
}

impl MemoryResetTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResetTokenStore for MemoryResetTokenStore {
    async fn save(
        &self,
        digest: &str,
        record: &ResetTokenRecord,
        _ttl: Duration,
    ) -> Result<(), AppError> {
        self.records
            .lock()
            .await
            .insert(digest.to_string(), record.clone());
        Ok(())
    }

    async fn take(&self, digest: &str) -> Result<Option<ResetTokenRecord>, AppError> {
        let record = self.records.lock().await.remove(digest);
        Ok(record.filter(|r| r.expires_at > Utc::now()))
    }
}
