use std::sync::Arc;

use bcrypt::{hash, verify};

use crate::error::AppError;

/// 密码与密保答案的哈希/校验
///
/// 校验失败、哈希格式损坏、校验过程出错一律返回 `false`，
/// 调用方无法也不应区分这几种情况。
#[derive(Clone)]
pub struct CredentialManager {
    cost: u32,
    // 用户不存在时用于消耗同等时间的占位哈希
    dummy_hash: Arc<str>,
}

impl CredentialManager {
    pub fn new(cost: u32) -> Result<Self, AppError> {
        let dummy_hash = hash(b"placeholder-credential", cost)
            .map_err(|e| AppError::Crypto(e.to_string()))?;

        Ok(Self {
            cost,
            dummy_hash: dummy_hash.into(),
        })
    }

    pub fn hash_secret(&self, plaintext: &str) -> Result<String, AppError> {
        hash(plaintext.as_bytes(), self.cost).map_err(|e| {
            tracing::error!(error = %e, "Failed to hash secret");
            AppError::Crypto(e.to_string())
        })
    }

    pub fn verify_secret(&self, plaintext: &str, hashed: &str) -> bool {
        match verify(plaintext.as_bytes(), hashed) {
            Ok(valid) => valid,
            Err(e) => {
                tracing::debug!(error = %e, "Secret verification errored, treating as mismatch");
                false
            }
        }
    }

    /// 对不存在的账号执行一次等价校验，结果总是 `false`
    pub fn verify_against_dummy(&self, plaintext: &str) -> bool {
        let _ = self.verify_secret(plaintext, &self.dummy_hash);
        false
    }

    /// 在阻塞线程池中计算哈希，避免占用异步执行器
    pub async fn hash_secret_blocking(&self, plaintext: String) -> Result<String, AppError> {
        let manager = self.clone();
        tokio::task::spawn_blocking(move || manager.hash_secret(&plaintext))
            .await
            .map_err(|e| AppError::Crypto(e.to_string()))?
    }

    pub async fn verify_secret_blocking(&self, plaintext: String, hashed: String) -> bool {
        let manager = self.clone();
        tokio::task::spawn_blocking(move || manager.verify_secret(&plaintext, &hashed))
            .await
            .unwrap_or(false)
    }

    pub async fn verify_against_dummy_blocking(&self, plaintext: String) -> bool {
        let manager = self.clone();
        tokio::task::spawn_blocking(move || manager.verify_against_dummy(&plaintext))
            .await
            .unwrap_or(false)
    }
}

/// 密保答案在哈希前统一规范化
pub fn normalize_answer(answer: &str) -> String {
    answer.trim().to_lowercase()
}
