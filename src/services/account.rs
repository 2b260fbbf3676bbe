use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::{
    CredentialManager, ResetTokenRecord, ResetTokenStore, TokenService, generate_reset_token,
    normalize_answer, reset_token_digest,
};
use crate::error::AppError;
use crate::models::{NewUser, User, UserChanges};
use crate::store::Store;

const MAX_USERNAME_LEN: usize = 64;
// bcrypt 只使用前 72 字节
const MAX_PASSWORD_BYTES: usize = 72;

const LOGIN_FAILED: &str = "用户名或密码错误";
const SECURITY_FAILED: &str = "用户名或密保答案错误";
const RESET_TOKEN_REJECTED: &str = "重置令牌无效或已过期";

#[derive(Debug, Clone)]
pub struct RegistrationInput {
    pub username: String,
    pub password: String,
    pub full_name: Option<String>,
    pub email: String,
    pub phone_number: String,
    pub security_question1: String,
    pub security_answer1: String,
    pub security_question2: String,
    pub security_answer2: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub token: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetTicket {
    pub reset_token: String,
    pub expires_at: DateTime<Utc>,
}

/// 对外展示的用户资料，不含任何哈希字段
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserProfile {
    pub user_id: i64,
    pub username: String,
    pub full_name: Option<String>,
    pub email: String,
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        UserProfile {
            user_id: user.user_id,
            username: user.username,
            full_name: user.full_name,
            email: user.email,
            phone_number: user.phone_number,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

fn require(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::invalid(format!("{}不能为空", field)));
    }
    Ok(())
}

fn validate_username(username: &str) -> Result<(), AppError> {
    if username.is_empty()
        || username.chars().count() > MAX_USERNAME_LEN
        || !username.chars().all(|c| c.is_alphanumeric() || c == '_')
    {
        return Err(AppError::invalid("用户名须为1-64位字母、数字或下划线"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AppError> {
    require(password, "密码")?;
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AppError::invalid("密码过长"));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AppError> {
    require(email, "邮箱")?;
    if !email.contains('@') {
        return Err(AppError::invalid("邮箱格式无效"));
    }
    Ok(())
}

/// 账号注册、登录、资料维护与密保找回
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn Store>,
    credentials: CredentialManager,
    tokens: TokenService,
    reset_tokens: Arc<dyn ResetTokenStore>,
    reset_token_ttl: Duration,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn Store>,
        credentials: CredentialManager,
        tokens: TokenService,
        reset_tokens: Arc<dyn ResetTokenStore>,
        reset_token_ttl: Duration,
    ) -> Self {
        Self {
            store,
            credentials,
            tokens,
            reset_tokens,
            reset_token_ttl,
        }
    }

    pub async fn register(&self, input: RegistrationInput) -> Result<User, AppError> {
        tracing::debug!(username = %input.username, "Registering user");

        validate_username(&input.username)?;
        validate_password(&input.password)?;
        validate_email(&input.email)?;
        require(&input.phone_number, "手机号")?;
        require(&input.security_question1, "密保问题1")?;
        require(&input.security_answer1, "密保答案1")?;
        require(&input.security_question2, "密保问题2")?;
        require(&input.security_answer2, "密保答案2")?;

        let password_hash = self
            .credentials
            .hash_secret_blocking(input.password)
            .await?;
        let security_answer1_hash = self
            .credentials
            .hash_secret_blocking(normalize_answer(&input.security_answer1))
            .await?;
        let security_answer2_hash = self
            .credentials
            .hash_secret_blocking(normalize_answer(&input.security_answer2))
            .await?;

        let new_user = NewUser {
            username: input.username,
            full_name: input
                .full_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            email: input.email.trim().to_string(),
            phone_number: input.phone_number.trim().to_string(),
            password_hash,
            security_question1: input.security_question1,
            security_answer1_hash,
            security_question2: input.security_question2,
            security_answer2_hash,
        };

        match self.store.insert_user(&new_user).await {
            Ok(user) => {
                tracing::info!(user_id = user.user_id, "User registered");
                Ok(user)
            }
            Err(e) => {
                tracing::warn!(username = %new_user.username, error = %e, "Registration rejected");
                Err(e)
            }
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AppError> {
        let user = self.store.find_user_by_username(username).await?;

        let Some(user) = user else {
            self.credentials
                .verify_against_dummy_blocking(password.to_string())
                .await;
            tracing::warn!("Login failed: unknown username");
            return Err(AppError::Unauthorized(LOGIN_FAILED.into()));
        };

        let valid = self
            .credentials
            .verify_secret_blocking(password.to_string(), user.password_hash.clone())
            .await;
        if !valid {
            tracing::warn!(user_id = user.user_id, "Login failed: wrong password");
            return Err(AppError::Unauthorized(LOGIN_FAILED.into()));
        }

        let issued = self.tokens.issue_token(user.user_id)?;
        tracing::info!(user_id = user.user_id, "User logged in");

        Ok(LoginOutcome {
            token: issued.token,
            user_id: user.user_id,
            expires_at: issued.expires_at,
        })
    }

    pub async fn get_profile(&self, user_id: i64) -> Result<UserProfile, AppError> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .map(UserProfile::from)
            .ok_or_else(|| AppError::not_found("用户"))
    }

    pub async fn update_profile(
        &self,
        user_id: i64,
        changes: UserChanges,
    ) -> Result<UserProfile, AppError> {
        if changes.is_empty() {
            return Err(AppError::invalid("没有需要更新的字段"));
        }
        if let Some(email) = &changes.email {
            validate_email(email)?;
        }
        if let Some(phone_number) = &changes.phone_number {
            require(phone_number, "手机号")?;
        }

        let changes = UserChanges {
            full_name: changes.full_name.map(|n| n.trim().to_string()),
            email: changes.email.map(|e| e.trim().to_string()),
            phone_number: changes.phone_number.map(|p| p.trim().to_string()),
        };

        let user = self.store.update_user(user_id, &changes).await?;
        tracing::info!(user_id, "User profile updated");
        Ok(user.into())
    }

    pub async fn delete_user(&self, user_id: i64) -> Result<(), AppError> {
        self.store.delete_user(user_id).await?;
        tracing::info!(user_id, "User deleted");
        Ok(())
    }

    /// 两个密保答案都正确时签发一次性重置令牌
    pub async fn verify_security(
        &self,
        username: &str,
        answer1: &str,
        answer2: &str,
    ) -> Result<ResetTicket, AppError> {
        let user = self.store.find_user_by_username(username).await?;

        let Some(user) = user else {
            self.credentials
                .verify_against_dummy_blocking(normalize_answer(answer1))
                .await;
            self.credentials
                .verify_against_dummy_blocking(normalize_answer(answer2))
                .await;
            tracing::warn!("Security verification failed: unknown username");
            return Err(AppError::Unauthorized(SECURITY_FAILED.into()));
        };

        // 两个答案都要校验，避免通过耗时判断哪一个答错
        let first = self
            .credentials
            .verify_secret_blocking(normalize_answer(answer1), user.security_answer1_hash.clone())
            .await;
        let second = self
            .credentials
            .verify_secret_blocking(normalize_answer(answer2), user.security_answer2_hash.clone())
            .await;
        if !(first && second) {
            tracing::warn!(user_id = user.user_id, "Security verification failed: wrong answers");
            return Err(AppError::Unauthorized(SECURITY_FAILED.into()));
        }

        let reset_token = generate_reset_token();
        let expires_at = Utc::now()
            + chrono::Duration::from_std(self.reset_token_ttl)
                .map_err(|e| AppError::invalid(e.to_string()))?;
        let record = ResetTokenRecord {
            user_id: user.user_id,
            expires_at,
        };
        self.reset_tokens
            .save(&reset_token_digest(&reset_token), &record, self.reset_token_ttl)
            .await?;

        tracing::info!(user_id = user.user_id, "Reset token issued");
        Ok(ResetTicket {
            reset_token,
            expires_at,
        })
    }

    pub async fn reset_password(
        &self,
        reset_token: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        // 先校验新密码，避免无效输入消耗掉令牌
        validate_password(new_password)?;

        let record = self
            .reset_tokens
            .take(&reset_token_digest(reset_token))
            .await?
            .filter(|r| r.expires_at > Utc::now());
        let Some(record) = record else {
            tracing::warn!("Password reset rejected: unknown or expired token");
            return Err(AppError::Unauthorized(RESET_TOKEN_REJECTED.into()));
        };

        let password_hash = self
            .credentials
            .hash_secret_blocking(new_password.to_string())
            .await?;
        match self
            .store
            .update_password_hash(record.user_id, &password_hash)
            .await
        {
            Ok(()) => {
                tracing::info!(user_id = record.user_id, "Password reset");
                Ok(())
            }
            Err(AppError::NotFound(_)) => {
                tracing::warn!(user_id = record.user_id, "Password reset for deleted user");
                Err(AppError::Unauthorized(RESET_TOKEN_REJECTED.into()))
            }
            Err(e) => Err(e),
        }
    }
}
