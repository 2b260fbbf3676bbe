use chrono::{DateTime, Utc};

/// 用户身份记录
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub full_name: Option<String>,
    pub email: String,
    pub phone_number: String,
    pub password_hash: String,
    pub security_question1: String,
    pub security_answer1_hash: String,
    pub security_question2: String,
    pub security_answer2_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 待写入的新用户，所有敏感字段均已哈希
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub full_name: Option<String>,
    pub email: String,
    pub phone_number: String,
    pub password_hash: String,
    pub security_question1: String,
    pub security_answer1_hash: String,
    pub security_question2: String,
    pub security_answer2_hash: String,
}

/// 资料的部分更新，`None` 表示保持原值
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.email.is_none() && self.phone_number.is_none()
    }
}
