use serde::{Deserialize, Serialize};

use crate::models::UserChanges;
use crate::services::RegistrationInput;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
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

impl From<RegisterRequest> for RegistrationInput {
    fn from(req: RegisterRequest) -> Self {
        RegistrationInput {
            username: req.username,
            password: req.password,
            full_name: req.full_name,
            email: req.email,
            phone_number: req.phone_number,
            security_question1: req.security_question1,
            security_answer1: req.security_answer1,
            security_question2: req.security_question2,
            security_answer2: req.security_answer2,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifySecurityRequest {
    pub username: String,
    pub answer1: String,
    pub answer2: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub reset_token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

impl From<UpdateProfileRequest> for UserChanges {
    fn from(req: UpdateProfileRequest) -> Self {
        UserChanges {
            full_name: req.full_name,
            email: req.email,
            phone_number: req.phone_number,
        }
    }
}
