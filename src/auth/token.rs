use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// 会话令牌有效期固定为24小时
pub const TOKEN_TTL_HOURS: i64 = 24;

const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // 用户ID
    pub iat: i64,    // 签发时间
    pub exp: i64,    // 过期时间
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// 无状态的 HS256 会话令牌签发与校验。
///
/// 密钥在进程启动时注入，之后不可变；多实例部署时必须共享同一密钥。
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn issue_token(&self, user_id: i64) -> Result<IssuedToken, AppError> {
        self.issue_token_at(user_id, Utc::now())
    }

    pub fn issue_token_at(
        &self,
        user_id: i64,
        issued_at: DateTime<Utc>,
    ) -> Result<IssuedToken, AppError> {
        let expires_at = issued_at + Duration::hours(TOKEN_TTL_HOURS);
        let claims = Claims {
            sub: user_id.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding).map_err(|e| {
            tracing::error!(error = %e, user_id, "Failed to sign session token");
            AppError::Signing(e.to_string())
        })?;

        tracing::debug!(user_id, expires_at = %expires_at, "Issued session token");
        Ok(IssuedToken { token, expires_at })
    }

    /// 校验签名、算法与有效期，返回令牌中的用户ID
    pub fn validate_token(&self, token: &str) -> Result<i64, AppError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AppError::TokenExpired,
                _ => AppError::TokenInvalid,
            }
        })?;

        if data.claims.exp <= Utc::now().timestamp() {
            return Err(AppError::TokenExpired);
        }

        data.claims
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::TokenInvalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-signing-secret";

    #[test]
    fn fresh_token_resolves_to_its_user() {
        let service = TokenService::new(SECRET);
        let issued = service.issue_token(42).unwrap();

        assert_eq!(service.validate_token(&issued.token).unwrap(), 42);
        let ttl = issued.expires_at - Utc::now();
        assert!(ttl > Duration::hours(23) && ttl <= Duration::hours(24));
    }

    #[test]
    fn token_past_its_window_is_expired() {
        let service = TokenService::new(SECRET);
        let issued_at = Utc::now() - Duration::hours(TOKEN_TTL_HOURS) - Duration::seconds(5);
        let issued = service.issue_token_at(7, issued_at).unwrap();

        assert!(matches!(
            service.validate_token(&issued.token),
            Err(AppError::TokenExpired)
        ));
    }

    #[test]
    fn token_just_inside_its_window_is_valid() {
        let service = TokenService::new(SECRET);
        let issued_at = Utc::now() - Duration::hours(TOKEN_TTL_HOURS) + Duration::minutes(1);
        let issued = service.issue_token_at(7, issued_at).unwrap();

        assert_eq!(service.validate_token(&issued.token).unwrap(), 7);
    }

    #[test]
    fn altering_any_byte_invalidates_the_token() {
        let service = TokenService::new(SECRET);
        let token = service.issue_token(1001).unwrap().token;

        for (i, original) in token.char_indices() {
            let replacement = if original == 'A' { 'B' } else { 'A' };
            let mut tampered = token.clone();
            tampered.replace_range(i..i + original.len_utf8(), &replacement.to_string());

            assert!(
                matches!(service.validate_token(&tampered), Err(AppError::TokenInvalid)),
                "tampering at byte {i} was accepted"
            );
        }
    }

    #[test]
    fn token_signed_with_another_secret_is_invalid() {
        let issuer = TokenService::new("some-other-secret");
        let verifier = TokenService::new(SECRET);
        let token = issuer.issue_token(5).unwrap().token;

        assert!(matches!(
            verifier.validate_token(&token),
            Err(AppError::TokenInvalid)
        ));
    }

    #[test]
    fn token_signed_with_another_algorithm_is_invalid() {
        let service = TokenService::new(SECRET);
        let claims = Claims {
            sub: "5".into(),
            iat: Utc::now().timestamp(),
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            service.validate_token(&token),
            Err(AppError::TokenInvalid)
        ));
    }

    #[test]
    fn garbage_is_invalid_not_expired() {
        let service = TokenService::new(SECRET);
        for token in ["", "abc", "a.b.c", "..", "Bearer x.y.z"] {
            assert!(matches!(
                service.validate_token(token),
                Err(AppError::TokenInvalid)
            ));
        }
    }

    #[test]
    fn non_numeric_subject_is_invalid() {
        let service = TokenService::new(SECRET);
        let claims = Claims {
            sub: "alice".into(),
            iat: Utc::now().timestamp(),
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
        };
        let token = encode(
            &Header::new(SIGNING_ALGORITHM),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            service.validate_token(&token),
            Err(AppError::TokenInvalid)
        ));
    }
}
