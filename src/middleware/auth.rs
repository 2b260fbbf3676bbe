use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use crate::{AppState, error::AppError};

/// 经令牌校验后的调用方身份，由认证中间件注入请求扩展
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
    pub is_admin: bool,
}

impl AuthUser {
    /// 本人或管理员才能操作目标用户的数据
    pub fn ensure_can_access(&self, owner_id: i64) -> Result<(), AppError> {
        if self.user_id == owner_id || self.is_admin {
            Ok(())
        } else {
            tracing::warn!(
                user_id = self.user_id,
                owner_id,
                "Access to another user's data denied"
            );
            Err(AppError::Forbidden)
        }
    }

    pub fn ensure_admin(&self) -> Result<(), AppError> {
        if self.is_admin {
            Ok(())
        } else {
            tracing::warn!(user_id = self.user_id, "Admin operation denied");
            Err(AppError::Forbidden)
        }
    }

    /// 普通用户只能为自己操作，管理员可以指定目标用户
    pub fn resolve_target(&self, requested: Option<i64>) -> Result<i64, AppError> {
        match requested {
            Some(user_id) => {
                self.ensure_can_access(user_id)?;
                Ok(user_id)
            }
            None => Ok(self.user_id),
        }
    }
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(Authorization(bearer)) = req.headers().typed_get::<Authorization<Bearer>>() else {
        tracing::debug!("Missing or malformed bearer token");
        return AppError::Unauthorized("缺少认证令牌".into()).into_response();
    };

    match state.tokens.validate_token(bearer.token()) {
        Ok(user_id) => {
            let user = AuthUser {
                user_id,
                is_admin: state.config.is_admin(user_id),
            };
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owners_and_admins_pass_access_checks() {
        let alice = AuthUser {
            user_id: 1,
            is_admin: false,
        };
        let admin = AuthUser {
            user_id: 9,
            is_admin: true,
        };

        assert!(alice.ensure_can_access(1).is_ok());
        assert!(matches!(alice.ensure_can_access(2), Err(AppError::Forbidden)));
        assert!(admin.ensure_can_access(2).is_ok());
        assert!(alice.ensure_admin().is_err());

        assert_eq!(alice.resolve_target(None).unwrap(), 1);
        assert!(alice.resolve_target(Some(2)).is_err());
        assert_eq!(admin.resolve_target(Some(2)).unwrap(), 2);
    }
}
