//! 认证能力：登录、登出、JWT 生成与校验。
//!
//! token 只携带身份（用户 ID 与用户名），不携带权限；
//! 权限在每个请求中由 `logbook-access` 依据存储的角色状态重新解析。

mod jwt;
mod password;

use domain::SessionContext;
use logbook_storage::{UserRecord, UserStore};
use std::sync::Arc;

pub use jwt::JwtManager;
pub use password::{
    MIN_PASSWORD_LEN, PasswordCheck, hash_new_password, hash_password,
    verify_password_and_maybe_upgrade,
};

/// 认证相关错误。
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("user inactive")]
    UserInactive,
    #[error("token expired")]
    TokenExpired,
    #[error("token invalid")]
    TokenInvalid,
    #[error("password must be at least {0} characters")]
    WeakPassword(usize),
    #[error("internal error: {0}")]
    Internal(String),
}

/// 登录/刷新返回的 token 结构。
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_jti: String,
    pub expires_at: u64,
}

/// 认证服务实现（基于 UserStore + JWT）。
pub struct AuthService {
    user_store: Arc<dyn UserStore>,
    jwt: JwtManager,
}

impl AuthService {
    pub fn new(user_store: Arc<dyn UserStore>, jwt: JwtManager) -> Self {
        Self { user_store, jwt }
    }

    /// 登录校验并签发 token；明文旧口令校验通过后升级为 argon2。
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(UserRecord, AuthTokens), AuthError> {
        let user = self
            .user_store
            .find_by_username(username)
            .await
            .map_err(|err| AuthError::Internal(err.to_string()))?
            .ok_or(AuthError::InvalidCredentials)?;
        let check = verify_password_and_maybe_upgrade(&user.password, password)?;
        if !check.verified {
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(AuthError::UserInactive);
        }
        if let Some(password_hash) = check.upgrade_hash {
            let updated = self
                .user_store
                .update_password_hash(&user.user_id, &password_hash)
                .await
                .map_err(|err| AuthError::Internal(err.to_string()))?;
            if !updated {
                return Err(AuthError::Internal("password migration update failed".to_string()));
            }
        }
        let session = SessionContext::new(user.user_id.clone(), user.username.clone());
        let tokens = self.jwt.issue_tokens(&session)?;
        self.bind_refresh(&session.user_id, Some(&tokens.refresh_jti))
            .await?;
        Ok((user, tokens))
    }

    /// 登出：作废当前 refresh token。
    pub async fn logout(&self, session: &SessionContext) -> Result<(), AuthError> {
        self.bind_refresh(&session.user_id, None).await
    }

    pub fn verify_access_token(&self, token: &str) -> Result<SessionContext, AuthError> {
        self.jwt.decode_access(token)
    }

    /// 使用 refresh token 换取新 token（单次有效）。
    pub async fn refresh(&self, token: &str) -> Result<AuthTokens, AuthError> {
        let (session, jti) = self.jwt.decode_refresh_with_jti(token)?;
        let stored = self
            .user_store
            .get_refresh_jti(&session.user_id)
            .await
            .map_err(|err| AuthError::Internal(err.to_string()))?;
        if stored.as_deref() != Some(jti.as_str()) {
            return Err(AuthError::TokenInvalid);
        }

        let tokens = self.jwt.issue_tokens(&session)?;
        self.bind_refresh(&session.user_id, Some(&tokens.refresh_jti))
            .await?;
        Ok(tokens)
    }

    async fn bind_refresh(&self, user_id: &str, jti: Option<&str>) -> Result<(), AuthError> {
        let updated = self
            .user_store
            .set_refresh_jti(user_id, jti)
            .await
            .map_err(|err| AuthError::Internal(err.to_string()))?;
        if !updated {
            return Err(AuthError::Internal("refresh token binding update failed".to_string()));
        }
        Ok(())
    }
}
