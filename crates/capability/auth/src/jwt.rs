use crate::{AuthError, AuthTokens};
use domain::SessionContext;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

const ACCESS_TOKEN_TYPE: &str = "access";
const REFRESH_TOKEN_TYPE: &str = "refresh";

/// JWT claims：只有身份，没有权限。
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    username: String,
    iat: usize,
    exp: usize,
    token_type: String,
    jti: Option<String>,
}

impl Claims {
    fn session(&self) -> SessionContext {
        SessionContext::new(self.sub.clone(), self.username.clone())
    }
}

/// JWT 生成与校验（HS256）。
pub struct JwtManager {
    secret: Vec<u8>,
    access_ttl_seconds: u64,
    refresh_ttl_seconds: u64,
}

impl JwtManager {
    pub fn new(secret: String, access_ttl_seconds: u64, refresh_ttl_seconds: u64) -> Self {
        Self {
            secret: secret.into_bytes(),
            access_ttl_seconds,
            refresh_ttl_seconds,
        }
    }

    /// 签发 access/refresh token；refresh token 带新的 jti。
    pub fn issue_tokens(&self, session: &SessionContext) -> Result<AuthTokens, AuthError> {
        let access_token = self.encode(session, self.access_ttl_seconds, ACCESS_TOKEN_TYPE, None)?;
        let refresh_jti = Uuid::new_v4().to_string();
        let refresh_token = self.encode(
            session,
            self.refresh_ttl_seconds,
            REFRESH_TOKEN_TYPE,
            Some(refresh_jti.clone()),
        )?;
        Ok(AuthTokens {
            access_token,
            refresh_token,
            refresh_jti,
            expires_at: now_epoch_seconds() + self.access_ttl_seconds,
        })
    }

    pub fn decode_access(&self, token: &str) -> Result<SessionContext, AuthError> {
        Ok(self.decode_typed(token, ACCESS_TOKEN_TYPE)?.session())
    }

    pub fn decode_refresh(&self, token: &str) -> Result<SessionContext, AuthError> {
        Ok(self.decode_typed(token, REFRESH_TOKEN_TYPE)?.session())
    }

    pub fn decode_refresh_with_jti(
        &self,
        token: &str,
    ) -> Result<(SessionContext, String), AuthError> {
        let claims = self.decode_typed(token, REFRESH_TOKEN_TYPE)?;
        let session = claims.session();
        let jti = claims.jti.ok_or(AuthError::TokenInvalid)?;
        Ok((session, jti))
    }

    fn encode(
        &self,
        session: &SessionContext,
        ttl_seconds: u64,
        token_type: &str,
        jti: Option<String>,
    ) -> Result<String, AuthError> {
        let now = now_epoch_seconds();
        let claims = Claims {
            sub: session.user_id.clone(),
            username: session.username.clone(),
            iat: now as usize,
            exp: (now + ttl_seconds) as usize,
            token_type: token_type.to_string(),
            jti,
        };
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|err| AuthError::Internal(err.to_string()))
    }

    /// 解码并校验 token 类型，access 与 refresh 不可互换。
    fn decode_typed(&self, token: &str, expected_type: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        let claims = jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &validation,
        )
        .map_err(map_jwt_error)?
        .claims;
        if claims.token_type != expected_type {
            return Err(AuthError::TokenInvalid);
        }
        Ok(claims)
    }
}

fn now_epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::TokenInvalid,
    }
}
