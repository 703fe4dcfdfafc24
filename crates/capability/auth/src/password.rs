//! 口令哈希
//!
//! 新口令一律 argon2；存量数据中的明文口令在登录成功后升级。

use crate::AuthError;
use argon2::{
    Argon2,
    PasswordHash,
    PasswordHasher,
    PasswordVerifier,
    password_hash::SaltString,
};
use rand_core::OsRng;
use subtle::ConstantTimeEq;

/// 新建用户口令的最小长度。
pub const MIN_PASSWORD_LEN: usize = 8;

pub struct PasswordCheck {
    pub verified: bool,
    /// 明文口令校验通过时给出的 argon2 哈希，调用方负责写回。
    pub upgrade_hash: Option<String>,
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Internal(err.to_string()))
}

/// 管理端创建用户时使用：先检查长度再哈希。
pub fn hash_new_password(password: &str) -> Result<String, AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword(MIN_PASSWORD_LEN));
    }
    hash_password(password)
}

pub fn verify_password_and_maybe_upgrade(
    stored_password_hash: &str,
    password: &str,
) -> Result<PasswordCheck, AuthError> {
    if stored_password_hash.starts_with("$argon2") {
        let parsed = PasswordHash::new(stored_password_hash)
            .map_err(|err| AuthError::Internal(err.to_string()))?;
        let verified = Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok();
        return Ok(PasswordCheck {
            verified,
            upgrade_hash: None,
        });
    }

    let verified: bool = stored_password_hash
        .as_bytes()
        .ct_eq(password.as_bytes())
        .into();
    let upgrade_hash = if verified {
        Some(hash_password(password)?)
    } else {
        None
    };
    Ok(PasswordCheck {
        verified,
        upgrade_hash,
    })
}
