use logbook_auth::{
    AuthError, MIN_PASSWORD_LEN, hash_new_password, hash_password,
    verify_password_and_maybe_upgrade,
};

#[test]
fn argon2_hash_verifies() {
    let hash = hash_password("admin123").expect("hash");
    let check = verify_password_and_maybe_upgrade(&hash, "admin123").expect("check");
    assert!(check.verified);
    assert!(check.upgrade_hash.is_none());
}

#[test]
fn legacy_plaintext_upgrades() {
    let check = verify_password_and_maybe_upgrade("admin123", "admin123").expect("check");
    assert!(check.verified);
    assert!(
        check
            .upgrade_hash
            .as_deref()
            .unwrap_or_default()
            .starts_with("$argon2")
    );
}

#[test]
fn wrong_password_rejected() {
    let check = verify_password_and_maybe_upgrade("admin123", "bad").expect("check");
    assert!(!check.verified);
    assert!(check.upgrade_hash.is_none());
}

#[test]
fn short_new_password_rejected() {
    let result = hash_new_password("short");
    assert!(matches!(result, Err(AuthError::WeakPassword(len)) if len == MIN_PASSWORD_LEN));
    assert!(hash_new_password("long-enough-secret").is_ok());
}
