use domain::SessionContext;
use logbook_auth::{AuthError, JwtManager};

#[test]
fn jwt_carries_identity_only() {
    let jwt = JwtManager::new("secret".to_string(), 3600, 7200);
    let session = SessionContext::new("user-1", "dana");

    let tokens = jwt.issue_tokens(&session).expect("tokens");
    let access = jwt.decode_access(&tokens.access_token).expect("access");
    let refresh = jwt.decode_refresh(&tokens.refresh_token).expect("refresh");

    assert_eq!(access, session);
    assert_eq!(refresh.user_id, "user-1");
}

#[test]
fn token_types_are_not_interchangeable() {
    let jwt = JwtManager::new("secret".to_string(), 3600, 7200);
    let tokens = jwt
        .issue_tokens(&SessionContext::new("user-1", "dana"))
        .expect("tokens");

    assert!(matches!(
        jwt.decode_access(&tokens.refresh_token),
        Err(AuthError::TokenInvalid)
    ));
    assert!(matches!(
        jwt.decode_refresh(&tokens.access_token),
        Err(AuthError::TokenInvalid)
    ));
}

#[test]
fn foreign_signature_is_rejected() {
    let issuer = JwtManager::new("secret-a".to_string(), 3600, 7200);
    let verifier = JwtManager::new("secret-b".to_string(), 3600, 7200);
    let tokens = issuer
        .issue_tokens(&SessionContext::new("user-1", "dana"))
        .expect("tokens");
    assert!(verifier.decode_access(&tokens.access_token).is_err());
}
