use api_contract::{ApiResponse, codes};

#[test]
fn api_response_success() {
    let response = ApiResponse::success("ok");
    assert!(response.success);
    assert!(response.data.is_some());
    assert!(response.error.is_none());
}

#[test]
fn api_response_error() {
    let response = ApiResponse::<()>::error(codes::CONFLICT, "issue was modified");
    assert!(!response.success);
    assert!(response.data.is_none());
    let value = serde_json::to_value(&response).expect("serialize");
    assert_eq!(
        value.pointer("/error/code").and_then(|code| code.as_str()),
        Some("RESOURCE.CONFLICT")
    );
}
