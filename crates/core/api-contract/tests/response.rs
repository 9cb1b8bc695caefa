use api_contract::ApiResponse;

#[test]
fn api_response_success() {
    let response = ApiResponse::success("ok");
    assert!(response.success);
    assert!(response.data.is_some());
    assert!(response.error.is_none());
}

#[test]
fn api_response_error() {
    let response = ApiResponse::<()>::error("ASSET.NOT_FOUND", "asset not found: J99");
    assert!(!response.success);
    assert!(response.data.is_none());
    assert!(response.error.is_some());
}

#[test]
fn api_response_failure_keeps_data() {
    let response = ApiResponse::failure("CONNECT.FAILED", "J65: LINK ERROR", 42);
    assert!(!response.success);
    assert_eq!(response.data, Some(42));
    assert_eq!(response.error.unwrap().code, "CONNECT.FAILED");
}
