use actix_web::http::StatusCode;
use permguard::config::{CommonConfig, GuardConfig};
use permguard::header;
use permguard::request::GuardRequest;
use permguard::stage::chain::Pipeline;
use permguard::stage::transaction::TRANSACTION_ID_PARAM;
use permguard::stage::Decision;
use wiremock::matchers::{header as header_matcher, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn build_pipeline(toml: &str) -> Pipeline {
    let mut cfg: GuardConfig = toml::from_str(toml).unwrap();
    cfg.complete().unwrap();
    cfg.build_pipeline().unwrap()
}

fn user_request(method: &str, permissions: &str) -> GuardRequest {
    GuardRequest::new(method)
        .with_header(header::IDENTITY, "user-1")
        .with_header(header::IDENTITY_TYPE, "oauth2")
        .with_header(header::AUTHORISED_TOKEN_PERMISSIONS, permissions)
}

#[tokio::test]
async fn test_company_accounts_pipeline() {
    let pipeline = build_pipeline(
        r#"
        [[stages]]
        type = "user_authentication"
        external_methods = ["GET", "POST", "PUT", "DELETE"]
        other_allowed_identity_types = ["oauth2"]

        [[stages]]
        type = "token_permissions"

        [[stages]]
        type = "permission"
        key = "company_number"

        [stages.mapping]
        default = "none"

        [[stages]]
        type = "permission"
        key = "company_accounts"
        ignored_methods = ["OPTIONS"]
        "#,
    );

    // Test case 1: crud permission held
    let req = user_request("PUT", "company_number=00006400 company_accounts=update");
    assert_eq!(pipeline.handle(&req).await.unwrap(), Decision::Continue);

    // Test case 2: crud permission missing
    let req = user_request("DELETE", "company_number=00006400 company_accounts=update");
    assert_eq!(
        pipeline.handle(&req).await.unwrap(),
        Decision::Halt(StatusCode::UNAUTHORIZED)
    );

    // Test case 3: OPTIONS is not an external method, so only internal users pass
    let req = user_request("OPTIONS", "");
    assert_eq!(
        pipeline.handle(&req).await.unwrap(),
        Decision::Halt(StatusCode::FORBIDDEN)
    );

    // Test case 4: malformed header fails the request
    let req = user_request("GET", "company_accounts=read,");
    assert!(pipeline.handle(&req).await.is_err());
}

#[tokio::test]
async fn test_disabled_token_permission_auth() {
    let pipeline = build_pipeline(
        r#"
        [permissions]
        enable_token_permission_auth = false

        [[stages]]
        type = "permission"
        key = "company_officers"

        [[stages]]
        type = "permission"
        key = "company_number"

        [stages.mapping]
        default = ["00006400"]
        "#,
    );

    let req = user_request("DELETE", "company_number=00006400");
    assert_eq!(pipeline.handle(&req).await.unwrap(), Decision::Continue);

    let req = user_request("DELETE", "company_number=00000001");
    assert_eq!(
        pipeline.handle(&req).await.unwrap(),
        Decision::Halt(StatusCode::UNAUTHORIZED)
    );
}

#[tokio::test]
async fn test_role_pipeline() {
    let pipeline = build_pipeline(
        r#"
        [[stages]]
        type = "role"
        role = "/admin/search"

        [[stages]]
        type = "role"
        role = "/admin/filings"
        deny_status = 403
        "#,
    );

    let req = user_request("GET", "").with_header(header::AUTHORISED_ROLES, "/admin/search");
    assert_eq!(
        pipeline.handle(&req).await.unwrap(),
        Decision::Halt(StatusCode::FORBIDDEN)
    );

    let req = user_request("GET", "").with_header(header::AUTHORISED_ROLES, "/admin/filings");
    assert_eq!(
        pipeline.handle(&req).await.unwrap(),
        Decision::Halt(StatusCode::UNAUTHORIZED)
    );

    let req = user_request("GET", "")
        .with_header(header::AUTHORISED_ROLES, "/admin/filings /admin/search");
    assert_eq!(pipeline.handle(&req).await.unwrap(), Decision::Continue);
}

#[tokio::test]
async fn test_transaction_pipeline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transactions/open-1"))
        .and(header_matcher(header::ACCESS_TOKEN, "caller-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "open-1",
            "status": "open"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/transactions/closed-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "closed-1",
            "status": "closed"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/transactions/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let pipeline = build_pipeline(&format!(
        r#"
        [transactions]
        api_url = "{}"

        [[stages]]
        type = "transaction"

        [[stages]]
        type = "open_transaction"
        "#,
        server.uri()
    ));

    let request = |method: &str, id: &str| {
        GuardRequest::new(method)
            .with_header(header::ACCESS_TOKEN, "caller-token")
            .with_path_param(TRANSACTION_ID_PARAM, id)
    };

    let req = request("PUT", "open-1");
    assert_eq!(pipeline.handle(&req).await.unwrap(), Decision::Continue);

    let req = request("PUT", "closed-1");
    assert_eq!(
        pipeline.handle(&req).await.unwrap(),
        Decision::Halt(StatusCode::FORBIDDEN)
    );

    let req = request("GET", "closed-1");
    assert_eq!(pipeline.handle(&req).await.unwrap(), Decision::Continue);

    let req = request("GET", "missing");
    assert_eq!(
        pipeline.handle(&req).await.unwrap(),
        Decision::Halt(StatusCode::NOT_FOUND)
    );
}
