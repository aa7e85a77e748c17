use gdrive_core::{ClientSecrets, OAuthClient, OAuthError};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn authorize_url_includes_required_params() {
    let client = OAuthClient::with_endpoints(
        "https://accounts.example/o/oauth2/auth",
        "https://oauth2.example/token",
        "client-id",
        "secret",
    )
    .expect("client should build");
    let url = client.authorize_url(
        "http://127.0.0.1:8080/",
        &["https://www.googleapis.com/auth/drive.readonly"],
        Some("state-1"),
    );

    assert_eq!(url.path(), "/o/oauth2/auth");
    let query = url.query().unwrap_or_default();
    assert!(query.contains("response_type=code"));
    assert!(query.contains("client_id=client-id"));
    assert!(query.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A8080%2F"));
    assert!(query.contains("scope=https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fdrive.readonly"));
    assert!(query.contains("access_type=offline"));
    assert!(query.contains("state=state-1"));
}

#[test]
fn from_secrets_uses_registered_endpoints() {
    let secrets = ClientSecrets {
        client_id: "cid".into(),
        client_secret: "cs".into(),
        auth_uri: Some("https://auth.example/authorize".into()),
        token_uri: Some("https://auth.example/token".into()),
    };
    let client = OAuthClient::from_secrets(&secrets).unwrap();
    let url = client.authorize_url("http://127.0.0.1:1/", &[], None);

    assert_eq!(url.host_str(), Some("auth.example"));
    assert!(url.query().unwrap_or_default().contains("client_id=cid"));
}

#[tokio::test]
async fn exchange_code_posts_form_data() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code"))
        .and(body_string_contains("client_id=client-id"))
        .and(body_string_contains("client_secret=secret"))
        .and(body_string_contains(
            "redirect_uri=http%3A%2F%2F127.0.0.1%3A8080%2F",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "token",
            "token_type": "Bearer",
            "expires_in": 3599,
            "refresh_token": "refresh",
            "scope": "https://www.googleapis.com/auth/drive"
        })))
        .mount(&server)
        .await;

    let client = OAuthClient::with_endpoints(
        &format!("{}/auth", server.uri()),
        &format!("{}/token", server.uri()),
        "client-id",
        "secret",
    )
    .unwrap();
    let token = client
        .exchange_code("auth-code", "http://127.0.0.1:8080/")
        .await
        .unwrap();

    assert_eq!(token.access_token, "token");
    assert_eq!(token.token_type, "Bearer");
    assert_eq!(token.expires_in, Some(3599));
    assert_eq!(token.refresh_token.as_deref(), Some("refresh"));
}

#[tokio::test]
async fn refresh_token_reports_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant"
        })))
        .mount(&server)
        .await;

    let client = OAuthClient::with_endpoints(
        &format!("{}/auth", server.uri()),
        &format!("{}/token", server.uri()),
        "client-id",
        "secret",
    )
    .unwrap();
    let err = client.refresh_token("revoked").await.unwrap_err();

    match err {
        OAuthError::Api { status, body } => {
            assert_eq!(status.as_u16(), 400);
            assert!(body.contains("invalid_grant"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
