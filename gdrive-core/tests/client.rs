use futures_util::StreamExt;
use gdrive_core::{ApiErrorClass, DriveClient, DriveError};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn list_children_page_sends_parents_query_and_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", "'folder-1' in parents"))
        .and(query_param("pageSize", "1000"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [
                {
                    "id": "f1",
                    "name": "a.txt",
                    "mimeType": "text/plain",
                    "modifiedTime": "2024-01-02T00:00:00.000Z",
                    "size": "12",
                    "md5Checksum": "5d41402abc4b2a76b9719d911017c592"
                },
                {
                    "id": "d1",
                    "name": "sub",
                    "mimeType": "application/vnd.google-apps.folder",
                    "modifiedTime": "2024-01-01T00:00:00.000Z"
                }
            ]
        })))
        .mount(&server)
        .await;

    let client = DriveClient::with_base_url(&server.uri(), "test-token").unwrap();
    let page = client
        .list_children_page("folder-1", 1000, None)
        .await
        .unwrap();

    assert!(page.next_page_token.is_none());
    assert_eq!(page.files.len(), 2);
    assert_eq!(page.files[0].name, "a.txt");
    assert_eq!(page.files[0].size_bytes(), Some(12));
    assert!(!page.files[0].is_folder());
    assert!(page.files[1].is_folder());
}

#[tokio::test]
async fn list_children_follows_next_page_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [
                {"id": "f2", "name": "b.txt", "mimeType": "text/plain"}
            ]
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nextPageToken": "page-2",
            "files": [
                {"id": "f1", "name": "a.txt", "mimeType": "text/plain"}
            ]
        })))
        .with_priority(2)
        .mount(&server)
        .await;

    let client = DriveClient::with_base_url(&server.uri(), "test-token").unwrap();
    let files = client.list_children("folder-1", 1).await.unwrap();

    let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
}

#[tokio::test]
async fn download_media_streams_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files/f1"))
        .and(query_param("alt", "media"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello world"))
        .mount(&server)
        .await;

    let client = DriveClient::with_base_url(&server.uri(), "test-token").unwrap();
    let download = client.download_media("f1").await.unwrap();
    assert_eq!(download.content_length(), Some(11));

    let mut stream = Box::pin(download.into_stream());
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(body, b"hello world");
}

#[tokio::test]
async fn download_media_maps_error_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("File not found"))
        .mount(&server)
        .await;

    let client = DriveClient::with_base_url(&server.uri(), "test-token").unwrap();
    let err = client.download_media("missing").await.err().unwrap();

    assert!(matches!(err, DriveError::Api { .. }));
    assert_eq!(err.classification(), Some(ApiErrorClass::Permanent));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn unauthorized_listing_is_classified_as_auth() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid Credentials"))
        .mount(&server)
        .await;

    let client = DriveClient::with_base_url(&server.uri(), "stale").unwrap();
    let err = client.list_children("folder-1", 1000).await.unwrap_err();

    assert_eq!(err.classification(), Some(ApiErrorClass::Auth));
}

#[tokio::test]
async fn get_file_returns_metadata() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files/f1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "f1",
            "name": "a.txt",
            "mimeType": "text/plain",
            "modifiedTime": "2024-01-02T00:00:00Z"
        })))
        .mount(&server)
        .await;

    let client = DriveClient::with_base_url(&server.uri(), "test-token").unwrap();
    let file = client.get_file("f1").await.unwrap();

    assert_eq!(file.id, "f1");
    assert!(file.modified_at().unwrap().is_some());
}

#[tokio::test]
async fn with_access_token_swaps_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files/root"))
        .and(header("authorization", "Bearer second-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "root-id",
            "name": "My Drive",
            "mimeType": "application/vnd.google-apps.folder"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let first = DriveClient::with_base_url(&server.uri(), "first-token").unwrap();
    let second = first.with_access_token("second-token");

    assert_eq!(second.get_file("root").await.unwrap().id, "root-id");
}
