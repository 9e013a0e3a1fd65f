use mirror_guard::{BranchLister, BranchSnapshot, HostError};
use mirror_guard_hosts::{GiteaClient, GiteaConfig};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> GiteaClient {
    GiteaClient::new(GiteaConfig {
        base_url: format!("{}/", server.uri()),
        token: Some("gitea-token".into()),
    })
}

fn branches(range: std::ops::Range<usize>) -> serde_json::Value {
    range
        .map(|i| json!({ "name": format!("b{i}"), "commit": { "id": format!("id{i}") } }))
        .collect()
}

#[tokio::test]
async fn lists_branches_with_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/mirror/web/branches"))
        .and(query_param("page", "1"))
        .and(query_param("limit", "50"))
        .and(header("Authorization", "Bearer gitea-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "main", "commit": { "id": "aaa", "message": "init" } }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let listed = client_for(&server).list_branches("mirror", "web").await.unwrap();
    assert_eq!(listed, vec![BranchSnapshot::new("main", "aaa")]);
}

#[tokio::test]
async fn follows_pages_of_fifty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/mirror/web/branches"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(branches(0..50)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/mirror/web/branches"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(branches(50..60)))
        .expect(1)
        .mount(&server)
        .await;

    let listed = client_for(&server).list_branches("mirror", "web").await.unwrap();
    assert_eq!(listed.len(), 60);
    assert_eq!(listed[59], BranchSnapshot::new("b59", "id59"));
}

#[tokio::test]
async fn unmirrored_repository_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/mirror/new/branches"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client_for(&server).list_branches("mirror", "new").await.unwrap_err();
    assert!(matches!(err, HostError::NotFound(_)), "got {err:?}");
}

#[tokio::test]
async fn unauthorized_is_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/mirror/web/branches"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token is required"))
        .mount(&server)
        .await;

    let err = client_for(&server).list_branches("mirror", "web").await.unwrap_err();
    assert!(matches!(err, HostError::Http { status: 401, .. }), "got {err:?}");
}
