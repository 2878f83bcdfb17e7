use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use ftp_drop_lib::api::ApiService;
use serde_json::Value;
use sorng_ftp::ftp::testing::{FakeFtpServer, FakeUser};
use sorng_ftp::ftp::FtpConnectionConfig;
use sorng_ftp_drop::dropzone::{Connector, DropConfig, DropService, FtpConnector, MemoryConnector};
use std::sync::Arc;
use tower::ServiceExt;

const ALICE: &str = "Basic YWxpY2U6cHc="; // alice:pw
const ALICE_WRONG: &str = "Basic YWxpY2U6bm9wZQ=="; // alice:nope
const BOUNDARY: &str = "XBOUNDARYX";

fn memory_store() -> MemoryConnector {
    let conn = MemoryConnector::new().with_account("alice", "pw");
    conn.add_dir("/_template");
    conn.add_dir("/_template/Fotos");
    conn.add_dir("/_template/Videos");
    conn.add_dir("/Existing");
    conn.add_file("/notes.txt", b"hi");
    conn
}

fn router<C: Connector + 'static>(config: DropConfig, connector: C) -> Router {
    let service = DropService::new(Arc::new(config), connector);
    Arc::new(ApiService::new(service, 1024 * 1024)).create_router()
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, header::HeaderMap, Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

fn form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Multipart body from (field, filename, content) triples.
fn multipart(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, content) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match filename {
            Some(f) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    name, f
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(auth: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(header::AUTHORIZATION, auth)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let app = router(DropConfig::default(), memory_store());
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, _, body) = send(app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "ftp-drop");
}

#[tokio::test]
async fn wrong_password_gets_challenge_and_leaks_nothing() {
    let conn = memory_store();
    let app = router(DropConfig::default(), conn.clone());
    let (status, headers, body) = send(app, form("/api/login", "username=alice&password=nope")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers[header::WWW_AUTHENTICATE], "Basic realm=\"ftp-drop\"");
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["kind"], "authFailed");
    assert_eq!(conn.open_sessions(), 0);
}

#[tokio::test]
async fn login_with_basic_header() {
    let conn = memory_store();
    let app = router(DropConfig::default(), conn.clone());
    let req = Request::builder()
        .method("POST")
        .uri("/api/login")
        .header(header::AUTHORIZATION, ALICE)
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(app, req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["identity"], "alice");
    assert_eq!(body["data"]["mode"], "remote");
    assert_eq!(conn.sessions_opened(), 1);
    assert_eq!(conn.open_sessions(), 0);
}

#[tokio::test]
async fn browse_without_credentials_is_challenged() {
    let conn = memory_store();
    let app = router(DropConfig::default(), conn.clone());
    let req = Request::builder().uri("/api/browse").body(Body::empty()).unwrap();
    let (status, headers, _) = send(app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(headers.contains_key(header::WWW_AUTHENTICATE));
    assert_eq!(conn.sessions_opened(), 0);
}

#[tokio::test]
async fn browse_root_hides_template() {
    let app = router(DropConfig::default(), memory_store());
    let req = Request::builder()
        .uri("/api/browse?path=/")
        .header(header::AUTHORIZATION, ALICE)
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(app, req).await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Existing", "notes.txt"]);
    assert_eq!(body["data"]["parent"], Value::Null);
}

#[tokio::test]
async fn browse_missing_directory_is_404() {
    let app = router(DropConfig::default(), memory_store());
    let req = Request::builder()
        .uri("/api/browse?path=/Nope")
        .header(header::AUTHORIZATION, ALICE)
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "notFound");
}

#[tokio::test]
async fn browse_accepts_query_credentials() {
    let conn = memory_store();
    let app = router(DropConfig::default(), conn.clone());
    let req = Request::builder()
        .uri("/api/browse?path=/Existing&username=alice&password=pw")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(app, req).await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["path"], "/Existing");
    assert_eq!(conn.sessions_opened(), 1);
    assert_eq!(conn.open_sessions(), 0);
}

#[tokio::test]
async fn browse_with_wrong_query_password_is_challenged() {
    let conn = memory_store();
    let app = router(DropConfig::default(), conn.clone());
    let req = Request::builder()
        .uri("/api/browse?username=alice&password=nope")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(headers.contains_key(header::WWW_AUTHENTICATE));
    assert_eq!(conn.open_sessions(), 0);
}

#[tokio::test]
async fn create_folder_clones_template() {
    let conn = memory_store();
    let app = router(DropConfig::default(), conn.clone());
    let (status, _, body) = send(
        app,
        form("/api/folders", "parent=%2F&name=Team+Alpha&username=alice&password=pw"),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["path"], "/Team_Alpha");
    assert_eq!(body["data"]["outcome"], "created");
    assert!(conn.is_dir("/Team_Alpha/Fotos"));
    assert!(conn.is_dir("/Team_Alpha/Videos"));
}

#[tokio::test]
async fn create_existing_folder_is_ok() {
    let app = router(DropConfig::default(), memory_store());
    let (status, _, body) = send(
        app,
        form("/api/folders", "parent=%2F&name=Existing&username=alice&password=pw"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "existing");
}

#[tokio::test]
async fn create_under_missing_parent_is_404_without_mutation() {
    let conn = memory_store();
    let app = router(DropConfig::default(), conn.clone());
    let (status, _, _) = send(
        app,
        form("/api/folders", "parent=%2FX&name=Y&username=alice&password=pw"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(conn.mutations().is_empty());
}

#[tokio::test]
async fn create_over_file_is_conflict() {
    let conn = memory_store();
    let app = router(DropConfig::default(), conn.clone());
    let (status, _, body) = send(
        app,
        form("/api/folders", "parent=%2F&name=notes.txt&username=alice&password=pw"),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "nameConflict");
    assert_eq!(conn.file("/notes.txt").unwrap(), b"hi");
}

#[tokio::test]
async fn create_with_bad_name_is_400() {
    let app = router(DropConfig::default(), memory_store());
    let (status, _, body) = send(
        app,
        form("/api/folders", "parent=%2F&name=..&username=alice&password=pw"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "validation");
}

#[tokio::test]
async fn upload_reports_per_file_results() {
    let conn = memory_store();
    let app = router(DropConfig::default(), conn.clone());
    let body = multipart(&[
        ("folder", None, b"/Existing"),
        ("files", Some("a.pdf"), b"%PDF"),
        ("files", Some(""), b""),
    ]);
    let (status, _, body) = send(app, upload_request(ALICE, body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["succeeded"], 1);
    assert_eq!(body["data"]["failed"], 1);
    let results = body["data"]["results"].as_array().unwrap();
    assert_eq!(results[0]["status"], "success");
    assert_eq!(results[0]["remoteName"], "a.pdf");
    assert_eq!(results[1]["status"], "failure");
    assert_eq!(results[1]["kind"], "validation");
    assert_eq!(results[1]["message"], "no filename");
    assert_eq!(conn.file("/Existing/a.pdf").unwrap(), b"%PDF");
    assert_eq!(conn.open_sessions(), 0);
}

#[tokio::test]
async fn large_upload_arrives_intact() {
    let conn = memory_store();
    let app = router(DropConfig::default(), conn.clone());
    let payload: Vec<u8> = (0..600 * 1024).map(|i| (i % 251) as u8).collect();
    let body = multipart(&[
        ("files", Some("big.bin"), payload.as_slice()),
        ("folder", None, b"/Existing"),
    ]);
    let (status, _, body) = send(app, upload_request(ALICE, body)).await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["results"][0]["bytes"], 600 * 1024);
    assert_eq!(conn.file("/Existing/big.bin").unwrap(), payload);
}

#[tokio::test]
async fn upload_without_files_part_is_400() {
    let conn = memory_store();
    let app = router(DropConfig::default(), conn.clone());
    let body = multipart(&[("folder", None, b"/Existing")]);
    let (status, _, body) = send(app, upload_request(ALICE, body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "No files part in the request");
    assert_eq!(conn.sessions_opened(), 0);
}

#[tokio::test]
async fn upload_into_missing_folder_is_404() {
    let conn = memory_store();
    let app = router(DropConfig::default(), conn.clone());
    let body = multipart(&[("folder", None, b"/Gone"), ("files", Some("a.txt"), b"a")]);
    let (status, _, _) = send(app, upload_request(ALICE, body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(conn.open_sessions(), 0);
}

#[tokio::test]
async fn upload_with_wrong_password_is_challenged() {
    let conn = memory_store();
    let app = router(DropConfig::default(), conn.clone());
    let body = multipart(&[("folder", None, b"/Existing"), ("files", Some("a.txt"), b"a")]);
    let (status, headers, _) = send(app, upload_request(ALICE_WRONG, body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(headers.contains_key(header::WWW_AUTHENTICATE));
    assert!(conn.file("/Existing/a.txt").is_none());
    assert_eq!(conn.open_sessions(), 0);
}

#[tokio::test]
async fn upload_over_loopback_ftp() {
    let server = FakeFtpServer::start(vec![FakeUser::new("dana", "pw")], false).await;
    server.add_dir("/drop");
    server.add_dir("/drop/Event");
    let connector = FtpConnector::new(FtpConnectionConfig {
        host: "127.0.0.1".into(),
        port: server.port(),
        connect_timeout_sec: 5,
        command_timeout_sec: 5,
        data_timeout_sec: 5,
        ..Default::default()
    });
    let config = DropConfig {
        base_directory: "/drop".into(),
        ..Default::default()
    };
    let app = router(config, connector);
    let body = multipart(&[
        ("folder", None, b"/Event"),
        ("files", Some("Mein Foto.jpg"), b"jpegdata"),
    ]);
    let (status, _, body) = send(app, upload_request("Basic ZGFuYTpwdw==", body)).await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["results"][0]["remoteName"], "Mein_Foto.jpg");
    assert_eq!(server.file("/drop/Event/Mein_Foto.jpg").unwrap(), b"jpegdata");
    assert_eq!(server.session_counts(), (1, 1));
}
