//! Dispatcher tests against a local HTTP server

use std::sync::Arc;
use std::time::Duration;

use courier::{
    Auth, BackendConfig, BodyFormat, Dispatcher, Environment, Error, Method, OperationKind,
    OperationResult, RequestDescriptor, ReqwestBackend,
};
use http::StatusCode;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use wiremock::matchers::{body_bytes, body_json, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn dispatcher_for(server: &MockServer) -> Dispatcher {
    Dispatcher::reqwest(Environment::new(server.uri())).unwrap()
}

#[tokio::test]
async fn test_get_with_query_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("id", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "Ada", "roles": []})))
        .expect(1)
        .mount(&server)
        .await;

    let request = RequestDescriptor::builder("/users").parameter("id", "42").build();
    let result = dispatcher_for(&server).execute(request).await;

    match result {
        OperationResult::Json { value, response } => {
            assert_eq!(value, json!({"name": "Ada", "roles": null}));
            assert_eq!(response.status, StatusCode::OK);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_decode_into_model() {
    #[derive(Debug, Deserialize)]
    struct User {
        name: String,
        roles: Option<Vec<String>>,
    }

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "Ada", "roles": []})))
        .mount(&server)
        .await;

    let result = dispatcher_for(&server)
        .execute(RequestDescriptor::builder("/users/1").build())
        .await;
    let (user, _): (User, _) = result.decode().unwrap();

    assert_eq!(user.name, "Ada");
    assert!(user.roles.is_none());
}

#[tokio::test]
async fn test_array_body_is_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"tags": []}, {"tags": ["a"]}])),
        )
        .mount(&server)
        .await;

    let result = dispatcher_for(&server)
        .execute(RequestDescriptor::builder("/items").build())
        .await;

    assert_eq!(result.json(), Some(&json!([{"tags": null}, {"tags": ["a"]}])));
}

#[tokio::test]
async fn test_error_statuses() {
    let server = MockServer::start().await;
    Mock::given(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "nope"})))
        .mount(&server)
        .await;
    Mock::given(path("/broken"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(path("/moved"))
        .respond_with(ResponseTemplate::new(304))
        .mount(&server)
        .await;

    let dispatcher = dispatcher_for(&server);

    let result = dispatcher.execute(RequestDescriptor::builder("/missing").build()).await;
    assert!(matches!(result.as_error(), Some(Error::BadRequest(_))));
    assert_eq!(result.status(), Some(StatusCode::NOT_FOUND));

    let result = dispatcher.execute(RequestDescriptor::builder("/broken").build()).await;
    assert!(matches!(result.as_error(), Some(Error::ServerError(_))));
    assert_eq!(result.status(), Some(StatusCode::SERVICE_UNAVAILABLE));

    let result = dispatcher.execute(RequestDescriptor::builder("/moved").build()).await;
    assert!(matches!(result.as_error(), Some(Error::Unknown)));
}

#[tokio::test]
async fn test_no_content_is_no_data() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/users/1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let request = RequestDescriptor::builder("/users/1")
        .method(Method::Delete)
        .parameter("ignored", "yes")
        .build();
    let result = dispatcher_for(&server).execute(request).await;

    assert!(matches!(result.as_error(), Some(Error::NoData)));
    assert_eq!(result.status(), Some(StatusCode::NO_CONTENT));

    let received = server.received_requests().await.unwrap();
    assert!(received[0].body.is_empty());
    assert!(received[0].url.query().is_none());
}

#[tokio::test]
async fn test_malformed_json_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(path("/garbled"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"a\": "))
        .mount(&server)
        .await;

    let result = dispatcher_for(&server)
        .execute(RequestDescriptor::builder("/garbled").build())
        .await;

    assert!(matches!(result.as_error(), Some(Error::ParseError(_))));
    assert_eq!(result.status(), Some(StatusCode::OK));
}

#[tokio::test]
async fn test_post_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"name": "Ada", "age": 36})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 9})))
        .expect(1)
        .mount(&server)
        .await;

    let request = RequestDescriptor::builder("/users")
        .method(Method::Post)
        .parameter("name", "Ada")
        .parameter("age", 36)
        .build();
    let result = dispatcher_for(&server).execute(request).await;

    assert_eq!(result.status(), Some(StatusCode::CREATED));
    assert_eq!(result.json(), Some(&json!({"id": 9})));
}

#[tokio::test]
async fn test_post_url_encoded_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("user=ada%20lovelace"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let request = RequestDescriptor::builder("/login")
        .method(Method::Post)
        .body_format(BodyFormat::UrlEncoded)
        .parameter("user", "ada lovelace")
        .build();
    let result = dispatcher_for(&server).execute(request).await;

    assert!(result.is_success(), "{:?}", result);
}

#[tokio::test]
async fn test_url_encoded_non_string_is_rejected_before_sending() {
    let server = MockServer::start().await;

    let request = RequestDescriptor::builder("/login")
        .method(Method::Post)
        .body_format(BodyFormat::UrlEncoded)
        .parameter("attempts", 3)
        .build();
    let result = dispatcher_for(&server).execute(request).await;

    assert!(matches!(
        result,
        OperationResult::Error { error: Error::BadRequest(Some(_)), response: None }
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_request_headers_override_environment() {
    let server = MockServer::start().await;
    Mock::given(path("/me"))
        .and(header("x-client", "request"))
        .and(header("x-env-only", "yes"))
        .and(header("authorization", "Bearer per-request"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let environment = Environment::new(server.uri())
        .header("x-client", "environment")
        .unwrap()
        .header("x-env-only", "yes")
        .unwrap()
        .auth(Auth::bearer("shared"))
        .unwrap();
    let dispatcher = Dispatcher::reqwest(environment).unwrap();

    let request = RequestDescriptor::builder("/me")
        .header("x-client", "request")
        .auth(Auth::bearer("per-request"))
        .build();
    let result = dispatcher.execute(request).await;

    assert!(result.is_success(), "{:?}", result);
}

#[tokio::test]
async fn test_validation_only_ignores_body() {
    let server = MockServer::start().await;
    Mock::given(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>fine</html>"))
        .mount(&server)
        .await;

    let request = RequestDescriptor::builder("/health")
        .kind(OperationKind::ValidationOnly)
        .build();
    let result = dispatcher_for(&server).execute(request).await;

    assert!(matches!(
        result,
        OperationResult::Json { value: serde_json::Value::Null, .. }
    ));
}

#[tokio::test]
async fn test_download_with_progress() {
    let server = MockServer::start().await;
    let content = vec![7u8; 256 * 1024];
    Mock::given(method("GET"))
        .and(path("/archive.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.clone()))
        .mount(&server)
        .await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let request = RequestDescriptor::builder("/archive.bin")
        .kind(OperationKind::Download)
        .progress(move |fraction| sink.lock().push(fraction))
        .build();
    let result = dispatcher_for(&server).execute(request).await;

    let location = result.file().expect("download location").to_path_buf();
    assert_eq!(std::fs::read(&location).unwrap(), content);
    std::fs::remove_file(&location).unwrap();

    let seen = seen.lock();
    assert!(!seen.is_empty());
    assert!(seen.iter().all(|f| (0.0..=1.0).contains(f)));
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(seen.last().copied(), Some(1.0));
}

#[tokio::test]
async fn test_upload_from_file() {
    let server = MockServer::start().await;
    let content = b"line one\nline two\n".repeat(5000);
    Mock::given(method("PUT"))
        .and(path("/files/notes.txt"))
        .and(body_bytes(content.clone()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"stored": true, "warnings": []})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut source = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(&mut source, &content).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let request = RequestDescriptor::builder("/files/notes.txt")
        .method(Method::Put)
        .kind(OperationKind::Upload)
        .upload_source(source.path())
        .progress(move |fraction| sink.lock().push(fraction))
        .build();
    let result = dispatcher_for(&server).execute(request).await;

    assert_eq!(result.json(), Some(&json!({"stored": true, "warnings": null})));
    assert_eq!(seen.lock().last().copied(), Some(1.0));
}

#[tokio::test]
async fn test_upload_missing_source_file() {
    let server = MockServer::start().await;

    let request = RequestDescriptor::builder("/files/none")
        .method(Method::Put)
        .kind(OperationKind::Upload)
        .upload_source("/definitely/not/here.txt")
        .build();
    let result = dispatcher_for(&server).execute(request).await;

    assert!(matches!(
        result,
        OperationResult::Error { error: Error::Io(_), response: None }
    ));
}

#[tokio::test]
async fn test_completion_runs_on_delivery_thread() {
    let server = MockServer::start().await;
    Mock::given(path("/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let dispatcher = dispatcher_for(&server);
    let delivery_thread = dispatcher.delivery().thread_id();
    let (tx, rx) = oneshot::channel();
    dispatcher.dispatch(RequestDescriptor::builder("/ping").build(), move |result| {
        let current = std::thread::current();
        let _ = tx.send((result.is_success(), current.id(), current.name().map(str::to_string)));
    });

    let (success, thread, name) = rx.await.unwrap();
    assert!(success);
    assert_eq!(thread, delivery_thread);
    assert_eq!(name.as_deref(), Some("courier-delivery"));
}

#[tokio::test]
async fn test_cancel_in_flight_request() {
    let server = MockServer::start().await;
    Mock::given(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let dispatcher = dispatcher_for(&server);
    let (tx, rx) = oneshot::channel();
    let handle = dispatcher
        .dispatch(RequestDescriptor::builder("/slow").build(), move |result| {
            let _ = tx.send(result);
        })
        .unwrap();
    handle.cancel();

    let result = tokio::time::timeout(Duration::from_secs(2), rx)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        result,
        OperationResult::Error { error: Error::Cancelled, response: None }
    ));
    assert!(handle.is_finished());
}

#[tokio::test]
async fn test_cancelled_download_leaves_no_file() {
    // Promises a large body, sends a little of it, then stalls.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = vec![0u8; 4096];
        let _ = socket.read(&mut request).await;
        socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000000\r\n\r\n")
            .await
            .unwrap();
        socket.write_all(&[0u8; 4000]).await.unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let downloads = tempfile::tempdir().unwrap();
    let backend = ReqwestBackend::with_config(BackendConfig {
        download_directory: Some(downloads.path().to_path_buf()),
        ..BackendConfig::default()
    })
    .unwrap();
    let environment = Environment::new(format!("http://{}", address));
    let dispatcher = Dispatcher::new(environment, Arc::new(backend)).unwrap();

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let request = RequestDescriptor::builder("/stalled")
        .kind(OperationKind::Download)
        .progress(move |fraction| {
            let _ = progress_tx.send(fraction);
        })
        .build();
    let (tx, rx) = oneshot::channel();
    let handle = dispatcher
        .dispatch(request, move |result| {
            let _ = tx.send(result);
        })
        .unwrap();

    let first = tokio::time::timeout(Duration::from_secs(5), progress_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(first > 0.0 && first < 1.0);
    assert_eq!(std::fs::read_dir(downloads.path()).unwrap().count(), 1);

    handle.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        result,
        OperationResult::Error { error: Error::Cancelled, response: None }
    ));

    // The aborted worker drops its file on the next runtime tick.
    let mut leftover = Vec::new();
    for _ in 0..100 {
        leftover = std::fs::read_dir(downloads.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        if leftover.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(leftover.is_empty(), "cancelled download left {:?}", leftover);
}

#[tokio::test]
async fn test_download_into_configured_directory() {
    let server = MockServer::start().await;
    Mock::given(path("/report.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string("a,b\n1,2\n"))
        .mount(&server)
        .await;
    Mock::given(path("/denied.csv"))
        .respond_with(ResponseTemplate::new(403).set_body_string("no"))
        .mount(&server)
        .await;

    let downloads = tempfile::tempdir().unwrap();
    let backend = ReqwestBackend::with_config(BackendConfig {
        download_directory: Some(downloads.path().to_path_buf()),
        ..BackendConfig::default()
    })
    .unwrap();
    let dispatcher = Dispatcher::new(Environment::new(server.uri()), Arc::new(backend)).unwrap();

    let request = RequestDescriptor::builder("/report.csv")
        .kind(OperationKind::Download)
        .build();
    let result = dispatcher.execute(request).await;
    let location = result.file().expect("download location").to_path_buf();
    assert!(location.starts_with(downloads.path()));
    assert_eq!(std::fs::read_to_string(&location).unwrap(), "a,b\n1,2\n");
    std::fs::remove_file(&location).unwrap();

    let request = RequestDescriptor::builder("/denied.csv")
        .kind(OperationKind::Download)
        .build();
    let result = dispatcher.execute(request).await;
    assert!(matches!(result.as_error(), Some(Error::BadRequest(_))));
    assert_eq!(std::fs::read_dir(downloads.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_timeout_without_response() {
    let server = MockServer::start().await;
    Mock::given(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let backend = ReqwestBackend::with_config(BackendConfig {
        resource_timeout: Some(Duration::from_millis(200)),
        ..BackendConfig::default()
    })
    .unwrap();
    let dispatcher = Dispatcher::new(Environment::new(server.uri()), Arc::new(backend)).unwrap();

    let result = dispatcher.execute(RequestDescriptor::builder("/slow").build()).await;
    assert!(matches!(
        result,
        OperationResult::Error { error: Error::Timeout, response: None }
    ));
}

#[tokio::test]
async fn test_unreachable_host_is_invalid_response() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let uri = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let dispatcher = Dispatcher::reqwest(Environment::new(uri)).unwrap();
    let result = dispatcher.execute(RequestDescriptor::builder("/gone").build()).await;

    assert!(matches!(
        result,
        OperationResult::Error { error: Error::InvalidResponse, response: None }
    ));
}
