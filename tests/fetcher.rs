//! Fetcher integration tests against a local HTTP server standing in for the broker.

use std::net::SocketAddr;

use axum::{http::StatusCode, routing::get, Router};
use instrument_catalog::fetcher::{download_all, FetchError, Source};

const NSE_CM_BODY: &str = r#"{"10100000003045":{"symTicker":"NSE:SBIN-EQ"}}"#;

async fn spawn_origin() -> SocketAddr {
    let app = Router::new()
        .route("/sym_details/NSE_CM_sym_master.json", get(|| async { NSE_CM_BODY }))
        .route(
            "/sym_details/BSE_CM_sym_master.json",
            get(|| async { "{}" }),
        )
        .route(
            "/sym_details/broken.json",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });
    addr
}

fn base(addr: SocketAddr) -> String {
    format!("http://{addr}/sym_details")
}

#[tokio::test]
async fn downloads_files_verbatim_into_new_directory() {
    let addr = spawn_origin().await;
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("nested").join("raw");
    let sources = vec![
        Source::master(&base(addr), "NSE_CM"),
        Source::master(&base(addr), "BSE_CM"),
    ];

    let written = download_all(&reqwest::Client::new(), &dir, &sources)
        .await
        .unwrap();
    assert_eq!(written.len(), 2);
    assert_eq!(
        std::fs::read_to_string(dir.join("NSE_CM_sym_master.json")).unwrap(),
        NSE_CM_BODY
    );
    assert_eq!(
        std::fs::read_to_string(dir.join("BSE_CM_sym_master.json")).unwrap(),
        "{}"
    );
}

#[tokio::test]
async fn overwrites_previous_download() {
    let addr = spawn_origin().await;
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("NSE_CM_sym_master.json"), "stale").unwrap();
    download_all(
        &reqwest::Client::new(),
        tmp.path(),
        &[Source::master(&base(addr), "NSE_CM")],
    )
    .await
    .unwrap();
    assert_eq!(
        std::fs::read_to_string(tmp.path().join("NSE_CM_sym_master.json")).unwrap(),
        NSE_CM_BODY
    );
}

#[tokio::test]
async fn non_success_status_stops_the_run() {
    let addr = spawn_origin().await;
    let tmp = tempfile::tempdir().unwrap();
    let sources = vec![
        Source::master(&base(addr), "NSE_CM"),
        Source {
            file_name: "broken.json".into(),
            url: format!("{}/broken.json", base(addr)),
        },
        Source::master(&base(addr), "BSE_CM"),
    ];

    let err = download_all(&reqwest::Client::new(), tmp.path(), &sources)
        .await
        .unwrap_err();
    match err {
        FetchError::Status { status, .. } => assert_eq!(status.as_u16(), 503),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(tmp.path().join("NSE_CM_sym_master.json").exists());
    assert!(!tmp.path().join("broken.json").exists());
    assert!(!tmp.path().join("BSE_CM_sym_master.json").exists());
}

#[tokio::test]
async fn missing_file_is_a_status_error() {
    let addr = spawn_origin().await;
    let tmp = tempfile::tempdir().unwrap();
    let err = download_all(
        &reqwest::Client::new(),
        tmp.path(),
        &[Source::master(&base(addr), "MCX_COM")],
    )
    .await
    .unwrap_err();
    assert!(matches!(err, FetchError::Status { status, .. } if status.as_u16() == 404));
}
