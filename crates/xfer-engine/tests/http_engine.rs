//! HTTP engine against a real local server.

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tokio::net::TcpListener;

use xfer_core::{EngineError, ReadOutcome, TransferEngine};
use xfer_engine::{HttpEngine, HttpEngineConfig};

const BODY_LEN: usize = 5000;

async fn spawn_server() -> String {
    let app = Router::new()
        .route("/media/movie.mkv", get(|| async { vec![42u8; BODY_LEN] }))
        .route("/missing.bin", get(|| async { StatusCode::NOT_FOUND }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn engine() -> HttpEngine {
    HttpEngine::new(HttpEngineConfig::default().with_max_retries(0)).unwrap()
}

#[tokio::test]
async fn resolves_and_streams_body_in_bounded_chunks() {
    let base = spawn_server().await;
    let mut handle = engine()
        .open(&format!("{base}/media/movie.mkv"))
        .await
        .unwrap();

    let files = handle.resolve().await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path, "movie.mkv");
    assert_eq!(files[0].size, BODY_LEN as u64);

    let mut stream = handle.open_stream(&files[0]).await.unwrap();
    let mut received = 0usize;
    loop {
        match stream.read(1024).await.unwrap() {
            ReadOutcome::Data(bytes) => {
                assert!(bytes.len() <= 1024);
                assert!(bytes.iter().all(|b| *b == 42));
                received += bytes.len();
            }
            ReadOutcome::Empty => {}
            ReadOutcome::EndOfStream => break,
        }
    }
    assert_eq!(received, BODY_LEN);
    handle.close().await;
}

#[tokio::test]
async fn error_status_is_resolution_failure() {
    let base = spawn_server().await;
    let mut handle = engine().open(&format!("{base}/missing.bin")).await.unwrap();
    let err = handle.resolve().await.unwrap_err();
    match err {
        EngineError::Resolve { message, .. } => assert!(message.contains("404")),
        other => panic!("expected resolve error, got {other:?}"),
    }
}

#[tokio::test]
async fn closed_handle_cannot_resolve() {
    let base = spawn_server().await;
    let mut handle = engine()
        .open(&format!("{base}/media/movie.mkv"))
        .await
        .unwrap();
    handle.close().await;
    assert_eq!(handle.resolve().await.unwrap_err(), EngineError::Closed);
}
