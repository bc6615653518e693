//! HttpTransferManager against a throwaway local HTTP listener.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use remote_transfer::{HttpTransferManager, TransferConfig, TransferError, TransferManager};
use repo_state::RemoteRepository;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serves one canned status per path; `None` means "never answer".
/// Returns the bound address and the captured request heads.
async fn serve(routes: HashMap<&'static str, Option<u16>>) -> (SocketAddr, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let captured = seen.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let routes = routes.clone();
            let captured = captured.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let head = String::from_utf8_lossy(&buf).to_string();
                let path = head
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("/")
                    .to_string();
                captured.lock().unwrap().push(head);

                let status = match routes.get(path.as_str()) {
                    Some(Some(code)) => *code,
                    Some(None) => {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                        return;
                    }
                    None => 404,
                };
                let reason = match status {
                    200 => "OK",
                    404 => "Not Found",
                    _ => "Other",
                };
                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    status, reason
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, seen)
}

fn remote_at(addr: SocketAddr, base: &str) -> RemoteRepository {
    RemoteRepository::new("maven", "probe", format!("http://{}{}", addr, base))
}

#[tokio::test]
async fn success_status_means_exists() {
    let (addr, _) = serve(HashMap::from([("/foo/health", Some(200))])).await;
    let manager = HttpTransferManager::new(TransferConfig::new(5)).unwrap();

    let exists = manager
        .exists(&remote_at(addr, "/foo"), "/health")
        .await
        .unwrap();
    assert!(exists);
}

#[tokio::test]
async fn not_found_means_absent() {
    let (addr, _) = serve(HashMap::new()).await;
    let manager = HttpTransferManager::new(TransferConfig::new(5)).unwrap();

    let exists = manager
        .exists(&remote_at(addr, "/foo"), "/missing.pom")
        .await
        .unwrap();
    assert!(!exists);
}

#[tokio::test]
async fn server_error_is_reported() {
    let (addr, _) = serve(HashMap::from([("/foo/", Some(503))])).await;
    let manager = HttpTransferManager::new(TransferConfig::new(5)).unwrap();

    let err = manager
        .exists(&remote_at(addr, "/foo"), "/")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TransferError::UnexpectedStatus { status: 503, .. }
    ));
}

#[tokio::test]
async fn probe_uses_head_and_basic_auth() {
    let (addr, seen) = serve(HashMap::from([("/secure/", Some(200))])).await;
    let manager = HttpTransferManager::new(TransferConfig::new(5)).unwrap();
    let remote = remote_at(addr, "/secure").with_credentials("probe", "secret");

    assert!(manager.exists(&remote, "/").await.unwrap());

    let heads = seen.lock().unwrap().clone();
    assert_eq!(heads.len(), 1);
    assert!(heads[0].starts_with("HEAD /secure/ HTTP/1.1"));
    // base64("probe:secret")
    assert!(heads[0]
        .to_ascii_lowercase()
        .contains("authorization: basic cHJvYmU6c2VjcmV0".to_ascii_lowercase().as_str()));
}

#[tokio::test]
async fn unresponsive_remote_times_out() {
    let (addr, _) = serve(HashMap::from([("/slow/", None)])).await;
    let manager = HttpTransferManager::new(TransferConfig::new(30)).unwrap();
    let remote = remote_at(addr, "/slow").with_timeout_seconds(1);

    let err = manager.exists(&remote, "/").await.unwrap_err();
    assert!(matches!(err, TransferError::Timeout { seconds: 1, .. }));
}

#[tokio::test]
async fn refused_connection_is_http_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let manager = HttpTransferManager::new(TransferConfig::new(5)).unwrap();
    let err = manager
        .exists(&remote_at(addr, "/gone"), "/")
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::Http { .. }));
}
