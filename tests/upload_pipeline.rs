//! End-to-end uploads against a local HTTP collector.

mod test_utils;

use std::{
    net::{SocketAddr, TcpListener},
    sync::{Arc, mpsc},
    thread,
    time::{Duration, Instant},
};

use rstest::{fixture, rstest};
use tempfile::TempDir;

use telemetry_uploader::{
    Credential, DirectoryBatchStore, MemoryBatchStore, PerformancePreset, QueryItem,
    UploadWorker, UploadWorkerBuilder,
};
use test_utils::{CapturedRequest, spawn_status_server, tcp_listener};

const RECV_TIMEOUT: Duration = Duration::from_secs(10);

/// Short intervals so retries show up quickly.
const FAST: PerformancePreset = PerformancePreset {
    initial_delay: Duration::from_millis(20),
    default_delay: Duration::from_millis(20),
    min_delay: Duration::from_millis(20),
    max_delay: Duration::from_millis(100),
    change_rate: 0.5,
    request_timeout: Duration::from_secs(5),
};

#[fixture]
fn batch_dir() -> TempDir {
    tempfile::tempdir().expect("tempdir")
}

fn builder(addr: SocketAddr, preset: PerformancePreset) -> UploadWorkerBuilder {
    UploadWorkerBuilder::new("logs")
        .with_endpoint(format!("http://{addr}/api/v2/logs"))
        .with_credential(Credential::api_key("abc123"))
        .with_query_item(QueryItem::Source("rust".into()))
        .with_query_item(QueryItem::Tags(vec![
            "env:test".into(),
            "service:shop".into(),
        ]))
        .with_connect_timeout(Duration::from_secs(2))
        .with_preset(preset)
}

fn recv(rx: &mpsc::Receiver<CapturedRequest>) -> CapturedRequest {
    rx.recv_timeout(RECV_TIMEOUT)
        .expect("expected an upload request")
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + RECV_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

fn dir_len(store: &DirectoryBatchStore) -> usize {
    store.len().expect("list batch directory")
}

#[rstest]
fn delivers_every_batch_and_empties_storage(tcp_listener: TcpListener, batch_dir: TempDir) {
    let (addr, rx) = spawn_status_server(tcp_listener, vec![], 200);
    let store = Arc::new(DirectoryBatchStore::open(batch_dir.path()).expect("open store"));
    let payloads: [&[u8]; 3] = [b"[1]", b"[2]", b"[3]"];
    for payload in payloads {
        store.write(payload).expect("write batch");
    }

    let worker = builder(addr, PerformancePreset::INSTANT_DATA_DELIVERY)
        .build(store.clone())
        .expect("worker");

    let bodies: Vec<Vec<u8>> = (0..3).map(|_| recv(&rx).body).collect();
    assert_eq!(bodies, vec![b"[1]".to_vec(), b"[2]".to_vec(), b"[3]".to_vec()]);
    assert!(wait_until(|| dir_len(&store) == 0));
    worker.cancel();
    assert!(rx.try_recv().is_err(), "no further uploads expected");
}

#[rstest]
fn request_carries_query_and_headers(tcp_listener: TcpListener) {
    let (addr, rx) = spawn_status_server(tcp_listener, vec![], 202);
    let store = Arc::new(MemoryBatchStore::new());
    store.write(br#"{"message":"hi"}"#.to_vec());
    store.write(br#"{"message":"again"}"#.to_vec());

    let worker = builder(addr, PerformancePreset::LOW_RUNTIME_IMPACT)
        .with_user_agent("shop", "1.0.0")
        .with_origin("rust", "0.1.0")
        .with_request_id()
        .build(store.clone())
        .expect("worker");
    assert!(worker.flush());

    let first = recv(&rx);
    let second = recv(&rx);
    assert_eq!(first.method, "POST");
    assert_eq!(
        first.target,
        "/api/v2/logs?ddsource=rust&ddtags=env:test,service:shop"
    );
    assert_eq!(first.body, br#"{"message":"hi"}"#);
    assert_eq!(first.header("content-type"), Some("application/json"));
    assert_eq!(first.header("dd-api-key"), Some("abc123"));
    assert_eq!(first.header("dd-evp-origin"), Some("rust"));
    assert_eq!(first.header("dd-evp-origin-version"), Some("0.1.0"));
    let user_agent = first.header("user-agent").expect("user agent");
    assert!(user_agent.starts_with("shop/1.0.0 ("), "{user_agent}");

    let first_id = first.header("dd-request-id").expect("request id");
    let second_id = second.header("dd-request-id").expect("request id");
    assert_eq!(first_id.len(), 36);
    assert_ne!(first_id, second_id);
}

#[rstest]
fn server_error_keeps_batch_for_a_later_cycle(tcp_listener: TcpListener) {
    let (addr, rx) = spawn_status_server(tcp_listener, vec![500], 200);
    let store = Arc::new(MemoryBatchStore::new());
    store.write(b"retry me".to_vec());

    let worker = builder(addr, FAST).build(store.clone()).expect("worker");

    let first = recv(&rx);
    let second = recv(&rx);
    assert_eq!(first.body, b"retry me");
    assert_eq!(second.body, b"retry me");
    assert!(wait_until(|| store.is_empty()));
    worker.cancel();
}

#[rstest]
fn forbidden_releases_batch(tcp_listener: TcpListener) {
    let (addr, rx) = spawn_status_server(tcp_listener, vec![], 403);
    let store = Arc::new(MemoryBatchStore::new());
    store.write(b"bad key".to_vec());

    let worker = builder(addr, FAST).build(store.clone()).expect("worker");

    assert_eq!(recv(&rx).body, b"bad key");
    assert!(wait_until(|| store.is_empty()));
    worker.cancel();
    assert!(rx.try_recv().is_err(), "a released batch is not uploaded again");
}

#[rstest]
fn flush_drains_directory_before_first_cycle(tcp_listener: TcpListener, batch_dir: TempDir) {
    let (addr, rx) = spawn_status_server(tcp_listener, vec![], 200);
    let store = Arc::new(DirectoryBatchStore::open(batch_dir.path()).expect("open store"));
    store.write(b"a").expect("write");
    store.write(b"b").expect("write");

    let worker: UploadWorker = builder(addr, PerformancePreset::LOW_RUNTIME_IMPACT)
        .build(store.clone())
        .expect("worker");
    assert!(worker.flush());
    assert_eq!(dir_len(&store), 0);
    assert_eq!(recv(&rx).body, b"a");
    assert_eq!(recv(&rx).body, b"b");
}

#[rstest]
fn unreachable_collector_keeps_batches(tcp_listener: TcpListener) {
    let addr = tcp_listener.local_addr().expect("address");
    drop(tcp_listener);
    let store = Arc::new(MemoryBatchStore::new());
    store.write(b"offline".to_vec());

    let worker = builder(addr, PerformancePreset::LOW_RUNTIME_IMPACT)
        .build(store.clone())
        .expect("worker");
    assert!(worker.flush());
    assert_eq!(store.len(), 1);
}
