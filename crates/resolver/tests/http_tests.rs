//! Downloads from HTTP repositories.

use jarlock_core::{Coordinates, Netrc};
use jarlock_events::{DownloadStage, Event, EventBus, EventSender, RecordingListener};
use jarlock_resolver::{Downloader, Error, Repository, RetryConfig};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::task::JoinSet;
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const MAGIC_SHA: &str = "de3a84a06968190ff02aa763f0ca6691ad0d5d880ae849fa1a44ed119f3d3df1";
const JAR_PATH: &str = "/maven2/com/example/item/1.0.0/item-1.0.0.jar";

fn item() -> Coordinates {
    Coordinates::parse("com.example:item:1.0.0").unwrap()
}

fn repository(server: &MockServer) -> Repository {
    Repository::parse(&format!("{}/maven2/", server.uri())).unwrap()
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        exponential_base: 2.0,
    }
}

const POOL_SIZE: usize = 2;

fn downloader(cache: &TempDir, credentials: Netrc, events: EventSender) -> Downloader {
    Downloader::new(cache.path(), events, Arc::new(credentials), POOL_SIZE)
        .unwrap()
        .with_retry(fast_retry())
}

async fn requests_to(server: &MockServer, target: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == target)
        .count()
}

#[tokio::test]
async fn test_download_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JAR_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"magic!".to_vec()))
        .mount(&server)
        .await;

    let cache = TempDir::new().unwrap();
    let result = downloader(&cache, Netrc::empty(), EventSender::noop())
        .download(&item(), &[repository(&server)])
        .await
        .unwrap();

    assert_eq!(result.sha256.as_deref(), Some(MAGIC_SHA));
    let path = result.path.unwrap();
    assert!(path.starts_with(cache.path()));
    assert_eq!(std::fs::read(path).unwrap(), b"magic!");
}

#[tokio::test]
async fn test_basic_auth_from_netrc() {
    let server = MockServer::start().await;
    let host = url::Url::parse(&server.uri())
        .unwrap()
        .host_str()
        .unwrap()
        .to_string();

    // "user:secret"
    Mock::given(method("GET"))
        .and(path(JAR_PATH))
        .and(header("authorization", "Basic dXNlcjpzZWNyZXQ="))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"magic!".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(JAR_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let cache = TempDir::new().unwrap();
    let netrc = Netrc::parse(&format!("machine {host} login user password secret\n"));
    let result = downloader(&cache, netrc, EventSender::noop())
        .download(&item(), &[repository(&server)])
        .await
        .unwrap();
    assert_eq!(result.sha256.as_deref(), Some(MAGIC_SHA));

    let anonymous = TempDir::new().unwrap();
    let result = downloader(&anonymous, Netrc::empty(), EventSender::noop())
        .download(&item(), &[repository(&server)])
        .await
        .unwrap();
    assert!(result.path.is_none());
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JAR_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(JAR_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"magic!".to_vec()))
        .mount(&server)
        .await;

    let cache = TempDir::new().unwrap();
    let result = downloader(&cache, Netrc::empty(), EventSender::noop())
        .download(&item(), &[repository(&server)])
        .await
        .unwrap();

    assert_eq!(result.sha256.as_deref(), Some(MAGIC_SHA));
    assert_eq!(requests_to(&server, JAR_PATH).await, 3);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JAR_PATH))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let cache = TempDir::new().unwrap();
    let result = downloader(&cache, Netrc::empty(), EventSender::noop())
        .download(&item(), &[repository(&server)])
        .await
        .unwrap();

    assert!(result.path.is_none());
    assert_eq!(requests_to(&server, JAR_PATH).await, 1);
}

#[tokio::test]
async fn test_exhausted_retries_fall_back_to_next_repository() {
    let flaky = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JAR_PATH))
        .respond_with(ResponseTemplate::new(502))
        .mount(&flaky)
        .await;
    let healthy = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JAR_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"magic!".to_vec()))
        .mount(&healthy)
        .await;

    let listener = Arc::new(RecordingListener::new());
    let bus = EventBus::new(listener.clone());
    let cache = TempDir::new().unwrap();
    let result = downloader(&cache, Netrc::empty(), bus.sender().unwrap())
        .download(&item(), &[repository(&flaky), repository(&healthy)])
        .await
        .unwrap();
    bus.shutdown().await;

    assert_eq!(result.repository, Some(repository(&healthy)));
    assert_eq!(requests_to(&flaky, JAR_PATH).await, 3);
    assert_eq!(listener.download_count(DownloadStage::Starting), 2);
    assert_eq!(listener.download_count(DownloadStage::Complete), 2);
}

#[tokio::test]
async fn test_published_checksum_mismatch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JAR_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"magic!".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{JAR_PATH}.sha256")))
        .respond_with(ResponseTemplate::new(200).set_body_string("f".repeat(64)))
        .mount(&server)
        .await;

    let cache = TempDir::new().unwrap();
    let err = downloader(&cache, Netrc::empty(), EventSender::noop())
        .download(&item(), &[repository(&server)])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Integrity { .. }));
}

#[tokio::test]
async fn test_retries_are_reported_on_verbose_bus() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JAR_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(JAR_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"magic!".to_vec()))
        .mount(&server)
        .await;

    let listener = Arc::new(RecordingListener::new());
    let bus = EventBus::with_verbosity(listener.clone(), true);
    let cache = TempDir::new().unwrap();
    downloader(&cache, Netrc::empty(), bus.sender().unwrap())
        .download(&item(), &[repository(&server)])
        .await
        .unwrap();
    bus.shutdown().await;

    let retries: Vec<String> = listener
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::Log {
                message,
                detail: Some(detail),
                ..
            } if message.starts_with("Retrying com/example/item/1.0.0/item-1.0.0.jar") => {
                Some(detail)
            }
            _ => None,
        })
        .collect();
    assert_eq!(retries.len(), 2, "{retries:?}");
    assert!(retries[0].starts_with("attempt 1/3 failed"));
    assert!(retries[1].starts_with("attempt 2/3 failed"));
}

#[tokio::test]
async fn test_unreachable_checksum_fails_download() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JAR_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"magic!".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{JAR_PATH}.sha256")))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let cache = TempDir::new().unwrap();
    let err = downloader(&cache, Netrc::empty(), EventSender::noop())
        .download(&item(), &[repository(&server)])
        .await
        .unwrap_err();
    match err {
        Error::TransientFetch { url, .. } => assert!(url.ends_with(".jar.sha256"), "{url}"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(requests_to(&server, &format!("{JAR_PATH}.sha256")).await, 3);
}

#[tokio::test]
async fn test_malformed_checksum_is_reported_and_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JAR_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"magic!".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{JAR_PATH}.sha256")))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>moved</html>"))
        .mount(&server)
        .await;

    let listener = Arc::new(RecordingListener::new());
    let bus = EventBus::new(listener.clone());
    let cache = TempDir::new().unwrap();
    let result = downloader(&cache, Netrc::empty(), bus.sender().unwrap())
        .download(&item(), &[repository(&server)])
        .await
        .unwrap();
    bus.shutdown().await;

    assert_eq!(result.sha256.as_deref(), Some(MAGIC_SHA));
    assert!(listener.events().iter().any(|e| matches!(
        e,
        Event::Log { message, .. } if message.contains("malformed checksum")
    )));
}

/// Records when each request arrived, then answers after a delay.
struct Arrivals {
    seen: Arc<Mutex<Vec<Instant>>>,
    delay: Duration,
}

impl Respond for Arrivals {
    fn respond(&self, _: &Request) -> ResponseTemplate {
        self.seen.lock().unwrap().push(Instant::now());
        ResponseTemplate::new(200)
            .set_body_bytes(b"magic!".to_vec())
            .set_delay(self.delay)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pool_caps_concurrent_fetches() {
    const DELAY: Duration = Duration::from_millis(300);
    const ARTIFACTS: usize = 6;

    let server = MockServer::start().await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    Mock::given(method("GET"))
        .and(path_regex(r"\.jar$"))
        .respond_with(Arrivals {
            seen: Arc::clone(&seen),
            delay: DELAY,
        })
        .mount(&server)
        .await;

    let cache = TempDir::new().unwrap();
    let downloader = Arc::new(downloader(&cache, Netrc::empty(), EventSender::noop()));
    let repositories = Arc::new([repository(&server)]);
    let started = Instant::now();
    let mut downloads = JoinSet::new();
    for i in 0..ARTIFACTS {
        let downloader = Arc::clone(&downloader);
        let repositories = Arc::clone(&repositories);
        downloads.spawn(async move {
            let coords = Coordinates::parse(&format!("com.example:item{i}:1.0.0")).unwrap();
            downloader.download(&coords, &repositories[..]).await.unwrap()
        });
    }
    while let Some(result) = downloads.join_next().await {
        assert_eq!(result.unwrap().sha256.as_deref(), Some(MAGIC_SHA));
    }
    let elapsed = started.elapsed();

    let arrivals = seen.lock().unwrap().clone();
    assert_eq!(arrivals.len(), ARTIFACTS);
    // A request is in flight from its arrival until its delayed response.
    let max_in_flight = arrivals
        .iter()
        .map(|&t| arrivals.iter().filter(|&&a| a <= t && t < a + DELAY).count())
        .max()
        .unwrap();
    assert_eq!(max_in_flight, POOL_SIZE);
    let waves = u32::try_from(ARTIFACTS / POOL_SIZE).unwrap();
    assert!(elapsed >= DELAY * waves, "{elapsed:?}");
}
