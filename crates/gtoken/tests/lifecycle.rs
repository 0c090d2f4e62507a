use async_trait::async_trait;
use gtoken::error::ProviderResult;
use gtoken::mocks::{MockServiceAccountInfo, MockTokenProvider};
use gtoken::{GtokenError, IdToken, Identity, RefreshMode, Refresher, Server, TokenProvider};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const TEST_EMAIL: &str = "test@project.iam.gserviceaccount.com";
const TEST_FILE: &str = "jwt.token";

async fn start(refresher: Refresher) -> (SocketAddr, JoinHandle<Result<(), GtokenError>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Server::new(addr, refresher);
    let handle = tokio::spawn(server.serve(listener, CancellationToken::new()));
    (addr, handle)
}

async fn post_quit(addr: SocketAddr) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://{}/quitquitquit", addr))
        .send()
        .await
        .expect("control server should accept the request")
}

#[tokio::test]
async fn quitquitquit_stops_continuous_refresh() {
    let accounts = Arc::new(MockServiceAccountInfo::bound(TEST_EMAIL));
    let tokens =
        Arc::new(MockTokenProvider::new("whatever").with_validity(Duration::from_secs(31)));
    let refresher = Refresher::new(
        accounts.clone(),
        tokens.clone(),
        TEST_FILE,
        RefreshMode::Continuous,
    );

    let (addr, handle) = start(refresher).await;

    let response = post_quit(addr).await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server should stop after termination")
        .unwrap()
        .expect("cancellation is not an error");

    assert!(tokens.generate_calls() <= 1);
    assert_eq!(tokens.generate_calls(), tokens.write_calls());
}

#[tokio::test]
async fn one_shot_run_shuts_control_server_down() {
    let accounts = Arc::new(MockServiceAccountInfo::bound(TEST_EMAIL));
    let tokens = Arc::new(MockTokenProvider::new("whatever"));
    let refresher = Refresher::new(
        accounts.clone(),
        tokens.clone(),
        TEST_FILE,
        RefreshMode::OneShot,
    );

    let (addr, handle) = start(refresher).await;

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("one-shot run should not wait for termination")
        .unwrap()
        .unwrap();

    assert_eq!(tokens.generate_calls(), 1);
    assert_eq!(tokens.write_calls(), 1);
    assert_eq!(tokens.calls().validity_checks, 0);
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn refresher_failure_is_returned_by_server() {
    let accounts = Arc::new(MockServiceAccountInfo::unresolvable());
    let tokens = Arc::new(MockTokenProvider::new("whatever"));
    let refresher = Refresher::new(accounts, tokens.clone(), TEST_FILE, RefreshMode::Continuous);

    let (_addr, handle) = start(refresher).await;

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(result, Err(GtokenError::Resolution(_))));
    assert_eq!(tokens.generate_calls(), 0);
}

/// Issuance that ignores cancellation and takes a while, so termination
/// requests land while a cycle is in flight.
struct SlowTokenProvider {
    busy: AtomicBool,
    issued: AtomicUsize,
    first_write: tokio::sync::Notify,
}

#[async_trait]
impl TokenProvider for SlowTokenProvider {
    async fn generate(
        &self,
        _cancel: &CancellationToken,
        _identity: &Identity,
    ) -> ProviderResult<IdToken> {
        self.busy.store(true, Ordering::SeqCst);
        if self.issued.fetch_add(1, Ordering::SeqCst) > 0 {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        Ok(IdToken::new("whatever"))
    }

    fn validity(&self, _token: &IdToken) -> ProviderResult<Duration> {
        Ok(Duration::from_millis(10))
    }

    async fn write_to_file(&self, _token: &IdToken, _path: &Path) -> ProviderResult<()> {
        self.busy.store(false, Ordering::SeqCst);
        self.first_write.notify_one();
        Ok(())
    }
}

#[tokio::test]
async fn termination_response_waits_for_in_flight_cycle() {
    let accounts = Arc::new(MockServiceAccountInfo::bound(TEST_EMAIL));
    let tokens = Arc::new(SlowTokenProvider {
        busy: AtomicBool::new(false),
        issued: AtomicUsize::new(0),
        first_write: tokio::sync::Notify::new(),
    });
    let refresher = Refresher::new(accounts, tokens.clone(), TEST_FILE, RefreshMode::Continuous)
        .with_min_interval(Duration::from_millis(10));

    let (addr, handle) = start(refresher).await;

    tokens.first_write.notified().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let response = post_quit(addr).await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(!tokens.busy.load(Ordering::SeqCst));

    let issued = tokens.issued.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(tokens.issued.load(Ordering::SeqCst), issued);

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
