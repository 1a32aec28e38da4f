// approval_flow.rs — End-to-end scenarios over real loopback HTTP.
//
// Each test builds an isolated home, resolves a policy through the real
// config store, starts a real approval server, and drives it with reqwest
// the way a browser would.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use guardian_approval::{ApprovalError, ApprovalServer, ApprovalSession};
use guardian_config::ConfigStore;
use guardian_grants::{GrantStore, OperationContext};
use guardian_policy::{CheckDecision, PolicyEngine};
use guardian_registry::ServerRegistry;

const PUSH_CONFIG: &str = r#"
guardian:
  version: "1.0.0"
  defaults:
    method: browser
    expires: "30m"
  scopes:
    git:
      operations:
        push:
          enabled: true
          method: browser
          expires: "15m"
          risk: high
          conditions:
            branches: ["main", "master"]
  security:
    browser_approval:
      timeout_seconds: 300
      auto_open_browser: false
      show_url_in_terminal: false
"#;

const EXPIRY_CONFIG: &str = r#"
guardian:
  version: "1.0.0"
  scopes:
    git:
      operations:
        push:
          enabled: true
          expires: "1s"
          conditions:
            branches: ["main"]
  security:
    browser_approval:
      timeout_seconds: 1
      auto_open_browser: false
      show_url_in_terminal: false
"#;

fn write_config(home: &Path, config: &str) {
    let dir = home.join("guardian");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.yaml"), config).unwrap();
}

fn ctx() -> OperationContext {
    OperationContext::new("main", "origin", "alice")
}

/// Resolve git.push to "approval required" and build its session.
fn pending_session(home: &Path) -> (ApprovalSession, guardian_config::SecuritySettings) {
    let engine = PolicyEngine::new(home).unwrap();
    let policy = match engine.check("git", "push", &ctx()).unwrap() {
        CheckDecision::ApprovalRequired(policy) => policy,
        other => panic!("expected ApprovalRequired, got {:?}", other),
    };

    let store = ConfigStore::new(home);
    let security = store.security().unwrap();
    let session = ApprovalSession::new(
        policy,
        ctx(),
        None,
        &security.browser_approval,
        &security.branding,
    );
    (session, security)
}

#[tokio::test(flavor = "multi_thread")]
async fn happy_path_approval_mints_a_single_use_grant() {
    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), PUSH_CONFIG);

    let (session, security) = pending_session(home.path());
    let server = ApprovalServer::new(home.path());
    let handle = server.start(session, &security).await.unwrap();

    // The server publishes exactly one discovery record while live.
    let registry = ServerRegistry::new(home.path()).unwrap();
    let record = registry.load("guardian").unwrap().expect("record published");
    assert_eq!(record.port, handle.port());
    assert_eq!(record.metadata["scope"], "git");

    // Approve the way the page's JavaScript would.
    let response = reqwest::Client::new()
        .post(format!("{}/confirm", handle.approval_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "approved");

    handle.wait().await.unwrap();

    // Cleanup retracted the record.
    assert!(registry.load("guardian").unwrap().is_none());

    // The grant admits exactly one subsequent check.
    let engine = PolicyEngine::new(home.path()).unwrap();
    assert_eq!(engine.check("git", "push", &ctx()).unwrap(), CheckDecision::Admit);
    assert!(matches!(
        engine.check("git", "push", &ctx()).unwrap(),
        CheckDecision::ApprovalRequired(_)
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn denial_mints_nothing() {
    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), PUSH_CONFIG);

    let (session, security) = pending_session(home.path());
    let handle = ApprovalServer::new(home.path())
        .start(session, &security)
        .await
        .unwrap();

    let response = reqwest::Client::new()
        .post(format!("{}/deny", handle.approval_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    assert!(matches!(handle.wait().await, Err(ApprovalError::Denied)));

    let grants = GrantStore::new(home.path()).unwrap();
    assert!(grants.list().unwrap().is_empty());

    // The next check still requires approval.
    let engine = PolicyEngine::new(home.path()).unwrap();
    assert!(matches!(
        engine.check("git", "push", &ctx()).unwrap(),
        CheckDecision::ApprovalRequired(_)
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn expiry_fires_without_traffic() {
    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), EXPIRY_CONFIG);

    let (session, security) = pending_session(home.path());
    assert_eq!(session.effective_expiry(), Duration::from_secs(1));

    let handle = ApprovalServer::new(home.path())
        .start(session, &security)
        .await
        .unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(3), handle.wait())
        .await
        .expect("wait() must settle within the expiry window");
    assert!(matches!(outcome, Err(ApprovalError::Expired)));

    let registry = ServerRegistry::new(home.path()).unwrap();
    assert!(registry.load("guardian").unwrap().is_none());
    assert!(GrantStore::new(home.path()).unwrap().list().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn wrong_nonce_is_rejected_and_session_survives() {
    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), PUSH_CONFIG);

    let (session, security) = pending_session(home.path());
    let handle = ApprovalServer::new(home.path())
        .start(session, &security)
        .await
        .unwrap();

    let wrong = format!(
        "http://127.0.0.1:{}/approve/{}/confirm",
        handle.port(),
        "0000000000000000000000000000dead"
    );
    let response = reqwest::Client::new().post(&wrong).send().await.unwrap();
    assert_eq!(response.status(), 401);

    // The session is still running; the real nonce still works.
    let response = reqwest::Client::new()
        .post(format!("{}/confirm", handle.approval_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    handle.wait().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_cancels_a_running_session() {
    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), PUSH_CONFIG);

    let (session, security) = pending_session(home.path());
    let handle = ApprovalServer::new(home.path())
        .start(session, &security)
        .await
        .unwrap();

    handle.shutdown().await;
    assert!(matches!(handle.wait().await, Err(ApprovalError::Cancelled)));

    // Cancellation retracts the record and mints nothing.
    let registry = ServerRegistry::new(home.path()).unwrap();
    assert!(registry.load("guardian").unwrap().is_none());
    assert!(GrantStore::new(home.path()).unwrap().list().unwrap().is_empty());

    // Idempotent: a second shutdown changes nothing.
    handle.shutdown().await;
    assert!(matches!(handle.wait().await, Err(ApprovalError::Cancelled)));
}

#[tokio::test(flavor = "multi_thread")]
async fn hello_and_root_redirect() {
    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), PUSH_CONFIG);

    let (session, security) = pending_session(home.path());
    let handle = ApprovalServer::new(home.path())
        .start(session, &security)
        .await
        .unwrap();

    let base = format!("http://127.0.0.1:{}", handle.port());

    let hello: serde_json::Value = reqwest::get(format!("{}/hello", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(hello["name"], "guardian");

    // The probe helper sees the same thing.
    let registry = ServerRegistry::new(home.path()).unwrap();
    let probed = registry.probe_hello(handle.port()).await.unwrap();
    assert_eq!(probed.name, "guardian");

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let response = client.get(format!("{}/", base)).send().await.unwrap();
    assert_eq!(response.status(), 307);
    let location = response.headers()["location"].to_str().unwrap();
    assert!(location.starts_with("/approve/"));

    handle.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_waiters_observe_the_same_outcome() {
    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), PUSH_CONFIG);

    let (session, security) = pending_session(home.path());
    let handle = Arc::new(
        ApprovalServer::new(home.path())
            .start(session, &security)
            .await
            .unwrap(),
    );

    let waiter = {
        let handle = handle.clone();
        tokio::spawn(async move { handle.wait().await.is_ok() })
    };

    reqwest::Client::new()
        .post(format!("{}/confirm", handle.approval_url()))
        .send()
        .await
        .unwrap();

    assert!(handle.wait().await.is_ok());
    assert!(waiter.await.unwrap());
}
