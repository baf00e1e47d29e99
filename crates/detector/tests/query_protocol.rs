#![forbid(unsafe_code)]

use bytes::Bytes;
use config::{Config, FeedDescriptor, FeedFormat};
use detector::observation::{ProcessSample, ProcessSource};
use detector::protocol::Message;
use detector::signature::{SignatureVerifier, TrustVerdict, VerifyError};
use detector::{Agent, DetectionCache, QueryClient, QueryService, RequestKind, Services};
use detector::domain::{Generation, ProcessEntry, SnapshotBuilder};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

struct StaticSource(Vec<ProcessSample>);

impl ProcessSource for StaticSource {
    fn processes(&mut self) -> Result<Vec<ProcessSample>, detector::Error> {
        Ok(self.0.clone())
    }
}

struct NothingSigned;

impl SignatureVerifier for NothingSigned {
    fn verify(&self, _path: &Path) -> Result<TrustVerdict, VerifyError> {
        Ok(TrustVerdict::NoSignature)
    }
}

async fn loopback() -> TcpListener {
    TcpListener::bind("127.0.0.1:0").await.unwrap()
}

#[tokio::test]
async fn empty_cache_then_unknown_then_valid_request() {
    let listener = loopback().await;
    let addr = listener.local_addr().unwrap();
    let service = QueryService::new(DetectionCache::new());
    let cancel = CancellationToken::new();
    let server = tokio::spawn({
        let cancel = cancel.clone();
        async move { service.serve(listener, cancel).await }
    });

    let mut client = QueryClient::connect(addr).await.unwrap();

    let reply = client.request(RequestKind::Unsigned).await.unwrap();
    assert_eq!(reply.message_type, "unsignedResults");
    assert_eq!(&reply.payload[..], b"[]");

    let reply = client.send(Message::new("foo", Bytes::new())).await.unwrap();
    assert_eq!(reply.message_type, "error");
    assert_eq!(&reply.payload[..], b"unknown request type");

    // The session survives an unknown request.
    let reply = client.request(RequestKind::Relationships).await.unwrap();
    assert_eq!(reply.message_type, "relationshipResults");
    assert_eq!(&reply.payload[..], b"[]");

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn sessions_are_independent() {
    let listener = loopback().await;
    let addr = listener.local_addr().unwrap();
    let service = QueryService::new(DetectionCache::new());
    let cancel = CancellationToken::new();
    let server = tokio::spawn({
        let cancel = cancel.clone();
        async move { service.serve(listener, cancel).await }
    });

    let mut first = QueryClient::connect(addr).await.unwrap();
    let mut second = QueryClient::connect(addr).await.unwrap();
    for kind in RequestKind::ALL {
        assert_eq!(first.request(kind).await.unwrap().message_type, kind.response_type());
        assert_eq!(second.request(kind).await.unwrap().message_type, kind.response_type());
    }
    drop(first);
    assert_eq!(
        second.request(RequestKind::Malicious).await.unwrap().message_type,
        "maliciousResults"
    );

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn agent_serves_results_of_its_scans() {
    let dir = tempdir().unwrap();
    let exe = dir.path().join("dropper");
    std::fs::write(&exe, b"payload").unwrap();
    let feed = dir.path().join("feed.json");
    std::fs::write(
        &feed,
        format!(
            r#"[{{"md5": "{:x}", "type": "trojan"}}]"#,
            md5::compute(b"payload")
        ),
    )
    .unwrap();

    let mut config = Config::default();
    config.monitor.rpc_port = 0;
    config.threat_intel.feeds.push(FeedDescriptor {
        path: feed,
        format: FeedFormat::Json,
    });

    let services = Services {
        source: Box::new(StaticSource(vec![ProcessSample::new(7, "dropper", &exe)])),
        verifier: Arc::new(NothingSigned),
    };
    let agent = Arc::new(Agent::with_services(config, services).unwrap());
    let listener = agent.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut updates = agent.cache().subscribe();
    let cancel = CancellationToken::new();
    let running = tokio::spawn({
        let agent = Arc::clone(&agent);
        let cancel = cancel.clone();
        async move { agent.run(listener, cancel).await }
    });
    tokio::time::timeout(Duration::from_secs(5), updates.changed())
        .await
        .unwrap()
        .unwrap();

    let mut client = QueryClient::connect(addr).await.unwrap();
    let reply = client.request(RequestKind::Malicious).await.unwrap();
    let entries: serde_json::Value = serde_json::from_slice(&reply.payload).unwrap();
    assert_eq!(
        entries,
        serde_json::json!([{ "pid": 7, "name": "dropper", "exePath": exe }])
    );

    let reply = client.request(RequestKind::Unsigned).await.unwrap();
    let entries: serde_json::Value = serde_json::from_slice(&reply.payload).unwrap();
    assert_eq!(entries.as_array().unwrap().len(), 1);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn agent_rescans_on_its_interval() {
    let dir = tempdir().unwrap();
    let exe = dir.path().join("worker");
    std::fs::write(&exe, b"worker").unwrap();

    let mut config = Config::default();
    config.monitor.rpc_port = 0;
    let services = Services {
        source: Box::new(StaticSource(vec![ProcessSample::new(11, "worker", &exe)])),
        verifier: Arc::new(NothingSigned),
    };
    let agent = Arc::new(
        Agent::with_services(config, services)
            .unwrap()
            .with_scan_interval(Duration::from_millis(50)),
    );
    assert_eq!(agent.config().monitor.rpc_port, 0);

    let listener = agent.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    let mut updates = agent.scanner().cache().subscribe();
    let cancel = CancellationToken::new();
    let running = tokio::spawn({
        let agent = Arc::clone(&agent);
        let cancel = cancel.clone();
        async move { agent.run(listener, cancel).await }
    });

    // Two generations without any request_scan means the interval drove them.
    tokio::time::timeout(
        Duration::from_secs(5),
        updates.wait_for(|snapshot| snapshot.generation.get() >= 2),
    )
    .await
    .unwrap()
    .unwrap();

    let mut client = QueryClient::connect(addr).await.unwrap();
    assert_eq!(client.peer_addr().unwrap(), addr);
    let reply = client.request(RequestKind::Unsigned).await.unwrap();
    let entries: serde_json::Value = serde_json::from_slice(&reply.payload).unwrap();
    assert_eq!(
        entries,
        serde_json::json!([{ "pid": 11, "name": "worker", "exePath": exe }])
    );

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn stop_delivers_the_reply_in_flight() {
    let mut builder = SnapshotBuilder::new();
    for pid in 0..20_000 {
        builder.push_unsigned(ProcessEntry {
            pid,
            name: format!("proc-{pid}"),
            exe_path: PathBuf::from(format!("/opt/app/bin/proc-{pid}")),
        });
    }
    let cache = DetectionCache::new();
    cache.publish(builder.finish(Generation::new(1)));

    let listener = loopback().await;
    let addr = listener.local_addr().unwrap();
    let service = QueryService::new(cache);
    let cancel = CancellationToken::new();
    let server = tokio::spawn({
        let cancel = cancel.clone();
        async move { service.serve(listener, cancel).await }
    });

    let mut client = QueryClient::connect(addr).await.unwrap();
    let reply = client.request(RequestKind::Malicious).await.unwrap();
    assert_eq!(reply.message_type, "maliciousResults");

    // Ask, then stop before reading: the reply still arrives whole.
    let pending = tokio::spawn(async move {
        let reply = client.request(RequestKind::Unsigned).await;
        (client, reply)
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let (mut client, reply) = tokio::time::timeout(Duration::from_secs(5), pending)
        .await
        .unwrap()
        .unwrap();
    let reply = reply.unwrap();
    assert_eq!(reply.message_type, "unsignedResults");
    let entries: serde_json::Value = serde_json::from_slice(&reply.payload).unwrap();
    assert_eq!(entries.as_array().unwrap().len(), 20_000);

    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(client.request(RequestKind::Unsigned).await.is_err());
}

#[tokio::test]
async fn bind_failure_names_the_address() {
    let taken = loopback().await;
    let mut config = Config::default();
    config.monitor.rpc_port = taken.local_addr().unwrap().port();

    let services = Services {
        source: Box::new(StaticSource(Vec::new())),
        verifier: Arc::new(NothingSigned),
    };
    let agent = Agent::with_services(config, services).unwrap();
    let err = agent.bind().await.unwrap_err();
    assert!(matches!(err, detector::Error::BindFailed { .. }));
}
