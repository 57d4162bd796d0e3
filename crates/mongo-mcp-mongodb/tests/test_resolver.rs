//! Connection resolver state machine, exercised with an in-memory connector.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mongo_mcp_mongodb::{
    ConnectionDescriptor, ConnectionReport, ConnectionResolver, ConnectionState, Connector,
    MongoMcpError, Result, Topology, TopologyRole,
};

#[derive(Debug)]
struct FakeClient {
    uri: String,
}

#[derive(Default)]
struct FakeConnector {
    opens: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    fail_ping: Arc<AtomicBool>,
    open_delay: Duration,
}

#[async_trait]
impl Connector for FakeConnector {
    type Client = FakeClient;

    async fn open(&self, descriptor: &ConnectionDescriptor) -> Result<FakeClient> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        Ok(FakeClient {
            uri: descriptor.uri.clone(),
        })
    }

    async fn ping(&self, _client: &FakeClient) -> Result<()> {
        if self.fail_ping.load(Ordering::SeqCst) {
            return Err(MongoMcpError::Operation("server selection failed".to_string()));
        }
        Ok(())
    }

    async fn probe(&self, _client: &FakeClient) -> Topology {
        Topology {
            role: TopologyRole::Standalone,
            server_version: Some("7.0.0".to_string()),
            ..Default::default()
        }
    }

    async fn close(&self, _client: &FakeClient) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

fn resolver(connector: FakeConnector) -> Arc<ConnectionResolver<FakeConnector>> {
    Arc::new(ConnectionResolver::new(connector, ConnectionDescriptor::default()))
}

#[tokio::test]
async fn test_concurrent_first_callers_share_one_connect() {
    let opens = Arc::new(AtomicUsize::new(0));
    let resolver = resolver(FakeConnector {
        opens: opens.clone(),
        open_delay: Duration::from_millis(50),
        ..Default::default()
    });

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let resolver = resolver.clone();
            tokio::spawn(async move { resolver.get_handle().await })
        })
        .collect();

    let handles: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(opens.load(Ordering::SeqCst), 1);
    assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
    assert_eq!(handles[0].generation(), 1);
    assert_eq!(resolver.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_steady_state_reuses_handle() {
    let opens = Arc::new(AtomicUsize::new(0));
    let resolver = resolver(FakeConnector {
        opens: opens.clone(),
        ..Default::default()
    });

    let first = resolver.get_handle().await.unwrap();
    let second = resolver.get_handle().await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(opens.load(Ordering::SeqCst), 1);
    assert_eq!(first.topology().server_version.as_deref(), Some("7.0.0"));
}

#[tokio::test]
async fn test_close_before_connect_is_noop() {
    let closes = Arc::new(AtomicUsize::new(0));
    let resolver = resolver(FakeConnector {
        closes: closes.clone(),
        ..Default::default()
    });
    resolver.close().await;
    assert_eq!(resolver.state(), ConnectionState::Uninitialized);
    resolver.close().await;
    assert_eq!(resolver.state(), ConnectionState::Uninitialized);
    assert_eq!(closes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_reopen_after_close() {
    let opens = Arc::new(AtomicUsize::new(0));
    let closes = Arc::new(AtomicUsize::new(0));
    let resolver = resolver(FakeConnector {
        opens: opens.clone(),
        closes: closes.clone(),
        ..Default::default()
    });

    let first = resolver.get_handle().await.unwrap();
    resolver.close().await;
    assert_eq!(resolver.state(), ConnectionState::Closed);
    assert_eq!(closes.load(Ordering::SeqCst), 1);

    // Second close is a no-op
    resolver.close().await;
    assert_eq!(resolver.state(), ConnectionState::Closed);
    assert_eq!(closes.load(Ordering::SeqCst), 1);

    let second = resolver.get_handle().await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(second.generation(), 2);
    assert_eq!(opens.load(Ordering::SeqCst), 2);
    assert_eq!(resolver.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_failed_connect_restores_state() {
    let fail = Arc::new(AtomicBool::new(true));
    let opens = Arc::new(AtomicUsize::new(0));
    let resolver = resolver(FakeConnector {
        opens: opens.clone(),
        fail_ping: fail.clone(),
        ..Default::default()
    });

    let err = resolver.get_handle().await.unwrap_err();
    assert!(matches!(err, MongoMcpError::Connection(_)), "got {err:?}");
    assert!(err.is_retryable());
    assert_eq!(resolver.state(), ConnectionState::Uninitialized);

    // Nothing is cached; the next caller tries again
    fail.store(false, Ordering::SeqCst);
    let handle = resolver.get_handle().await.unwrap();
    assert_eq!(handle.generation(), 1);
    assert_eq!(opens.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_cancelled_connect_restores_state() {
    let resolver = resolver(FakeConnector {
        open_delay: Duration::from_secs(5),
        ..Default::default()
    });

    let attempt = tokio::time::timeout(Duration::from_millis(20), resolver.get_handle()).await;
    assert!(attempt.is_err());
    assert_eq!(resolver.state(), ConnectionState::Uninitialized);
}

#[tokio::test]
async fn test_reconfigure_applies_on_next_connect() {
    let closes = Arc::new(AtomicUsize::new(0));
    let resolver = resolver(FakeConnector {
        closes: closes.clone(),
        ..Default::default()
    });
    let first = resolver.get_handle().await.unwrap();
    assert_eq!(first.client().uri, ConnectionDescriptor::default().uri);

    let descriptor = ConnectionDescriptor {
        uri: "mongodb://db.internal:27018".to_string(),
        ..Default::default()
    };
    resolver.reconfigure(descriptor).await;
    assert_eq!(resolver.state(), ConnectionState::Closed);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert_eq!(resolver.descriptor().uri, "mongodb://db.internal:27018");

    let second = resolver.get_handle().await.unwrap();
    assert_eq!(second.client().uri, "mongodb://db.internal:27018");
    assert_eq!(second.generation(), 2);
}

#[tokio::test]
async fn test_describe_never_connects() {
    let opens = Arc::new(AtomicUsize::new(0));
    let resolver = resolver(FakeConnector {
        opens: opens.clone(),
        ..Default::default()
    });

    match resolver.describe() {
        ConnectionReport::NotConnected { state, configuration } => {
            assert_eq!(state, ConnectionState::Uninitialized);
            assert!(configuration.get("uri").is_some());
        }
        other => panic!("unexpected report: {other:?}"),
    }
    assert_eq!(opens.load(Ordering::SeqCst), 0);

    resolver.get_handle().await.unwrap();
    let report = serde_json::to_value(resolver.describe()).unwrap();
    assert_eq!(report["status"], "connected");
    assert_eq!(report["generation"], 1);
    assert_eq!(report["topology"]["role"], "standalone");
}
