// ABOUTME: Test support utilities.
// ABOUTME: Provides a fake fleet (executor + health check), inventories, and a local HTTP server.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;
use tranche::deploy::{DeployError, DeploymentExecutor, RolloutSettings};
use tranche::health::{HealthCheck, ProbeError, ProbePolicy};
use tranche::inventory::{InventoryError, InventoryProvider, Target};
use tranche::types::{TargetId, Version};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("tranche=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

#[allow(dead_code)]
pub fn version(v: &str) -> Version {
    Version::new(v).unwrap()
}

#[allow(dead_code)]
pub fn ids(values: &[&str]) -> Vec<TargetId> {
    values.iter().map(|v| TargetId::new(*v)).collect()
}

/// Targets all running `v1`, with fake health endpoints.
#[allow(dead_code)]
pub fn targets(ids: &[&str]) -> Vec<Target> {
    ids.iter()
        .map(|id| Target::new(*id, version("v1"), format!("http://{id}.test/health")))
        .collect()
}

/// One attempt, no backoff, no delay between batches.
#[allow(dead_code)]
pub fn fast_settings() -> RolloutSettings {
    RolloutSettings::new(fast_policy())
}

#[allow(dead_code)]
pub fn fast_policy() -> ProbePolicy {
    ProbePolicy::new(Duration::from_secs(1), NonZeroU32::MIN, Duration::ZERO)
}

/// In-memory fleet acting as both deploy backend and health endpoint.
///
/// Each target runs one version. A target listed in `unhealthy_on_new` fails
/// its health check while it runs anything other than its inventory version.
#[allow(dead_code)]
#[derive(Default)]
pub struct FakeFleet {
    running: Mutex<HashMap<TargetId, Version>>,
    unhealthy_on_new: HashSet<TargetId>,
    always_unhealthy: HashSet<TargetId>,
    failing_deploy: HashSet<TargetId>,
    failing_revert: HashSet<TargetId>,
    deploy_delay: Duration,
    deploys: Mutex<Vec<(TargetId, Version)>>,
    reverts: Mutex<Vec<(TargetId, Version)>>,
    checks: AtomicUsize,
}

#[allow(dead_code)]
impl FakeFleet {
    pub fn new(targets: &[Target]) -> Self {
        let running = targets
            .iter()
            .map(|t| (t.id.clone(), t.version.clone()))
            .collect();
        Self {
            running: Mutex::new(running),
            ..Default::default()
        }
    }

    pub fn unhealthy_on_new(mut self, ids: &[&str]) -> Self {
        self.unhealthy_on_new.extend(ids.iter().map(|id| TargetId::new(*id)));
        self
    }

    pub fn always_unhealthy(mut self, ids: &[&str]) -> Self {
        self.always_unhealthy.extend(ids.iter().map(|id| TargetId::new(*id)));
        self
    }

    pub fn failing_deploy(mut self, ids: &[&str]) -> Self {
        self.failing_deploy.extend(ids.iter().map(|id| TargetId::new(*id)));
        self
    }

    pub fn failing_revert(mut self, ids: &[&str]) -> Self {
        self.failing_revert.extend(ids.iter().map(|id| TargetId::new(*id)));
        self
    }

    pub fn deploy_delay(mut self, delay: Duration) -> Self {
        self.deploy_delay = delay;
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn running(&self, id: &str) -> Option<String> {
        self.running
            .lock()
            .get(&TargetId::new(id))
            .map(|v| v.as_str().to_string())
    }

    pub fn deployed_ids(&self) -> Vec<TargetId> {
        self.deploys.lock().iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn reverted_ids(&self) -> Vec<TargetId> {
        self.reverts.lock().iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn reverts(&self) -> Vec<(TargetId, Version)> {
        self.reverts.lock().clone()
    }

    pub fn check_count(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeploymentExecutor for FakeFleet {
    async fn deploy(&self, target: &Target, version: &Version) -> Result<(), DeployError> {
        if !self.deploy_delay.is_zero() {
            tokio::time::sleep(self.deploy_delay).await;
        }
        self.deploys.lock().push((target.id.clone(), version.clone()));
        if self.failing_deploy.contains(&target.id) {
            return Err(DeployError::failed(target.id.clone(), "image pull failed"));
        }
        self.running.lock().insert(target.id.clone(), version.clone());
        Ok(())
    }

    async fn revert(&self, target: &Target, to_version: &Version) -> Result<(), DeployError> {
        self.reverts.lock().push((target.id.clone(), to_version.clone()));
        if self.failing_revert.contains(&target.id) {
            return Err(DeployError::failed(target.id.clone(), "revert rejected"));
        }
        self.running.lock().insert(target.id.clone(), to_version.clone());
        Ok(())
    }
}

#[async_trait]
impl HealthCheck for FakeFleet {
    async fn check(&self, target: &Target) -> Result<(), ProbeError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if self.always_unhealthy.contains(&target.id) {
            return Err(ProbeError::Status(500));
        }
        let on_new = self.running.lock().get(&target.id) != Some(&target.version);
        if on_new && self.unhealthy_on_new.contains(&target.id) {
            return Err(ProbeError::Status(503));
        }
        Ok(())
    }
}

/// Inventory that counts how often it is read.
#[allow(dead_code)]
pub struct CountingInventory {
    targets: Vec<Target>,
    reads: AtomicUsize,
}

#[allow(dead_code)]
impl CountingInventory {
    pub fn new(targets: Vec<Target>) -> Self {
        Self {
            targets,
            reads: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InventoryProvider for CountingInventory {
    async fn list_targets(&self) -> Result<Vec<Target>, InventoryError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.targets.clone())
    }
}

/// Minimal HTTP/1.1 server answering every request with a fixed status.
///
/// Runs on a plain thread so both sync and async tests can use it.
#[allow(dead_code)]
pub struct TestServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl TestServer {
    pub fn start(status: u16) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                counter.fetch_add(1, Ordering::SeqCst);

                let mut request = Vec::new();
                let mut buf = [0u8; 512];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }

                let response = format!(
                    "HTTP/1.1 {status} Test\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok"
                );
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
            }
        });

        Self { addr, hits }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}
