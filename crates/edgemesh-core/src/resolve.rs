//! Supernode hostname resolution
//!
//! A background worker periodically re-resolves every supernode's
//! `host:port` spec and stages the results; the main loop publishes
//! staged sockets into the peer registry on its next check. The consumer
//! side never blocks: it takes the shared lock with `try_lock` and simply
//! retries on the next pass, so a `check` call always completes in
//! bounded time.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::lookup_host;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::unix_now;
use crate::error::{CoreError, CoreResult};
use crate::peers::PeerRegistry;
use crate::sock::SockAddr;

/// Resolver timing configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolveConfig {
    /// Seconds between unforced re-resolutions of all supernode names
    pub interval_secs: u64,

    /// Seconds between consumer checks for published results
    pub check_interval_secs: u64,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            check_interval_secs: 10,
        }
    }
}

impl ResolveConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.interval_secs < 60 {
            return Err("resolve interval must be at least 60 seconds".into());
        }
        if self.check_interval_secs == 0 {
            return Err("check interval must be at least 1 second".into());
        }
        Ok(())
    }
}

/// Parse a `host:port` supernode spec.
///
/// The port is read the way `atoi` would: leading decimal digits,
/// anything after them silently ignored, the value wrapped into 16 bits.
pub fn parse_supernode(spec: &str) -> CoreResult<(&str, u16)> {
    let (host, port) = spec
        .split_once(':')
        .ok_or_else(|| CoreError::MalformedSupernode(spec.to_string()))?;
    if host.is_empty() || port.is_empty() {
        return Err(CoreError::MalformedSupernode(spec.to_string()));
    }
    Ok((host, atoi_port(port)))
}

fn atoi_port(s: &str) -> u16 {
    let end = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    s[..end].parse::<u64>().unwrap_or(0) as u16
}

/// Resolve a supernode spec to an IPv4 socket address.
pub async fn resolve_supernode(spec: &str) -> CoreResult<SockAddr> {
    let (host, port) = parse_supernode(spec)?;

    let mut addrs = lookup_host((host, port))
        .await
        .map_err(|e| CoreError::ResolveFailed {
            host: host.to_string(),
            reason: e.to_string(),
        })?;

    let v4 = addrs
        .find_map(|addr| match addr {
            SocketAddr::V4(v4) => Some(v4),
            SocketAddr::V6(_) => None,
        })
        .ok_or_else(|| CoreError::NoIpv4Address(host.to_string()))?;

    debug!(host, "resolved supernode IPv4 address");
    Ok(SockAddr::V4 {
        addr: v4.ip().octets(),
        port,
    })
}

/// One supernode name under periodic re-resolution
#[derive(Debug)]
struct ResolveEntry {
    /// Original `host:port` spec
    hostname: String,
    /// Freshest successful resolution, staged for publication
    sock: SockAddr,
    /// What the registry currently holds for this peer
    published: SockAddr,
    /// Outcome of the last resolution attempt
    error: Option<CoreError>,
}

/// Worker-shared state; every field is guarded by the mutex.
#[derive(Debug, Default)]
struct ResolveShared {
    entries: Vec<ResolveEntry>,
    /// Consumer asks for an immediate re-resolution pass
    request: bool,
    /// Worker staged at least one changed socket
    changed: bool,
    last_resolved: u64,
}

/// Handle to the background resolver, owned by the main loop.
#[derive(Debug)]
pub struct Resolver {
    shared: Arc<Mutex<ResolveShared>>,
    worker: JoinHandle<()>,
    cfg: ResolveConfig,
    // consumer-only fields, never contended, so not under the mutex
    last_checked: u64,
    check_interval: u64,
}

impl Resolver {
    /// Seed one entry per supernode peer carrying a hostname and start
    /// the worker on the current runtime.
    ///
    /// Outside a runtime this fails with
    /// [`CoreError::ResolverUnavailable`] and callers keep handling their
    /// own `requires_resolution` flag.
    pub fn spawn(registry: &PeerRegistry, cfg: ResolveConfig) -> CoreResult<Self> {
        let handle =
            tokio::runtime::Handle::try_current().map_err(|_| CoreError::ResolverUnavailable)?;

        let entries = registry
            .values()
            .filter_map(|peer| {
                peer.hostname.as_ref().map(|hostname| ResolveEntry {
                    hostname: hostname.clone(),
                    sock: peer.sock,
                    published: peer.sock,
                    error: None,
                })
            })
            .collect();

        let shared = Arc::new(Mutex::new(ResolveShared {
            entries,
            ..Default::default()
        }));
        let worker = handle.spawn(resolve_worker(Arc::clone(&shared), cfg.clone()));

        Ok(Self {
            shared,
            worker,
            check_interval: cfg.check_interval_secs,
            cfg,
            last_checked: 0,
        })
    }

    /// Stop the background worker.
    pub fn cancel(self) {
        self.worker.abort();
    }

    /// Publish staged results and forward an urgent re-resolution need.
    ///
    /// Returns `false` once the worker has been told about the urgent
    /// need (nothing further for the caller to do), otherwise
    /// `requires_resolution` unchanged so the caller retries later.
    pub fn check(
        &mut self,
        registry: &mut PeerRegistry,
        requires_resolution: bool,
        now: u64,
    ) -> bool {
        if now.saturating_sub(self.last_checked) <= self.check_interval && !requires_resolution {
            return requires_resolution;
        }

        let Ok(mut shared) = self.shared.try_lock() else {
            // worker holds the lock; try again on the next pass
            return requires_resolution;
        };
        let mut ret = requires_resolution;

        if shared.changed {
            shared.changed = false;
            // publish every entry, not just the changed ones: errored
            // entries simply re-publish their last known socket
            for entry in &mut shared.entries {
                entry.published = entry.sock;
                if registry.set_sock_by_hostname(&entry.hostname, entry.sock) {
                    info!(supernode = %entry.hostname, sock = %entry.sock,
                          "renewed supernode address");
                }
            }
        }

        if requires_resolution {
            shared.request = true;
            ret = false;
        }

        self.last_checked = now;
        self.check_interval = if shared.request {
            self.cfg.check_interval_secs / 10
        } else {
            self.cfg.check_interval_secs
        };

        ret
    }
}

impl Drop for Resolver {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn resolve_worker(shared: Arc<Mutex<ResolveShared>>, cfg: ResolveConfig) {
    let mut rep_time = cfg.interval_secs / 10;

    loop {
        // wake well before the repetition time to notice signalled requests
        tokio::time::sleep(Duration::from_secs(cfg.interval_secs / 60)).await;

        let now = unix_now();
        let mut shared = shared.lock().await;

        if !shared.request && now.saturating_sub(shared.last_resolved) <= rep_time {
            continue;
        }

        let mut changed = false;
        let mut all_ok = true;
        for entry in &mut shared.entries {
            match resolve_supernode(&entry.hostname).await {
                Ok(sock) => {
                    if sock != entry.published {
                        changed = true;
                    }
                    entry.sock = sock;
                    entry.error = None;
                }
                Err(err) => {
                    // keep the last known socket; retry on the short interval
                    warn!(supernode = %entry.hostname, error = %err,
                          "supernode re-resolution failed");
                    entry.error = Some(err);
                    all_ok = false;
                }
            }
        }
        if changed {
            shared.changed = true;
        }
        shared.last_resolved = now;
        shared.request = false;

        rep_time = if all_ok {
            cfg.interval_secs
        } else {
            cfg.interval_secs / 10
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::Mac;
    use crate::peers::Peer;

    #[test]
    fn test_parse_supernode() {
        assert_eq!(parse_supernode("1.2.3.4:80").unwrap(), ("1.2.3.4", 80));
        assert_eq!(
            parse_supernode("sn.example.com:7777").unwrap(),
            ("sn.example.com", 7777)
        );
        // non-numeric suffix is silently truncated, as atoi would
        assert_eq!(parse_supernode("1.2.3.4:80abc").unwrap(), ("1.2.3.4", 80));
        // a port value wider than 16 bits wraps
        assert_eq!(parse_supernode("h:70000").unwrap(), ("h", 4464));
        assert_eq!(parse_supernode("h:abc").unwrap(), ("h", 0));

        assert!(parse_supernode("no-port").is_err());
        assert!(parse_supernode("host:").is_err());
        assert!(parse_supernode(":80").is_err());
        assert!(parse_supernode("").is_err());
    }

    #[tokio::test]
    async fn test_resolve_supernode_loopback() {
        let sock = resolve_supernode("localhost:7777").await.unwrap();
        assert_eq!(
            sock,
            SockAddr::V4 {
                addr: [127, 0, 0, 1],
                port: 7777
            }
        );
    }

    #[tokio::test]
    async fn test_resolve_failure_is_typed() {
        let err = resolve_supernode("surely-not-a-real-host.invalid:7777")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ResolveFailed { .. }));
    }

    #[test]
    fn test_spawn_outside_runtime_degrades() {
        let mut registry = PeerRegistry::new();
        registry.insert(Peer::with_hostname(
            Mac::new([2, 0, 0, 0, 0, 1]),
            SockAddr::Invalid,
            "localhost:7777",
        ));

        match Resolver::spawn(&registry, ResolveConfig::default()) {
            Err(CoreError::ResolverUnavailable) => {}
            other => panic!("expected ResolverUnavailable, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_requested_resolution_is_published() {
        let mac = Mac::new([2, 0, 0, 0, 0, 1]);
        let mut registry = PeerRegistry::new();
        registry.insert(Peer::with_hostname(mac, SockAddr::Invalid, "localhost:19191"));

        // a 60 second interval makes the worker tick once per second
        let cfg = ResolveConfig {
            interval_secs: 60,
            check_interval_secs: 10,
        };
        let mut resolver = Resolver::spawn(&registry, cfg).unwrap();

        // hand the urgent need to the worker
        let pending = resolver.check(&mut registry, true, unix_now());
        assert!(!pending);

        let expected = SockAddr::V4 {
            addr: [127, 0, 0, 1],
            port: 19191,
        };
        let mut published = false;
        for _ in 0..60 {
            tokio::time::sleep(Duration::from_millis(500)).await;
            resolver.check(&mut registry, false, unix_now());
            if registry.get(&mac).map(|p| p.sock) == Some(expected) {
                published = true;
                break;
            }
        }
        assert!(published, "resolver never published the refreshed socket");

        resolver.cancel();
    }
}
