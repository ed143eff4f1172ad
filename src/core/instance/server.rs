// ─── Server Target ───
// The server to join on launch and the resolver used to look it up.

use async_trait::async_trait;
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};

pub const DEFAULT_SERVER_PORT: u16 = 25565;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerTarget {
    pub address: String,
    pub port: u16,
}

impl ServerTarget {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    /// Parse `host`, `host:port`, `[v6]` or `[v6]:port`. Bad ports fall back to the default.
    pub fn parse(full_address: &str) -> Self {
        let full_address = full_address.trim();

        if let Some(rest) = full_address.strip_prefix('[') {
            if let Some((host, tail)) = rest.split_once(']') {
                let port = tail
                    .strip_prefix(':')
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(DEFAULT_SERVER_PORT);
                return Self::new(host, port);
            }
        }

        match full_address.split_once(':') {
            Some((host, port)) if !port.contains(':') => {
                Self::new(host, port.parse().unwrap_or(DEFAULT_SERVER_PORT))
            }
            _ => Self::new(full_address, DEFAULT_SERVER_PORT),
        }
    }
}

impl std::fmt::Display for ServerTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Resolves a bare host name to the server that should be joined.
#[async_trait]
pub trait ServerResolver: Send + Sync {
    /// `Ok(None)` means the name has no records and the literal should be used.
    async fn resolve(&self, host: &str) -> LauncherResult<Option<ServerTarget>>;
}

/// One `SRV` answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvRecord {
    pub target: String,
    pub port: u16,
    pub priority: u16,
    pub weight: u16,
}

/// Raw SRV record source. An empty list means the name has no records.
#[async_trait]
pub trait SrvLookup: Send + Sync {
    async fn lookup_srv(&self, name: &str) -> LauncherResult<Vec<SrvRecord>>;
}

/// SRV lookups through the system DNS configuration.
pub struct HickoryLookup;

#[async_trait]
impl SrvLookup for HickoryLookup {
    async fn lookup_srv(&self, name: &str) -> LauncherResult<Vec<SrvRecord>> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|e| LauncherError::Other(format!("No usable DNS configuration: {}", e)))?;
        match resolver.srv_lookup(name).await {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|srv| SrvRecord {
                    target: srv.target().to_utf8(),
                    port: srv.port(),
                    priority: srv.priority(),
                    weight: srv.weight(),
                })
                .collect()),
            Err(e) if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) => Ok(Vec::new()),
            Err(e) => Err(LauncherError::Other(format!("Failed to resolve {}: {}", name, e))),
        }
    }
}

/// Resolves `_minecraft._tcp.<host>` and joins the preferred record.
pub struct SystemResolver {
    lookup: Box<dyn SrvLookup>,
}

impl SystemResolver {
    pub fn new() -> Self {
        Self::with_lookup(Box::new(HickoryLookup))
    }

    pub fn with_lookup(lookup: Box<dyn SrvLookup>) -> Self {
        Self { lookup }
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServerResolver for SystemResolver {
    async fn resolve(&self, host: &str) -> LauncherResult<Option<ServerTarget>> {
        let records = self.lookup.lookup_srv(&srv_name(host)).await?;
        let target = preferred_record(&records);
        match &target {
            Some(target) => debug!("{} has SRV record {}", host, target),
            None => debug!("{} has no SRV records", host),
        }
        Ok(target)
    }
}

fn srv_name(host: &str) -> String {
    format!("_minecraft._tcp.{}", host.trim_end_matches('.'))
}

/// Lowest priority wins, then highest weight.
fn preferred_record(records: &[SrvRecord]) -> Option<ServerTarget> {
    records
        .iter()
        .filter(|r| !r.target.trim_end_matches('.').is_empty())
        .min_by(|a, b| a.priority.cmp(&b.priority).then(b.weight.cmp(&a.weight)))
        .map(|r| ServerTarget::new(r.target.trim_end_matches('.'), r.port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn parses_addresses() {
        assert_eq!(ServerTarget::parse("mc.example.org"), ServerTarget::new("mc.example.org", 25565));
        assert_eq!(ServerTarget::parse("mc.example.org:25570"), ServerTarget::new("mc.example.org", 25570));
        assert_eq!(ServerTarget::parse("[::1]:25570"), ServerTarget::new("::1", 25570));
        assert_eq!(ServerTarget::parse("host:notaport"), ServerTarget::new("host", 25565));
        assert_eq!(ServerTarget::parse("::1").port, 25565);
    }

    /// Answers from a fixed table and remembers the last query.
    struct FixedLookup {
        records: Vec<SrvRecord>,
        queried: Arc<Mutex<Option<String>>>,
    }

    #[async_trait]
    impl SrvLookup for FixedLookup {
        async fn lookup_srv(&self, name: &str) -> LauncherResult<Vec<SrvRecord>> {
            *self.queried.lock().unwrap() = Some(name.to_string());
            Ok(self.records.clone())
        }
    }

    fn record(target: &str, port: u16, priority: u16, weight: u16) -> SrvRecord {
        SrvRecord {
            target: target.to_string(),
            port,
            priority,
            weight,
        }
    }

    #[tokio::test]
    async fn srv_record_replaces_host_and_port() {
        let lookup = FixedLookup {
            records: vec![
                record("backup.example.org.", 25590, 20, 0),
                record("node1.example.org.", 25571, 10, 1),
                record("node2.example.org.", 25572, 10, 5),
            ],
            queried: Arc::default(),
        };
        let resolver = SystemResolver::with_lookup(Box::new(lookup));
        let target = resolver.resolve("play.example.org").await.unwrap();
        assert_eq!(target, Some(ServerTarget::new("node2.example.org", 25572)));
    }

    #[tokio::test]
    async fn srv_query_uses_minecraft_service_name() {
        let queried = Arc::new(Mutex::new(None));
        let resolver = SystemResolver::with_lookup(Box::new(FixedLookup {
            records: Vec::new(),
            queried: queried.clone(),
        }));
        assert_eq!(resolver.resolve("play.example.org.").await.unwrap(), None);
        assert_eq!(
            queried.lock().unwrap().as_deref(),
            Some("_minecraft._tcp.play.example.org")
        );
    }

    #[test]
    fn root_target_means_no_service() {
        assert_eq!(preferred_record(&[record(".", 25565, 0, 0)]), None);
    }
}
