use crate::error::{Result, ScanError};
use crate::record::ResolvedAddress;
use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use tracing::{debug, warn};
use url::{Host, Url};

pub const DEFAULT_MAX_RESOLVE_DEPTH: usize = 4;

/// Name lookup seam. Answers may be literal addresses or further names.
#[async_trait]
pub trait NameResolver: Send + Sync {
    async fn lookup(&self, host: &str) -> io::Result<Vec<String>>;
}

/// Resolves through the operating system's resolver
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

#[async_trait]
impl NameResolver for SystemResolver {
    async fn lookup(&self, host: &str) -> io::Result<Vec<String>> {
        let addrs = tokio::net::lookup_host((host, 0)).await?;
        Ok(addrs.map(|addr| addr.ip().to_string()).collect())
    }
}

/// Extract the host of a locator, without its port.
///
/// Returns `Ok(None)` for locators that carry no host at all (relative
/// strings, `mailto:` and the like); those are not errors. IPv6 hosts are
/// returned unbracketed.
pub fn locator_host(locator: &str) -> Result<Option<String>> {
    let url = match Url::parse(locator.trim()) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => return Ok(None),
        Err(e) => return Err(ScanError::InvalidUrl(format!("{}: {}", locator, e))),
    };

    Ok(match url.host() {
        None => None,
        Some(Host::Domain(domain)) if domain.is_empty() => None,
        Some(Host::Domain(domain)) => Some(domain.to_string()),
        Some(Host::Ipv4(ip)) => Some(ip.to_string()),
        Some(Host::Ipv6(ip)) => Some(ip.to_string()),
    })
}

/// Turns hosts into literal addresses
#[derive(Clone)]
pub struct EndpointResolver {
    names: Arc<dyn NameResolver>,
    max_depth: usize,
}

impl EndpointResolver {
    pub fn new() -> Self {
        Self::with_resolver(Arc::new(SystemResolver))
    }

    pub fn with_resolver(names: Arc<dyn NameResolver>) -> Self {
        Self {
            names,
            max_depth: DEFAULT_MAX_RESOLVE_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Resolve `host` to every literal address it leads to.
    ///
    /// Names are followed through a work list, at most `max_depth` lookups
    /// deep. Failed lookups and over-deep branches are logged and dropped.
    /// Repeated addresses are collapsed; lookup order is kept.
    pub async fn resolve_host(&self, host: &str) -> Vec<ResolvedAddress> {
        let mut pending = vec![(host.to_string(), 0usize)];
        let mut resolved: Vec<ResolvedAddress> = Vec::new();

        while let Some((name, depth)) = pending.pop() {
            if let Some(addr) = ResolvedAddress::parse(&name) {
                if !resolved.contains(&addr) {
                    resolved.push(addr);
                }
                continue;
            }

            if depth >= self.max_depth {
                warn!(host = %host, "{}", ScanError::ResolveDepthExceeded(name));
                continue;
            }

            match self.names.lookup(&name).await {
                Ok(answers) => {
                    debug!(host = %host, name = %name, answers = answers.len(), "Resolved name");
                    // Pushed in reverse so the first answer is popped first
                    for answer in answers.into_iter().rev() {
                        pending.push((answer, depth + 1));
                    }
                }
                Err(source) => {
                    warn!(host = %host, "{}", ScanError::ResolveError { host: name, source });
                }
            }
        }

        resolved
    }
}

impl Default for EndpointResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// In-memory resolver for tests
    #[derive(Default)]
    pub(crate) struct StaticResolver {
        answers: HashMap<String, Vec<String>>,
    }

    impl StaticResolver {
        pub(crate) fn with(mut self, name: &str, answers: &[&str]) -> Self {
            self.answers.insert(
                name.to_string(),
                answers.iter().map(|a| a.to_string()).collect(),
            );
            self
        }
    }

    #[async_trait]
    impl NameResolver for StaticResolver {
        async fn lookup(&self, host: &str) -> io::Result<Vec<String>> {
            self.answers
                .get(host)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such host"))
        }
    }

    fn resolver(names: StaticResolver) -> EndpointResolver {
        EndpointResolver::with_resolver(Arc::new(names))
    }

    #[test]
    fn test_locator_host_strips_port() {
        assert_eq!(
            locator_host("http://10.0.0.1:80/path").unwrap(),
            Some("10.0.0.1".to_string())
        );
        assert_eq!(
            locator_host("https://ps.example.net:8090/lookup/records").unwrap(),
            Some("ps.example.net".to_string())
        );
        assert_eq!(
            locator_host("http://[2001:db8::5]:443/").unwrap(),
            Some("2001:db8::5".to_string())
        );
    }

    #[test]
    fn test_locator_host_without_port() {
        assert_eq!(
            locator_host("http://ps.example.net/toolkit").unwrap(),
            Some("ps.example.net".to_string())
        );
    }

    #[test]
    fn test_locator_without_host_is_dropped_silently() {
        assert_eq!(locator_host("").unwrap(), None);
        assert_eq!(locator_host("service-type").unwrap(), None);
        assert_eq!(locator_host("mailto:ops@example.net").unwrap(), None);
    }

    #[test]
    fn test_locator_with_bad_host_is_an_error() {
        assert!(matches!(
            locator_host("http://[::1"),
            Err(ScanError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_literal_address_skips_lookup() {
        let resolved = resolver(StaticResolver::default()).resolve_host("10.0.0.1").await;
        assert_eq!(resolved, vec![ResolvedAddress::parse("10.0.0.1").unwrap()]);
    }

    #[tokio::test]
    async fn test_name_fans_out_in_order() {
        let resolved = resolver(
            StaticResolver::default().with("ps.example.net", &["10.0.0.1", "10.0.0.2", "2001:db8::1"]),
        )
            .resolve_host("ps.example.net")
            .await;
        let rendered: Vec<String> = resolved.iter().map(|a| a.to_string()).collect();
        assert_eq!(rendered, vec!["10.0.0.1", "10.0.0.2", "[2001:db8::1]"]);
    }

    #[tokio::test]
    async fn test_names_are_followed_transitively() {
        let resolved = resolver(
            StaticResolver::default()
                .with("alias.example.net", &["ps.example.net", "10.0.0.9"])
                .with("ps.example.net", &["10.0.0.1", "10.0.0.9"]),
        )
        .resolve_host("alias.example.net")
        .await;
        let rendered: Vec<String> = resolved.iter().map(|a| a.to_string()).collect();
        assert_eq!(rendered, vec!["10.0.0.1", "10.0.0.9"]);
    }

    #[tokio::test]
    async fn test_cyclic_names_stop_at_depth() {
        let resolved = resolver(
            StaticResolver::default()
                .with("a.example", &["b.example"])
                .with("b.example", &["a.example"]),
        )
            .with_max_depth(3)
            .resolve_host("a.example")
            .await;
        assert!(resolved.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_failure_yields_nothing() {
        let resolved = resolver(StaticResolver::default()).resolve_host("missing.example").await;
        assert!(resolved.is_empty());
    }
}
