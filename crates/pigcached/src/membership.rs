//! Working out which entry of the peer list is this node

use std::net::SocketAddr;

use tokio::net::lookup_host;
use tracing::{debug, info, warn};

/// `host:port` part of a peer URL, with the scheme's default port filled in
fn authority(url: &str) -> String {
    let (scheme, rest) = url.split_once("://").unwrap_or(("http", url));
    let host = rest.split('/').next().unwrap_or(rest);
    let has_port = match host.rfind(']') {
        Some(end) => host[end..].contains(':'),
        None => host.contains(':'),
    };
    if has_port {
        host.to_string()
    } else if scheme == "https" {
        format!("{}:443", host)
    } else {
        format!("{}:80", host)
    }
}

async fn resolve(authority: &str) -> Vec<SocketAddr> {
    match lookup_host(authority).await {
        Ok(addrs) => addrs.collect(),
        Err(e) => {
            debug!("Cannot resolve {}: {}", authority, e);
            Vec::new()
        }
    }
}

fn same_endpoint(local: &SocketAddr, peer: &SocketAddr) -> bool {
    if local.port() != peer.port() {
        return false;
    }
    local.ip() == peer.ip() || (local.ip().is_unspecified() && peer.ip().is_loopback())
}

/// Peer URLs that resolve to the address this node binds
pub async fn find_self_aliases(bind: &str, peers: &[String]) -> Vec<String> {
    let local = resolve(bind).await;
    let mut aliases = Vec::new();
    if local.is_empty() {
        return aliases;
    }
    for peer in peers {
        let addrs = resolve(&authority(peer)).await;
        if addrs.iter().any(|a| local.iter().any(|l| same_endpoint(l, a))) {
            aliases.push(peer.clone());
        }
    }
    aliases
}

/// Pick this node's ring id and the final peer list
///
/// A peer listed under another spelling of this node's address would join
/// the ring as a second member that forwards to itself. The first alias
/// becomes the id when `--self-url` is absent; every other alias is dropped.
pub fn self_membership(
    bind: &str,
    self_url: Option<&str>,
    peers: &[String],
    aliases: &[String],
) -> (String, Vec<String>) {
    let self_id = match (self_url, aliases.first()) {
        (Some(url), _) => url.to_string(),
        (None, Some(alias)) => {
            info!("Peer {} resolves to this node; using it as the node id", alias);
            alias.clone()
        }
        (None, None) => format!("http://{}", bind),
    };

    let mut ring = Vec::with_capacity(peers.len() + 1);
    for peer in peers {
        if *peer != self_id && aliases.contains(peer) {
            warn!("Peer {} resolves to this node ({}); dropping it", peer, self_id);
        } else if !ring.contains(peer) {
            ring.push(peer.clone());
        }
    }
    if !ring.contains(&self_id) {
        ring.push(self_id.clone());
    }
    (self_id, ring)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_authority() {
        assert_eq!(authority("http://127.0.0.1:8001/"), "127.0.0.1:8001");
        assert_eq!(authority("http://localhost:8001/_pigcache/"), "localhost:8001");
        assert_eq!(authority("http://node1"), "node1:80");
        assert_eq!(authority("https://node1"), "node1:443");
        assert_eq!(authority("http://[::1]:8001"), "[::1]:8001");
        assert_eq!(authority("http://[::1]"), "[::1]:80");
    }

    #[tokio::test]
    async fn test_trailing_slash_is_self() {
        let peers = urls(&["http://127.0.0.1:8002", "http://127.0.0.1:8001/"]);
        let aliases = find_self_aliases("127.0.0.1:8001", &peers).await;
        assert_eq!(aliases, urls(&["http://127.0.0.1:8001/"]));
    }

    #[tokio::test]
    async fn test_localhost_is_self() {
        let peers = urls(&["http://localhost:8001", "http://127.0.0.1:8002"]);
        let aliases = find_self_aliases("127.0.0.1:8001", &peers).await;
        assert_eq!(aliases, urls(&["http://localhost:8001"]));
    }

    #[tokio::test]
    async fn test_unspecified_bind_matches_loopback() {
        let peers = urls(&["http://127.0.0.1:8001"]);
        let aliases = find_self_aliases("0.0.0.0:8001", &peers).await;
        assert_eq!(aliases, peers);
    }

    #[tokio::test]
    async fn test_other_port_is_not_self() {
        let peers = urls(&["http://localhost:8002", "http://127.0.0.1:8003"]);
        assert!(find_self_aliases("127.0.0.1:8001", &peers).await.is_empty());
    }

    #[test]
    fn test_alias_becomes_id() {
        let peers = urls(&["http://localhost:8001", "http://127.0.0.1:8002"]);
        let aliases = urls(&["http://localhost:8001"]);
        let (id, ring) = self_membership("127.0.0.1:8001", None, &peers, &aliases);

        assert_eq!(id, "http://localhost:8001");
        assert_eq!(ring, peers);
    }

    #[test]
    fn test_alias_dropped_for_explicit_self_url() {
        let peers = urls(&["http://localhost:8001", "http://127.0.0.1:8002"]);
        let aliases = urls(&["http://localhost:8001"]);
        let (id, ring) = self_membership(
            "127.0.0.1:8001",
            Some("http://127.0.0.1:8001"),
            &peers,
            &aliases,
        );

        assert_eq!(id, "http://127.0.0.1:8001");
        assert_eq!(ring, urls(&["http://127.0.0.1:8002", "http://127.0.0.1:8001"]));
    }

    #[test]
    fn test_second_spelling_dropped() {
        let peers = urls(&[
            "http://127.0.0.1:8001",
            "http://127.0.0.1:8002",
            "http://localhost:8001",
        ]);
        let aliases = urls(&["http://127.0.0.1:8001", "http://localhost:8001"]);
        let (id, ring) = self_membership("127.0.0.1:8001", None, &peers, &aliases);

        assert_eq!(id, "http://127.0.0.1:8001");
        assert_eq!(ring, urls(&["http://127.0.0.1:8001", "http://127.0.0.1:8002"]));
    }

    #[test]
    fn test_default_id_from_bind() {
        let peers = urls(&["http://127.0.0.1:8002"]);
        let (id, ring) = self_membership("127.0.0.1:8001", None, &peers, &[]);

        assert_eq!(id, "http://127.0.0.1:8001");
        assert_eq!(ring, urls(&["http://127.0.0.1:8002", "http://127.0.0.1:8001"]));
    }
}
