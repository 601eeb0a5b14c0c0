//! HTTP accept loop

use std::sync::Arc;

use anyhow::Result;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::handler::RequestHandler;

/// Serve connections from `listener` until `shutdown` fires
pub async fn serve(
    listener: TcpListener,
    handler: Arc<RequestHandler>,
    shutdown: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Server shutting down");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    debug!("New connection from {}", addr);
                    let handler = Arc::clone(&handler);

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let handler = Arc::clone(&handler);
                            async move { handler.serve(req).await }
                        });

                        if let Err(e) = http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), service)
                            .await
                        {
                            error!("Error serving connection {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::HttpGetter;
    use crate::handler::DEFAULT_BASE_PATH;
    use pigcache::{
        Error, GetterFn, GroupRegistry, HashRing, LoadContext, PeerGetter, PeerPicker, PeerPool,
    };
    use std::collections::HashMap;
    use std::sync::Mutex;

    const REPLICAS: usize = 50;

    struct Node {
        id: String,
        registry: Arc<GroupRegistry>,
        loads: Arc<Mutex<HashMap<String, usize>>>,
    }

    /// Start one node per listener, all sharing the same peer list
    async fn start_cluster(size: usize, shutdown: &CancellationToken) -> Vec<Node> {
        let mut listeners = Vec::new();
        for _ in 0..size {
            listeners.push(TcpListener::bind("127.0.0.1:0").await.unwrap());
        }
        let ids: Vec<String> = listeners
            .iter()
            .map(|l| format!("http://{}", l.local_addr().unwrap()))
            .collect();

        let mut nodes = Vec::new();
        for (listener, id) in listeners.into_iter().zip(ids.iter()) {
            let client = reqwest::Client::new();
            let pool = Arc::new(PeerPool::new(
                id.clone(),
                REPLICAS,
                move |peer: &str| -> Arc<dyn PeerGetter> {
                    Arc::new(HttpGetter::new(client.clone(), peer, DEFAULT_BASE_PATH))
                },
            ));
            pool.set_peers(&ids);

            let registry = Arc::new(GroupRegistry::with_peers(pool as Arc<dyn PeerPicker>));
            let loads = Arc::new(Mutex::new(HashMap::new()));
            let counter = Arc::clone(&loads);
            let node_id = id.clone();
            registry.new_group(
                "scores",
                2 << 10,
                GetterFn(move |key: &str| {
                    *counter.lock().unwrap().entry(key.to_string()).or_insert(0) += 1;
                    Ok::<_, String>(format!("{}@{}", key, node_id).into_bytes())
                }),
            );

            let handler = Arc::new(RequestHandler::new(
                id.clone(),
                DEFAULT_BASE_PATH,
                Arc::clone(&registry),
            ));
            tokio::spawn(serve(listener, handler, shutdown.clone()));

            nodes.push(Node {
                id: id.clone(),
                registry,
                loads,
            });
        }
        nodes
    }

    #[tokio::test]
    async fn test_keys_route_to_owner() {
        let shutdown = CancellationToken::new();
        let nodes = start_cluster(2, &shutdown).await;

        let mut ring = HashRing::new(REPLICAS);
        ring.add(nodes.iter().map(|n| n.id.as_str()));

        // ten keys owned by each node, so both the local and the remote path run
        let mut keys: Vec<(String, String)> = Vec::new();
        for i in 0..1000 {
            let key = format!("user/{} x", i);
            let owner = ring.get(&key).unwrap().to_string();
            if keys.iter().filter(|(_, o)| *o == owner).count() < 10 {
                keys.push((key, owner));
            }
            if keys.len() == 20 {
                break;
            }
        }
        assert_eq!(keys.len(), 20);

        let front = nodes[0].registry.get_group("scores").unwrap();
        for (key, owner) in &keys {
            let value = front.get(key).await.unwrap();
            assert_eq!(value.to_string(), format!("{}@{}", key, owner));

            let owner_node = nodes.iter().find(|n| n.id == *owner).unwrap();
            assert_eq!(owner_node.loads.lock().unwrap()[key], 1);
            if *owner != nodes[0].id {
                assert!(!nodes[0].loads.lock().unwrap().contains_key(key));
            }
        }

        // only locally owned keys stay in the front node's store
        assert_eq!(front.cache_len(), 10);
        assert_eq!(nodes[1].loads.lock().unwrap().len(), 10);

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_fetch_unknown_group_fails() {
        let shutdown = CancellationToken::new();
        let nodes = start_cluster(1, &shutdown).await;

        let getter = HttpGetter::new(reqwest::Client::new(), &nodes[0].id, DEFAULT_BASE_PATH);
        let err = getter
            .fetch(&LoadContext::background(), "users", "Tom")
            .await
            .unwrap_err();

        match err {
            Error::Remote { peer, message } => {
                assert_eq!(peer, nodes[0].id);
                assert_eq!(message, "server returned: 404 Not Found");
            }
            other => panic!("unexpected error: {}", other),
        }

        let value = getter
            .fetch(&LoadContext::background(), "scores", "Tom")
            .await
            .unwrap();
        assert_eq!(value, format!("Tom@{}", nodes[0].id).into_bytes());

        shutdown.cancel();
    }
}
