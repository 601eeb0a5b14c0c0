//! HTTP request handler for cache lookups

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use pigcache::{GroupRegistry, LoadContext, StatsSnapshot};
use serde::Serialize;
use tracing::{info, warn};

use crate::parser::{split_path, PathError};

/// Default prefix for peer requests
pub const DEFAULT_BASE_PATH: &str = "/_pigcache/";

/// Path of the JSON statistics report
pub const STATS_PATH: &str = "/_stats";

#[derive(Serialize)]
struct GroupReport {
    name: String,
    cache_len: usize,
    cache_bytes: usize,
    max_bytes: usize,
    #[serde(flatten)]
    stats: StatsSnapshot,
}

#[derive(Serialize)]
struct StatsReport<'a> {
    node: &'a str,
    groups: Vec<GroupReport>,
}

/// Serves `GET <base_path><group>/<key>` from the group registry
pub struct RequestHandler {
    self_id: String,
    base_path: String,
    registry: Arc<GroupRegistry>,
    request_timeout: Option<Duration>,
}

impl RequestHandler {
    pub fn new(
        self_id: impl Into<String>,
        base_path: impl Into<String>,
        registry: Arc<GroupRegistry>,
    ) -> Self {
        Self {
            self_id: self_id.into(),
            base_path: base_path.into(),
            registry,
            request_timeout: None,
        }
    }

    /// Bound every lookup (peer fetch or load) by `timeout`
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub async fn serve<B>(&self, req: Request<B>) -> Result<Response<Full<Bytes>>, Infallible> {
        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        Ok(self.respond(&method, &path).await)
    }

    pub async fn respond(&self, method: &Method, path: &str) -> Response<Full<Bytes>> {
        info!(server = %self.self_id, %method, path, "request");

        if method != Method::GET {
            return text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string());
        }

        if path == STATS_PATH {
            return self.stats();
        }

        let (group_name, key) = match split_path(&self.base_path, path) {
            Ok(parts) => parts,
            Err(PathError::OutsideBase) => {
                return text(StatusCode::NOT_FOUND, format!("unexpected path: {}", path));
            }
            Err(PathError::Malformed) => {
                return text(StatusCode::BAD_REQUEST, "bad request".to_string());
            }
        };

        let group = match self.registry.get_group(&group_name) {
            Some(group) => group,
            None => {
                return text(StatusCode::NOT_FOUND, format!("no such group: {}", group_name));
            }
        };

        let ctx = match self.request_timeout {
            Some(timeout) => LoadContext::with_timeout(timeout),
            None => LoadContext::background(),
        };

        match group.get_with(&ctx, &key).await {
            Ok(view) => reply(StatusCode::OK, "application/octet-stream", view.bytes()),
            Err(e) => {
                warn!(group = %group_name, key = %key, error = %e, "get failed");
                text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }

    fn stats(&self) -> Response<Full<Bytes>> {
        let groups = self
            .registry
            .names()
            .into_iter()
            .filter_map(|name| self.registry.get_group(&name))
            .map(|group| GroupReport {
                name: group.name().to_string(),
                cache_len: group.cache_len(),
                cache_bytes: group.cache_bytes(),
                max_bytes: group.max_bytes(),
                stats: group.stats().snapshot(),
            })
            .collect();

        let report = StatsReport {
            node: &self.self_id,
            groups,
        };

        match serde_json::to_vec(&report) {
            Ok(body) => reply(StatusCode::OK, "application/json", body),
            Err(e) => text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }
}

fn reply(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn text(status: StatusCode, mut message: String) -> Response<Full<Bytes>> {
    message.push('\n');
    reply(status, "text/plain; charset=utf-8", message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use pigcache::GetterFn;

    fn handler() -> RequestHandler {
        let registry = Arc::new(GroupRegistry::new());
        registry.new_group(
            "scores",
            2 << 10,
            GetterFn(|key: &str| match key {
                "Tom" => Ok(b"630".to_vec()),
                _ => Err(format!("{} not exist", key)),
            }),
        );
        RequestHandler::new("http://127.0.0.1:8001", DEFAULT_BASE_PATH, registry)
    }

    async fn body(response: Response<Full<Bytes>>) -> Vec<u8> {
        response.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    #[tokio::test]
    async fn test_get_ok() {
        let resp = handler().respond(&Method::GET, "/_pigcache/scores/Tom").await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], "application/octet-stream");
        assert_eq!(body(resp).await, b"630");
    }

    #[tokio::test]
    async fn test_bad_request() {
        let resp = handler().respond(&Method::GET, "/_pigcache/scores").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_group() {
        let resp = handler().respond(&Method::GET, "/_pigcache/users/Tom").await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(resp).await, b"no such group: users\n");
    }

    #[tokio::test]
    async fn test_loader_failure() {
        let resp = handler().respond(&Method::GET, "/_pigcache/scores/Kate").await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(resp).await, b"Kate not exist\n");
    }

    #[tokio::test]
    async fn test_outside_base_path() {
        let resp = handler().respond(&Method::GET, "/favicon.ico").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_method_not_allowed() {
        let resp = handler().respond(&Method::POST, "/_pigcache/scores/Tom").await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_stats_report() {
        let handler = handler();
        handler.respond(&Method::GET, "/_pigcache/scores/Tom").await;
        handler.respond(&Method::GET, "/_pigcache/scores/Tom").await;

        let resp = handler.respond(&Method::GET, STATS_PATH).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let report: serde_json::Value = serde_json::from_slice(&body(resp).await).unwrap();
        let scores = &report["groups"][0];
        assert_eq!(report["node"], "http://127.0.0.1:8001");
        assert_eq!(scores["name"], "scores");
        assert_eq!(scores["hits"], 1);
        assert_eq!(scores["local_loads"], 1);
        assert_eq!(scores["cache_len"], 1);
    }
}
