//! HTTP client for fetching values from peer nodes

use async_trait::async_trait;
use pigcache::{Error, LoadContext, PeerGetter, Result};
use reqwest::{Client, StatusCode};

/// Fetches `<peer><base_path><group>/<key>` from one peer
pub struct HttpGetter {
    peer: String,
    base_url: String,
    client: Client,
}

impl HttpGetter {
    /// `peer` is the peer's base URL, e.g. `http://10.0.0.2:8001`
    pub fn new(client: Client, peer: &str, base_path: &str) -> Self {
        Self {
            peer: peer.to_string(),
            base_url: format!("{}{}", peer.trim_end_matches('/'), base_path),
            client,
        }
    }

    fn url(&self, group: &str, key: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            urlencoding::encode(group),
            urlencoding::encode(key)
        )
    }
}

#[async_trait]
impl PeerGetter for HttpGetter {
    async fn fetch(&self, ctx: &LoadContext, group: &str, key: &str) -> Result<Vec<u8>> {
        let mut request = self.client.get(self.url(group, key));
        if let Some(remaining) = ctx.remaining() {
            request = request.timeout(remaining);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::remote(&self.peer, e))?;

        if response.status() != StatusCode::OK {
            return Err(Error::remote(
                &self.peer,
                format!("server returned: {}", response.status()),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::remote(&self.peer, format!("reading response body: {}", e)))?;

        Ok(body.to_vec())
    }

    fn peer(&self) -> &str {
        &self.peer
    }
}
