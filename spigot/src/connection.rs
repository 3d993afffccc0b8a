//! Logical connections to the target.

use std::num::NonZeroU16;

use bytes::Bytes;
use http::{HeaderMap, StatusCode, Uri, header::CONTENT_LENGTH};
use http_body_util::BodyExt;
use hyper::Request;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};

use crate::RequestBody;

/// Errors produced by [`Connection::send`].
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The request could not be constructed.
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::http::Error),
    /// The request could not be performed.
    #[error("Failed to send HTTP request to {uri}: {source}")]
    RequestFailed {
        /// Target URI
        uri: String,
        /// Underlying client error
        #[source]
        source: hyper_util::client::legacy::Error,
    },
    /// The response body could not be collected.
    #[error("Hyper error: {0}")]
    Hyper(#[from] hyper::Error),
}

/// One logical sender slot: a target URI plus headers, selected round-robin
/// by the dispatcher.
///
/// The underlying client is pooled and safe for concurrent use, so a send
/// that outlives a full cursor cycle may overlap with the next send on the
/// same slot.
#[derive(Debug, Clone)]
pub struct Connection {
    id: u32,
    uri: Uri,
    headers: HeaderMap,
    client: Client<HttpConnector, RequestBody>,
}

impl Connection {
    /// The sequential id assigned to this connection, starting at 1.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// POST `body` to the target.
    ///
    /// Blocks until the response body has been collected. Always invoked
    /// from a spawned task, never from the dispatch loop itself.
    ///
    /// # Errors
    ///
    /// Any transport failure: refused connection, reset, malformed
    /// response. The caller logs and moves on; nothing is retried.
    pub async fn send(&self, body: Bytes) -> Result<(StatusCode, Bytes), Error> {
        let mut request = Request::builder()
            .method(hyper::Method::POST)
            .uri(self.uri.clone())
            .header(CONTENT_LENGTH, body.len())
            .body(crate::full(body))?;
        let request_headers = request.headers_mut();
        for (name, value) in &self.headers {
            request_headers.append(name.clone(), value.clone());
        }

        let response = self
            .client
            .request(request)
            .await
            .map_err(|source| Error::RequestFailed {
                uri: self.uri.to_string(),
                source,
            })?;
        let status = response.status();
        let body = response.into_body().collect().await?.to_bytes();
        Ok((status, body))
    }
}

/// Build `count` connections sharing `uri` and `headers`, ids assigned
/// sequentially from 1. The hyper client is shared: its pool tolerates
/// overlapping sends when a request outlives a full cursor cycle.
#[must_use]
pub fn pool(count: NonZeroU16, uri: &Uri, headers: &HeaderMap) -> Vec<Connection> {
    let client = Client::builder(TokioExecutor::new())
        .pool_max_idle_per_host(usize::from(count.get()))
        .retry_canceled_requests(false)
        .build_http();

    (1..=u32::from(count.get()))
        .map(|id| Connection {
            id,
            uri: uri.clone(),
            headers: headers.clone(),
            client: client.clone(),
        })
        .collect()
}

#[cfg(test)]
mod test {
    use std::num::NonZeroU16;

    use http::{HeaderMap, Uri};

    use super::pool;

    // Client construction wants a tokio context available.
    #[tokio::test]
    async fn ids_assigned_sequentially_from_one() {
        let uri: Uri = "http://localhost:9000/".parse().expect("static uri");
        let connections = pool(
            NonZeroU16::new(4).expect("non-zero"),
            &uri,
            &HeaderMap::new(),
        );
        let ids: Vec<u32> = connections.iter().map(super::Connection::id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }
}
