// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;

use bytes::Bytes;
use http::{StatusCode, Uri};
use http_body_util::{BodyExt, Empty};
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use meshcache::{Error, PeerFetcher, Result};

use crate::wire::{self, FetchRequest, FetchResponse};

pub(crate) type HttpClient = Client<HttpConnector, Empty<Bytes>>;

pub(crate) fn new_client() -> HttpClient {
    Client::builder(TokioExecutor::new()).build_http()
}

/// Fetches values from one remote node over HTTP.
///
/// Any transport failure, non-200 status or undecodable body is reported as
/// [`ErrorKind::PeerUnavailable`](meshcache::ErrorKind::PeerUnavailable).
#[derive(Clone)]
pub struct HttpPeer {
    base_url: String,
    base_path: String,
    client: HttpClient,
}

impl Debug for HttpPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPeer")
            .field("base_url", &self.base_url)
            .field("base_path", &self.base_path)
            .finish_non_exhaustive()
    }
}

impl HttpPeer {
    /// Creates a fetcher for the node at `base_url` (for example `http://10.0.0.2:8001`)
    /// serving lookups below `base_path`.
    pub fn new(base_url: impl Into<String>, base_path: impl Into<String>) -> Self {
        Self::with_client(base_url.into(), base_path.into(), new_client())
    }

    pub(crate) fn with_client(base_url: String, base_path: String, client: HttpClient) -> Self {
        Self {
            base_url,
            base_path,
            client,
        }
    }

    fn uri(&self, group: &str, key: &str) -> Result<Uri> {
        let path = FetchRequest::new(group, key).to_path(&self.base_path);
        format!("{}{path}", self.base_url).parse().map_err(Error::peer_unavailable)
    }
}

impl PeerFetcher for HttpPeer {
    async fn fetch(&self, group: &str, key: &str) -> Result<Bytes> {
        let uri = self.uri(group, key)?;
        let response = self.client.get(uri).await.map_err(Error::peer_unavailable)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::peer_unavailable(format!("{} returned {status}", self.base_url)));
        }

        let body = response.into_body().collect().await.map_err(Error::peer_unavailable)?.to_bytes();
        let response: FetchResponse = wire::decode(&body)?;
        Ok(Bytes::from(response.value))
    }
}
