// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The HTTP peer pool: membership, key routing and the serving endpoint.

use std::{collections::HashMap, convert::Infallible, fmt::Debug, sync::Arc};

use bytes::Bytes;
use http::{Method, Request, Response, StatusCode, header};
use http_body_util::Full;
use hyper::{body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use meshcache::{Peer, PeerPicker, Registry};
use meshcache_ring::{DEFAULT_REPLICAS, HashFn, HashRing};
use parking_lot::Mutex;
use tokio::net::TcpListener;

use crate::{
    HttpPeer,
    peer::{HttpClient, new_client},
    wire::{self, FetchRequest, FetchResponse},
};

/// Path prefix under which nodes serve each other's lookups unless configured otherwise.
pub const DEFAULT_BASE_PATH: &str = "/_meshcache/";

/// Configuration of an [`HttpPool`].
#[derive(Clone)]
#[non_exhaustive]
pub struct PoolOptions {
    /// Path prefix for peer requests. Must start and end with `/`. Defaults to
    /// [`DEFAULT_BASE_PATH`].
    pub base_path: String,
    /// Virtual replicas per node on the hash ring. Defaults to 50.
    pub replicas: usize,
    /// Ring hash function. Defaults to the ring's xxHash32.
    pub hash_fn: Option<HashFn>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_string(),
            replicas: DEFAULT_REPLICAS,
            hash_fn: None,
        }
    }
}

impl Debug for PoolOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolOptions")
            .field("base_path", &self.base_path)
            .field("replicas", &self.replicas)
            .field("hash_fn", &self.hash_fn.as_ref().map(|_| "custom"))
            .finish()
    }
}

/// Builder for configuring an [`HttpPool`].
///
/// # Examples
///
/// ```
/// use meshcache_http::HttpPool;
///
/// let pool = HttpPool::builder("http://10.0.0.1:8001")
///     .base_path("/cache/")
///     .replicas(100)
///     .build();
///
/// assert_eq!(pool.options().replicas, 100);
/// ```
#[derive(Debug)]
pub struct HttpPoolBuilder {
    self_url: String,
    options: PoolOptions,
}

impl HttpPoolBuilder {
    /// Sets the path prefix for peer requests.
    #[must_use]
    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.options.base_path = base_path.into();
        self
    }

    /// Sets the number of virtual replicas per node.
    #[must_use]
    pub fn replicas(mut self, replicas: usize) -> Self {
        self.options.replicas = replicas;
        self
    }

    /// Sets the ring hash function. Every node of a cluster must use the same one.
    #[must_use]
    pub fn hash_fn(mut self, hash_fn: impl Fn(&[u8]) -> u32 + Send + Sync + 'static) -> Self {
        self.options.hash_fn = Some(Arc::new(hash_fn));
        self
    }

    /// Builds the pool with no peers.
    #[must_use]
    pub fn build(self) -> HttpPool {
        HttpPool::with_options(self.self_url, self.options)
    }
}

struct Membership {
    ring: HashRing,
    peers: HashMap<String, Peer>,
}

/// A set of HTTP peers that routes keys over a consistent-hash ring.
///
/// One pool serves a whole process: it is the [`PeerPicker`] for every group (register it with
/// [`Group::register_peers`](meshcache::Group::register_peers)) and, through
/// [`handle`](Self::handle) or [`serve`](Self::serve), answers the lookups other nodes send here.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use meshcache::{Registry, getter_fn};
/// use meshcache_http::HttpPool;
///
/// # async fn run() -> std::io::Result<()> {
/// let registry = Arc::new(Registry::new());
/// let scores = registry
///     .new_group("scores", 2 << 10, getter_fn(|key: String| async move { Ok(key.into_bytes()) }))
///     .unwrap();
///
/// let pool = Arc::new(HttpPool::new("http://10.0.0.1:8001"));
/// pool.set_peers(["http://10.0.0.1:8001", "http://10.0.0.2:8001", "http://10.0.0.3:8001"]);
/// scores.register_peers(Arc::clone(&pool) as Arc<dyn meshcache::PeerPicker>).unwrap();
///
/// let listener = tokio::net::TcpListener::bind("10.0.0.1:8001").await?;
/// pool.serve(listener, registry).await
/// # }
/// ```
pub struct HttpPool {
    self_url: String,
    options: PoolOptions,
    client: HttpClient,
    membership: Mutex<Membership>,
}

impl Debug for HttpPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPool")
            .field("self_url", &self.self_url)
            .field("options", &self.options)
            .field("peers", &self.membership.lock().ring)
            .finish_non_exhaustive()
    }
}

impl HttpPool {
    /// Creates a pool for the node reachable at `self_url`, with default options.
    #[must_use]
    pub fn new(self_url: impl Into<String>) -> Self {
        Self::with_options(self_url, PoolOptions::default())
    }

    /// Starts configuring a pool for the node reachable at `self_url`.
    #[must_use]
    pub fn builder(self_url: impl Into<String>) -> HttpPoolBuilder {
        HttpPoolBuilder {
            self_url: self_url.into(),
            options: PoolOptions::default(),
        }
    }

    /// Creates a pool with explicit options.
    #[must_use]
    pub fn with_options(self_url: impl Into<String>, options: PoolOptions) -> Self {
        let membership = Membership {
            ring: new_ring(&options),
            peers: HashMap::new(),
        };

        Self {
            self_url: self_url.into(),
            options,
            client: new_client(),
            membership: Mutex::new(membership),
        }
    }

    /// The URL other nodes use to reach this one.
    #[must_use]
    pub fn self_url(&self) -> &str {
        &self.self_url
    }

    /// The options this pool was built with.
    #[must_use]
    pub fn options(&self) -> &PoolOptions {
        &self.options
    }

    /// Replaces the cluster membership.
    ///
    /// `urls` lists every node, normally including this one. Each URL is a base such as
    /// `http://10.0.0.2:8001`. All nodes must be given the same list to agree on key ownership.
    pub fn set_peers<I, S>(&self, urls: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let urls: Vec<String> = urls.into_iter().map(|url| url.as_ref().to_owned()).collect();

        let mut ring = new_ring(&self.options);
        ring.add(&urls);

        let peers = urls
            .iter()
            .map(|url| {
                let fetcher = HttpPeer::with_client(url.clone(), self.options.base_path.clone(), self.client.clone());
                (url.clone(), Peer::new(url.as_str(), fetcher))
            })
            .collect();

        *self.membership.lock() = Membership { ring, peers };
        tracing::info!(pool.self_url = %self.self_url, peers = urls.len(), "pool.membership_updated");
    }

    /// Answers a lookup sent by another node.
    ///
    /// The request path must be `{base_path}{group}/{key}` with percent-encoded segments. The
    /// response is `200` with a bincode-encoded [`FetchResponse`], `400` for a malformed path,
    /// `404` for an unknown group, `405` for a method other than `GET`, or `500` if the group
    /// fails to produce the value.
    pub async fn handle<B>(&self, request: Request<B>, registry: &Registry) -> Response<Full<Bytes>> {
        if request.method() != Method::GET {
            return text_response(StatusCode::METHOD_NOT_ALLOWED, "only GET is supported".to_string());
        }

        let Some(FetchRequest { group, key }) = FetchRequest::from_path(&self.options.base_path, request.uri().path()) else {
            tracing::debug!(pool.self_url = %self.self_url, path = request.uri().path(), "pool.bad_request");
            return text_response(StatusCode::BAD_REQUEST, "bad request".to_string());
        };
        drop(request);

        let Some(group) = registry.group(&group) else {
            return text_response(StatusCode::NOT_FOUND, format!("no such group: {group}"));
        };
        group.record_server_request();

        let value = match group.get(&key).await {
            Ok(value) => value,
            Err(error) => return text_response(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
        };

        match wire::encode(&FetchResponse { value: value.to_vec() }) {
            Ok(body) => Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/octet-stream")
                .body(Full::new(Bytes::from(body)))
                .unwrap_or_else(|_| text_response(StatusCode::INTERNAL_SERVER_ERROR, "response build failed".to_string())),
            Err(error) => text_response(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
        }
    }

    /// Accepts connections on `listener` and serves lookups for the groups in `registry`.
    ///
    /// Each connection is served on its own task over HTTP/1.1. Runs until accepting fails.
    ///
    /// # Errors
    ///
    /// Returns the I/O error that stopped the accept loop.
    pub async fn serve(self: Arc<Self>, listener: TcpListener, registry: Arc<Registry>) -> std::io::Result<()> {
        tracing::info!(pool.self_url = %self.self_url, addr = ?listener.local_addr().ok(), "pool.serving");

        loop {
            let (stream, remote) = listener.accept().await?;
            let pool = Arc::clone(&self);
            let registry = Arc::clone(&registry);

            tokio::spawn(async move {
                let service = service_fn(move |request: Request<Incoming>| {
                    let pool = Arc::clone(&pool);
                    let registry = Arc::clone(&registry);
                    async move { Ok::<_, Infallible>(pool.handle(request, &registry).await) }
                });

                if let Err(error) = http1::Builder::new().serve_connection(TokioIo::new(stream), service).await {
                    tracing::debug!(%remote, %error, "pool.connection_error");
                }
            });
        }
    }
}

impl PeerPicker for HttpPool {
    fn pick_peer(&self, key: &str) -> Option<Peer> {
        let membership = self.membership.lock();
        let owner = membership.ring.get(key)?;
        if owner == self.self_url {
            return None;
        }

        tracing::debug!(pool.self_url = %self.self_url, key, peer = owner, "pool.pick_peer");
        membership.peers.get(owner).cloned()
    }
}

fn new_ring(options: &PoolOptions) -> HashRing {
    match &options.hash_fn {
        Some(hash_fn) => HashRing::with_shared_hasher(options.replicas, Arc::clone(hash_fn)),
        None => HashRing::new(options.replicas),
    }
}

fn text_response(status: StatusCode, message: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(message)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, header::HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}
