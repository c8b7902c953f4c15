//! In-memory transport for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use finpro_common::{Error, FetchRequest, FetchResponse, HttpMethod, Result};

use crate::transport::Transport;

/// Scripted outcome of a request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Answer with this response.
    Respond(FetchResponse),
    /// Fail as if the connection dropped.
    Fail(String),
}

#[derive(Default)]
struct Routes {
    fixed: HashMap<(HttpMethod, String), Reply>,
    scripted: HashMap<(HttpMethod, String), VecDeque<Reply>>,
    calls: Vec<FetchRequest>,
}

/// In-memory transport.
///
/// Useful for testing and simulations. Routes are matched on method and
/// absolute URL. Scripted replies are consumed first, then the fixed reply,
/// then a 404. Clones share routes and the call log.
#[derive(Clone)]
pub struct MemoryTransport {
    routes: Arc<Mutex<Routes>>,
    online: Arc<AtomicBool>,
}

impl MemoryTransport {
    /// Create an online transport with no routes.
    pub fn new() -> Self {
        Self {
            routes: Arc::new(Mutex::new(Routes::default())),
            online: Arc::new(AtomicBool::new(true)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Routes> {
        // A poisoned lock only means a test panicked mid-call; keep serving.
        self.routes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Always answer `method url` with `response`.
    pub fn respond(&self, method: HttpMethod, url: &str, response: FetchResponse) {
        self.lock()
            .fixed
            .insert((method, url.to_string()), Reply::Respond(response));
    }

    /// Always fail `method url` with a network error.
    pub fn fail(&self, method: HttpMethod, url: &str) {
        self.lock().fixed.insert(
            (method, url.to_string()),
            Reply::Fail(format!("connection to {} refused", url)),
        );
    }

    /// Queue replies consumed one per request before the fixed reply.
    pub fn script(&self, method: HttpMethod, url: &str, replies: Vec<Reply>) {
        self.lock()
            .scripted
            .entry((method, url.to_string()))
            .or_default()
            .extend(replies);
    }

    /// Toggle whether any request can reach the network.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Every request seen so far, including failed ones.
    pub fn calls(&self) -> Vec<FetchRequest> {
        self.lock().calls.clone()
    }

    /// Number of requests seen for `method url`.
    pub fn call_count(&self, method: HttpMethod, url: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|r| r.method == method && r.url.as_str() == url)
            .count()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        let key = (request.method, request.url.as_str().to_string());

        let reply = {
            let mut routes = self.lock();
            routes.calls.push(request);

            if !self.online.load(Ordering::SeqCst) {
                return Err(Error::Network("offline".to_string()));
            }

            let scripted = routes.scripted.get_mut(&key).and_then(|q| q.pop_front());
            scripted.or_else(|| routes.fixed.get(&key).cloned())
        };

        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail(reason)) => Err(Error::Network(reason)),
            None => Ok(FetchResponse::new(404, "Not Found")),
        }
    }
}
