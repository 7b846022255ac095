//! Scripted in-memory backend.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ServiceProvider, ServiceRequest};
use crate::error::{Error, Result};

type Handler = Box<dyn Fn(&ServiceRequest) -> Result<String> + Send + Sync>;
type FetchHandler = Box<dyn Fn(&str) -> Result<String> + Send + Sync>;

/// [`ServiceProvider`] answering from closures and recording every request.
pub struct MockProvider {
    handler: Handler,
    fetch_handler: Option<FetchHandler>,
    requests: Mutex<Vec<ServiceRequest>>,
    fetched: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn new(
        handler: impl Fn(&ServiceRequest) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            fetch_handler: None,
            requests: Mutex::new(Vec::new()),
            fetched: Mutex::new(Vec::new()),
        }
    }

    /// Answer `fetch` calls with `handler`. Without one they fail.
    pub fn with_fetch(
        mut self,
        handler: impl Fn(&str) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        self.fetch_handler = Some(Box::new(handler));
        self
    }

    /// Requests seen so far, oldest first.
    pub fn requests(&self) -> Vec<ServiceRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests whose logical name is `name`.
    pub fn count(&self, name: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|request| request.name() == name)
            .count()
    }

    /// URLs passed to `fetch`, oldest first.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }
}

#[async_trait]
impl ServiceProvider for MockProvider {
    async fn request(&self, request: &ServiceRequest) -> Result<String> {
        self.requests.lock().push(request.clone());
        (self.handler)(request)
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        self.fetched.lock().push(url.to_string());
        match &self.fetch_handler {
            Some(handler) => handler(url),
            None => Err(Error::Transport(format!("no fetch handler for {url}"))),
        }
    }
}
