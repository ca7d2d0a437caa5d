//! Scripted in-memory transport for unit tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::TransportError;
use crate::transport::{Transport, WireRequest, WireResponse};

type Reply = Pin<Box<dyn Future<Output = Result<WireResponse, TransportError>> + Send>>;
type Handler = Arc<dyn Fn(WireRequest) -> Reply + Send + Sync>;

/// Records every request and answers with a user-supplied async handler.
#[derive(Clone)]
pub struct MockTransport {
    handler: Handler,
    sent: Arc<Mutex<Vec<WireRequest>>>,
    clears: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(WireRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<WireResponse, TransportError>> + Send + 'static,
    {
        Self {
            handler: Arc::new(move |req| Box::pin(handler(req))),
            sent: Arc::new(Mutex::new(Vec::new())),
            clears: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn requests(&self) -> Vec<WireRequest> {
        self.sent.lock().expect("mock transport mutex poisoned").clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.sent
            .lock()
            .expect("mock transport mutex poisoned")
            .iter()
            .filter(|r| r.path == path)
            .count()
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: WireRequest) -> Result<WireResponse, TransportError> {
        self.sent
            .lock()
            .expect("mock transport mutex poisoned")
            .push(request.clone());
        (self.handler)(request).await
    }

    fn clear_credentials(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}
