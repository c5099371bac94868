//! Mock transport for testing

use super::Transport;
use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Reply generator: maps each sent datagram to zero or more reply datagrams
pub type Responder = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send>;

/// Mock transport for unit and integration testing
///
/// Replies can be queued ahead of time with [`push_reply`](Self::push_reply),
/// or computed from each outgoing datagram by installing a responder with
/// [`set_responder`](Self::set_responder). The latter is how tests script a
/// fake controller that has to track the rolling session key.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

struct MockTransportInner {
    replies: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
    responder: Option<Responder>,
}

impl MockTransport {
    /// Create a new mock transport with no scripted replies
    pub fn new() -> Self {
        MockTransport {
            inner: Arc::new(Mutex::new(MockTransportInner {
                replies: VecDeque::new(),
                sent: Vec::new(),
                responder: None,
            })),
        }
    }

    /// Queue a reply datagram
    pub fn push_reply(&self, data: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        inner.replies.push_back(data);
    }

    /// Install a responder invoked for every sent datagram
    pub fn set_responder(&self, responder: Responder) {
        let mut inner = self.inner.lock().unwrap();
        inner.responder = Some(responder);
    }

    /// All datagrams sent so far
    pub fn sent(&self) -> Vec<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner.sent.clone()
    }

    /// Number of datagrams sent so far
    pub fn sent_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.sent.len()
    }

    /// Drop any queued replies
    pub fn clear_replies(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.replies.clear();
    }
}

impl Transport for MockTransport {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.sent.push(data.to_vec());
        if let Some(responder) = inner.responder.as_mut() {
            let replies = responder(data);
            inner.replies.extend(replies);
        }
        Ok(())
    }

    fn recv(&mut self, _timeout: Duration) -> Result<Vec<u8>> {
        let mut inner = self.inner.lock().unwrap();
        inner.replies.pop_front().ok_or(Error::Timeout)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}
