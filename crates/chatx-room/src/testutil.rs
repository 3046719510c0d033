//! Socket test double.
//!
//! [`ScriptedConnector`] hands out in-memory sockets. The test pushes frames
//! into the most recent one, drops it to simulate the server closing the
//! connection, or switches the connector to refuse new connections. Older
//! sockets stay open so several rooms can share one connector.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};

use chatx_core::{ChatExchangeError, Result};

use crate::socket::{EventSocket, SocketConnector};

/// In-memory [`SocketConnector`].
#[derive(Default)]
pub struct ScriptedConnector {
    peers: Mutex<Vec<mpsc::UnboundedSender<String>>>,
    urls: Mutex<Vec<String>>,
    origins: Mutex<Vec<String>>,
    failing: AtomicBool,
    closed: Arc<AtomicUsize>,
    connected: Notify,
}

impl ScriptedConnector {
    /// Connector that accepts every connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse (`true`) or accept (`false`) new connections.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Deliver `frame` on the current socket. Returns `false` if there is
    /// no open socket.
    pub fn push_frame(&self, frame: &str) -> bool {
        self.peers
            .lock()
            .last()
            .is_some_and(|tx| tx.send(frame.to_string()).is_ok())
    }

    /// Close the current socket from the server side.
    pub fn drop_connection(&self) {
        drop(self.peers.lock().pop());
    }

    /// Successful connections so far.
    pub fn connect_count(&self) -> usize {
        self.urls.lock().len()
    }

    /// Urls of successful connections, in order.
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    /// `Origin` headers of successful connections, in order.
    pub fn origins(&self) -> Vec<String> {
        self.origins.lock().clone()
    }

    /// Sockets closed from the client side.
    pub fn closed_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` connections have succeeded.
    pub async fn wait_for_connects(&self, count: usize) {
        loop {
            let notified = self.connected.notified();
            if self.connect_count() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl SocketConnector for ScriptedConnector {
    async fn connect(&self, url: &str, origin: &str) -> Result<Box<dyn EventSocket>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ChatExchangeError::Socket("connection refused".to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers.lock().push(tx);
        self.urls.lock().push(url.to_string());
        self.origins.lock().push(origin.to_string());
        self.connected.notify_waiters();
        Ok(Box::new(ScriptedSocket {
            rx,
            closed: Arc::clone(&self.closed),
        }))
    }
}

struct ScriptedSocket {
    rx: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl EventSocket for ScriptedSocket {
    async fn next_frame(&mut self) -> Option<Result<String>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.rx.close();
        let _ = self.closed.fetch_add(1, Ordering::SeqCst);
    }
}
