#![allow(dead_code)]

use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use mailrun_dispatch::{DispatchEvent, DispatchOutcome, EventSink};
use mailrun_smtp::{SessionTransport, TransportError};

/// What the mock transport was asked to do. Shared with the test so it can
/// be inspected after the engine is done with the transport.
#[derive(Debug, Default)]
pub struct Calls {
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    send_attempts: AtomicUsize,
    delivered: Mutex<Vec<(String, String, String)>>,
}

impl Calls {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn send_attempts(&self) -> usize {
        self.send_attempts.load(Ordering::SeqCst)
    }

    /// Addresses of accepted messages, in order.
    pub fn delivered(&self) -> Vec<String> {
        self.lock()
            .iter()
            .map(|(address, _, _)| address.clone())
            .collect()
    }

    /// Body of the accepted message for `address`.
    pub fn body_for(&self, address: &str) -> Option<String> {
        self.lock()
            .iter()
            .find(|(to, _, _)| to == address)
            .map(|(_, _, body)| body.clone())
    }

    pub fn subjects(&self) -> Vec<String> {
        self.lock()
            .iter()
            .map(|(_, subject, _)| subject.clone())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(String, String, String)>> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scriptable [`SessionTransport`].
///
/// Connect attempts and send attempts are numbered from 1 over the life of
/// the transport.
#[derive(Debug, Default)]
pub struct MockTransport {
    calls: Arc<Calls>,
    connected: bool,
    failing_connects: HashSet<usize>,
    dropped_sends: HashSet<usize>,
    rejected: HashSet<String>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Arc<Calls> {
        Arc::clone(&self.calls)
    }

    /// Fail the `n`th connect attempt.
    pub fn failing_connect(mut self, n: usize) -> Self {
        self.failing_connects.insert(n);
        self
    }

    /// Drop the session on the `n`th send attempt.
    pub fn dropping_send(mut self, n: usize) -> Self {
        self.dropped_sends.insert(n);
        self
    }

    /// Refuse every message to `address`.
    pub fn rejecting(mut self, address: &str) -> Self {
        self.rejected.insert(address.to_string());
        self
    }
}

#[async_trait]
impl SessionTransport for MockTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let attempt = self.calls.connects.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_connects.contains(&attempt) {
            self.connected = false;
            return Err(TransportError::NetworkFailure(format!(
                "connect attempt {attempt} refused"
            )));
        }
        self.connected = true;
        Ok(())
    }

    async fn send_one(
        &mut self,
        address: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), TransportError> {
        let attempt = self.calls.send_attempts.fetch_add(1, Ordering::SeqCst) + 1;

        if !self.connected {
            return Err(TransportError::SessionDropped("not connected".to_string()));
        }
        if self.dropped_sends.contains(&attempt) {
            self.connected = false;
            return Err(TransportError::SessionDropped(format!(
                "connection reset on send {attempt}"
            )));
        }
        if self.rejected.contains(address) {
            return Err(TransportError::SendFailure(format!(
                "550 {address}: mailbox unavailable"
            )));
        }

        self.calls.lock().push((
            address.to_string(),
            subject.to_string(),
            body.to_string(),
        ));
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.calls.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Keeps every event for inspection.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DispatchEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<DispatchEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// `(index, outcome)` for every recipient event.
    pub fn outcomes(&self) -> Vec<(usize, DispatchOutcome)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DispatchEvent::Recipient { index, outcome, .. } => Some((index, outcome)),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &DispatchEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
