use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::AdmissionError;

/// Dispatches outbound read commands to replicas.
///
/// `send_data` requests the full value; `send_digest` requests only a
/// comparison digest (used for the non-primary members of a quorum
/// read, matching the read-repair pattern of a quorum-replicated
/// store: one replica answers in full, the rest only prove agreement).
/// Neither method waits for the replica's reply — that arrives later,
/// out of band, and is fed back in through `MetricsIngress`.
#[async_trait]
pub trait Messenger<E, Cmd>: Send + Sync {
    async fn send_data(&self, endpoint: &E, command: &Cmd) -> Result<(), AdmissionError>;
    async fn send_digest(&self, endpoint: &E, command: &Cmd) -> Result<(), AdmissionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentKind {
    Data,
    Digest,
}

/// An in-memory collaborator double recording every dispatch it's
/// asked to make, for assertions in tests and the demo binary.
#[derive(Debug, Default)]
pub struct InMemoryMessenger<E> {
    sent: Mutex<Vec<(E, SentKind)>>,
}

impl<E: Clone> InMemoryMessenger<E> {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<(E, SentKind)> {
        self.sent.lock().expect("in-memory messenger mutex poisoned").clone()
    }
}

#[async_trait]
impl<E, Cmd> Messenger<E, Cmd> for InMemoryMessenger<E>
where
    E: Clone + Send + Sync,
    Cmd: Send + Sync,
{
    async fn send_data(&self, endpoint: &E, _command: &Cmd) -> Result<(), AdmissionError> {
        self.sent
            .lock()
            .expect("in-memory messenger mutex poisoned")
            .push((endpoint.clone(), SentKind::Data));
        Ok(())
    }

    async fn send_digest(&self, endpoint: &E, _command: &Cmd) -> Result<(), AdmissionError> {
        self.sent
            .lock()
            .expect("in-memory messenger mutex poisoned")
            .push((endpoint.clone(), SentKind::Digest));
        Ok(())
    }
}
