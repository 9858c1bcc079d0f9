use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use parking_lot::Mutex;

use super::connection::{Envelope, MessageListener};
use super::protocol::SendPolicy;

/// Creates the inbound buffer between transport threads and the simulation.
pub fn inbox() -> (InboxSender, Inbox) {
    let (tx, rx) = crossbeam_channel::unbounded();
    let latest = Arc::new(Mutex::new(None));
    (
        InboxSender {
            queue: tx,
            latest: Arc::clone(&latest),
        },
        Inbox { queue: rx, latest },
    )
}

/// Network-side handle. Register it as a message listener for every kind the
/// simulation consumes.
#[derive(Clone)]
pub struct InboxSender {
    queue: Sender<Envelope>,
    latest: Arc<Mutex<Option<Envelope>>>,
}

impl InboxSender {
    pub fn push(&self, envelope: Envelope) {
        match envelope.policy() {
            SendPolicy::LatestOnly => {
                *self.latest.lock() = Some(envelope);
            }
            SendPolicy::QueueAll => {
                if self.queue.send(envelope).is_err() {
                    log::trace!("inbox closed, dropped {:?}", envelope.kind());
                }
            }
        }
    }
}

impl MessageListener for InboxSender {
    fn on_message(&self, envelope: &Envelope) {
        self.push(*envelope);
    }
}

/// Simulation-side handle, drained once per tick.
pub struct Inbox {
    queue: Receiver<Envelope>,
    latest: Arc<Mutex<Option<Envelope>>>,
}

impl Inbox {
    /// Every queued message in arrival order, then the newest snapshot if one
    /// arrived since the previous drain.
    pub fn drain(&self) -> Vec<Envelope> {
        let mut out = Vec::with_capacity(self.queue.len() + 1);
        loop {
            match self.queue.try_recv() {
                Ok(envelope) => out.push(envelope),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        if let Some(snapshot) = self.latest.lock().take() {
            out.push(snapshot);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty() && self.latest.lock().is_none()
    }
}
