use std::collections::VecDeque;

use super::connection::Envelope;
use super::protocol::SendPolicy;

/// Outbound buffer between the simulation and a transport's send loop.
///
/// Queue-all envelopes are kept in order and never dropped. Latest-only
/// envelopes get one slot per (kind, target); a newer one overwrites a slot
/// the transport has not drained yet.
#[derive(Default)]
pub struct Outbox {
    queued: VecDeque<Envelope>,
    latest: Vec<Envelope>,
    coalesced: u64,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the envelope replaced one still waiting to be sent.
    pub fn push(&mut self, envelope: Envelope) -> bool {
        match envelope.policy() {
            SendPolicy::QueueAll => {
                self.queued.push_back(envelope);
                false
            }
            SendPolicy::LatestOnly => {
                let slot = self
                    .latest
                    .iter_mut()
                    .find(|e| e.kind() == envelope.kind() && e.device == envelope.device);
                match slot {
                    Some(existing) => {
                        *existing = envelope;
                        self.coalesced += 1;
                        true
                    }
                    None => {
                        self.latest.push(envelope);
                        false
                    }
                }
            }
        }
    }

    /// Everything pending: queued envelopes in order, then the latest-only slots.
    pub fn drain(&mut self) -> Vec<Envelope> {
        let mut out: Vec<Envelope> = self.queued.drain(..).collect();
        out.append(&mut self.latest);
        out
    }

    pub fn len(&self) -> usize {
        self.queued.len() + self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty() && self.latest.is_empty()
    }

    pub fn clear(&mut self) {
        self.queued.clear();
        self.latest.clear();
    }

    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }
}
