use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use super::protocol::{CodecError, Message};

/// Transport tag for a sequenced, acknowledged message frame.
pub const RELIABLE_TAG: u8 = 0x80;
/// Transport tag for an acknowledgement of reliable frames.
pub const ACK_TAG: u8 = 0x81;

const SEQUENCE_SIZE: usize = 4;
const ACK_FRAME_SIZE: usize = 9;
const SEQUENCE_WRAP_THRESHOLD: u32 = u32::MAX / 2;

const MIN_RESEND: Duration = Duration::from_millis(40);
const MAX_RESEND: Duration = Duration::from_millis(1000);

#[inline]
pub fn sequence_greater_than(s1: u32, s2: u32) -> bool {
    ((s1 > s2) && (s1 - s2 <= SEQUENCE_WRAP_THRESHOLD))
        || ((s1 < s2) && (s2 - s1 > SEQUENCE_WRAP_THRESHOLD))
}

/// What travels in one UDP datagram.
///
/// `Plain` is a bare message frame as laid out by [`Message::encode`].
/// Queue-all messages to a peer that speaks the sequenced framing go out as
/// `Reliable` and are resent until an `Ack` covers them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Datagram {
    Plain(Message),
    Reliable { sequence: u32, message: Message },
    Ack { ack: u32, bitfield: u32 },
}

impl Datagram {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Datagram::Plain(message) => message.encode(),
            Datagram::Reliable { sequence, message } => {
                let frame = message.encode();
                let mut data = Vec::with_capacity(1 + SEQUENCE_SIZE + frame.len());
                data.push(RELIABLE_TAG);
                data.extend_from_slice(&sequence.to_be_bytes());
                data.extend_from_slice(&frame);
                data
            }
            Datagram::Ack { ack, bitfield } => {
                let mut data = Vec::with_capacity(ACK_FRAME_SIZE);
                data.push(ACK_TAG);
                data.extend_from_slice(&ack.to_be_bytes());
                data.extend_from_slice(&bitfield.to_be_bytes());
                data
            }
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        match data.first() {
            Some(&RELIABLE_TAG) => {
                let header = 1 + SEQUENCE_SIZE;
                if data.len() <= header {
                    return Err(CodecError::ShortHeader {
                        expected: header + 1,
                        actual: data.len(),
                    });
                }
                let sequence = read_u32(&data[1..header]);
                let message = Message::decode(&data[header..])?;
                Ok(Datagram::Reliable { sequence, message })
            }
            Some(&ACK_TAG) => {
                if data.len() < ACK_FRAME_SIZE {
                    return Err(CodecError::ShortHeader {
                        expected: ACK_FRAME_SIZE,
                        actual: data.len(),
                    });
                }
                Ok(Datagram::Ack {
                    ack: read_u32(&data[1..5]),
                    bitfield: read_u32(&data[5..9]),
                })
            }
            _ => Message::decode(data).map(Datagram::Plain),
        }
    }

    /// Whether the sender speaks the sequenced framing.
    pub fn is_sequenced(&self) -> bool {
        !matches!(self, Datagram::Plain(_))
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; SEQUENCE_SIZE];
    buf.copy_from_slice(&bytes[..SEQUENCE_SIZE]);
    u32::from_be_bytes(buf)
}

#[derive(Debug, Clone)]
struct PendingFrame {
    sequence: u32,
    message: Message,
    sent_at: Instant,
    attempts: u32,
}

/// Outgoing half of a reliable link: numbers frames, keeps them until they
/// are acknowledged and hands back the ones due for a resend.
#[derive(Debug)]
pub struct SendChannel {
    next_sequence: u32,
    pending: VecDeque<PendingFrame>,
    srtt: f32,
    rtt_var: f32,
}

impl Default for SendChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl SendChannel {
    pub fn new() -> Self {
        Self {
            next_sequence: 1,
            pending: VecDeque::new(),
            srtt: 100.0,
            rtt_var: 50.0,
        }
    }

    /// Assigns the next sequence number and starts tracking the frame.
    pub fn track(&mut self, message: Message, now: Instant) -> u32 {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.pending.push_back(PendingFrame {
            sequence,
            message,
            sent_at: now,
            attempts: 1,
        });
        sequence
    }

    /// Marks every frame covered by `ack` and its bitfield as delivered and
    /// returns how many were newly acknowledged.
    pub fn process_ack(&mut self, ack: u32, bitfield: u32, now: Instant) -> usize {
        let mut rtt_samples = Vec::new();
        let before = self.pending.len();

        self.pending.retain(|pending| {
            let acked = if pending.sequence == ack {
                true
            } else if sequence_greater_than(ack, pending.sequence) {
                let diff = ack.wrapping_sub(pending.sequence);
                diff <= 32 && (bitfield & (1 << (diff - 1))) != 0
            } else {
                false
            };

            // resent frames give ambiguous samples
            if acked && pending.attempts == 1 {
                rtt_samples.push(now.duration_since(pending.sent_at).as_secs_f32() * 1000.0);
            }
            !acked
        });

        for rtt in rtt_samples {
            self.update_rtt(rtt);
        }
        before - self.pending.len()
    }

    /// Frames whose resend timer ran out, oldest first. Their timers restart
    /// with a doubled timeout.
    pub fn due_for_resend(&mut self, now: Instant) -> Vec<(u32, Message)> {
        let base = self.resend_timeout();
        let mut due = Vec::new();
        for pending in &mut self.pending {
            let backoff = 1u32 << pending.attempts.saturating_sub(1).min(4);
            let timeout = (base * backoff).min(MAX_RESEND);
            if now.duration_since(pending.sent_at) >= timeout {
                pending.sent_at = now;
                pending.attempts += 1;
                due.push((pending.sequence, pending.message));
            }
        }
        due
    }

    pub fn resend_timeout(&self) -> Duration {
        let millis = (self.srtt + 4.0 * self.rtt_var).max(0.0);
        Duration::from_secs_f32(millis / 1000.0).clamp(MIN_RESEND, MAX_RESEND)
    }

    fn update_rtt(&mut self, rtt: f32) {
        const ALPHA: f32 = 0.125;
        const BETA: f32 = 0.25;

        let diff = (rtt - self.srtt).abs();
        self.rtt_var = (1.0 - BETA) * self.rtt_var + BETA * diff;
        self.srtt = (1.0 - ALPHA) * self.srtt + ALPHA * rtt;
    }

    pub fn srtt(&self) -> f32 {
        self.srtt
    }

    pub fn unacked_count(&self) -> usize {
        self.pending.len()
    }
}

/// Incoming half of a reliable link: builds the ack bitfield, drops
/// duplicates and releases messages strictly in sequence order.
#[derive(Debug)]
pub struct ReceiveChannel {
    last_received: u32,
    received_bitfield: u32,
    next_delivery: u32,
    held: BTreeMap<u32, Message>,
}

impl Default for ReceiveChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveChannel {
    pub fn new() -> Self {
        Self {
            last_received: 0,
            received_bitfield: 0,
            next_delivery: 1,
            held: BTreeMap::new(),
        }
    }

    /// Records a reliable frame and returns the messages that are now ready,
    /// in order. Duplicates and frames behind a gap return nothing yet.
    pub fn accept(&mut self, sequence: u32, message: Message) -> Vec<Message> {
        self.record_ack(sequence);

        if sequence_greater_than(self.next_delivery, sequence) || self.held.contains_key(&sequence)
        {
            log::trace!("duplicate reliable frame {sequence}");
            return Vec::new();
        }
        self.held.insert(sequence, message);

        let mut ready = Vec::new();
        while let Some(message) = self.held.remove(&self.next_delivery) {
            ready.push(message);
            self.next_delivery = self.next_delivery.wrapping_add(1);
        }
        ready
    }

    fn record_ack(&mut self, sequence: u32) {
        if sequence_greater_than(sequence, self.last_received) {
            let diff = sequence.wrapping_sub(self.last_received);
            if diff <= 32 {
                self.received_bitfield =
                    self.received_bitfield.checked_shl(diff).unwrap_or(0) | (1 << (diff - 1));
            } else {
                self.received_bitfield = 0;
            }
            self.last_received = sequence;
        } else {
            let diff = self.last_received.wrapping_sub(sequence);
            if diff > 0 && diff <= 32 {
                self.received_bitfield |= 1 << (diff - 1);
            }
        }
    }

    /// The ack to send back: newest sequence seen and a bitfield of the 32
    /// before it.
    pub fn ack_data(&self) -> (u32, u32) {
        (self.last_received, self.received_bitfield)
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chrono(seconds: i32) -> Message {
        Message::Chrono { seconds }
    }

    #[test]
    fn test_datagram_layouts() {
        let reliable = Datagram::Reliable {
            sequence: 0x0102_0304,
            message: Message::Killed,
        };
        let data = reliable.encode();
        assert_eq!(&data[..5], &[RELIABLE_TAG, 1, 2, 3, 4]);
        assert_eq!(&data[5..], Message::Killed.encode().as_slice());
        assert_eq!(Datagram::decode(&data).unwrap(), reliable);

        let ack = Datagram::Ack { ack: 7, bitfield: 0b101 };
        assert_eq!(ack.encode(), vec![ACK_TAG, 0, 0, 0, 7, 0, 0, 0, 5]);

        let plain = Message::RoleRestart.encode();
        assert_eq!(
            Datagram::decode(&plain).unwrap(),
            Datagram::Plain(Message::RoleRestart)
        );
    }

    #[test]
    fn test_short_transport_frames_rejected() {
        assert!(Datagram::decode(&[RELIABLE_TAG, 0, 0, 0, 1]).is_err());
        assert!(Datagram::decode(&[ACK_TAG, 0, 0, 0, 1, 0]).is_err());
        assert!(Datagram::decode(&[]).is_err());
    }

    #[test]
    fn test_sequence_wraps() {
        assert!(sequence_greater_than(1, u32::MAX));
        assert!(!sequence_greater_than(u32::MAX, 1));
        assert!(sequence_greater_than(5, 4));
    }

    #[test]
    fn test_receive_bitfield_tracks_previous_frames() {
        let mut channel = ReceiveChannel::new();
        channel.accept(1, chrono(3));
        channel.accept(2, chrono(2));
        channel.accept(3, chrono(1));

        let (ack, bitfield) = channel.ack_data();
        assert_eq!(ack, 3);
        assert_eq!(bitfield & 0b11, 0b11);
    }

    #[test]
    fn test_out_of_order_frames_released_in_order() {
        let mut channel = ReceiveChannel::new();
        assert!(channel.accept(3, chrono(1)).is_empty());
        assert!(channel.accept(2, chrono(2)).is_empty());
        assert_eq!(channel.held_count(), 2);

        let ready = channel.accept(1, chrono(3));
        assert_eq!(ready, vec![chrono(3), chrono(2), chrono(1)]);
        assert_eq!(channel.held_count(), 0);

        let (ack, bitfield) = channel.ack_data();
        assert_eq!(ack, 3);
        assert_eq!(bitfield & 0b11, 0b11);
    }

    #[test]
    fn test_duplicates_dropped() {
        let mut channel = ReceiveChannel::new();
        assert_eq!(channel.accept(1, Message::Killed), vec![Message::Killed]);
        assert!(channel.accept(1, Message::Killed).is_empty());
        assert!(channel.accept(3, Message::Quit).is_empty());
        assert!(channel.accept(3, Message::Quit).is_empty());
        assert_eq!(
            channel.accept(2, Message::RoleRestart),
            vec![Message::RoleRestart, Message::Quit]
        );
    }

    #[test]
    fn test_ack_clears_pending() {
        let start = Instant::now();
        let mut channel = SendChannel::new();
        assert_eq!(channel.track(chrono(5), start), 1);
        assert_eq!(channel.track(chrono(4), start), 2);
        assert_eq!(channel.track(chrono(3), start), 3);

        // 3 acked directly, 1 through the bitfield, 2 still missing
        assert_eq!(channel.process_ack(3, 0b10, start), 2);
        assert_eq!(channel.unacked_count(), 1);
        assert_eq!(channel.process_ack(2, 0, start), 1);
        assert_eq!(channel.unacked_count(), 0);
    }

    #[test]
    fn test_unacked_frames_resent_with_backoff() {
        let start = Instant::now();
        let mut channel = SendChannel::new();
        channel.track(Message::Killed, start);
        let timeout = channel.resend_timeout();

        assert!(channel.due_for_resend(start).is_empty());
        let due = channel.due_for_resend(start + timeout);
        assert_eq!(due, vec![(1, Message::Killed)]);

        assert!(channel.due_for_resend(start + timeout * 2).is_empty());
        let due = channel.due_for_resend(start + timeout * 3);
        assert_eq!(due, vec![(1, Message::Killed)]);

        channel.process_ack(1, 0, start + timeout * 3);
        assert!(channel.due_for_resend(start + timeout * 10).is_empty());
    }

    #[test]
    fn test_first_attempt_acks_update_rtt() {
        let start = Instant::now();
        let mut channel = SendChannel::new();
        channel.track(Message::Killed, start);
        channel.process_ack(1, 0, start + Duration::from_millis(10));
        assert!(channel.srtt() < 100.0);
        assert!(channel.resend_timeout() >= MIN_RESEND);
    }
}
