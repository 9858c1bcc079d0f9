use glam::Vec2;

use crate::scene::ReactorPower;

pub const PROTOCOL_VERSION: i32 = 2;
pub const DEFAULT_PORT: u16 = 27016;
pub const MAX_FRAME_SIZE: usize = 64;

const ROTATION_SCALE: f32 = 10000.0;
const TAG_SIZE: usize = 1;

/// Wraps an angle into [-π, π] so the scaled value always fits an i16.
fn normalize_angle(angle: f32) -> f32 {
    let two_pi = std::f32::consts::TAU;
    let mut normalized = angle % two_pi;
    if normalized > std::f32::consts::PI {
        normalized -= two_pi;
    } else if normalized < -std::f32::consts::PI {
        normalized += two_pi;
    }
    normalized
}

#[inline]
pub fn encode_rotation(radians: f32) -> i16 {
    (normalize_angle(radians) * ROTATION_SCALE).round() as i16
}

#[inline]
pub fn decode_rotation(stored: i16) -> f32 {
    stored as f32 / ROTATION_SCALE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPolicy {
    /// Every instance is delivered, in order.
    QueueAll,
    /// A newer instance replaces one the transport has not sent yet.
    LatestOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    VersionCheck = 1,
    VersionMismatch = 2,
    SessionFull = 3,
    Quit = 4,
    StartGame = 5,
    RoleRestart = 6,
    Chrono = 7,
    ShipSnapshot = 8,
    Fire = 9,
    Score = 10,
    Killed = 11,
}

impl MessageKind {
    pub const ALL: [MessageKind; 11] = [
        Self::VersionCheck,
        Self::VersionMismatch,
        Self::SessionFull,
        Self::Quit,
        Self::StartGame,
        Self::RoleRestart,
        Self::Chrono,
        Self::ShipSnapshot,
        Self::Fire,
        Self::Score,
        Self::Killed,
    ];

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::VersionCheck),
            2 => Some(Self::VersionMismatch),
            3 => Some(Self::SessionFull),
            4 => Some(Self::Quit),
            5 => Some(Self::StartGame),
            6 => Some(Self::RoleRestart),
            7 => Some(Self::Chrono),
            8 => Some(Self::ShipSnapshot),
            9 => Some(Self::Fire),
            10 => Some(Self::Score),
            11 => Some(Self::Killed),
            _ => None,
        }
    }

    #[inline]
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn policy(self) -> SendPolicy {
        match self {
            Self::ShipSnapshot => SendPolicy::LatestOnly,
            _ => SendPolicy::QueueAll,
        }
    }

    /// Exact encoded length, tag included.
    pub fn frame_size(self) -> usize {
        match self {
            Self::VersionCheck | Self::Chrono => TAG_SIZE + 4,
            Self::ShipSnapshot => TAG_SIZE + 4 + 4 + 2 + 4 + 4 + 1,
            Self::Fire => TAG_SIZE + 4 * 3,
            Self::Score => TAG_SIZE + 4 + 1,
            Self::VersionMismatch
            | Self::SessionFull
            | Self::Quit
            | Self::StartGame
            | Self::RoleRestart
            | Self::Killed => TAG_SIZE,
        }
    }

    /// Continuous traffic that is too frequent to log per message.
    pub fn is_high_frequency(self) -> bool {
        matches!(
            self,
            Self::ShipSnapshot | Self::Fire | Self::Score | Self::Chrono
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Scorer {
    Cat = 0,
    Mouse = 1,
}

impl From<u8> for Scorer {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Mouse,
            _ => Self::Cat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShipSnapshot {
    pub position: Vec2,
    pub rotation: f32,
    pub velocity: Vec2,
    pub reactor: ReactorPower,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireOrder {
    pub position: Vec2,
    pub rotation: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    VersionCheck { version: i32 },
    VersionMismatch,
    SessionFull,
    Quit,
    StartGame,
    RoleRestart,
    Chrono { seconds: i32 },
    ShipSnapshot(ShipSnapshot),
    Fire(FireOrder),
    Score { scorer: Scorer, value: i32 },
    Killed,
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("empty frame")]
    Empty,
    #[error("unknown message tag {0}")]
    UnknownTag(u8),
    #[error("truncated {kind:?} frame: expected {expected} bytes, got {actual}")]
    Truncated {
        kind: MessageKind,
        expected: usize,
        actual: usize,
    },
    #[error("truncated transport header: expected {expected} bytes, got {actual}")]
    ShortHeader { expected: usize, actual: usize },
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::VersionCheck { .. } => MessageKind::VersionCheck,
            Self::VersionMismatch => MessageKind::VersionMismatch,
            Self::SessionFull => MessageKind::SessionFull,
            Self::Quit => MessageKind::Quit,
            Self::StartGame => MessageKind::StartGame,
            Self::RoleRestart => MessageKind::RoleRestart,
            Self::Chrono { .. } => MessageKind::Chrono,
            Self::ShipSnapshot(_) => MessageKind::ShipSnapshot,
            Self::Fire(_) => MessageKind::Fire,
            Self::Score { .. } => MessageKind::Score,
            Self::Killed => MessageKind::Killed,
        }
    }

    #[inline]
    pub fn policy(&self) -> SendPolicy {
        self.kind().policy()
    }

    pub fn encode(&self) -> Vec<u8> {
        let kind = self.kind();
        let mut buf = Vec::with_capacity(kind.frame_size());
        buf.push(kind.tag());

        match self {
            Self::VersionCheck { version } => buf.extend_from_slice(&version.to_be_bytes()),
            Self::Chrono { seconds } => buf.extend_from_slice(&seconds.to_be_bytes()),
            Self::ShipSnapshot(snapshot) => {
                buf.extend_from_slice(&snapshot.position.x.to_be_bytes());
                buf.extend_from_slice(&snapshot.position.y.to_be_bytes());
                buf.extend_from_slice(&encode_rotation(snapshot.rotation).to_be_bytes());
                buf.extend_from_slice(&snapshot.velocity.x.to_be_bytes());
                buf.extend_from_slice(&snapshot.velocity.y.to_be_bytes());
                buf.push(snapshot.reactor as u8);
            }
            Self::Fire(order) => {
                buf.extend_from_slice(&order.position.x.to_be_bytes());
                buf.extend_from_slice(&order.position.y.to_be_bytes());
                buf.extend_from_slice(&order.rotation.to_be_bytes());
            }
            Self::Score { scorer, value } => {
                buf.extend_from_slice(&value.to_be_bytes());
                buf.push(*scorer as u8);
            }
            Self::VersionMismatch
            | Self::SessionFull
            | Self::Quit
            | Self::StartGame
            | Self::RoleRestart
            | Self::Killed => {}
        }

        debug_assert_eq!(buf.len(), kind.frame_size());
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let &tag = data.first().ok_or(CodecError::Empty)?;
        let kind = MessageKind::from_tag(tag).ok_or(CodecError::UnknownTag(tag))?;

        let expected = kind.frame_size();
        if data.len() < expected {
            return Err(CodecError::Truncated {
                kind,
                expected,
                actual: data.len(),
            });
        }

        let reader = FrameReader { data };
        let message = match kind {
            MessageKind::VersionCheck => Self::VersionCheck {
                version: reader.i32_at(1),
            },
            MessageKind::VersionMismatch => Self::VersionMismatch,
            MessageKind::SessionFull => Self::SessionFull,
            MessageKind::Quit => Self::Quit,
            MessageKind::StartGame => Self::StartGame,
            MessageKind::RoleRestart => Self::RoleRestart,
            MessageKind::Chrono => Self::Chrono {
                seconds: reader.i32_at(1),
            },
            MessageKind::ShipSnapshot => Self::ShipSnapshot(ShipSnapshot {
                position: Vec2::new(reader.f32_at(1), reader.f32_at(5)),
                rotation: decode_rotation(reader.i16_at(9)),
                velocity: Vec2::new(reader.f32_at(11), reader.f32_at(15)),
                reactor: ReactorPower::from(data[19]),
            }),
            MessageKind::Fire => Self::Fire(FireOrder {
                position: Vec2::new(reader.f32_at(1), reader.f32_at(5)),
                rotation: reader.f32_at(9),
            }),
            MessageKind::Score => Self::Score {
                value: reader.i32_at(1),
                scorer: Scorer::from(data[5]),
            },
            MessageKind::Killed => Self::Killed,
        };

        Ok(message)
    }
}

/// Fixed-offset reads over a frame whose length was already checked.
struct FrameReader<'a> {
    data: &'a [u8],
}

impl FrameReader<'_> {
    fn bytes<const N: usize>(&self, at: usize) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[at..at + N]);
        out
    }

    fn f32_at(&self, at: usize) -> f32 {
        f32::from_be_bytes(self.bytes(at))
    }

    fn i32_at(&self, at: usize) -> i32 {
        i32::from_be_bytes(self.bytes(at))
    }

    fn i16_at(&self, at: usize) -> i16 {
        i16::from_be_bytes(self.bytes(at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI, TAU};

    fn angle_distance(a: f32, b: f32) -> f32 {
        let d = (a - b).rem_euclid(TAU);
        d.min(TAU - d)
    }

    #[test]
    fn every_kind_roundtrips() {
        let samples = [
            Message::VersionCheck {
                version: PROTOCOL_VERSION,
            },
            Message::VersionMismatch,
            Message::SessionFull,
            Message::Quit,
            Message::StartGame,
            Message::RoleRestart,
            Message::Chrono { seconds: 42 },
            Message::Fire(FireOrder {
                position: Vec2::new(-12.5, 300.25),
                rotation: 4.75,
            }),
            Message::Score {
                scorer: Scorer::Mouse,
                value: 17,
            },
            Message::Killed,
        ];

        for message in samples {
            let encoded = message.encode();
            assert_eq!(encoded.len(), message.kind().frame_size());
            assert_eq!(Message::decode(&encoded).unwrap(), message);
        }
    }

    #[test]
    fn snapshot_roundtrip_within_rotation_precision() {
        let snapshot = ShipSnapshot {
            position: Vec2::new(100.0, -50.0),
            rotation: 1.5708,
            velocity: Vec2::new(0.5, 0.0),
            reactor: ReactorPower::On,
        };
        let encoded = Message::ShipSnapshot(snapshot).encode();
        assert_eq!(encoded.len(), 20);

        let Message::ShipSnapshot(decoded) = Message::decode(&encoded).unwrap() else {
            panic!("expected ShipSnapshot");
        };
        assert_eq!(decoded.position, snapshot.position);
        assert_eq!(decoded.velocity, snapshot.velocity);
        assert_eq!(decoded.reactor, ReactorPower::On);
        assert!((decoded.rotation - FRAC_PI_2).abs() < 1e-4);
    }

    #[test]
    fn rotation_beyond_half_turn_fits_i16() {
        for radians in [0.0, 1.0, PI - 0.001, 3.5, 5.0, TAU - 0.0001, -2.0] {
            let restored = decode_rotation(encode_rotation(radians));
            assert!(
                angle_distance(restored, radians) <= 1.0 / ROTATION_SCALE,
                "{radians} came back as {restored}"
            );
        }
    }

    #[test]
    fn truncated_frames_are_rejected() {
        let encoded = Message::Chrono { seconds: 9 }.encode();
        match Message::decode(&encoded[..3]) {
            Err(CodecError::Truncated {
                kind,
                expected,
                actual,
            }) => {
                assert_eq!(kind, MessageKind::Chrono);
                assert_eq!(expected, 5);
                assert_eq!(actual, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_and_empty_frames_are_rejected() {
        assert!(matches!(Message::decode(&[]), Err(CodecError::Empty)));
        assert!(matches!(
            Message::decode(&[0]),
            Err(CodecError::UnknownTag(0))
        ));
        assert!(matches!(
            Message::decode(&[200, 1, 2]),
            Err(CodecError::UnknownTag(200))
        ));
    }

    #[test]
    fn padded_frames_are_accepted() {
        let mut encoded = Message::RoleRestart.encode();
        encoded.push(0);
        assert_eq!(Message::decode(&encoded).unwrap(), Message::RoleRestart);
    }

    #[test]
    fn integers_are_big_endian() {
        let encoded = Message::Chrono { seconds: 0x0102_0304 }.encode();
        assert_eq!(encoded, vec![7, 1, 2, 3, 4]);
    }

    #[test]
    fn policies() {
        for kind in MessageKind::ALL {
            let expected = if kind == MessageKind::ShipSnapshot {
                SendPolicy::LatestOnly
            } else {
                SendPolicy::QueueAll
            };
            assert_eq!(kind.policy(), expected);
            assert_eq!(MessageKind::from_tag(kind.tag()), Some(kind));
        }
    }

    #[test]
    fn lenient_enumeration_fields() {
        let mut encoded = Message::Score {
            scorer: Scorer::Mouse,
            value: 3,
        }
        .encode();
        encoded[5] = 9;
        assert_eq!(
            Message::decode(&encoded).unwrap(),
            Message::Score {
                scorer: Scorer::Cat,
                value: 3
            }
        );
    }
}
