mod connection;
mod endpoint;
mod inbox;
mod loopback;
mod outbox;
mod protocol;
mod stats;
mod tracking;

pub use connection::{
    ConnectionEvent, ConnectionListener, ConnectionState, Envelope, GameConnection, GameDevice,
    ListenerTable, MessageListener,
};
pub use endpoint::{TransportError, TransportOptions, UdpConnection};
pub use inbox::{Inbox, InboxSender, inbox};
pub use loopback::LoopbackConnection;
pub use outbox::Outbox;
pub use protocol::{
    CodecError, DEFAULT_PORT, FireOrder, MAX_FRAME_SIZE, Message, MessageKind, PROTOCOL_VERSION,
    Scorer, SendPolicy, ShipSnapshot, decode_rotation, encode_rotation,
};
pub use stats::NetworkStats;
pub use tracking::{
    ACK_TAG, Datagram, RELIABLE_TAG, ReceiveChannel, SendChannel, sequence_greater_than,
};
