//! Coordinator/worker message protocol.
//!
//! Every exchange is a `(kind, payload)` frame:
//! ```text
//! +------+----------------+------------------+
//! | kind | len (u32, BE)  | payload (bincode)|
//! +------+----------------+------------------+
//! ```
//! `Done` is the zero-payload phase terminator that ends every multi-message
//! batch.

mod channel;

pub use channel::Channel;

use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use travel_common::{TravelError, VaccinationStatus};
use travel_common::constants::{HEADER_LEN, MAX_PAYLOAD_LEN};

/// Channel-level failures. Everything except `Closed` is a protocol error.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("unknown message kind {0}")]
    UnknownKind(u8),

    #[error("short read: stream ended inside a frame")]
    ShortRead,

    #[error("peer closed the channel")]
    Closed,

    #[error("frame payload of {0} bytes exceeds limit")]
    Oversize(usize),

    #[error("payload codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("unexpected {0:?} message")]
    Unexpected(MessageKind),

    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChannelError {
    /// Map a failure on worker `index`'s channel into the command error.
    ///
    /// A closed channel means the worker is gone and will be replaced; any
    /// other failure is a protocol error.
    pub fn for_worker(self, index: usize) -> TravelError {
        match self {
            Self::Closed => TravelError::WorkerUnavailable(index),
            Self::Io(e) => TravelError::Io(e),
            other => TravelError::Protocol(format!("worker {}: {}", index, other)),
        }
    }
}

/// Wire discriminant of each message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    Init = 0,
    Assign = 1,
    AssignSilent = 2,
    Done = 3,
    BloomSnapshot = 4,
    VaccQuery = 5,
    VaccAnswer = 6,
    StatusQuery = 7,
    PersonInfo = 8,
    PersonVacc = 9,
    OutcomeNotice = 10,
}

impl TryFrom<u8> for MessageKind {
    type Error = ChannelError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Init,
            1 => Self::Assign,
            2 => Self::AssignSilent,
            3 => Self::Done,
            4 => Self::BloomSnapshot,
            5 => Self::VaccQuery,
            6 => Self::VaccAnswer,
            7 => Self::StatusQuery,
            8 => Self::PersonInfo,
            9 => Self::PersonVacc,
            10 => Self::OutcomeNotice,
            other => return Err(ChannelError::UnknownKind(other)),
        })
    }
}

/// Every message exchanged between the coordinator and a worker
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// First message on a fresh channel
    Init { buffer_size: u32, bloom_size: u32 },
    /// Ingest a country directory; reply with data at the end of the phase
    Assign { country_dir: String },
    /// Ingest a country directory; reply only with the phase terminator
    AssignSilent { country_dir: String },
    /// Phase terminator
    Done,
    /// Serialized bloom filter for one virus
    BloomSnapshot { virus: String, bits: Vec<u8> },
    /// Authoritative vaccination lookup
    VaccQuery { citizen_id: String, virus: String },
    VaccAnswer { status: VaccinationStatus },
    /// Everything the shard knows about a citizen
    StatusQuery { citizen_id: String },
    PersonInfo {
        first_name: String,
        last_name: String,
        country: String,
        age: u32,
    },
    PersonVacc {
        virus: String,
        status: VaccinationStatus,
    },
    /// Travel request outcome for the destination country's shard
    OutcomeNotice { accepted: bool },
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Init { .. } => MessageKind::Init,
            Self::Assign { .. } => MessageKind::Assign,
            Self::AssignSilent { .. } => MessageKind::AssignSilent,
            Self::Done => MessageKind::Done,
            Self::BloomSnapshot { .. } => MessageKind::BloomSnapshot,
            Self::VaccQuery { .. } => MessageKind::VaccQuery,
            Self::VaccAnswer { .. } => MessageKind::VaccAnswer,
            Self::StatusQuery { .. } => MessageKind::StatusQuery,
            Self::PersonInfo { .. } => MessageKind::PersonInfo,
            Self::PersonVacc { .. } => MessageKind::PersonVacc,
            Self::OutcomeNotice { .. } => MessageKind::OutcomeNotice,
        }
    }

    fn payload(&self) -> Result<Vec<u8>, ChannelError> {
        let bytes = match self {
            Self::Init { buffer_size, bloom_size } => to_payload(&(buffer_size, bloom_size))?,
            Self::Assign { country_dir } | Self::AssignSilent { country_dir } => {
                to_payload(country_dir)?
            }
            Self::Done => Vec::new(),
            Self::BloomSnapshot { virus, bits } => to_payload(&(virus, bits))?,
            Self::VaccQuery { citizen_id, virus } => to_payload(&(citizen_id, virus))?,
            Self::VaccAnswer { status } => to_payload(status)?,
            Self::StatusQuery { citizen_id } => to_payload(citizen_id)?,
            Self::PersonInfo {
                first_name,
                last_name,
                country,
                age,
            } => to_payload(&(first_name, last_name, country, age))?,
            Self::PersonVacc { virus, status } => to_payload(&(virus, status))?,
            Self::OutcomeNotice { accepted } => to_payload(accepted)?,
        };
        Ok(bytes)
    }

    fn from_payload(kind: MessageKind, payload: &[u8]) -> Result<Self, ChannelError> {
        Ok(match kind {
            MessageKind::Init => {
                let (buffer_size, bloom_size) = from_payload(payload)?;
                Self::Init { buffer_size, bloom_size }
            }
            MessageKind::Assign => Self::Assign {
                country_dir: from_payload(payload)?,
            },
            MessageKind::AssignSilent => Self::AssignSilent {
                country_dir: from_payload(payload)?,
            },
            MessageKind::Done => Self::Done,
            MessageKind::BloomSnapshot => {
                let (virus, bits) = from_payload(payload)?;
                Self::BloomSnapshot { virus, bits }
            }
            MessageKind::VaccQuery => {
                let (citizen_id, virus) = from_payload(payload)?;
                Self::VaccQuery { citizen_id, virus }
            }
            MessageKind::VaccAnswer => Self::VaccAnswer {
                status: from_payload(payload)?,
            },
            MessageKind::StatusQuery => Self::StatusQuery {
                citizen_id: from_payload(payload)?,
            },
            MessageKind::PersonInfo => {
                let (first_name, last_name, country, age) = from_payload(payload)?;
                Self::PersonInfo {
                    first_name,
                    last_name,
                    country,
                    age,
                }
            }
            MessageKind::PersonVacc => {
                let (virus, status) = from_payload(payload)?;
                Self::PersonVacc { virus, status }
            }
            MessageKind::OutcomeNotice => Self::OutcomeNotice {
                accepted: from_payload(payload)?,
            },
        })
    }
}

fn to_payload<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, ChannelError> {
    Ok(bincode::serialize(value)?)
}

fn from_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T, ChannelError> {
    Ok(bincode::deserialize(payload)?)
}

/// Encode one message as a complete frame
pub fn encode_frame(message: &Message) -> Result<BytesMut, ChannelError> {
    let payload = message.payload()?;
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(ChannelError::Oversize(payload.len()));
    }

    let mut frame = BytesMut::with_capacity(HEADER_LEN + payload.len());
    frame.put_u8(message.kind() as u8);
    frame.put_u32(payload.len() as u32);
    frame.put_slice(&payload);
    Ok(frame)
}

/// Pop one complete frame off the front of `buf`.
///
/// Returns `Ok(None)` when more bytes are needed. The kind byte is checked
/// as soon as it arrives so a corrupt stream fails fast.
pub fn decode_frame(buf: &mut BytesMut) -> Result<Option<Message>, ChannelError> {
    if buf.is_empty() {
        return Ok(None);
    }
    let kind = MessageKind::try_from(buf[0])?;

    if buf.len() < HEADER_LEN {
        return Ok(None);
    }
    let len = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
    if len > MAX_PAYLOAD_LEN {
        return Err(ChannelError::Oversize(len));
    }
    if buf.len() < HEADER_LEN + len {
        buf.reserve(HEADER_LEN + len - buf.len());
        return Ok(None);
    }

    buf.advance(HEADER_LEN);
    let payload = buf.split_to(len);
    Message::from_payload(kind, &payload).map(Some)
}
