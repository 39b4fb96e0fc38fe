//! Datagram codec for the RCON wire protocol
//!
//! Every datagram is framed as `"BE" | crc32(payload) | payload`, with the
//! checksum stored little-endian and computed over the payload only. The
//! payload always starts with `0xFF` followed by the packet type byte.
//!
//! Login and chat packets share their type byte between directions, so
//! decoding is direction-aware: the client decodes with
//! [`Packet::decode_from_server`] and a server with
//! [`Packet::decode_from_client`].

use crate::ProtocolError;

/// Leading bytes of every datagram.
pub const MAGIC: [u8; 2] = *b"BE";
/// First payload byte.
pub const PAYLOAD_MARKER: u8 = 0xFF;
/// Magic, checksum, marker and type byte.
pub const HEADER_LEN: usize = 8;
/// Command responses up to this length carry no text and only acknowledge a sequence.
pub const ACK_MAX_LEN: usize = 9;
/// First byte of the split-response header `0x00 | total | index`.
pub const MULTIPART_MARKER: u8 = 0x00;
/// Outbound sequence numbers run `0..SEQUENCE_MODULUS` and wrap.
pub const SEQUENCE_MODULUS: u8 = 127;

const CHECKSUM_RANGE: std::ops::Range<usize> = 2..6;
const PAYLOAD_START: usize = 6;
const TYPE_OFFSET: usize = 7;
const BODY_OFFSET: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Login = 0x00,
    Command = 0x01,
    Chat = 0x02,
}

impl TryFrom<u8> for PacketType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(PacketType::Login),
            0x01 => Ok(PacketType::Command),
            0x02 => Ok(PacketType::Chat),
            other => Err(ProtocolError::UnknownType(other)),
        }
    }
}

/// Body of a command response sent by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// Bare acknowledgement of a sequence number.
    Ack,
    /// One fragment of a response split over several datagrams.
    Part {
        total: u8,
        index: u8,
        fragment: Vec<u8>,
    },
    /// A complete response in a single datagram.
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    // Client to server
    Login {
        password: String,
    },
    /// An empty command is the keep-alive.
    Command {
        sequence: u8,
        command: String,
    },
    ChatAck {
        id: u8,
    },

    // Server to client
    LoginResponse {
        success: bool,
    },
    CommandResponse {
        sequence: u8,
        body: ResponseBody,
    },
    Chat {
        id: u8,
        message: String,
    },
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Login { .. } | Packet::LoginResponse { .. } => PacketType::Login,
            Packet::Command { .. } | Packet::CommandResponse { .. } => PacketType::Command,
            Packet::ChatAck { .. } | Packet::Chat { .. } => PacketType::Chat,
        }
    }

    /// Serializes the packet into a framed datagram ready for the socket.
    pub fn encode(&self) -> Vec<u8> {
        let mut payload = vec![PAYLOAD_MARKER, self.packet_type() as u8];

        match self {
            Packet::Login { password } => payload.extend_from_slice(password.as_bytes()),
            Packet::Command { sequence, command } => {
                payload.push(*sequence);
                payload.extend_from_slice(command.as_bytes());
            }
            Packet::ChatAck { id } => payload.push(*id),
            Packet::LoginResponse { success } => payload.push(u8::from(*success)),
            Packet::CommandResponse { sequence, body } => {
                payload.push(*sequence);
                match body {
                    ResponseBody::Ack => {}
                    ResponseBody::Part {
                        total,
                        index,
                        fragment,
                    } => {
                        payload.extend_from_slice(&[MULTIPART_MARKER, *total, *index]);
                        payload.extend_from_slice(fragment);
                    }
                    ResponseBody::Text(text) => payload.extend_from_slice(text.as_bytes()),
                }
            }
            Packet::Chat { id, message } => {
                payload.push(*id);
                payload.extend_from_slice(message.as_bytes());
            }
        }

        frame(&payload)
    }

    /// Decodes a datagram received by the client.
    pub fn decode_from_server(data: &[u8]) -> Result<Packet, ProtocolError> {
        let packet_type = validate_frame(data)?;
        let body = &data[BODY_OFFSET..];

        match packet_type {
            PacketType::Login => {
                let status = body.first().ok_or(ProtocolError::TooShort {
                    len: data.len(),
                    min: HEADER_LEN + 1,
                })?;
                Ok(Packet::LoginResponse {
                    success: *status == 0x01,
                })
            }
            PacketType::Command => {
                let sequence = body.first().copied().unwrap_or(0);

                if data.len() <= ACK_MAX_LEN {
                    return Ok(Packet::CommandResponse {
                        sequence,
                        body: ResponseBody::Ack,
                    });
                }

                let rest = &body[1..];
                let response = if rest.len() >= 3 && rest[0] == MULTIPART_MARKER {
                    ResponseBody::Part {
                        total: rest[1],
                        index: rest[2],
                        fragment: rest[3..].to_vec(),
                    }
                } else {
                    ResponseBody::Text(String::from_utf8_lossy(rest).into_owned())
                };

                Ok(Packet::CommandResponse {
                    sequence,
                    body: response,
                })
            }
            PacketType::Chat => {
                let id = body.first().ok_or(ProtocolError::TooShort {
                    len: data.len(),
                    min: HEADER_LEN + 1,
                })?;
                Ok(Packet::Chat {
                    id: *id,
                    message: String::from_utf8_lossy(&body[1..]).into_owned(),
                })
            }
        }
    }

    /// Decodes a datagram received by a server.
    pub fn decode_from_client(data: &[u8]) -> Result<Packet, ProtocolError> {
        let packet_type = validate_frame(data)?;
        let body = &data[BODY_OFFSET..];
        let too_short = ProtocolError::TooShort {
            len: data.len(),
            min: HEADER_LEN + 1,
        };

        match packet_type {
            PacketType::Login => Ok(Packet::Login {
                password: String::from_utf8_lossy(body).into_owned(),
            }),
            PacketType::Command => {
                let (sequence, command) = body.split_first().ok_or(too_short)?;
                Ok(Packet::Command {
                    sequence: *sequence,
                    command: String::from_utf8_lossy(command).into_owned(),
                })
            }
            PacketType::Chat => {
                let id = body.first().ok_or(too_short)?;
                Ok(Packet::ChatAck { id: *id })
            }
        }
    }
}

/// Standard reflected CRC-32 over the payload region.
pub fn checksum(payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(payload);
    hasher.finalize()
}

/// Prepends magic and checksum to a raw payload.
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut datagram = Vec::with_capacity(PAYLOAD_START + payload.len());
    datagram.extend_from_slice(&MAGIC);
    datagram.extend_from_slice(&checksum(payload).to_le_bytes());
    datagram.extend_from_slice(payload);
    datagram
}

/// Checks length, magic, checksum and marker, returning the packet type.
fn validate_frame(data: &[u8]) -> Result<PacketType, ProtocolError> {
    if data.len() < HEADER_LEN {
        return Err(ProtocolError::TooShort {
            len: data.len(),
            min: HEADER_LEN,
        });
    }

    if data[..2] != MAGIC {
        return Err(ProtocolError::BadMagic([data[0], data[1]]));
    }

    let mut expected = [0u8; 4];
    expected.copy_from_slice(&data[CHECKSUM_RANGE]);
    let expected = u32::from_le_bytes(expected);
    let actual = checksum(&data[PAYLOAD_START..]);
    if expected != actual {
        return Err(ProtocolError::ChecksumMismatch { expected, actual });
    }

    if data[PAYLOAD_START] != PAYLOAD_MARKER {
        return Err(ProtocolError::MissingMarker);
    }

    PacketType::try_from(data[TYPE_OFFSET])
}

/// Rolling one-byte sequence number for outbound command packets.
#[derive(Debug, Default, Clone)]
pub struct Sequencer {
    next: u8,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number to stamp on the next command packet and advances.
    pub fn advance(&mut self) -> u8 {
        let sequence = self.next;
        self.next = (self.next + 1) % SEQUENCE_MODULUS;
        sequence
    }

    pub fn peek(&self) -> u8 {
        self.next
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_packet_layout() {
        let data = Packet::Login {
            password: "secret".to_string(),
        }
        .encode();

        assert_eq!(&data[..2], b"BE");
        assert_eq!(data[6], 0xFF);
        assert_eq!(data[7], 0x00);
        assert_eq!(&data[8..], b"secret");
    }

    #[test]
    fn test_checksum_covers_payload_only() {
        let data = Packet::Command {
            sequence: 3,
            command: "players".to_string(),
        }
        .encode();

        let stored = u32::from_le_bytes([data[2], data[3], data[4], data[5]]);
        assert_eq!(stored, crc32fast::hash(&data[6..]));
    }

    #[test]
    fn test_checksum_known_value() {
        // zlib crc32("123456789")
        assert_eq!(checksum(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_keepalive_is_bare_command() {
        let data = Packet::Command {
            sequence: 5,
            command: String::new(),
        }
        .encode();

        assert_eq!(data.len(), ACK_MAX_LEN);
        assert_eq!(&data[6..], &[0xFF, 0x01, 5]);
    }

    #[test]
    fn test_decode_login_response() {
        let ok = frame(&[0xFF, 0x00, 0x01]);
        let rejected = frame(&[0xFF, 0x00, 0x00]);

        assert_eq!(
            Packet::decode_from_server(&ok),
            Ok(Packet::LoginResponse { success: true })
        );
        assert_eq!(
            Packet::decode_from_server(&rejected),
            Ok(Packet::LoginResponse { success: false })
        );
    }

    #[test]
    fn test_decode_short_command_is_ack() {
        let data = frame(&[0xFF, 0x01, 42]);
        assert_eq!(
            Packet::decode_from_server(&data),
            Ok(Packet::CommandResponse {
                sequence: 42,
                body: ResponseBody::Ack,
            })
        );
    }

    #[test]
    fn test_decode_multipart_header() {
        let data = frame(&[0xFF, 0x01, 7, 0x00, 3, 1, b'a', b'b']);

        match Packet::decode_from_server(&data).unwrap() {
            Packet::CommandResponse {
                sequence,
                body:
                    ResponseBody::Part {
                        total,
                        index,
                        fragment,
                    },
            } => {
                assert_eq!(sequence, 7);
                assert_eq!(total, 3);
                assert_eq!(index, 1);
                assert_eq!(fragment, b"ab");
            }
            other => panic!("Unexpected packet: {:?}", other),
        }
    }

    #[test]
    fn test_decode_plain_text_response() {
        let data = frame(b"\xFF\x01\x02Players on server:");
        assert_eq!(
            Packet::decode_from_server(&data),
            Ok(Packet::CommandResponse {
                sequence: 2,
                body: ResponseBody::Text("Players on server:".to_string()),
            })
        );
    }

    #[test]
    fn test_decode_chat() {
        let data = frame(b"\xFF\x02\x09(Global) Bob: hi");
        assert_eq!(
            Packet::decode_from_server(&data),
            Ok(Packet::Chat {
                id: 9,
                message: "(Global) Bob: hi".to_string(),
            })
        );
    }

    #[test]
    fn test_decode_rejects_short_packet() {
        assert_eq!(
            Packet::decode_from_server(b"BE\x00\x00"),
            Err(ProtocolError::TooShort { len: 4, min: 8 })
        );
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        let mut data = frame(&[0xFF, 0x01, 1]);
        data[0] = b'X';
        assert_eq!(
            Packet::decode_from_server(&data),
            Err(ProtocolError::BadMagic([b'X', b'E']))
        );
    }

    #[test]
    fn test_decode_rejects_corrupted_payload() {
        let mut data = frame(b"\xFF\x01\x01hello");
        let last = data.len() - 1;
        data[last] ^= 0x20;
        assert!(matches!(
            Packet::decode_from_server(&data),
            Err(ProtocolError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        let data = frame(&[0xFF, 0x07, 0]);
        assert_eq!(
            Packet::decode_from_server(&data),
            Err(ProtocolError::UnknownType(0x07))
        );
    }

    #[test]
    fn test_decode_from_client() {
        let login = Packet::Login {
            password: "pw".to_string(),
        };
        let ack = Packet::ChatAck { id: 200 };
        let command = Packet::Command {
            sequence: 126,
            command: "#lock".to_string(),
        };

        assert_eq!(Packet::decode_from_client(&login.encode()), Ok(login));
        assert_eq!(Packet::decode_from_client(&ack.encode()), Ok(ack));
        assert_eq!(Packet::decode_from_client(&command.encode()), Ok(command));
    }

    #[test]
    fn test_sequencer_wraps_after_126() {
        let mut sequencer = Sequencer::new();
        let issued: Vec<u8> = (0..128).map(|_| sequencer.advance()).collect();

        assert_eq!(issued[0], 0);
        assert_eq!(issued[126], 126);
        assert_eq!(issued[127], 0);
        assert!(issued.iter().all(|seq| *seq < SEQUENCE_MODULUS));
    }

    #[test]
    fn test_sequencer_reset() {
        let mut sequencer = Sequencer::new();
        sequencer.advance();
        sequencer.advance();
        assert_eq!(sequencer.peek(), 2);

        sequencer.reset();
        assert_eq!(sequencer.advance(), 0);
    }
}
