//! The Bitcoin peer-to-peer protocol, just enough to pull a header chain:
//! framed messages over one blocking TCP connection, the version handshake,
//! and the getheaders/headers exchange. Pings are answered transparently;
//! any other unexpected frame is surfaced to the caller.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, info, trace};

use btc_primitives::block::Header;
use btc_primitives::encode::{
    read_array, read_u32_le, read_u64_le, read_varint, write_varbytes, write_varint,
};
use btc_primitives::entropy::rand_bytes;
use btc_primitives::hash::hash256;
use btc_primitives::{Error, Network, Result, H256};

pub const PROTOCOL_VERSION: u32 = 70015;
pub const MAX_HEADERS_PER_MESSAGE: usize = 2000;
const USER_AGENT: &str = "/btc-node:0.1.0/";
/// Frames larger than this are junk, not messages.
const MAX_PAYLOAD_SIZE: u32 = 32 * 1024 * 1024;

/// The message kinds this client speaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Version,
    Verack,
    Ping,
    Pong,
    GetHeaders,
    Headers,
}

impl MessageKind {
    pub fn command(self) -> &'static [u8] {
        match self {
            MessageKind::Version => b"version",
            MessageKind::Verack => b"verack",
            MessageKind::Ping => b"ping",
            MessageKind::Pong => b"pong",
            MessageKind::GetHeaders => b"getheaders",
            MessageKind::Headers => b"headers",
        }
    }

    fn from_command(command: &[u8]) -> Option<MessageKind> {
        [
            MessageKind::Version,
            MessageKind::Verack,
            MessageKind::Ping,
            MessageKind::Pong,
            MessageKind::GetHeaders,
            MessageKind::Headers,
        ]
        .into_iter()
        .find(|kind| kind.command() == command)
    }
}

/// One wire frame: magic, NUL-padded command, length, HASH256 checksum,
/// payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub command: [u8; 12],
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn new(command: &[u8], payload: Vec<u8>) -> Envelope {
        debug_assert!(command.len() <= 12, "commands are at most 12 bytes");
        let mut padded = [0u8; 12];
        padded[..command.len()].copy_from_slice(command);
        Envelope {
            command: padded,
            payload,
        }
    }

    /// The command without its NUL padding.
    pub fn command_bytes(&self) -> &[u8] {
        let end = self
            .command
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.command.len());
        &self.command[..end]
    }

    pub fn command_string(&self) -> String {
        String::from_utf8_lossy(self.command_bytes()).into_owned()
    }

    pub fn kind(&self) -> Option<MessageKind> {
        MessageKind::from_command(self.command_bytes())
    }

    /// Reads one frame, checking magic and checksum.
    pub fn read(reader: &mut impl Read, network: Network) -> Result<Envelope> {
        let magic = read_array::<4>(reader)?;
        if magic != network.magic() {
            return Err(Error::Protocol(format!(
                "magic mismatch: got {}, expected {}",
                hex::encode(magic),
                hex::encode(network.magic())
            )));
        }
        let command = read_array::<12>(reader)?;
        let payload_len = read_u32_le(reader)?;
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(Error::Protocol(format!(
                "oversized payload: {payload_len} bytes"
            )));
        }
        let checksum = read_array::<4>(reader)?;
        let mut payload = vec![0u8; payload_len as usize];
        reader.read_exact(&mut payload)?;

        let expected = hash256(&payload);
        if checksum != expected.0[..4] {
            return Err(Error::Protocol(format!(
                "checksum mismatch on {:?}",
                String::from_utf8_lossy(&command)
            )));
        }
        Ok(Envelope { command, payload })
    }

    pub fn serialize(&self, network: Network) -> Vec<u8> {
        let mut out = Vec::with_capacity(24 + self.payload.len());
        out.extend_from_slice(&network.magic());
        out.extend_from_slice(&self.command);
        out.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&hash256(&self.payload).0[..4]);
        out.extend_from_slice(&self.payload);
        out
    }
}

/// The `version` advertisement opening the handshake.
pub struct VersionMessage {
    pub version: u32,
    pub services: u64,
    pub timestamp: u64,
    pub nonce: [u8; 8],
    pub user_agent: String,
    pub start_height: u32,
}

impl VersionMessage {
    pub fn new() -> VersionMessage {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let nonce: [u8; 8] = rand_bytes(8).try_into().expect("rand_bytes(8) is 8 bytes");
        VersionMessage {
            version: PROTOCOL_VERSION,
            services: 0,
            timestamp,
            nonce,
            user_agent: USER_AGENT.to_owned(),
            start_height: 0,
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.services.to_le_bytes());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        // Receiver and sender network addresses; all-zero IPv4-mapped
        // addresses, since we advertise no services either way.
        for _ in 0..2 {
            out.extend_from_slice(&self.services.to_le_bytes());
            out.extend_from_slice(&[0u8; 10]);
            out.extend_from_slice(&[0xff, 0xff]);
            out.extend_from_slice(&[0u8; 4]);
            out.extend_from_slice(&0u16.to_be_bytes());
        }
        out.extend_from_slice(&self.nonce);
        write_varbytes(&mut out, self.user_agent.as_bytes());
        out.extend_from_slice(&self.start_height.to_le_bytes());
        out.push(0x00); // no relay
        out
    }
}

impl Default for VersionMessage {
    fn default() -> Self {
        Self::new()
    }
}

/// A `getheaders` request: give me up to 2000 headers after `start_block`.
pub struct GetHeadersMessage {
    pub start_block: H256,
}

impl GetHeadersMessage {
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());
        write_varint(&mut out, 1); // one locator hash
        out.extend_from_slice(&self.start_block.0);
        out.extend_from_slice(&H256::ZERO.0); // no stopping hash
        out
    }
}

/// A `headers` reply: each entry is an 80-byte header plus a transaction
/// count, which is always zero in this message.
pub struct HeadersMessage {
    pub headers: Vec<Header>,
}

impl HeadersMessage {
    pub fn parse(payload: &[u8]) -> Result<HeadersMessage> {
        let reader = &mut &payload[..];
        let count = read_varint(reader)?;
        if count as usize > MAX_HEADERS_PER_MESSAGE {
            return Err(Error::Protocol(format!(
                "headers message claims {count} entries"
            )));
        }
        let mut headers = Vec::with_capacity(count as usize);
        for _ in 0..count {
            headers.push(Header::parse(reader)?);
            let tx_count = read_varint(reader)?;
            if tx_count != 0 {
                return Err(Error::Protocol(format!(
                    "headers entry carries {tx_count} transactions"
                )));
            }
        }
        Ok(HeadersMessage { headers })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_varint(&mut out, self.headers.len() as u64);
        for header in &self.headers {
            out.extend_from_slice(&header.serialize());
            write_varint(&mut out, 0);
        }
        out
    }
}

/// One blocking connection to a peer. All reads and writes happen on the
/// caller's thread; closing the socket is the only cancellation.
pub struct Node {
    stream: TcpStream,
    network: Network,
}

impl Node {
    /// Connects without handshaking. Timeouts apply to every subsequent
    /// read and write; `None` blocks indefinitely.
    pub fn connect(
        host: &str,
        port: u16,
        network: Network,
        read_timeout: Option<Duration>,
        write_timeout: Option<Duration>,
    ) -> Result<Node> {
        let stream = TcpStream::connect((host, port))?;
        stream.set_read_timeout(read_timeout)?;
        stream.set_write_timeout(write_timeout)?;
        info!(target: "p2p", "connected to {host}:{port}");
        Ok(Node { stream, network })
    }

    pub fn send(&mut self, command: &[u8], payload: Vec<u8>) -> Result<()> {
        let envelope = Envelope::new(command, payload);
        trace!(target: "p2p", "-> {}", envelope.command_string());
        self.stream.write_all(&envelope.serialize(self.network))?;
        Ok(())
    }

    /// Reads frames until one of the requested kinds arrives. Pings are
    /// answered in passing; anything else unexpected is an error.
    pub fn wait_for(&mut self, kinds: &[MessageKind]) -> Result<Envelope> {
        loop {
            let envelope = Envelope::read(&mut self.stream, self.network)?;
            trace!(target: "p2p", "<- {}", envelope.command_string());
            match envelope.kind() {
                Some(MessageKind::Ping) if !kinds.contains(&MessageKind::Ping) => {
                    // Echo the nonce back.
                    self.send(MessageKind::Pong.command(), envelope.payload)?;
                }
                Some(kind) if kinds.contains(&kind) => return Ok(envelope),
                _ => {
                    return Err(Error::Protocol(format!(
                        "unexpected {} message",
                        envelope.command_string()
                    )))
                }
            }
        }
    }

    /// The three-step opening: our version, the peer's version (answered
    /// with verack), the peer's verack. Order of the peer's two messages
    /// is not assumed.
    pub fn handshake(&mut self) -> Result<()> {
        self.send(
            MessageKind::Version.command(),
            VersionMessage::new().serialize(),
        )?;

        let mut got_version = false;
        let mut got_verack = false;
        while !(got_version && got_verack) {
            let wanted: &[MessageKind] = if got_version {
                &[MessageKind::Verack]
            } else {
                &[MessageKind::Version, MessageKind::Verack]
            };
            let envelope = self.wait_for(wanted)?;
            match envelope.kind() {
                Some(MessageKind::Version) => {
                    let peer_version = read_u32_le(&mut envelope.payload.as_slice())?;
                    debug!(target: "p2p", "peer speaks protocol {peer_version}");
                    self.send(MessageKind::Verack.command(), Vec::new())?;
                    got_version = true;
                }
                Some(MessageKind::Verack) => got_verack = true,
                _ => unreachable!("wait_for returned an unrequested kind"),
            }
        }
        debug!(target: "p2p", "handshake complete");
        Ok(())
    }

    /// One getheaders/headers round trip starting after `start_block`.
    pub fn get_headers(&mut self, start_block: H256) -> Result<Vec<Header>> {
        let request = GetHeadersMessage { start_block };
        self.send(MessageKind::GetHeaders.command(), request.serialize())?;
        let reply = self.wait_for(&[MessageKind::Headers])?;
        Ok(HeadersMessage::parse(&reply.payload)?.headers)
    }

    /// Answers one ping, mostly useful to drain a quiet socket in tests.
    pub fn ping(&mut self) -> Result<()> {
        let nonce = rand_bytes(8);
        self.send(MessageKind::Ping.command(), nonce)?;
        let reply = self.wait_for(&[MessageKind::Pong])?;
        let _ = read_u64_le(&mut reply.payload.as_slice())?;
        Ok(())
    }
}
