pub mod models;

use std::{
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    sync::atomic::{AtomicU16, AtomicU32, Ordering},
    time::Duration,
};

use coap_lite::{CoapOption, MessageClass, MessageType, Packet, RequestType};
use thiserror::Error;
use tokio::{net::UdpSocket, time};
use tracing::debug;

use self::models::{Brightness, ResponseCode, StatusPayload, BRIGHTNESS_PATH, STATUS_PATH};

/// Largest datagram we expect from a constrained node (IPv6 minimum MTU).
const MAX_DATAGRAM: usize = 1280;

// ---------------------------------------------------------------------------
// DongleError
// ---------------------------------------------------------------------------

/// Why a single exchange with one dongle failed.
///
/// Always local to that dongle: callers log it and carry on with the next.
#[derive(Debug, Error)]
pub enum DongleError {
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("response carried no payload")]
    NoPayload,
    #[error("dongle answered with {0}")]
    Status(ResponseCode),
    #[error("invalid status payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
    #[error("malformed CoAP message: {0}")]
    Codec(String),
    #[error("dongle reset the exchange")]
    Reset,
    #[error("invalid dongle address {0:?}")]
    InvalidAddress(String),
}

fn codec_error(e: impl std::fmt::Debug) -> DongleError {
    DongleError::Codec(format!("{e:?}"))
}

// ---------------------------------------------------------------------------
// DongleLink
// ---------------------------------------------------------------------------

/// The two requests the pipeline makes to a dongle.
#[allow(async_fn_in_trait)]
pub trait DongleLink {
    /// `GET /status`, decoded.
    async fn read_status(&self, address: &str) -> Result<StatusPayload, DongleError>;

    /// `PUT /actuators/brightness`. Any response counts as delivered.
    async fn set_brightness(
        &self,
        address: &str,
        brightness: Brightness,
    ) -> Result<ResponseCode, DongleError>;
}

// ---------------------------------------------------------------------------
// CoapClient
// ---------------------------------------------------------------------------

/// Confirmable request/response client over UDP.
///
/// Each exchange binds its own ephemeral socket and is bounded by `timeout`.
/// Lost messages are not retransmitted; the caller simply sees a timeout.
#[derive(Debug)]
pub struct CoapClient {
    port: u16,
    timeout: Duration,
    message_id: AtomicU16,
    token: AtomicU32,
}

impl CoapClient {
    pub fn new(port: u16, timeout: Duration) -> Self {
        // Start ids somewhere arbitrary so restarts do not reuse recent ids.
        let seed = chrono::Utc::now().timestamp_subsec_nanos();
        Self {
            port,
            timeout,
            message_id: AtomicU16::new(seed as u16),
            token: AtomicU32::new(seed.rotate_left(16)),
        }
    }

    fn target(&self, address: &str) -> Result<SocketAddr, DongleError> {
        let ip: IpAddr = address
            .parse()
            .map_err(|_| DongleError::InvalidAddress(address.to_owned()))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    fn request(&self, method: RequestType, path: &str, payload: Vec<u8>) -> Packet {
        let mut packet = Packet::new();
        packet.header.set_version(1);
        packet.header.set_type(MessageType::Confirmable);
        packet.header.code = MessageClass::Request(method);
        packet.header.message_id = self.message_id.fetch_add(1, Ordering::Relaxed);
        packet.set_token(
            self.token
                .fetch_add(1, Ordering::Relaxed)
                .to_be_bytes()
                .to_vec(),
        );
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            packet.add_option(CoapOption::UriPath, segment.as_bytes().to_vec());
        }
        packet.payload = payload;
        packet
    }

    /// Send `request` to `target` and wait for the matching response.
    async fn exchange(&self, target: SocketAddr, request: &Packet) -> Result<Packet, DongleError> {
        let local: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(target).await?;
        socket.send(&request.to_bytes().map_err(codec_error)?).await?;

        match time::timeout(self.timeout, await_response(&socket, request)).await {
            Ok(result) => result,
            Err(_) => Err(DongleError::Timeout(self.timeout)),
        }
    }
}

impl DongleLink for CoapClient {
    async fn read_status(&self, address: &str) -> Result<StatusPayload, DongleError> {
        let target = self.target(address)?;
        debug!(target = %target, path = STATUS_PATH, "CoAP GET");

        let request = self.request(RequestType::Get, STATUS_PATH, Vec::new());
        let response = self.exchange(target, &request).await?;

        let code = response_code(&response);
        if !code.is_success() {
            return Err(DongleError::Status(code));
        }
        if response.payload.is_empty() {
            return Err(DongleError::NoPayload);
        }
        Ok(StatusPayload::from_slice(&response.payload)?)
    }

    async fn set_brightness(
        &self,
        address: &str,
        brightness: Brightness,
    ) -> Result<ResponseCode, DongleError> {
        let target = self.target(address)?;
        debug!(target = %target, path = BRIGHTNESS_PATH, percent = brightness.percent(), "CoAP PUT");

        let request = self.request(RequestType::Put, BRIGHTNESS_PATH, brightness.to_payload());
        let response = self.exchange(target, &request).await?;
        Ok(response_code(&response))
    }
}

fn response_code(packet: &Packet) -> ResponseCode {
    ResponseCode(u8::from(packet.header.code))
}

/// Read datagrams until the response to `request` arrives.
///
/// A piggy-backed ACK carries the response directly. An empty ACK means the
/// response follows separately, matched by token; a confirmable separate
/// response is acknowledged before returning. Datagrams that do not decode
/// or do not belong to this exchange are skipped.
async fn await_response(socket: &UdpSocket, request: &Packet) -> Result<Packet, DongleError> {
    let mut buf = [0u8; MAX_DATAGRAM];
    loop {
        let len = socket.recv(&mut buf).await?;
        let packet = match Packet::from_bytes(&buf[..len]) {
            Ok(packet) => packet,
            Err(e) => {
                debug!(len, error = ?e, "Ignoring undecodable datagram");
                continue;
            }
        };
        let same_id = packet.header.message_id == request.header.message_id;

        match packet.header.get_type() {
            MessageType::Reset if same_id => return Err(DongleError::Reset),
            MessageType::Acknowledgement
                if same_id && matches!(packet.header.code, MessageClass::Empty) =>
            {
                debug!(message_id = packet.header.message_id, "Empty ACK, awaiting separate response");
                continue;
            }
            _ => {}
        }

        if packet.get_token() != request.get_token()
            || !matches!(packet.header.code, MessageClass::Response(_))
        {
            debug!(message_id = packet.header.message_id, "Ignoring unrelated datagram");
            continue;
        }

        if matches!(packet.header.get_type(), MessageType::Confirmable) {
            let ack = empty_ack(packet.header.message_id);
            socket.send(&ack.to_bytes().map_err(codec_error)?).await?;
        }
        return Ok(packet);
    }
}

fn empty_ack(message_id: u16) -> Packet {
    let mut packet = Packet::new();
    packet.header.set_version(1);
    packet.header.set_type(MessageType::Acknowledgement);
    packet.header.code = MessageClass::Empty;
    packet.header.message_id = message_id;
    packet
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
