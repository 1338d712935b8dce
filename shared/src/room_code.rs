//! Human-shareable room codes: the host's IPv4 packed into four bytes and
//! base64url encoded without padding.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use std::net::Ipv4Addr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomCodeError {
    #[error("room code is not valid base64url")]
    InvalidBase64,
    #[error("room code decodes to {0} bytes, expected 4")]
    WrongLength(usize),
}

pub fn encode(ip: Ipv4Addr) -> String {
    URL_SAFE_NO_PAD.encode(ip.octets())
}

pub fn decode(code: &str) -> Result<Ipv4Addr, RoomCodeError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(code.trim().trim_end_matches('='))
        .map_err(|_| RoomCodeError::InvalidBase64)?;

    let octets: [u8; 4] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| RoomCodeError::WrongLength(bytes.len()))?;
    Ok(Ipv4Addr::from(octets))
}
