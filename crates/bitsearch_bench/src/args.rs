//! Value parsers for the positional CLI arguments.
//!
//! Each parser reports a fixed, user-facing message so a bad invocation fails
//! before any connection is attempted.

use std::net::IpAddr;

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ArgError {
    #[error("The IP address must be an IPv4 or IPv6 address.")]
    IpAddress,
    #[error("The port number must be an integer.")]
    PortNotInteger,
    #[error("The port number must be suitably small.")]
    PortTooLarge,
    #[error("The number must be an integer.")]
    CountNotInteger,
    #[error("The number must be suitably small.")]
    CountTooLarge,
}

enum Unsigned {
    NotInteger,
    TooLarge,
}

fn parse_unsigned<T: TryFrom<u64>>(raw: &str) -> Result<T, Unsigned> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Unsigned::NotInteger);
    }
    // Only digits remain, so a parse failure is an overflow.
    let wide = raw.parse::<u64>().map_err(|_| Unsigned::TooLarge)?;
    T::try_from(wide).map_err(|_| Unsigned::TooLarge)
}

pub fn parse_coordinator_ip(raw: &str) -> Result<IpAddr, ArgError> {
    raw.trim().parse::<IpAddr>().map_err(|_| ArgError::IpAddress)
}

pub fn parse_port(raw: &str) -> Result<u16, ArgError> {
    parse_unsigned(raw).map_err(|err| match err {
        Unsigned::NotInteger => ArgError::PortNotInteger,
        Unsigned::TooLarge => ArgError::PortTooLarge,
    })
}

pub fn parse_count(raw: &str) -> Result<u32, ArgError> {
    parse_unsigned(raw).map_err(|err| match err {
        Unsigned::NotInteger => ArgError::CountNotInteger,
        Unsigned::TooLarge => ArgError::CountTooLarge,
    })
}
