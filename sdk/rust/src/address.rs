//! `host:port` address validation

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AddressError {
    #[error("address {0:?} must have the form host:port")]
    Format(String),

    #[error("address {0:?} has an empty host")]
    EmptyHost(String),

    #[error("address {0:?} has an invalid port, expected 1-65535")]
    Port(String),
}

/// Split and validate a `host:port` address
pub fn split_host_port(address: &str) -> Result<(&str, u16), AddressError> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| AddressError::Format(address.to_string()))?;
    if host.is_empty() {
        return Err(AddressError::EmptyHost(address.to_string()));
    }
    if host.contains(':') && !(host.starts_with('[') && host.ends_with(']')) {
        return Err(AddressError::Format(address.to_string()));
    }
    match port.parse::<u16>() {
        Ok(port) if port > 0 => Ok((host, port)),
        _ => Err(AddressError::Port(address.to_string())),
    }
}
