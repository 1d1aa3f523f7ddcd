//! Client identity derived from the peer address.

use std::fmt;

use thiserror::Error;

/// Reasons a peer address cannot be turned into a client identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("request carries no peer address")]
    MissingPeer,

    #[error("address {0}: missing port in address")]
    MissingPort(String),

    #[error("address {0}: too many colons in address")]
    TooManyColons(String),

    #[error("address {0}: missing ']' in address")]
    MissingBracket(String),

    #[error("address {0}: invalid port")]
    InvalidPort(String),

    #[error("address {0}: empty host")]
    EmptyHost(String),
}

/// Opaque per-client key: the host portion of the peer address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Split `host:port` (or `[v6-host]:port`) and keep the host.
    pub fn from_peer_addr(addr: &str) -> Result<Self, IdentityError> {
        let (host, port) = split_host_port(addr)?;

        if port.is_empty() || port.parse::<u16>().is_err() {
            return Err(IdentityError::InvalidPort(addr.to_string()));
        }
        if host.is_empty() {
            return Err(IdentityError::EmptyHost(addr.to_string()));
        }

        Ok(Self(host.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn split_host_port(addr: &str) -> Result<(&str, &str), IdentityError> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| IdentityError::MissingBracket(addr.to_string()))?;
        let port = tail
            .strip_prefix(':')
            .ok_or_else(|| IdentityError::MissingPort(addr.to_string()))?;
        if port.contains(':') {
            return Err(IdentityError::TooManyColons(addr.to_string()));
        }
        return Ok((host, port));
    }

    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| IdentityError::MissingPort(addr.to_string()))?;
    if host.contains(':') {
        return Err(IdentityError::TooManyColons(addr.to_string()));
    }
    if host.contains(']') {
        return Err(IdentityError::MissingBracket(addr.to_string()));
    }
    Ok((host, port))
}
