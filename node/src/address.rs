use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// Address rejected by [`is_valid_address`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("not a valid address: '{0}' (expected IPV4:PORT or localhost:PORT)")]
    Invalid(String),
}

/// Returns true for `host:port` where host is an IPv4 literal or `localhost`
/// and port is a decimal number that fits in 16 bits.
pub fn is_valid_address(addr: &str) -> bool {
    let Some((host, port)) = addr.split_once(':') else {
        return false;
    };

    let host_ok = host == "localhost" || host.parse::<Ipv4Addr>().is_ok();
    let port_ok = !port.is_empty()
        && port.bytes().all(|b| b.is_ascii_digit())
        && port.parse::<u16>().is_ok();

    host_ok && port_ok
}

/// A `host:port` string that passed [`is_valid_address`].
///
/// Node identities, registry entries and connection targets are all held as
/// `PeerAddress`, so nothing past the command line sees an unchecked address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerAddress(String);

impl PeerAddress {
    pub fn parse(addr: impl Into<String>) -> Result<Self, AddressError> {
        let addr = addr.into();
        if is_valid_address(&addr) {
            Ok(Self(addr))
        } else {
            Err(AddressError::Invalid(addr))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn host(&self) -> &str {
        self.0.split_once(':').map(|(host, _)| host).unwrap_or_default()
    }

    pub fn port(&self) -> u16 {
        self.0
            .split_once(':')
            .and_then(|(_, port)| port.parse().ok())
            .unwrap_or_default()
    }

    /// Same host on a different port
    pub fn with_port(&self, port: u16) -> Self {
        Self(format!("{}:{}", self.host(), port))
    }

    /// URI used to open a gRPC channel to this address
    pub fn endpoint(&self) -> String {
        format!("http://{}", self.0)
    }
}

impl FromStr for PeerAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_ipv4_and_localhost() {
        assert!(is_valid_address("127.0.0.1:4000"));
        assert!(is_valid_address("10.0.1.5:5000"));
        assert!(is_valid_address("localhost:4001"));
        assert!(is_valid_address("0.0.0.0:0"));
    }

    #[test]
    fn test_rejects_malformed_addresses() {
        assert!(!is_valid_address(""));
        assert!(!is_valid_address("127.0.0.1"));
        assert!(!is_valid_address("127.0.0.1:"));
        assert!(!is_valid_address("127.0.0.1:abc"));
        assert!(!is_valid_address("127.0.0.1:+80"));
        assert!(!is_valid_address("127.0.0.1:70000"));
        assert!(!is_valid_address("127.0.0.1:4000:1"));
        assert!(!is_valid_address("256.0.0.1:4000"));
        assert!(!is_valid_address("example.com:4000"));
        assert!(!is_valid_address("[::1]:4000"));
    }

    #[test]
    fn test_peer_address_parse() {
        let addr: PeerAddress = "localhost:4000".parse().unwrap();
        assert_eq!(addr.as_str(), "localhost:4000");
        assert_eq!(addr.host(), "localhost");
        assert_eq!(addr.port(), 4000);
        assert_eq!(addr.endpoint(), "http://localhost:4000");
        assert_eq!(addr.to_string(), "localhost:4000");

        assert_eq!(
            PeerAddress::parse("nope"),
            Err(AddressError::Invalid("nope".to_string()))
        );
    }

    #[test]
    fn test_with_port_keeps_host() {
        let addr = PeerAddress::parse("127.0.0.1:0").unwrap();
        assert_eq!(addr.with_port(4123).as_str(), "127.0.0.1:4123");
    }
}
