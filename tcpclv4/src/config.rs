/*!
Tunables for a [`super::Layer`], matching the suggested defaults of RFC 9174
§9.
*/

/// Per-session tunables, applied to both accepted and dialled connections.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    /// Seconds to wait for the peer's contact header and SESS_INIT.
    pub contact_timeout: u16,

    /// Keepalive interval in seconds, advertised in our SESS_INIT.
    /// `None` (or 0, once negotiated) disables keepalives.
    pub keepalive_interval: Option<u16>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            contact_timeout: 15,
            keepalive_interval: Some(60),
        }
    }
}

/// Layer-wide configuration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// The address to listen for inbound TCP connections on.
    pub address: std::net::SocketAddr,

    /// Largest single XFER_SEGMENT data length we will accept.
    pub segment_mru: u64,

    /// Largest total bundle size we will accept.
    pub transfer_mru: u64,

    /// Maximum number of connections the accept loop will admit per second.
    pub connection_rate_limit: u32,

    #[cfg_attr(feature = "serde", serde(flatten))]
    pub session_defaults: SessionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: std::net::SocketAddr::new(std::net::IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED), 4556),
            segment_mru: 16384,
            transfer_mru: 0x2_0000_0000_0000,
            connection_rate_limit: 10,
            session_defaults: SessionConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_rfc9174_suggestions() {
        let config = Config::default();
        assert_eq!(config.address.port(), 4556);
        assert_eq!(config.segment_mru, 16384);
        assert_eq!(config.session_defaults.contact_timeout, 15);
        assert_eq!(config.session_defaults.keepalive_interval, Some(60));
    }
}
