//! IP-network membership for gating administrative handlers.
//!
//! # Responsibilities
//! - Parse configured CIDR strings
//! - Answer whether a peer address falls inside the allowed networks
//!
//! # Design Decisions
//! - Outside the list means 404, not 403: the handlers stay invisible

use std::net::IpAddr;

use ipnet::IpNet;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid network {network:?}: {source}")]
pub struct NetworkParseError {
    network: String,
    source: ipnet::AddrParseError,
}

/// The set of networks whose members may reach debug handlers.
#[derive(Debug, Clone)]
pub struct DebugNetworks {
    networks: Vec<IpNet>,
}

impl DebugNetworks {
    /// Parses CIDR strings into an allow-list.
    pub fn parse<I, S>(cidrs: I) -> Result<Self, NetworkParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut networks = Vec::new();
        for cidr in cidrs {
            let cidr = cidr.as_ref();
            let net = cidr.parse().map_err(|source| NetworkParseError {
                network: cidr.to_string(),
                source,
            })?;
            networks.push(net);
        }
        Ok(Self { networks })
    }

    /// The loopback, link-local, and private-use networks: the addresses a
    /// co-located operator connects from.
    pub fn local() -> Self {
        Self::parse([
            "127.0.0.0/8",    // loopback
            "::1/128",        // loopback
            "169.254.0.0/16", // link local
            "fe80::/10",      // link local
            "fc00::/7",       // unique local
            "10.0.0.0/8",     // private use
            "172.16.0.0/12",  // private use
            "192.168.0.0/16", // private use
        ])
        .expect("built-in networks parse")
    }

    /// Returns the first network containing `ip`, if any.
    pub fn containing(&self, ip: IpAddr) -> Option<&IpNet> {
        self.networks.iter().find(|net| net.contains(&ip))
    }

    pub fn allows(&self, ip: IpAddr) -> bool {
        self.containing(ip).is_some()
    }
}

impl Default for DebugNetworks {
    fn default() -> Self {
        Self::local()
    }
}
