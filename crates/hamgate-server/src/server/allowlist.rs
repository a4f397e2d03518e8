//! IP admission allowlist

use std::net::IpAddr;
use std::str::FromStr;

use ipnetwork::IpNetwork;

/// Network prefixes allowed to connect
#[derive(Debug, Clone, Default)]
pub struct IpAllowlist {
    networks: Vec<IpNetwork>,
    /// Entries were configured but none parsed
    deny_all: bool,
}

impl IpAllowlist {
    /// Parse configured entries, skipping malformed ones
    ///
    /// Accepts bare addresses and CIDR prefixes for IPv4 and IPv6. Host bits
    /// in a prefix are ignored.
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Self {
        let mut networks = Vec::with_capacity(entries.len());

        for entry in entries {
            let entry = entry.as_ref().trim();
            match parse_entry(entry) {
                Some(network) => networks.push(network),
                None => tracing::warn!("Ignoring malformed ip_allowlist entry {:?}", entry),
            }
        }

        let deny_all = !entries.is_empty() && networks.is_empty();
        if deny_all {
            tracing::warn!("No ip_allowlist entry could be parsed; all connections will be rejected");
        }

        Self { networks, deny_all }
    }

    /// Whether connections from `ip` are admitted
    pub fn allows(&self, ip: IpAddr) -> bool {
        if self.deny_all {
            return false;
        }
        if self.networks.is_empty() {
            return true;
        }

        let ip = ip.to_canonical();
        self.networks.iter().any(|network| network.contains(ip))
    }

    /// Whether any restriction is in effect
    pub fn is_restricted(&self) -> bool {
        self.deny_all || !self.networks.is_empty()
    }

    pub fn networks(&self) -> &[IpNetwork] {
        &self.networks
    }
}

fn parse_entry(entry: &str) -> Option<IpNetwork> {
    if entry.contains('/') {
        IpNetwork::from_str(entry).ok()
    } else {
        IpAddr::from_str(entry).ok().map(IpNetwork::from)
    }
}
