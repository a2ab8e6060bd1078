//! Broker URL parsing.

use crate::error::PublisherError;

pub struct BrokerAddr {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

pub fn parse(url: &str) -> Result<BrokerAddr, PublisherError> {
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| PublisherError::InvalidBrokerUrl(url.to_string()))?;

    let tls = matches!(scheme, "mqtts" | "ssl");
    let default_port: u16 = if tls { 8883 } else { 1883 };

    let host_port = rest.trim_end_matches('/');
    let (host, port) = match host_port.rsplit_once(':') {
        Some((host, port_str)) => {
            let port: u16 = port_str
                .parse()
                .map_err(|_| PublisherError::InvalidBrokerUrl(url.to_string()))?;
            (host.to_string(), port)
        }
        None => (host_port.to_string(), default_port),
    };

    if host.is_empty() {
        return Err(PublisherError::InvalidBrokerUrl(url.to_string()));
    }

    Ok(BrokerAddr { host, port, tls })
}
