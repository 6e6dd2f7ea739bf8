//! DNS override: resolve through an explicit list of name servers
//!
//! The list format is `host[:port][,host[:port]]...` where `host` is an IPv4
//! address or an IPv6 address (bracketed when a port follows). The port
//! defaults to 53.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use hickory_resolver::config::{
    LookupIpStrategy, NameServerConfig, ResolverConfig, ResolverOpts,
};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::xfer::Protocol;
use hickory_resolver::TokioResolver;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use thiserror::Error;

use super::{TransportCode, TransportError};

const DEFAULT_DNS_PORT: u16 = 53;

/// A parsed name server list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsServers {
    servers: Vec<SocketAddr>,
}

impl DnsServers {
    pub fn parse(list: &str) -> Result<Self, TransportError> {
        let mut servers = Vec::new();
        for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            servers.push(parse_entry(entry).ok_or_else(|| {
                TransportError::new(
                    TransportCode::BadFunctionArgument,
                    format!("invalid DNS server entry {:?}", entry),
                )
            })?);
        }
        if servers.is_empty() {
            return Err(TransportError::new(
                TransportCode::BadFunctionArgument,
                format!("no DNS servers in {:?}", list),
            ));
        }
        Ok(Self { servers })
    }

    pub fn servers(&self) -> &[SocketAddr] {
        &self.servers
    }

    /// A resolver that only consults these servers.
    pub(crate) fn resolver(&self) -> OverrideResolver {
        let mut config = ResolverConfig::new();
        for addr in &self.servers {
            config.add_name_server(NameServerConfig::new(*addr, Protocol::Udp));
        }
        let mut opts = ResolverOpts::default();
        opts.ip_strategy = LookupIpStrategy::Ipv4AndIpv6;

        let resolver =
            TokioResolver::builder_with_config(config, TokioConnectionProvider::default())
                .with_options(opts)
                .build();
        OverrideResolver {
            resolver: Arc::new(resolver),
        }
    }
}

fn parse_entry(entry: &str) -> Option<SocketAddr> {
    if let Ok(addr) = entry.parse::<SocketAddr>() {
        return Some(addr);
    }
    let host = entry
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(entry);
    host.parse::<IpAddr>()
        .ok()
        .map(|ip| SocketAddr::new(ip, DEFAULT_DNS_PORT))
}

/// A host name could not be resolved through the override servers.
#[derive(Error, Debug)]
#[error("could not resolve {host}: {reason}")]
pub struct DnsLookupError {
    host: String,
    reason: String,
}

impl DnsLookupError {
    pub fn new(host: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            reason: reason.into(),
        }
    }
}

/// Bridges the hickory resolver into the engine's resolver hook.
#[derive(Clone)]
pub(crate) struct OverrideResolver {
    resolver: Arc<TokioResolver>,
}

impl Resolve for OverrideResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = self.resolver.clone();
        Box::pin(async move {
            let host = name.as_str().to_string();
            let lookup = resolver
                .lookup_ip(host.as_str())
                .await
                .map_err(|e| DnsLookupError::new(host.as_str(), e.to_string()))?;
            let addrs: Vec<SocketAddr> = lookup.iter().map(|ip| SocketAddr::new(ip, 0)).collect();
            tracing::trace!(%host, count = addrs.len(), "resolved through DNS override");
            let addrs: Addrs = Box::new(addrs.into_iter());
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(addrs)
        })
    }
}
