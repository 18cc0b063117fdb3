use crate::ProbeError;
use std::fmt;
use std::net::IpAddr;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    pub fn of(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }

    fn name(self) -> &'static str {
        match self {
            AddressFamily::V4 => "IPv4",
            AddressFamily::V6 => "IPv6",
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The resolved destination. Fixed for the lifetime of a run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Target {
    addr: IpAddr,
}

impl Target {
    pub fn new(addr: IpAddr) -> Self {
        Target { addr }
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn family(&self) -> AddressFamily {
        AddressFamily::of(self.addr)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr)
    }
}

/// Resolves `host` to a single address of the requested family. IP literals skip the lookup.
pub fn resolve(host: &str, family: AddressFamily) -> Result<Target, ProbeError> {
    let resolution_error = |message: String| ProbeError::Resolution { host: host.to_owned(), message };

    if let Ok(ip) = host.parse::<IpAddr>() {
        if AddressFamily::of(ip) != family {
            return Err(resolution_error(format!("{ip} is not an {} address", family.name())));
        }
        return Ok(Target::new(ip));
    }

    let ips = dns_lookup::lookup_host(host).map_err(|e| resolution_error(e.to_string()))?;
    let target = ips
        .into_iter()
        .find(|ip| AddressFamily::of(*ip) == family)
        .map(Target::new)
        .ok_or_else(|| resolution_error(format!("no {} address", family.name())))?;
    tracing::debug!("resolved {host} to {target}");
    Ok(target)
}
