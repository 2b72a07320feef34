use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::IpAddr;

/// A locator taken from a source table, along with where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord {
    pub locator: String,
    pub origin: String,
}

impl CandidateRecord {
    pub fn new(locator: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            origin: origin.into(),
        }
    }
}

/// A literal network address ready for harvesting.
///
/// IPv4-mapped IPv6 addresses are folded into plain IPv4 so the same host
/// never appears under two keys. IPv6 addresses display bracketed, which is
/// the form used for dedup keys, edge records and request URLs alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResolvedAddress(IpAddr);

impl ResolvedAddress {
    pub fn new(ip: IpAddr) -> Self {
        Self(ip.to_canonical())
    }

    /// Parse a bare or bracketed literal address
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        let bare = trimmed
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .unwrap_or(trimmed);
        bare.parse::<IpAddr>().ok().map(Self::new)
    }

}

impl From<IpAddr> for ResolvedAddress {
    fn from(ip: IpAddr) -> Self {
        Self::new(ip)
    }
}

impl fmt::Display for ResolvedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            IpAddr::V4(v4) => write!(f, "{}", v4),
            IpAddr::V6(v6) => write!(f, "[{}]", v6),
        }
    }
}

impl Serialize for ResolvedAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// How an address was reached. One is written for every dispatch, repeats included.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryEdge {
    pub address: ResolvedAddress,
    pub origin: String,
}

/// One entry of a host's test catalog. Missing and `null` fields read as empty.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TestDescriptor {
    #[serde(alias = "lastUpdated", deserialize_with = "null_as_default")]
    pub last_updated: i64,
    #[serde(alias = "destinationIP", deserialize_with = "null_as_default")]
    pub destination_ip: String,
    #[serde(alias = "sourceIP", deserialize_with = "null_as_default")]
    pub source_ip: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
