use std::fs;
use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ipnet::IpNet;
use thiserror::Error;

/// Location of an IP address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoRecord {
    pub city: String,
    pub region: String,
    /// Short country code, e.g. `CN`
    pub country: String,
    pub isp: String,
}

pub trait GeoResolver: Send + Sync {
    fn lookup(&self, ip: IpAddr) -> Option<GeoRecord>;
}

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("failed to read geo table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("geo table line {line}: {message}")]
    Line { line: usize, message: String },
}

/// In-memory table of networks, resolved by longest prefix match.
///
/// The CSV form has one network per line:
///
/// ```text
/// # cidr,country,region,city[,isp]
/// 1.2.3.0/24,CN,Zhejiang,Hangzhou,China Telecom
/// 2001:db8::/32,US,California,San Jose
/// ```
#[derive(Debug, Clone, Default)]
pub struct CidrGeoTable {
    entries: Vec<(IpNet, GeoRecord)>,
}

impl CidrGeoTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, network: IpNet, record: GeoRecord) {
        self.entries.push((network, record));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn from_csv_str(text: &str) -> Result<Self, GeoError> {
        let mut table = Self::new();

        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fail = |message: String| GeoError::Line {
                line: index + 1,
                message,
            };

            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if !(4..=5).contains(&fields.len()) {
                return Err(fail(format!("expected 4 or 5 fields, got {}", fields.len())));
            }

            let network = IpNet::from_str(fields[0])
                .or_else(|_| IpAddr::from_str(fields[0]).map(IpNet::from))
                .map_err(|_| fail(format!("invalid network `{}`", fields[0])))?;

            table.insert(
                network,
                GeoRecord {
                    country: fields[1].to_string(),
                    region: fields[2].to_string(),
                    city: fields[3].to_string(),
                    isp: fields.get(4).map(|s| s.to_string()).unwrap_or_default(),
                },
            );
        }

        Ok(table)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, GeoError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| GeoError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_csv_str(&text)?;
        tracing::debug!(path = %path.display(), networks = table.len(), "loaded geo table");
        Ok(table)
    }
}

impl GeoResolver for CidrGeoTable {
    fn lookup(&self, ip: IpAddr) -> Option<GeoRecord> {
        self.entries
            .iter()
            .filter(|(network, _)| network.contains(&ip))
            .max_by_key(|(network, _)| network.prefix_len())
            .map(|(_, record)| record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_prefix_wins() {
        let table = CidrGeoTable::from_csv_str(
            "# comment\n\
             10.0.0.0/8,CN,,,\n\
             10.1.0.0/16,CN,Zhejiang,Hangzhou,Telecom\n\
             192.168.1.7,US,California,San Jose\n",
        )
        .unwrap();

        let hit = table.lookup("10.1.2.3".parse().unwrap()).unwrap();
        assert_eq!(hit.city, "Hangzhou");
        assert_eq!(hit.isp, "Telecom");

        let wide = table.lookup("10.9.9.9".parse().unwrap()).unwrap();
        assert_eq!(wide.region, "");

        assert!(table.lookup("192.168.1.7".parse().unwrap()).is_some());
        assert!(table.lookup("8.8.8.8".parse().unwrap()).is_none());
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let err = CidrGeoTable::from_csv_str("1.2.3.0/24,CN,a,b\nnot-a-net,CN,a,b\n").unwrap_err();
        assert!(matches!(err, GeoError::Line { line: 2, .. }));
    }
}
