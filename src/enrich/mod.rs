//! Lookup services used by the enrichment builtins.
//!
//! `geoip()` and `user_agent()` call through the traits defined here, so an
//! engine can be given any resolver. The crate ships a CIDR table loaded
//! from CSV ([`CidrGeoTable`]) and a rule-based user-agent parser
//! ([`RegexUserAgentParser`]).

mod geo;
mod useragent;

pub use geo::{CidrGeoTable, GeoError, GeoRecord, GeoResolver};
pub use useragent::{RegexUserAgentParser, UserAgentInfo, UserAgentParser};
