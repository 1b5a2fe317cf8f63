use std::fmt;
use std::net::IpAddr;

use serde_derive::{Deserialize, Serialize};

use crate::http::get_request;
use crate::util::one_or_more_string;

use super::DdnsService;

pub const UPDATE_HOST: &str = "www.duckdns.org";

#[derive(Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Config {
    token: Box<str>,

    #[serde(deserialize_with = "one_or_more_string")]
    domains: Vec<Box<str>>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("domains", &self.domains)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Service {
    config: Config,
}

impl From<Config> for Service {
    fn from(config: Config) -> Self {
        Self { config }
    }
}

impl DdnsService for Service {
    fn name(&self) -> &'static str {
        "DuckDNS"
    }

    fn host(&self) -> &str {
        UPDATE_HOST
    }

    fn update_request(&self, address: &IpAddr) -> String {
        // DuckDNS keeps the A and AAAA records under separate parameters.
        let param = if address.is_ipv4() { "ip" } else { "ipv6" };

        let query = format!(
            "/update?domains={}&token={}&{}={}",
            self.config.domains.join(","),
            self.config.token,
            param,
            address
        );

        get_request(UPDATE_HOST, &query)
    }
}
