use std::fmt;
use std::net::IpAddr;

use serde_derive::{Deserialize, Serialize};

use crate::http::get_request;

use super::DdnsService;

pub const UPDATE_HOST: &str = "dynamicdns.park-your-domain.com";

/// Namecheap's marker for the bare domain.
pub const DEFAULT_HOST: &str = "@";

#[derive(Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Config {
    domain: Box<str>,
    password: Box<str>,

    #[serde(default = "default_host")]
    host: Box<str>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("domain", &self.domain)
            .field("host", &self.host)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn default_host() -> Box<str> {
    DEFAULT_HOST.into()
}

/// Build the Namecheap dynamic DNS update request. Values are inserted as
/// they are, without URL encoding, so they must already be query-safe.
pub fn build_update_request(
    domain: &str,
    sub_host: &str,
    password: &str,
    new_address: &IpAddr,
) -> String {
    let query = format!(
        "/update?host={}&domain={}&password={}&ip={}",
        sub_host, domain, password, new_address
    );

    get_request(UPDATE_HOST, &query)
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

impl Service {
    pub fn new(domain: impl Into<Box<str>>, password: impl Into<Box<str>>) -> Self {
        Self {
            config: Config {
                domain: domain.into(),
                password: password.into(),
                host: default_host(),
            },
        }
    }

    pub fn with_host(mut self, host: impl Into<Box<str>>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn domain(&self) -> &str {
        &self.config.domain
    }

    pub fn sub_host(&self) -> &str {
        &self.config.host
    }
}

impl DdnsService for Service {
    fn name(&self) -> &'static str {
        "Namecheap"
    }

    fn host(&self) -> &str {
        UPDATE_HOST
    }

    fn update_request(&self, address: &IpAddr) -> String {
        build_update_request(
            &self.config.domain,
            &self.config.host,
            &self.config.password,
            address,
        )
    }
}
