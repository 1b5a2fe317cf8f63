use std::net::IpAddr;

use crate::http::Response;

use super::{AddressFormat, ResolveError};

/// Pull the address out of a complete echo service response.
pub(super) fn extract_address(
    host: &str,
    raw: &str,
    format: &AddressFormat,
) -> Result<IpAddr, ResolveError> {
    let response = Response::parse(raw);

    if let Some(code) = response.status.filter(|_| !response.is_success()) {
        return Err(ResolveError::Status(host.into(), code));
    }

    let text = match format {
        AddressFormat::LastLine => response
            .body
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .unwrap_or_default(),

        AddressFormat::Body => response.body.trim(),

        #[cfg(feature = "regex")]
        AddressFormat::Regex(regex) => regex
            .captures(response.body)
            .and_then(|captured| captured.get(1))
            .map(|matched| matched.as_str().trim())
            .unwrap_or_default(),
    };

    if text.is_empty() {
        return Err(ResolveError::Empty(host.into()));
    }

    text.parse::<IpAddr>()
        .map_err(|e| ResolveError::InvalidAddress {
            text: text.into(),
            reason: e.to_string().into(),
        })
}
