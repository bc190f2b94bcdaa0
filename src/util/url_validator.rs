use std::net::IpAddr;
use thiserror::Error;
use url::{Host, Url};

/// Reasons a candidate URL is refused before any request is made.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("URL has no host")]
    MissingHost,
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    #[error("Localhost not allowed")]
    Localhost,
}

/// Parses `url_str` and checks it with [`check_candidate`].
pub fn validate_url(url_str: &str, block_private: bool) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;
    check_candidate(&url, block_private)?;
    Ok(url)
}

/// Checks that a URL is fit to hand to the fetcher.
///
/// Every candidate must be absolute: an `http` or `https` scheme plus a host.
/// With `block_private` set, literal loopback, private, link-local and
/// unspecified addresses (and the name `localhost`) are refused as well.
/// Hostnames are not resolved, so a public name pointing at a private
/// address still passes.
pub fn check_candidate(url: &Url, block_private: bool) -> Result<(), UrlValidationError> {
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    let host = url.host().ok_or(UrlValidationError::MissingHost)?;
    if !block_private {
        return Ok(());
    }

    let ip: IpAddr = match host {
        Host::Domain(name) if name.eq_ignore_ascii_case("localhost") => {
            return Err(UrlValidationError::Localhost)
        }
        Host::Domain(_) => return Ok(()),
        Host::Ipv4(v4) => v4.into(),
        Host::Ipv6(v6) => v6.into(),
    };

    if ip.is_loopback() {
        return Err(UrlValidationError::Localhost);
    }
    if is_private_ip(&ip) {
        return Err(UrlValidationError::PrivateIp(ip.to_string()));
    }

    Ok(())
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private() || ipv4.is_loopback() || ipv4.is_link_local() || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            if ipv6.is_loopback() || ipv6.is_unspecified() {
                return true;
            }
            let first = ipv6.segments()[0];
            // fc00::/7 unique local, fe80::/10 link local
            (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    }
}
