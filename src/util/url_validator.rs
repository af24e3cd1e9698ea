use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Query parameters that only carry campaign tracking and never change which
/// article a link points to.
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_cid", "mc_eid"];

/// Errors that can occur during URL validation.
///
/// These errors cover both parsing failures and security policy violations
/// designed to prevent SSRF (Server-Side Request Forgery) attacks.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL points to a private/internal IP address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    /// The URL points to localhost.
    #[error("Localhost not allowed")]
    Localhost,
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
}

/// Validates a URL string before the pipeline makes an outbound request to it.
///
/// Rejects:
/// - Non-HTTP(S) schemes (e.g., `file://`, `ftp://`)
/// - URLs without a host
/// - Localhost addresses (`localhost`, `127.0.0.1`, `::1`)
/// - Private IP ranges (RFC 1918, link-local, unique local IPv6)
///
/// The last two checks are skipped when `allow_private` is set, which is how
/// tests point sources at a local mock server.
///
/// # Examples
///
/// ```
/// use presswire::util::validate_url;
///
/// let url = validate_url("https://media.example.com/rss.xml", false).unwrap();
/// assert_eq!(url.host_str(), Some("media.example.com"));
///
/// assert!(validate_url("http://localhost/feed", false).is_err());
/// assert!(validate_url("http://192.168.1.1/feed", false).is_err());
/// assert!(validate_url("file:///etc/passwd", true).is_err());
/// ```
pub fn validate_url(url_str: &str, allow_private: bool) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    let host = url.host_str().ok_or(UrlValidationError::MissingHost)?;
    if allow_private {
        return Ok(url);
    }

    if host == "localhost" {
        return Err(UrlValidationError::Localhost);
    }

    // Strip brackets from IPv6 addresses for parsing
    let host_for_parse = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    if let Ok(ip) = host_for_parse.parse::<IpAddr>() {
        if ip.is_loopback() {
            return Err(UrlValidationError::Localhost);
        }
        if is_private_ip(&ip) {
            return Err(UrlValidationError::PrivateIp(ip.to_string()));
        }
    }

    Ok(url)
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
            let segments = ipv6.segments();
            // Unique Local (fc00::/7)
            let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
            // Link-Local (fe80::/10)
            let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
            is_unique_local || is_link_local
        }
    }
}

/// Lowercases a hostname and strips one leading `www.`.
pub fn normalize_host(host: &str) -> String {
    let lower = host.trim().trim_end_matches('.').to_ascii_lowercase();
    match lower.strip_prefix("www.") {
        Some(rest) => rest.to_owned(),
        None => lower,
    }
}

/// Host allowlist check for feed entry links.
///
/// A link is allowed when its hostname equals, or is a subdomain of, the
/// hostname of the source's base URL (both normalized by [`normalize_host`]).
/// Ports are ignored. Unparseable inputs are never allowed.
///
/// ```
/// use presswire::util::is_host_allowed;
///
/// assert!(is_host_allowed("https://media.maker.example.com/a", "https://www.maker.example.com"));
/// assert!(!is_host_allowed("https://evil.example.net/a", "https://maker.example.com"));
/// assert!(!is_host_allowed("https://notmaker.example.com/a", "https://maker.example.com"));
/// ```
pub fn is_host_allowed(link: &str, base_url: &str) -> bool {
    let (Ok(link), Ok(base)) = (Url::parse(link), Url::parse(base_url)) else {
        return false;
    };
    let (Some(link_host), Some(base_host)) = (link.host_str(), base.host_str()) else {
        return false;
    };

    let link_host = normalize_host(link_host);
    let base_host = normalize_host(base_host);
    if base_host.is_empty() {
        return false;
    }

    link_host == base_host || link_host.ends_with(&format!(".{base_host}"))
}

/// Resolves a potentially relative URL against a base URL.
///
/// Returns `None` when the result is not an absolute http(s) URL.
pub fn resolve_url(href: &str, base_url: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    // SEC-014: Protocol-relative: use the URL parser to normalize and prevent credential injection
    let resolved = if let Some(rest) = href.strip_prefix("//") {
        Url::parse(&format!("https://{rest}")).ok()?
    } else if let Ok(absolute) = Url::parse(href) {
        absolute
    } else {
        Url::parse(base_url).ok()?.join(href).ok()?
    };

    match resolved.scheme() {
        "http" | "https" if resolved.host_str().is_some() => Some(resolved.to_string()),
        _ => None,
    }
}

/// Canonical form of an article link, used as the identity input.
///
/// Drops the fragment and campaign-tracking query parameters. The URL parser
/// already lowercases the host and normalizes the path. Inputs that do not
/// parse are returned trimmed but otherwise untouched.
pub fn canonicalize_link(link: &str) -> String {
    let Ok(mut url) = Url::parse(link.trim()) else {
        return link.trim().to_owned();
    };
    url.set_fragment(None);

    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| {
                let key = k.to_ascii_lowercase();
                !key.starts_with("utm_") && !TRACKING_PARAMS.contains(&key.as_str())
            })
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    url.to_string()
}

/// Origin (`scheme://host[:port]`) of a URL, without a trailing slash.
pub fn origin_of(url_str: &str) -> Option<String> {
    let url = Url::parse(url_str).ok()?;
    let origin = url.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}
