use encoding_rs::{Encoding, UTF_8};
use futures::StreamExt;
use regex::bytes::Regex;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONTENT_TYPE,
};
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;
use crate::util::validate_url;

const ACCEPT_FEEDS: &str = "application/rss+xml, application/atom+xml, application/xml;q=0.9, \
     text/xml;q=0.9, text/html;q=0.8, */*;q=0.5";
const ACCEPT_LANGUAGES: &str = "en-US,en;q=0.9,ja;q=0.8";

/// How far into a body the XML prolog or a `<meta charset>` is searched for
const SNIFF_WINDOW: usize = 1024;

static XML_DECLARED_ENCODING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i-u)^\s*<\?xml[^>]*?\bencoding\s*=\s*["']([A-Za-z0-9._:-]+)["']"#).unwrap()
});

static META_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i-u)<meta[^>]*?\bcharset\s*=\s*["']?([A-Za-z0-9._:-]+)"#).unwrap()
});

/// Errors that can occur while fetching a single URL.
///
/// These never leave the fetcher through [`Fetcher::fetch`]; they exist so
/// that failures can be logged and tested precisely before collapsing to
/// `None`.
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL rejected before any request was made (SSRF, bad scheme, etc.)
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the per-request timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// A configured header value is not valid HTTP
    #[error("Invalid header value: {0}")]
    InvalidHeader(String),
}

/// HTTP client wrapper used by every pipeline stage.
///
/// Each request carries the identifying user agent, content-negotiation
/// headers and a `Cache-Control: max-age` revalidation hint, and races its own
/// timeout. A timeout drops only that request's future.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
    allow_private: bool,
}

impl Fetcher {
    /// Builds a fetcher with its own connection pool from the configuration.
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_FEEDS));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGES));
        let cache_hint = format!("max-age={}", config.revalidate_secs);
        headers.insert(
            CACHE_CONTROL,
            HeaderValue::from_str(&cache_hint).map_err(|e| FetchError::InvalidHeader(e.to_string()))?,
        );
        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| FetchError::InvalidHeader(e.to_string()))?;

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            timeout: config.request_timeout(),
            max_bytes: config.max_response_bytes,
            allow_private: config.allow_private_hosts,
        })
    }

    /// Fetches `url` as text. Every failure mode collapses to `None`.
    pub async fn fetch(&self, url: &str) -> Option<String> {
        match self.try_fetch(url).await {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Fetch failed");
                None
            }
        }
    }

    /// Fetches `url` as text, reporting why it failed.
    pub async fn try_fetch(&self, url: &str) -> Result<String, FetchError> {
        let validated = validate_url(url, self.allow_private)
            .map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        // Timeout covers the whole exchange, body included
        tokio::time::timeout(self.timeout, self.get_text(validated))
            .await
            .map_err(|_| FetchError::Timeout)?
    }

    async fn get_text(&self, url: url::Url) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let bytes = read_limited_bytes(response, self.max_bytes).await?;
        Ok(decode_body(&bytes, content_type.as_deref()))
    }
}

/// Decodes a response body to text.
///
/// The encoding is taken from, in order: a byte-order mark, the
/// `Content-Type` charset, the XML prolog (or an HTML `<meta charset>`), and
/// finally UTF-8. Unknown labels are skipped. Undecodable sequences become
/// U+FFFD rather than failing the fetch.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = Encoding::for_bom(bytes)
        .map(|(encoding, _)| encoding)
        .or_else(|| content_type.and_then(charset_param))
        .or_else(|| declared_encoding(bytes))
        .unwrap_or(UTF_8);

    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::debug!(encoding = encoding.name(), "Body contained undecodable bytes");
    }
    text.into_owned()
}

fn charset_param(content_type: &str) -> Option<&'static Encoding> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        Encoding::for_label(value.trim().trim_matches(|c| c == '"' || c == '\'').as_bytes())
    })
}

/// A label found by ASCII scanning cannot be UTF-16; `output_encoding` maps
/// those to UTF-8.
fn declared_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(SNIFF_WINDOW)];
    let label = XML_DECLARED_ENCODING
        .captures(head)
        .or_else(|| META_CHARSET.captures(head))?
        .get(1)?;
    Encoding::for_label(label.as_bytes()).map(Encoding::output_encoding)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_USER_AGENT;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_fetcher() -> Fetcher {
        let config = Config {
            allow_private_hosts: true,
            request_timeout_secs: 1,
            max_response_bytes: 1024,
            ..Config::default()
        };
        Fetcher::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success_returns_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<rss></rss>"))
            .mount(&mock_server)
            .await;

        let body = test_fetcher()
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await;
        assert_eq!(body.as_deref(), Some("<rss></rss>"));
    }

    #[tokio::test]
    async fn test_fetch_sends_identifying_headers() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("user-agent", DEFAULT_USER_AGENT))
            .and(header("cache-control", "max-age=1800"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let body = test_fetcher().fetch(&mock_server.uri()).await;
        assert_eq!(body.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_fetch_404_is_none() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let fetcher = test_fetcher();
        let url = format!("{}/missing", mock_server.uri());
        assert!(matches!(
            fetcher.try_fetch(&url).await,
            Err(FetchError::HttpStatus(404))
        ));
        assert!(fetcher.fetch(&url).await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_500_is_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        assert!(test_fetcher().fetch(&mock_server.uri()).await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_none() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let result = test_fetcher().try_fetch(&mock_server.uri()).await;
        assert!(matches!(result, Err(FetchError::Timeout)));
    }

    #[tokio::test]
    async fn test_fetch_oversized_body_is_none() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(4096)))
            .mount(&mock_server)
            .await;

        let result = test_fetcher().try_fetch(&mock_server.uri()).await;
        assert!(matches!(result, Err(FetchError::ResponseTooLarge)));
    }

    #[tokio::test]
    async fn test_fetch_private_host_rejected_by_default() {
        let fetcher = Fetcher::new(&Config::default()).unwrap();
        let result = fetcher.try_fetch("http://127.0.0.1:9/feed").await;
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_fetch_decodes_prolog_declared_latin1() {
        let mock_server = MockServer::start().await;
        let mut body = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><rss><channel><item><title>Citro".to_vec();
        body.push(0xEB);
        body.extend_from_slice(b"n recall notice</title></item></channel></rss>");
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/rss+xml"))
            .mount(&mock_server)
            .await;

        let text = test_fetcher().fetch(&mock_server.uri()).await.unwrap();
        assert!(text.contains("Citroën recall notice"), "{text}");
    }

    #[tokio::test]
    async fn test_fetch_decodes_content_type_charset() {
        let mock_server = MockServer::start().await;
        let (sjis, _, _) = encoding_rs::SHIFT_JIS.encode("<rss><title>リコール</title></rss>");
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(sjis.into_owned(), "text/xml; charset=Shift_JIS"),
            )
            .mount(&mock_server)
            .await;

        let text = test_fetcher().fetch(&mock_server.uri()).await.unwrap();
        assert_eq!(text, "<rss><title>リコール</title></rss>");
    }

    #[test]
    fn test_decode_body_precedence() {
        let (euc, _, _) = encoding_rs::EUC_JP.encode("<?xml version=\"1.0\" encoding=\"EUC-JP\"?><t>新型</t>");
        // Prolog applies when the header names no charset
        assert!(decode_body(&euc, Some("application/xml")).contains("新型"));
        assert!(decode_body(&euc, None).contains("新型"));

        // Header charset outranks the prolog
        let latin = b"<?xml version=\"1.0\" encoding=\"Shift_JIS\"?><t>caf\xE9</t>";
        assert!(decode_body(latin, Some("text/xml; charset=\"iso-8859-1\"")).contains("café"));

        // BOM outranks everything
        let bom = b"\xEF\xBB\xBF<t>caf\xC3\xA9</t>";
        assert_eq!(decode_body(bom, Some("text/xml; charset=iso-8859-1")), "<t>café</t>");

        // Unknown labels fall through to UTF-8
        assert_eq!(decode_body("<t>é</t>".as_bytes(), Some("text/xml; charset=bogus")), "<t>é</t>");

        // A prolog claiming UTF-16 over ASCII-readable bytes is read as UTF-8
        let mislabeled = "<?xml version=\"1.0\" encoding=\"UTF-16\"?><t>é</t>";
        assert_eq!(decode_body(mislabeled.as_bytes(), None), mislabeled);
    }

    #[test]
    fn test_decode_body_html_meta_charset() {
        let (sjis, _, _) =
            encoding_rs::SHIFT_JIS.encode("<html><head><meta charset=\"shift_jis\"></head><body>ニュース</body></html>");
        assert!(decode_body(&sjis, Some("text/html")).contains("ニュース"));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host_is_none() {
        // Port 9 (discard) on loopback is expected to refuse connections
        let body = test_fetcher().fetch("http://127.0.0.1:9/feed").await;
        assert!(body.is_none());
    }
}
