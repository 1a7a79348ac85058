//! Remote retrieval for `http://`, `https://` and `ftp://` locators.

use reqwest::blocking::Client;
use reqwest::Url;
use std::net::ToSocketAddrs;
use std::time::Duration;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};
use tracing::debug;

use crate::error::FetchError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResource {
    pub bytes: Vec<u8>,
    /// Declared `Content-Type`, when the server sent one.
    pub content_type: Option<String>,
}

pub trait Fetcher {
    fn fetch(&self, uri: &str) -> Result<FetchedResource, FetchError>;
}

/// Blocking HTTP(S) fetcher with a bounded request time.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, uri: &str) -> Result<FetchedResource, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport { uri: uri.to_string(), message: e.to_string() };
        let response = self.client.get(uri).send().map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { uri: uri.to_string(), status: status.as_u16() });
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let bytes = response.bytes().map_err(transport)?.to_vec();
        Ok(FetchedResource { bytes, content_type })
    }
}

/// Passive-mode binary `RETR` over a fresh control connection per fetch.
///
/// Credentials come from the URI and default to anonymous. Negative server
/// replies (such as `550`) surface as [`FetchError::Status`] carrying the reply
/// code. FTP declares no content type.
pub struct FtpFetcher {
    timeout: Duration,
}

impl FtpFetcher {
    pub fn new(timeout: Duration) -> Self { Self { timeout } }
}

impl Fetcher for FtpFetcher {
    fn fetch(&self, uri: &str) -> Result<FetchedResource, FetchError> {
        let transport = |message: String| FetchError::Transport { uri: uri.to_string(), message };
        let ftp_error = |e: FtpError| match e {
            FtpError::UnexpectedResponse(response) => FetchError::Status {
                uri: uri.to_string(),
                status: u16::try_from(response.status.code()).unwrap_or(u16::MAX),
            },
            other => transport(other.to_string()),
        };

        let url = Url::parse(uri).map_err(|e| transport(e.to_string()))?;
        let host = url.host_str().ok_or_else(|| transport("missing host".into()))?;
        let port = url.port_or_known_default().unwrap_or(21);
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|e| transport(e.to_string()))?
            .next()
            .ok_or_else(|| transport(format!("{host} did not resolve")))?;
        let user = if url.username().is_empty() { "anonymous" } else { url.username() };
        let password = url.password().unwrap_or("anonymous");

        let mut ftp = FtpStream::connect_timeout(addr, self.timeout).map_err(ftp_error)?;
        ftp.get_ref().set_read_timeout(Some(self.timeout)).map_err(|e| transport(e.to_string()))?;
        ftp.login(user, password).map_err(ftp_error)?;
        ftp.transfer_type(FileType::Binary).map_err(ftp_error)?;
        let bytes = ftp.retr_as_buffer(url.path()).map_err(ftp_error)?.into_inner();
        if let Err(e) = ftp.quit() {
            debug!(uri, error = %e, "ftp quit failed after transfer");
        }
        Ok(FetchedResource { bytes, content_type: None })
    }
}

/// Default fetcher: `ftp://` goes to [`FtpFetcher`], everything else to
/// [`HttpFetcher`]. Both share one timeout.
pub struct RemoteFetcher {
    http: HttpFetcher,
    ftp: FtpFetcher,
}

impl RemoteFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self { http: HttpFetcher::new(timeout)?, ftp: FtpFetcher::new(timeout) })
    }
}

impl Fetcher for RemoteFetcher {
    fn fetch(&self, uri: &str) -> Result<FetchedResource, FetchError> {
        let is_ftp = uri.get(..6).is_some_and(|scheme| scheme.eq_ignore_ascii_case("ftp://"));
        if is_ftp { self.ftp.fetch(uri) } else { self.http.fetch(uri) }
    }
}
