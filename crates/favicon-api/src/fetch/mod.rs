//! Outbound HTTP client wrapper
//!
//! A single shared wrapper owns two preconfigured `reqwest` clients, one per
//! redirect policy, so redirect behaviour is a per-call parameter instead of
//! mutable client state. Every request carries a browser-mimicking header set
//! (should bypass most WAFs) and a 5 second total timeout.

use std::io::{self, Cursor};
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use reqwest::redirect;
use reqwest::{Client, Response, Url};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::io::StreamReader;

use crate::errors::AppResult;
use crate::sniff::SNIFF_LEN;
use crate::utils::url::authority_end;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// The strict policy is not closed under repeated `www.` toggling, so both
/// policies bound the hop count.
const MAX_REDIRECT_HOPS: usize = 10;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0";

/// Per-call redirect behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectPolicy {
    /// Follow only same-host redirects, treating a `www.` prefix toggle as the
    /// same host. A disallowed hop stops the chase and yields the response in
    /// hand; its body is still inspected downstream.
    Strict,
    /// Follow all redirects, hop-bounded.
    Permissive,
}

/// Shared outbound HTTP client for icon discovery and fetching.
#[derive(Debug, Clone)]
pub struct IconFetcher {
    strict: Client,
    permissive: Client,
}

impl IconFetcher {
    pub fn new() -> AppResult<Self> {
        let strict = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .redirect(strict_redirect_policy())
            .build()?;
        let permissive = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .redirect(redirect::Policy::limited(MAX_REDIRECT_HOPS))
            .build()?;

        Ok(Self { strict, permissive })
    }

    /// GET `url` under the given redirect policy with the full browser header
    /// set. `Referer` and `Origin` are derived from the request's own origin.
    pub async fn get(&self, url: &str, policy: RedirectPolicy) -> Result<Response, reqwest::Error> {
        let client = match policy {
            RedirectPolicy::Strict => &self.strict,
            RedirectPolicy::Permissive => &self.permissive,
        };

        let mut request = client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .header("DNT", "1")
            .header("Accept", "image/avif,image/webp,*/*")
            .header("Cache-Control", "no-cache")
            .header("Sec-Fetch-Dest", "image")
            .header("Sec-Fetch-Mode", "no-cors")
            .header("Sec-Fetch-Site", "same-origin");

        if let Ok(end) = authority_end(url) {
            let origin = &url[..end];
            request = request.header("Referer", origin).header("Origin", origin);
        }

        request.send().await
    }
}

fn strict_redirect_policy() -> redirect::Policy {
    redirect::Policy::custom(|attempt| {
        if attempt.previous().len() > MAX_REDIRECT_HOPS {
            return attempt.stop();
        }
        let from = attempt.previous().first().and_then(Url::host_str);
        let to = attempt.url().host_str();
        match (from, to) {
            (Some(from), Some(to)) if same_site(from, to) => attempt.follow(),
            _ => attempt.stop(),
        }
    })
}

/// The `www.` domain is not really another domain, in our case. Blocking all
/// other cross-host redirects matters for cases where, e.g., company A
/// acquires B and redirects B.com to A.com.
pub(crate) fn same_site(from: &str, to: &str) -> bool {
    from == to
        || to.strip_prefix("www.").is_some_and(|t| t == from)
        || from.strip_prefix("www.").is_some_and(|f| f == to)
}

type BodyStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;
type BodyReader = StreamReader<BodyStream, Bytes>;

/// Adapt a response body into an async reader.
pub(crate) fn body_reader(response: Response) -> BodyReader {
    let stream: BodyStream = Box::pin(response.bytes_stream().map_err(io::Error::other));
    StreamReader::new(stream)
}

/// Read up to [`SNIFF_LEN`] bytes from the head of `reader`, zero-padding on a
/// short body. Returns the buffer and how many bytes were actually read; read
/// errors end the prefix early and are rediscovered by whoever drains the
/// remainder.
pub(crate) async fn read_prefix<R: AsyncRead + Unpin>(reader: &mut R) -> ([u8; SNIFF_LEN], usize) {
    let mut buf = [0u8; SNIFF_LEN];
    let mut filled = 0;
    while filled < SNIFF_LEN {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) | Err(_) => break,
            Ok(n) => filled += n,
        }
    }
    (buf, filled)
}

/// Streaming icon body: the sniffed prefix logically re-prepended to the rest
/// of the network stream. Dropping the body closes the underlying connection
/// exactly once.
pub struct IconBody {
    prefix: [u8; SNIFF_LEN],
    prefix_len: usize,
    rest: BodyReader,
}

impl IconBody {
    pub(crate) fn new(prefix: [u8; SNIFF_LEN], prefix_len: usize, rest: BodyReader) -> Self {
        Self {
            prefix,
            prefix_len,
            rest,
        }
    }

    /// A reader over the complete payload, prefix first.
    pub fn into_reader(self) -> impl AsyncRead + Unpin + Send {
        Cursor::new(self.prefix)
            .take(self.prefix_len as u64)
            .chain(self.rest)
    }

    /// Drain the complete payload into memory.
    pub async fn read_to_end(self) -> io::Result<Vec<u8>> {
        let mut reader = self.into_reader();
        let mut bytes = Vec::with_capacity(SNIFF_LEN);
        reader.read_to_end(&mut bytes).await?;
        Ok(bytes)
    }
}

impl std::fmt::Debug for IconBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IconBody")
            .field("prefix_len", &self.prefix_len)
            .finish()
    }
}
