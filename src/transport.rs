// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Net library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

use crate::error::{ClientError, Error};
use crate::types::{header, Headers, Method};
use futures::future::BoxFuture;
use futures::io::{AsyncBufRead, AsyncRead, AsyncReadExt, Cursor};
use futures::ready;
use snafu::ResultExt;
use std::fmt::{self, Debug, Formatter};
use std::io;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::task::{Context, Poll};
use surf::http::headers::HeaderName;
use surf::{Body, RequestBuilder, Url};
use tracing::{event, Level};

const CHUNK_SIZE: usize = 16 * 1024;

/// A fully resolved HTTP request.
#[derive(Clone, Debug, PartialEq)]
pub struct RawRequest {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
}

/// An HTTP response with its body fully read.
#[derive(Clone, Debug, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    /// Header names are lower case.
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn content_type(&self) -> Option<&str> {
        header(&self.headers, "content-type")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

/// Byte counters of a body being sent or received.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub direction: Direction,
    pub loaded: u64,
    pub total: Option<u64>,
}

/// Callback notified of [Transfer] progress.
pub type ProgressHook = Arc<dyn Fn(Transfer) + Send + Sync>;

/// The network layer used by every client.
///
/// Implementations report the progress of the request body ([Direction::Upload]) and of the
/// response body ([Direction::Download]) to the hook, when one is given. Responses with error
/// statuses are returned as [RawResponse]s; only failures to obtain a response at all are
/// reported as [Error]s.
pub trait Transport: Send + Sync {
    fn execute(
        &self,
        request: RawRequest,
        progress: Option<ProgressHook>,
    ) -> BoxFuture<'_, Result<RawResponse, Error>>;
}

/// [Transport] backed by a [surf::Client].
///
/// Relative URLs (the default when no host name is configured) are resolved against the base
/// URL given at construction.
#[derive(Clone)]
pub struct SurfTransport {
    client: surf::Client,
    base_url: Option<Url>,
}

impl SurfTransport {
    pub fn new() -> Self {
        Self::from_client(surf::Client::new())
    }

    pub fn from_client(client: surf::Client) -> Self {
        Self {
            client,
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, Error> {
        self.base_url = Some(Url::parse(base_url).context(crate::error::InvalidUrlSnafu {
            url: base_url,
        })?);
        Ok(self)
    }

    fn resolve(&self, url: &str) -> Result<Url, Error> {
        match (Url::parse(url), &self.base_url) {
            (Ok(url), _) => Ok(url),
            (Err(url::ParseError::RelativeUrlWithoutBase), Some(base)) => base
                .join(url)
                .context(crate::error::InvalidUrlSnafu { url }),
            (Err(source), _) => Err(Error::InvalidUrl {
                url: url.to_string(),
                source,
            }),
        }
    }

    async fn send(
        &self,
        request: RawRequest,
        progress: Option<ProgressHook>,
    ) -> Result<RawResponse, Error> {
        let url = request.url.as_str();
        let mut builder = RequestBuilder::new(request.method, self.resolve(url)?);
        for (name, value) in &request.headers {
            let name = HeaderName::from_str(name).context(ClientError { url })?;
            builder = builder.header(name, value.as_str());
        }
        if let Some(bytes) = request.body {
            let len = bytes.len();
            let body = match &progress {
                Some(hook) => Body::from_reader(ProgressReader::new(bytes, hook.clone()), Some(len)),
                None => Body::from_bytes(bytes),
            };
            builder = builder.body(body);
        }

        event!(Level::DEBUG, "--> {} {}", request.method, url);
        let mut res = self.client.send(builder).await.context(ClientError { url })?;
        let status = res.status();
        event!(Level::DEBUG, "<-- {} {}", status, url);

        let total = res.len().map(|len| len as u64);
        let headers = res
            .iter()
            .map(|(name, values)| {
                (
                    name.as_str().to_ascii_lowercase(),
                    values.as_str().to_string(),
                )
            })
            .collect();

        let mut reader = res.take_body().into_reader();
        let mut body = Vec::with_capacity(total.unwrap_or(0) as usize);
        let mut chunk = vec![0u8; CHUNK_SIZE];
        loop {
            let read = reader
                .read(&mut chunk)
                .await
                .map_err(surf::Error::from)
                .context(ClientError { url })?;
            if read == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..read]);
            if let Some(hook) = &progress {
                hook(Transfer {
                    direction: Direction::Download,
                    loaded: body.len() as u64,
                    total,
                });
            }
        }

        Ok(RawResponse {
            status: status as u16,
            status_text: status.canonical_reason().to_string(),
            headers,
            body,
        })
    }
}

impl Default for SurfTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for SurfTransport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfTransport")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .finish()
    }
}

impl Transport for SurfTransport {
    fn execute(
        &self,
        request: RawRequest,
        progress: Option<ProgressHook>,
    ) -> BoxFuture<'_, Result<RawResponse, Error>> {
        Box::pin(self.send(request, progress))
    }
}

// Request body reporting how much of it has been consumed by the connection.
struct ProgressReader {
    inner: Cursor<Vec<u8>>,
    total: u64,
    hook: ProgressHook,
}

impl ProgressReader {
    fn new(bytes: Vec<u8>, hook: ProgressHook) -> Self {
        Self {
            total: bytes.len() as u64,
            inner: Cursor::new(bytes),
            hook,
        }
    }

    fn report(&self) {
        (self.hook)(Transfer {
            direction: Direction::Upload,
            loaded: self.inner.position(),
            total: Some(self.total),
        });
    }
}

impl AsyncRead for ProgressReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let read = ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        if read > 0 {
            this.report();
        }
        Poll::Ready(Ok(read))
    }
}

impl AsyncBufRead for ProgressReader {
    fn poll_fill_buf(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<&[u8]>> {
        Pin::new(&mut self.get_mut().inner).poll_fill_buf(cx)
    }

    fn consume(self: Pin<&mut Self>, amt: usize) {
        let this = self.get_mut();
        Pin::new(&mut this.inner).consume(amt);
        if amt > 0 {
            this.report();
        }
    }
}
