// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Net library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

use crate::error::{Error, HttpError, HttpResponse};
use crate::monitoring::{RequestFollower, RequestMonitoring};
use crate::transport::{RawRequest, RawResponse, Transport};
use crate::types::{set_header, Blob, CommandType, Headers, Json, Method, Payload};
use serde_json::json;
use snafu::ResultExt;
use tracing::debug;

/// Request options as understood by the transport.
///
/// When `json` is set it takes precedence over `body`: it is serialized and sent with a
/// `content-type: application/json` header.
#[derive(Clone, Debug, Default)]
pub struct NativeRequestOptions {
    /// Overrides the default method of the command.
    pub method: Option<Method>,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
    pub json: Option<Json>,
}

impl NativeRequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_json(mut self, json: Json) -> Self {
        self.json = Some(json);
        self
    }
}

/// Build the request sent for `command` on `url`.
pub fn prepare_request(
    command: CommandType,
    url: &str,
    options: NativeRequestOptions,
) -> Result<RawRequest, Error> {
    let NativeRequestOptions {
        method,
        mut headers,
        mut body,
        json,
    } = options;
    if let Some(json) = json {
        body = Some(serde_json::to_vec(&json).context(crate::error::SerializeSnafu)?);
        set_header(&mut headers, "content-type", "application/json");
    }
    Ok(RawRequest {
        method: method.unwrap_or_else(|| command.default_method()),
        url: url.to_string(),
        headers,
        body,
    })
}

/// Send a request and decode its response.
///
/// The response body is decoded according to its Content-Type (see [response_to_result]).
/// A response with a non-2xx status resolves to `Ok(Err(HttpError))`; `Err(_)` is reserved for
/// failures to obtain a well-formed response.
///
/// If `monitoring` provides at least one channel, a [RequestFollower] emits `started` before the
/// request is sent and `finished` once it has settled, whatever the outcome. Its id defaults to
/// the URL of the request.
pub async fn send(
    transport: &dyn Transport,
    command: CommandType,
    url: &str,
    options: NativeRequestOptions,
    monitoring: Option<&RequestMonitoring>,
) -> Result<HttpResponse<Payload>, Error> {
    let res = send_raw(transport, command, url, options, monitoring).await?;
    response_to_result(url, res)
}

/// Like [send], but leaves the response untouched.
pub async fn send_raw(
    transport: &dyn Transport,
    command: CommandType,
    url: &str,
    options: NativeRequestOptions,
    monitoring: Option<&RequestMonitoring>,
) -> Result<RawResponse, Error> {
    let request = prepare_request(command, url, options)?;
    debug!("{} {} ({})", request.method, url, command);
    match RequestFollower::from_monitoring(monitoring, Some(url), command) {
        None => transport.execute(request, None).await,
        Some(follower) => {
            follower.start(Some(1));
            let result = transport.execute(request, None).await;
            follower.end();
            result
        }
    }
}

/// Classify a response as success or [HttpError] and decode its body.
///
/// * `application/json*`: the body is parsed as JSON, whatever the status.
/// * `text/*`: the raw text on success, `{"text": ...}` on error.
/// * other content types: a [Blob] on success, `{}` on error.
/// * no content type: `{}`.
pub fn response_to_result(url: &str, res: RawResponse) -> Result<HttpResponse<Payload>, Error> {
    if res.is_success() {
        response_body(url, res).map(Ok)
    } else {
        http_error(url, res).map(Err)
    }
}

/// Classify a response as success or [HttpError], keeping the bytes and the content type of a
/// successful response as sent by the server.
pub fn response_to_blob(url: &str, res: RawResponse) -> Result<HttpResponse<Blob>, Error> {
    if res.is_success() {
        let content_type = res.content_type().map(str::to_owned);
        Ok(Ok(Blob::new(content_type, res.body)))
    } else {
        http_error(url, res).map(Err)
    }
}

/// The [HttpError] of a response with an error status, its body decoded as described in
/// [response_to_result].
pub(crate) fn http_error(url: &str, res: RawResponse) -> Result<HttpError, Error> {
    let status = res.status;
    let body = match response_body(url, res)? {
        Payload::Json(value) => value,
        Payload::Text(text) => json!({ "text": text }),
        Payload::Blob(_) => json!({}),
    };
    debug!("{} responded with error status {}", url, status);
    Ok(HttpError::new(status, body))
}

fn response_body(url: &str, res: RawResponse) -> Result<Payload, Error> {
    let content_type = res.content_type().map(str::to_owned);
    match content_type.as_deref() {
        None => Ok(Payload::Json(json!({}))),
        Some(content_type) if content_type.starts_with("application/json") => {
            serde_json::from_slice(&res.body)
                .map(Payload::Json)
                .map_err(|err| Error::Decode {
                    url: url.to_string(),
                    reason: format!("invalid JSON body: {}", err),
                })
        }
        Some(content_type) if content_type.starts_with("text/") => Ok(Payload::Text(
            String::from_utf8_lossy(&res.body).into_owned(),
        )),
        Some(other) => Ok(Payload::Blob(Blob::new(Some(other.to_string()), res.body))),
    }
}
