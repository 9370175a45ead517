// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Net library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

use crate::types::Json;
use snafu::{IntoError, Snafu};
use std::fmt::{self, Display, Formatter};

/// A well-formed HTTP response carrying an error status.
///
/// The body is the parsed content of the response: the decoded JSON document, a plain text body
/// wrapped as `{"text": ...}`, or an empty object when the body has no usable content type.
///
/// An [HttpError] is an expected outcome of a request, not a failure of the client. Requests
/// deliver it as data inside an [HttpResponse], and the caller decides through the
/// [operators](crate::operators) whether it should become a hard error.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpError {
    pub status: u16,
    pub body: Json,
}

impl HttpError {
    pub fn new(status: u16, body: Json) -> Self {
        Self { status, body }
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Failed with status {}: {}", self.status, self.body)
    }
}

impl std::error::Error for HttpError {}

/// Outcome of a request which reached the server: either the decoded response or the error
/// response returned by the server.
pub type HttpResponse<T> = Result<T, HttpError>;

/// Failures of the client itself.
///
/// None of these variants represent an error response from the server, except for [Error::Http]
/// which only appears once the caller has explicitly chosen to raise an [HttpError] (see
/// [HttpResponseStreamExt::raise_http_errors](crate::HttpResponseStreamExt::raise_http_errors))
/// or when using the form-data upload helpers, which raise by construction.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// The request could not be completed: DNS failure, refused or reset connection, I/O error
    /// while streaming a body, ...
    #[snafu(display("request to {} failed: {}", url, error))]
    Transport { url: String, error: surf::Error },

    #[snafu(display("invalid URL {}: {}", url, source))]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[snafu(display("unable to serialize request body: {}", source))]
    Serialize { source: serde_json::Error },

    /// The server answered, but its response body does not match what was expected.
    #[snafu(display("response from {} fails to decode: {}", url, reason))]
    Decode { url: String, reason: String },

    /// Form data can only be sent with `POST` or `PUT`.
    #[snafu(display("method {} is not supported for form data, expected POST or PUT", method))]
    InvalidMethod { method: String },

    #[snafu(display("{}", source))]
    Http { source: HttpError },

    #[snafu(display("websocket {} failed: {}", url, reason))]
    WebSocket { url: String, reason: String },

    #[snafu(display("websocket {} closed before delivering a message", url))]
    ChannelClosed { url: String },
}

impl Error {
    /// The error response wrapped by this error, if it was raised from an [HttpError].
    pub fn http_error(&self) -> Option<&HttpError> {
        match self {
            Error::Http { source } => Some(source),
            _ => None,
        }
    }
}

impl From<HttpError> for Error {
    fn from(source: HttpError) -> Self {
        Error::Http { source }
    }
}

/// Context for embedding network client errors into [Error].
///
/// This type implements the [IntoError] trait from SNAFU, so it can be used with
/// [ResultExt::context](snafu::ResultExt::context) just like automatically generated SNAFU
/// contexts. Calling `some_result.context(ClientError { url })` converts a [surf::Error] into
/// [Error::Transport], recording the URL of the failed request.
pub struct ClientError<'a> {
    pub url: &'a str,
}

impl<'a> IntoError<Error> for ClientError<'a> {
    type Source = surf::Error;

    fn into_error(self, source: Self::Source) -> Error {
        Error::Transport {
            url: self.url.to_string(),
            error: source,
        }
    }
}
