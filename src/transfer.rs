// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Net library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Binary uploads and downloads with byte-level progress.

use crate::client;
use crate::error::{Error, HttpError, HttpResponse};
use crate::monitoring::{CallerRequestOptions, RequestFollower};
use crate::transport::{Direction, ProgressHook, RawRequest, Transfer, Transport};
use crate::types::{merge_headers, set_header, Blob, CommandType, Headers, Json, Method};
use itertools::Itertools;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::json;
use std::fmt::Display;
use std::sync::Arc;
use tracing::debug;

/// Query parameters appended to a URL.
///
/// Keys are written in camelCase and encoded in kebab-case; parameters without a value are
/// skipped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParameters(Vec<(String, Option<String>)>);

impl QueryParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Display) -> Self {
        self.0.push((key.into(), Some(value.to_string())));
        self
    }

    pub fn with_optional<V: Display>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.0.push((key.into(), value.map(|v| v.to_string())));
        self
    }

    /// The encoded parameters, each one written as `key=value&`.
    pub fn to_url_suffix(&self) -> String {
        self.0
            .iter()
            .filter_map(|(key, value)| {
                value
                    .as_ref()
                    .map(|value| format!("{}={}&", camel_case_to_kebab_case(key), value))
            })
            .join("")
    }

    /// `url` followed by `?` and the encoded parameters.
    pub fn append_to(&self, url: &str) -> String {
        format!("{}?{}", url, self.to_url_suffix())
    }
}

pub fn camel_case_to_kebab_case(key: &str) -> String {
    let mut kebab = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            kebab.push('-');
            kebab.push(c.to_ascii_lowercase());
        } else {
            kebab.push(c);
        }
    }
    kebab
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormEntry {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// A `multipart/form-data` payload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormData {
    entries: Vec<FormEntry>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push(FormEntry {
            name: name.into(),
            file_name: None,
            content_type: None,
            data: value.into().into_bytes(),
        });
    }

    pub fn append_blob(&mut self, name: impl Into<String>, file_name: impl Into<String>, blob: Blob) {
        self.entries.push(FormEntry {
            name: name.into(),
            file_name: Some(file_name.into()),
            content_type: blob.content_type,
            data: blob.bytes,
        });
    }

    pub fn entries(&self) -> &[FormEntry] {
        &self.entries
    }

    /// Encode the entries, separated by `boundary`.
    ///
    /// File entries without a content type get the one guessed from their file name.
    pub fn encode(&self, boundary: &str) -> Vec<u8> {
        let mut body = Vec::new();
        for entry in &self.entries {
            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            body.extend_from_slice(b"Content-Disposition: form-data; name=\"");
            body.extend_from_slice(escape_parameter(&entry.name).as_bytes());
            body.extend_from_slice(b"\"");
            if let Some(file_name) = &entry.file_name {
                body.extend_from_slice(b"; filename=\"");
                body.extend_from_slice(escape_parameter(file_name).as_bytes());
                body.extend_from_slice(b"\"");
                let content_type = match &entry.content_type {
                    Some(content_type) => content_type.clone(),
                    None => mime_guess::from_path(file_name)
                        .first_or_octet_stream()
                        .to_string(),
                };
                body.extend_from_slice(b"\r\nContent-Type: ");
                body.extend_from_slice(escape_parameter(&content_type).as_bytes());
            }
            body.extend_from_slice(b"\r\n\r\n");
            body.extend_from_slice(&entry.data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
        body
    }
}

// `"`, CR and LF would end the quoted parameter or the header line.
fn escape_parameter(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn multipart_boundary() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect();
    format!("----W3NestFormBoundary{}", suffix)
}

/// Download a binary resource with `GET`.
///
/// Progress is reported from the bytes received, under the id `file_id` unless the caller chose
/// one. `total` overrides the size announced by the server. A status of 400 or above resolves to
/// an [HttpError] whose body holds the reason phrase as `statusText`.
pub async fn download_blob(
    transport: &dyn Transport,
    url: &str,
    file_id: &str,
    headers: &Headers,
    caller_options: &CallerRequestOptions,
    total: Option<u64>,
) -> Result<HttpResponse<Blob>, Error> {
    let follower = RequestFollower::from_monitoring(
        caller_options.monitoring.as_ref(),
        Some(file_id),
        CommandType::Download,
    )
    .map(Arc::new);
    let request = RawRequest {
        method: Method::Get,
        url: url.to_string(),
        headers: merge_headers([headers, &caller_options.headers]),
        body: None,
    };

    let hook = follower.as_ref().map(|follower| {
        follower.start(total.map(|total| total as i64));
        let follower = follower.clone();
        let hook: ProgressHook = Arc::new(move |transfer: Transfer| {
            if transfer.direction == Direction::Download {
                let known = total.or(transfer.total).map(|total| total as i64);
                follower.progress_to(transfer.loaded as i64, known);
            }
        });
        hook
    });

    debug!("downloading {} from {}", file_id, url);
    let result = transport.execute(request, hook).await;
    if let Some(follower) = &follower {
        follower.end();
    }
    let res = result?;

    if res.status >= 400 {
        return Ok(Err(HttpError::new(
            res.status,
            json!({ "statusText": res.status_text }),
        )));
    }
    let content_type = res.content_type().map(str::to_owned);
    Ok(Ok(Blob::new(content_type, res.body)))
}

/// A form-data upload, see [send_form_data].
#[derive(Clone, Debug)]
pub struct FormDataRequest {
    pub url: String,
    pub query_parameters: Option<QueryParameters>,
    pub form: FormData,
    /// Either `POST` or `PUT`.
    pub method: Method,
    pub headers: Headers,
    pub caller_options: CallerRequestOptions,
}

/// Send a `multipart/form-data` payload and parse the JSON response.
///
/// Unlike [send](crate::client::send), error responses are raised: a status of 400 or above
/// yields [Error::Http]. Upload progress is reported with the `upload` command type.
pub async fn send_form_data(
    transport: &dyn Transport,
    request: FormDataRequest,
) -> Result<Json, Error> {
    let FormDataRequest {
        url,
        query_parameters,
        form,
        method,
        headers,
        caller_options,
    } = request;
    if method != Method::Post && method != Method::Put {
        return Err(Error::InvalidMethod {
            method: method.to_string(),
        });
    }

    let url = match &query_parameters {
        Some(query) => query.append_to(&url),
        None => url,
    };
    let boundary = multipart_boundary();
    let body = form.encode(&boundary);
    let mut headers = merge_headers([&headers, &caller_options.headers]);
    set_header(
        &mut headers,
        "content-type",
        &format!("multipart/form-data; boundary={}", boundary),
    );

    let follower = RequestFollower::from_monitoring(
        caller_options.monitoring.as_ref(),
        None,
        CommandType::Upload,
    )
    .map(Arc::new);
    let hook = follower.as_ref().map(|follower| {
        follower.start(Some(body.len() as i64));
        let follower = follower.clone();
        let hook: ProgressHook = Arc::new(move |transfer: Transfer| {
            if transfer.direction == Direction::Upload {
                follower.progress_to(
                    transfer.loaded as i64,
                    transfer.total.map(|total| total as i64),
                );
            }
        });
        hook
    });

    debug!("{} form data ({} bytes) to {}", method, body.len(), url);
    let request = RawRequest {
        method,
        url: url.clone(),
        headers,
        body: Some(body),
    };
    let result = transport.execute(request, hook).await;
    if let Some(follower) = &follower {
        follower.end();
    }
    let res = result?;

    if res.status >= 400 {
        return Err(client::http_error(&url, res)?.into());
    }
    serde_json::from_slice(&res.body).map_err(|err| Error::Decode {
        url,
        reason: format!("invalid JSON body: {}", err),
    })
}

/// Upload a single file, sent as the `file` entry of a form.
pub async fn upload_blob(
    transport: &dyn Transport,
    url: &str,
    file_name: &str,
    method: Method,
    blob: Blob,
    headers: &Headers,
    caller_options: &CallerRequestOptions,
) -> Result<Json, Error> {
    let mut form = FormData::new();
    form.append_blob("file", file_name, blob);
    send_form_data(
        transport,
        FormDataRequest {
            url: url.to_string(),
            query_parameters: None,
            form,
            method,
            headers: headers.clone(),
            caller_options: caller_options.clone(),
        },
    )
    .await
}
