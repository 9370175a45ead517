// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Net library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

use crate::client::{self, NativeRequestOptions};
use crate::error::{Error, HttpResponse};
use crate::monitoring::CallerRequestOptions;
use crate::transfer::{self, FormData, FormDataRequest, QueryParameters};
use crate::transport::{SurfTransport, Transport};
use crate::types::{merge_headers, Blob, CommandType, Headers, Json, Method, Payload};
use serde::de::DeserializeOwned;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Settings shared by every client built from it.
///
/// Headers are applied with the lowest precedence: headers given to a client take precedence
/// over them, and headers given for a single call take precedence over both.
#[derive(Clone)]
pub struct ClientConfig {
    /// Scheme and authority prepended to every base path, e.g. `http://localhost:2000`. Empty by
    /// default, in which case paths are resolved by the transport.
    pub host_name: String,
    pub headers: Headers,
    pub transport: Arc<dyn Transport>,
}

impl ClientConfig {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            host_name: String::new(),
            headers: Headers::new(),
            transport,
        }
    }

    pub fn with_host_name(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = host_name.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(Arc::new(SurfTransport::new()))
    }
}

impl Debug for ClientConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host_name", &self.host_name)
            .field("headers", &self.headers)
            .finish()
    }
}

/// A base path and a set of headers, shared by the endpoints of one resource.
///
/// Every request goes to `{base_path}{path}`. Headers are merged in this order, later ones
/// winning: the native request options, the headers of the router, the headers of the caller.
#[derive(Clone)]
pub struct Router {
    headers: Headers,
    base_path: String,
    transport: Arc<dyn Transport>,
}

impl Router {
    pub fn new(transport: Arc<dyn Transport>, headers: Headers, base_path: impl Into<String>) -> Self {
        Self {
            headers,
            base_path: base_path.into(),
            transport,
        }
    }

    /// A top level router.
    ///
    /// The base path is prefixed by `host_name`, or by the host name of `config` if none is
    /// given, and `headers` are applied over the headers of `config`.
    pub fn root(
        config: &ClientConfig,
        base_path: &str,
        headers: &Headers,
        host_name: Option<&str>,
    ) -> Self {
        let host_name = host_name.unwrap_or(config.host_name.as_str());
        Self::new(
            config.transport.clone(),
            merge_headers([&config.headers, headers]),
            format!("{}{}", host_name, base_path),
        )
    }

    /// A router for `{base_path}{segment}`, sharing headers and transport with this one.
    pub fn child(&self, segment: &str) -> Self {
        Self::new(
            self.transport.clone(),
            self.headers.clone(),
            format!("{}{}", self.base_path, segment),
        )
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_path, path)
    }

    /// Send a request and decode the response as `T`.
    pub async fn send<T: DeserializeOwned>(
        &self,
        command: CommandType,
        path: &str,
        native: NativeRequestOptions,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<T>, Error> {
        let url = self.url(path);
        match self.send_payload(command, path, native, caller).await? {
            Ok(payload) => payload.into_typed(&url).map(Ok),
            Err(err) => Ok(Err(err)),
        }
    }

    /// Send a request and return the body of the response as sent by the server.
    pub async fn send_blob(
        &self,
        command: CommandType,
        path: &str,
        native: NativeRequestOptions,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<Blob>, Error> {
        let url = self.url(path);
        let res = client::send_raw(
            self.transport.as_ref(),
            command,
            &url,
            self.native_options(command, native, caller),
            caller.monitoring.as_ref(),
        )
        .await?;
        client::response_to_blob(&url, res)
    }

    /// Send a request and return the decoded response without further conversion.
    pub async fn send_payload(
        &self,
        command: CommandType,
        path: &str,
        native: NativeRequestOptions,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<Payload>, Error> {
        client::send(
            self.transport.as_ref(),
            command,
            &self.url(path),
            self.native_options(command, native, caller),
            caller.monitoring.as_ref(),
        )
        .await
    }

    fn native_options(
        &self,
        command: CommandType,
        mut native: NativeRequestOptions,
        caller: &CallerRequestOptions,
    ) -> NativeRequestOptions {
        native.method = Some(native.method.unwrap_or_else(|| command.default_method()));
        native.headers = merge_headers([&native.headers, &self.headers, &caller.headers]);
        native
    }

    /// Send form data, see [transfer::send_form_data].
    pub async fn send_form_data(
        &self,
        command: CommandType,
        path: &str,
        form: FormData,
        query_parameters: Option<QueryParameters>,
        native: NativeRequestOptions,
        caller: &CallerRequestOptions,
    ) -> Result<Json, Error> {
        let method = native.method.unwrap_or_else(|| command.default_method());
        transfer::send_form_data(
            self.transport.as_ref(),
            FormDataRequest {
                url: self.url(path),
                query_parameters,
                form,
                method,
                headers: merge_headers([&native.headers, &self.headers]),
                caller_options: caller.clone(),
            },
        )
        .await
    }

    /// Download `path` as a blob, see [transfer::download_blob].
    pub async fn download_blob(
        &self,
        path: &str,
        file_id: &str,
        caller: &CallerRequestOptions,
        total: Option<u64>,
    ) -> Result<HttpResponse<Blob>, Error> {
        transfer::download_blob(
            self.transport.as_ref(),
            &self.url(path),
            file_id,
            &self.headers,
            caller,
            total,
        )
        .await
    }

    /// Upload a single file to `path`, see [transfer::upload_blob].
    pub async fn upload_blob(
        &self,
        path: &str,
        file_name: &str,
        method: Method,
        blob: Blob,
        caller: &CallerRequestOptions,
    ) -> Result<Json, Error> {
        transfer::upload_blob(
            self.transport.as_ref(),
            &self.url(path),
            file_name,
            method,
            blob,
            &self.headers,
            caller,
        )
        .await
    }
}

impl Debug for Router {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("base_path", &self.base_path)
            .field("headers", &self.headers)
            .finish()
    }
}
