// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Net library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Per-application JSON documents persisted for the user.

use crate::client::NativeRequestOptions;
use crate::error::{Error, HttpResponse};
use crate::monitoring::CallerRequestOptions;
use crate::router::{ClientConfig, Router};
use crate::types::{CommandType, Headers, Json};

#[derive(Clone, Debug)]
pub struct WebpmSessionsStorageClient {
    router: Router,
}

impl WebpmSessionsStorageClient {
    pub const BASE_PATH: &'static str = "/api/webpm-sessions-storage";

    pub fn new(config: &ClientConfig) -> Self {
        Self::with_headers(config, &Headers::new())
    }

    pub fn with_headers(config: &ClientConfig, headers: &Headers) -> Self {
        Self {
            router: Router::root(config, Self::BASE_PATH, headers, None),
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    fn path(package_name: &str, data_name: &str) -> String {
        format!("/applications/{}/{}", package_name, data_name)
    }

    /// Save `body` as the document `data_name` of the package `package_name`.
    pub async fn post_data(
        &self,
        package_name: &str,
        data_name: &str,
        body: Json,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<Json>, Error> {
        self.router
            .send(
                CommandType::Upload,
                &Self::path(package_name, data_name),
                NativeRequestOptions::new().with_json(body),
                caller,
            )
            .await
    }

    pub async fn get_data(
        &self,
        package_name: &str,
        data_name: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<Json>, Error> {
        self.router
            .send(
                CommandType::Download,
                &Self::path(package_name, data_name),
                NativeRequestOptions::new(),
                caller,
            )
            .await
    }

    pub async fn delete_data(
        &self,
        package_name: &str,
        data_name: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<Json>, Error> {
        self.router
            .send(
                CommandType::Delete,
                &Self::path(package_name, data_name),
                NativeRequestOptions::new(),
                caller,
            )
            .await
    }
}
