// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Net library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Client of the local development server.
//!
//! HTTP endpoints are served from the root of the server; updates are pushed on the sockets of
//! a [WsRouter] shared by every router of the client.

pub mod projects;

use crate::client::NativeRequestOptions;
use crate::error::{Error, HttpResponse};
use crate::monitoring::CallerRequestOptions;
use crate::router::{ClientConfig, Router};
use crate::types::{CommandType, Headers};
use crate::ws::{ContextMessage, WsRouter};
use projects::ProjectsRouter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthzResponse {
    pub status: String,
}

/// Routes under `/api`.
#[derive(Clone, Debug)]
pub struct ApiRouter {
    pub projects: ProjectsRouter,
}

impl ApiRouter {
    pub fn new(parent: &Router, ws: Arc<WsRouter>) -> Self {
        let router = parent.child("/api");
        Self {
            projects: ProjectsRouter::new(&router, ws),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LocalClient {
    router: Router,
    pub api: ApiRouter,
    pub ws: Arc<WsRouter>,
}

impl LocalClient {
    pub fn new(config: &ClientConfig, ws: Arc<WsRouter>) -> Self {
        Self::with_headers(config, &Headers::new(), ws)
    }

    pub fn with_headers(config: &ClientConfig, headers: &Headers, ws: Arc<WsRouter>) -> Self {
        let router = Router::root(config, "", headers, None);
        Self {
            api: ApiRouter::new(&router, ws.clone()),
            router,
            ws,
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub async fn get_healthz(
        &self,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<HealthzResponse>, Error> {
        self.router
            .send(CommandType::Query, "/healthz", NativeRequestOptions::new(), caller)
            .await
    }

    /// Connect the sockets of the server, see [WsRouter::start].
    pub async fn start_ws(&self) -> Result<(ContextMessage, ContextMessage), Error> {
        self.ws.start().await
    }
}
