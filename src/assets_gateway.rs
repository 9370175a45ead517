// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Net library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Gateway exposing the package registry and the explorer behind a single entry point, with the
//! permissions of the user applied.

use crate::accounts::{AccountsClient, Group, UserInfos};
use crate::error::{Error, HttpResponse};
use crate::explorer::ExplorerClient;
use crate::monitoring::CallerRequestOptions;
use crate::router::{ClientConfig, Router};
use crate::types::Headers;
use crate::webpm::WebpmClient;
use serde::{Deserialize, Serialize};

pub type GetUserInfoResponse = UserInfos;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryGroupsResponse {
    pub groups: Vec<Group>,
}

#[derive(Clone, Debug)]
pub struct AssetsGatewayClient {
    router: Router,
    pub webpm: WebpmClient,
    pub explorer: ExplorerClient,
    pub accounts: AccountsClient,
}

impl AssetsGatewayClient {
    pub const BASE_PATH: &'static str = "/api/assets-gateway";

    pub fn new(config: &ClientConfig) -> Self {
        Self::with_headers(config, &Headers::new())
    }

    pub fn with_headers(config: &ClientConfig, headers: &Headers) -> Self {
        let router = Router::root(config, Self::BASE_PATH, headers, None);
        Self {
            webpm: WebpmClient::from_router(router.child("/webpm")),
            explorer: ExplorerClient::from_router(router.child("/explorer")),
            accounts: AccountsClient::with_headers(config, headers),
            router,
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// The user of the session, as reported by [AccountsClient::get_session_details].
    pub async fn get_user_info(
        &self,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<GetUserInfoResponse>, Error> {
        let session = self.accounts.get_session_details(caller).await?;
        Ok(session.map(|session| session.user_info))
    }

    /// Groups of the user of the session.
    pub async fn query_groups(
        &self,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<QueryGroupsResponse>, Error> {
        let session = self.accounts.get_session_details(caller).await?;
        Ok(session.map(|session| QueryGroupsResponse {
            groups: session.user_info.groups,
        }))
    }
}
