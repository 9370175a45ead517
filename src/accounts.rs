// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Net library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! User session and impersonation.

use crate::client::NativeRequestOptions;
use crate::error::{Error, HttpResponse};
use crate::monitoring::CallerRequestOptions;
use crate::router::{ClientConfig, Router};
use crate::types::{CommandType, Headers, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub path: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfos {
    pub name: String,
    /// Whether the user is a temporary, anonymous visitor.
    pub temp: bool,
    pub groups: Vec<Group>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// The session of the current user.
///
/// While an administrator impersonates another user, `user_info` describes the impersonated
/// user and `real_user_info` the administrator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetails {
    pub user_info: UserInfos,
    pub remembered: bool,
    pub account_manager_url: String,
    pub logout_url: String,
    pub impersonating: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_user_info: Option<UserInfos>,
}

#[derive(Clone, Debug)]
pub struct AccountsClient {
    router: Router,
}

impl AccountsClient {
    pub const BASE_PATH: &'static str = "/api/accounts";

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

    pub async fn get_session_details(
        &self,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<SessionDetails>, Error> {
        self.router
            .send(CommandType::Query, "/session", NativeRequestOptions::new(), caller)
            .await
    }

    /// Impersonate `user_id`, the session then reports the impersonating user as well.
    pub async fn start_visible_impersonation(
        &self,
        user_id: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<Json>, Error> {
        self.impersonate(user_id, false, caller).await
    }

    /// Impersonate `user_id` without revealing it in the session.
    pub async fn start_hidden_impersonation(
        &self,
        user_id: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<Json>, Error> {
        self.impersonate(user_id, true, caller).await
    }

    pub async fn stop_impersonation(
        &self,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<Json>, Error> {
        self.router
            .send(
                CommandType::Delete,
                "/impersonation",
                NativeRequestOptions::new(),
                caller,
            )
            .await
    }

    async fn impersonate(
        &self,
        user_id: &str,
        hidden: bool,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<Json>, Error> {
        self.router
            .send(
                CommandType::Create,
                "/impersonation",
                NativeRequestOptions::new().with_json(json!({ "userId": user_id, "hidden": hidden })),
                caller,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_wire_format() {
        let session: SessionDetails = serde_json::from_value(json!({
            "userInfo": {
                "name": "John Doe",
                "temp": false,
                "groups": [{"id": "private_51c4", "path": "private"}],
            },
            "remembered": true,
            "accountManagerUrl": "/accounts",
            "logoutUrl": "/logout",
            "impersonating": false,
        }))
        .unwrap();
        assert_eq!(session.user_info.groups[0].path, "private");
        assert!(session.user_info.email.is_none());
        assert!(session.real_user_info.is_none());
    }
}
