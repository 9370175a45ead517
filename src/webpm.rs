// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Net library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Client of the package registry.

use crate::client::NativeRequestOptions;
use crate::error::{Error, HttpResponse};
use crate::monitoring::CallerRequestOptions;
use crate::router::{ClientConfig, Router};
use crate::transfer::QueryParameters;
use crate::types::{Blob, CommandType, Headers, Method, Payload};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebpmKind {
    Esm,
    Webapp,
    Backend,
    Pyodide,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub version: String,
    pub version_number: i64,
    pub fingerprint: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FolderResponse {
    pub name: String,
    pub path: String,
    pub size: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileResponse {
    pub name: String,
    pub encoding: String,
    pub size: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryExplorerResponse {
    pub size: u64,
    pub folders: Vec<FolderResponse>,
    pub files: Vec<FileResponse>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub name: String,
    pub id: String,
    pub version: String,
    pub fingerprint: String,
    pub compressed_size: u64,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetVersionMetadataResponse {
    pub icon: String,
    pub display_name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetVersionInfoResponse {
    pub name: String,
    pub version: String,
    pub id: String,
    pub namespace: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub kind: WebpmKind,
    pub fingerprint: String,
    pub aliases: Vec<String>,
    pub api_key: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GetLibraryInfoResponse {
    pub name: String,
    pub versions: Vec<String>,
    pub namespace: String,
    pub id: String,
    pub releases: Vec<Release>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteLibraryResponse {
    pub deleted_versions_count: u64,
}

/// Optional filters of [WebpmClient::get_library_info].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LibraryInfoQuery {
    /// Semantic versioning query, e.g. `^1.2.0`.
    pub semver: Option<String>,
    pub max_count: Option<u32>,
}

impl From<&LibraryInfoQuery> for QueryParameters {
    fn from(query: &LibraryInfoQuery) -> Self {
        QueryParameters::new()
            .with_optional("semver", query.semver.as_ref())
            .with_optional("maxCount", query.max_count)
    }
}

/// A zipped package to publish.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadBody {
    pub file_name: String,
    pub blob: Blob,
}

#[derive(Clone, Debug)]
pub struct WebpmClient {
    router: Router,
}

impl WebpmClient {
    pub const BASE_PATH: &'static str = "/api/webpm";

    pub fn new(config: &ClientConfig) -> Self {
        Self::from_router(Router::root(config, Self::BASE_PATH, &Headers::new(), None))
    }

    /// A client served from another base path, e.g. behind a gateway.
    pub fn from_router(router: Router) -> Self {
        Self { router }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Package info, including the available versions.
    pub async fn get_library_info(
        &self,
        library_id: &str,
        query: Option<&LibraryInfoQuery>,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<GetLibraryInfoResponse>, Error> {
        let path = format!("/libraries/{}", library_id);
        let path = match query {
            Some(query) => QueryParameters::from(query).append_to(&path),
            None => path,
        };
        self.router
            .send(CommandType::Query, &path, NativeRequestOptions::new(), caller)
            .await
    }

    pub async fn get_version_info(
        &self,
        library_id: &str,
        version: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<GetVersionInfoResponse>, Error> {
        self.router
            .send(
                CommandType::Query,
                &format!("/libraries/{}/{}", library_id, version),
                NativeRequestOptions::new(),
                caller,
            )
            .await
    }

    pub async fn get_metadata_info(
        &self,
        library_id: &str,
        version: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<GetVersionMetadataResponse>, Error> {
        self.router
            .send(
                CommandType::Query,
                &format!("/metadata/{}/{}", library_id, version),
                NativeRequestOptions::new(),
                caller,
            )
            .await
    }

    /// Delete a library and all its published versions.
    pub async fn delete_library(
        &self,
        library_id: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<DeleteLibraryResponse>, Error> {
        self.router
            .send(
                CommandType::Delete,
                &format!("/libraries/{}", library_id),
                NativeRequestOptions::new(),
                caller,
            )
            .await
    }

    pub async fn get_entry_point(
        &self,
        library_id: &str,
        version: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<Blob>, Error> {
        self.router
            .send_blob(
                CommandType::Query,
                &format!("/resources/{}/{}", library_id, version),
                NativeRequestOptions::new(),
                caller,
            )
            .await
    }

    pub async fn get_resource(
        &self,
        library_id: &str,
        version: &str,
        rest_of_path: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<Blob>, Error> {
        self.router
            .send_blob(
                CommandType::Query,
                &format!("/resources/{}/{}/{}", library_id, version, rest_of_path),
                NativeRequestOptions::new(),
                caller,
            )
            .await
    }

    /// The zip file of a library, with download progress reported under the id `library`.
    pub async fn download_library(
        &self,
        library_id: &str,
        version: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<Blob>, Error> {
        self.router
            .download_blob(
                &format!("/download-library/{}/{}", library_id, version),
                "library",
                caller,
                None,
            )
            .await
    }

    /// Publish the zip file of a package.
    ///
    /// `folder_id` is the destination folder when the registry is reached through the assets
    /// gateway, in which case the response describes the created asset rather than an
    /// [UploadResponse]; `T` selects the expected shape.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        body: UploadBody,
        folder_id: Option<&str>,
        caller: &CallerRequestOptions,
    ) -> Result<T, Error> {
        let path = match folder_id {
            Some(folder_id) => format!("/publish-library?folder-id={}", folder_id),
            None => "/publish-library".to_string(),
        };
        let response = self
            .router
            .upload_blob(&path, &body.file_name, Method::Post, body.blob, caller)
            .await?;
        Payload::Json(response).into_typed(&self.router.url(&path))
    }

    /// Content of a folder of a published version.
    pub async fn query_explorer(
        &self,
        library_id: &str,
        version: &str,
        rest_of_path: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<QueryExplorerResponse>, Error> {
        self.router
            .send(
                CommandType::Query,
                &format!("/explorer/{}/{}/{}", library_id, version, rest_of_path),
                NativeRequestOptions::new(),
                caller,
            )
            .await
    }
}
