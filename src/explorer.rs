// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Net library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Client of the explorer: drives, folders and items organizing the assets of a group.

use crate::client::NativeRequestOptions;
use crate::error::{Error, HttpResponse};
use crate::monitoring::CallerRequestOptions;
use crate::router::{ClientConfig, Router};
use crate::types::{CommandType, Headers, Json, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveResponse {
    pub drive_id: String,
    pub group_id: String,
    pub name: String,
    #[serde(default)]
    pub metadata: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderResponse {
    pub folder_id: String,
    pub parent_folder_id: String,
    pub drive_id: String,
    pub group_id: String,
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResponse {
    pub item_id: String,
    pub asset_id: String,
    pub raw_id: String,
    pub folder_id: String,
    pub drive_id: String,
    pub group_id: String,
    pub name: String,
    pub kind: String,
    /// Whether the item is a borrowed reference to an asset living in another folder.
    pub borrowed: bool,
    #[serde(default)]
    pub metadata: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDrivesResponse {
    pub drives: Vec<DriveResponse>,
}

/// The drive of a group with its predefined folders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetDefaultDriveResponse {
    pub drive_id: String,
    pub drive_name: String,
    pub group_id: String,
    pub download_folder_id: String,
    pub download_folder_name: String,
    pub home_folder_id: String,
    pub home_folder_name: String,
    pub tmp_folder_id: String,
    pub tmp_folder_name: String,
    pub system_folder_id: String,
    pub system_folder_name: String,
    pub system_packages_folder_id: String,
    pub system_packages_folder_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryItemsByAssetIdResponse {
    pub items: Vec<ItemResponse>,
}

/// Location of an item: its drive and the folders from the drive's root down to the item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetPathResponse {
    pub item: ItemResponse,
    pub folders: Vec<FolderResponse>,
    pub drive: DriveResponse,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetPathFolderResponse {
    pub folders: Vec<FolderResponse>,
    pub drive: DriveResponse,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveResponse {
    pub folders_count: u64,
    pub items: Vec<ItemResponse>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Item,
    Folder,
    Drive,
}

/// A drive, a folder or an item, see [GetEntityResponse::entity_type].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetEntityResponse {
    pub entity_type: EntityType,
    pub entity: Json,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryChildrenResponse {
    pub items: Vec<ItemResponse>,
    pub folders: Vec<FolderResponse>,
}

/// Entities of a drive that have been put in the trash.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryDeletedResponse {
    pub items: Vec<Json>,
    pub folders: Vec<Json>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeDriveResponse {
    pub folders_count: u64,
    pub items_count: u64,
    pub items: Vec<ItemResponse>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDriveBody {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drive_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

/// Body of the rename endpoints of drives, folders and items.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameBody {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderBody {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemBody {
    pub name: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub borrowed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMoveBody {
    /// Id of the item or folder to move.
    pub target_id: String,
    pub destination_folder_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostBorrowBody {
    pub destination_folder_id: String,
}

fn json_options(body: &impl Serialize) -> Result<NativeRequestOptions, Error> {
    let json = serde_json::to_value(body).map_err(|source| Error::Serialize { source })?;
    Ok(NativeRequestOptions::new().with_json(json))
}

#[derive(Clone, Debug)]
pub struct ExplorerClient {
    router: Router,
}

impl ExplorerClient {
    pub const BASE_PATH: &'static str = "/api/explorer";

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

    async fn query<T: DeserializeOwned>(
        &self,
        path: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<T>, Error> {
        self.router
            .send(CommandType::Query, path, NativeRequestOptions::new(), caller)
            .await
    }

    async fn create<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<T>, Error> {
        let native = json_options(body)?.with_method(Method::Put);
        self.router.send(CommandType::Create, path, native, caller).await
    }

    async fn update<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<T>, Error> {
        self.router
            .send(CommandType::Update, path, json_options(body)?, caller)
            .await
    }

    async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<T>, Error> {
        self.router
            .send(CommandType::Delete, path, NativeRequestOptions::new(), caller)
            .await
    }

    pub async fn create_drive(
        &self,
        group_id: &str,
        body: &CreateDriveBody,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<DriveResponse>, Error> {
        self.create(&format!("/groups/{}/drives", group_id), body, caller)
            .await
    }

    /// Drives of a group.
    pub async fn query_drives(
        &self,
        group_id: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<QueryDrivesResponse>, Error> {
        self.query(&format!("/groups/{}/drives", group_id), caller)
            .await
    }

    pub async fn update_drive(
        &self,
        drive_id: &str,
        body: &RenameBody,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<DriveResponse>, Error> {
        self.update(&format!("/drives/{}", drive_id), body, caller)
            .await
    }

    pub async fn get_drive(
        &self,
        drive_id: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<DriveResponse>, Error> {
        self.query(&format!("/drives/{}", drive_id), caller).await
    }

    pub async fn get_default_drive(
        &self,
        group_id: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<GetDefaultDriveResponse>, Error> {
        self.query(&format!("/groups/{}/default-drive", group_id), caller)
            .await
    }

    /// Default drive of the private group of the user.
    pub async fn get_default_user_drive(
        &self,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<GetDefaultDriveResponse>, Error> {
        self.query("/default-drive", caller).await
    }

    pub async fn create_folder(
        &self,
        parent_folder_id: &str,
        body: &CreateFolderBody,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<FolderResponse>, Error> {
        self.create(&format!("/folders/{}", parent_folder_id), body, caller)
            .await
    }

    pub async fn update_folder(
        &self,
        folder_id: &str,
        body: &RenameBody,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<FolderResponse>, Error> {
        self.update(&format!("/folders/{}", folder_id), body, caller)
            .await
    }

    pub async fn get_folder(
        &self,
        folder_id: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<FolderResponse>, Error> {
        self.query(&format!("/folders/{}", folder_id), caller).await
    }

    pub async fn create_item(
        &self,
        folder_id: &str,
        body: &CreateItemBody,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<ItemResponse>, Error> {
        self.create(&format!("/folders/{}/items", folder_id), body, caller)
            .await
    }

    pub async fn update_item(
        &self,
        item_id: &str,
        body: &RenameBody,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<ItemResponse>, Error> {
        self.update(&format!("/items/{}", item_id), body, caller)
            .await
    }

    pub async fn get_item(
        &self,
        item_id: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<ItemResponse>, Error> {
        self.query(&format!("/items/{}", item_id), caller).await
    }

    /// Items referencing an asset, the original one and the borrowed ones.
    pub async fn query_items_by_asset_id(
        &self,
        asset_id: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<QueryItemsByAssetIdResponse>, Error> {
        self.query(&format!("/items/from-asset/{}", asset_id), caller)
            .await
    }

    pub async fn get_path(
        &self,
        item_id: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<GetPathResponse>, Error> {
        self.query(&format!("/items/{}/path", item_id), caller)
            .await
    }

    pub async fn get_path_folder(
        &self,
        folder_id: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<GetPathFolderResponse>, Error> {
        self.query(&format!("/folders/{}/path", folder_id), caller)
            .await
    }

    /// Move an item or a folder to another folder.
    pub async fn move_entity(
        &self,
        body: &PostMoveBody,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<MoveResponse>, Error> {
        self.update("/move", body, caller).await
    }

    /// Reference an item from another folder, the asset itself is not copied.
    pub async fn borrow(
        &self,
        item_id: &str,
        body: &PostBorrowBody,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<ItemResponse>, Error> {
        self.update(&format!("/items/{}/borrow", item_id), body, caller)
            .await
    }

    pub async fn get_entity(
        &self,
        entity_id: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<GetEntityResponse>, Error> {
        self.query(&format!("/entities/{}", entity_id), caller)
            .await
    }

    /// Folders and items directly under a folder or a drive.
    pub async fn query_children(
        &self,
        parent_id: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<QueryChildrenResponse>, Error> {
        self.query(&format!("/folders/{}/children", parent_id), caller)
            .await
    }

    pub async fn query_deleted(
        &self,
        drive_id: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<QueryDeletedResponse>, Error> {
        self.query(&format!("/drives/{}/deleted", drive_id), caller)
            .await
    }

    /// Put an item in the trash of its drive.
    pub async fn trash_item(
        &self,
        item_id: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<Json>, Error> {
        self.delete(&format!("/items/{}", item_id), caller).await
    }

    /// Put a folder in the trash of its drive.
    pub async fn trash_folder(
        &self,
        folder_id: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<Json>, Error> {
        self.delete(&format!("/folders/{}", folder_id), caller)
            .await
    }

    /// Delete for good the trashed entities of a drive.
    pub async fn purge_drive(
        &self,
        drive_id: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<PurgeDriveResponse>, Error> {
        self.delete(&format!("/drives/{}/purge", drive_id), caller)
            .await
    }

    /// Delete a drive, which must be empty.
    pub async fn delete_drive(
        &self,
        drive_id: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<Json>, Error> {
        self.delete(&format!("/drives/{}", drive_id), caller).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn optional_body_fields_are_omitted() {
        let body = CreateItemBody {
            name: "foo".into(),
            kind: "package".into(),
            item_id: None,
            asset_id: Some("YXNzZXQ=".into()),
            borrowed: None,
            metadata: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"name": "foo", "kind": "package", "assetId": "YXNzZXQ="})
        );
        let body = PostMoveBody {
            target_id: "item".into(),
            destination_folder_id: "folder".into(),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"targetId": "item", "destinationFolderId": "folder"})
        );
    }

    #[test]
    fn entity_wire_format() {
        let entity: GetEntityResponse = serde_json::from_value(json!({
            "entityType": "drive",
            "entity": {"driveId": "d", "groupId": "g", "name": "home"},
        }))
        .unwrap();
        assert_eq!(entity.entity_type, EntityType::Drive);
        let drive: DriveResponse = serde_json::from_value(entity.entity).unwrap();
        assert_eq!(drive.metadata, "");
    }
}
