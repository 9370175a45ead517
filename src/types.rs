// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Net library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

use crate::error::Error;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use surf::http::headers::HeaderName;

pub use surf::http::Method;

/// An arbitrary JSON document.
pub type Json = serde_json::Value;

/// HTTP headers, keyed by header name.
///
/// Names are compared in their canonical form (see [header_name]) when headers are looked up
/// or merged.
pub type Headers = BTreeMap<String, String>;

/// The intent of a request, used to pick its default HTTP verb.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Upload,
    Download,
    Create,
    Update,
    Delete,
    Query,
}

impl CommandType {
    pub const ALL: [CommandType; 6] = [
        CommandType::Upload,
        CommandType::Download,
        CommandType::Create,
        CommandType::Update,
        CommandType::Delete,
        CommandType::Query,
    ];

    /// The HTTP verb used for this command when the caller does not override it.
    pub fn default_method(self) -> Method {
        match self {
            CommandType::Upload => Method::Post,
            CommandType::Download => Method::Get,
            CommandType::Create => Method::Put,
            CommandType::Update => Method::Post,
            CommandType::Delete => Method::Delete,
            CommandType::Query => Method::Get,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CommandType::Upload => "upload",
            CommandType::Download => "download",
            CommandType::Create => "create",
            CommandType::Update => "update",
            CommandType::Delete => "delete",
            CommandType::Query => "query",
        }
    }
}

impl Display for CommandType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle step of a followed request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStep {
    Started,
    Transferring,
    Processing,
    Finished,
}

/// Progress notification emitted by a [RequestFollower](crate::RequestFollower).
///
/// A `total_count` of `-1` means the total is unknown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEvent {
    pub request_id: String,
    pub command_type: CommandType,
    pub step: RequestStep,
    pub total_count: i64,
    pub transferred_count: i64,
}

impl Display for RequestEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        fmt_as_json(self, f)
    }
}

/// Raw binary content, as returned by endpoints serving files.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Blob {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Blob {
    pub fn new(content_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            content_type,
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A decoded response body, before conversion to the type expected by the caller.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Json(Json),
    Text(String),
    Blob(Blob),
}

impl Payload {
    /// Convert the payload into a typed value.
    ///
    /// JSON documents are deserialized directly, text bodies are deserialized from a JSON string
    /// (so `String` and string-like enums work). Binary bodies can not be decoded this way.
    pub fn into_typed<T: DeserializeOwned>(self, url: &str) -> Result<T, Error> {
        let value = match self {
            Payload::Json(value) => value,
            Payload::Text(text) => Json::String(text),
            Payload::Blob(blob) => {
                return Err(Error::Decode {
                    url: url.to_string(),
                    reason: format!(
                        "binary body ({}) can not be decoded as a typed value",
                        blob.content_type.as_deref().unwrap_or("no content type")
                    ),
                })
            }
        };
        serde_json::from_value(value).map_err(|err| Error::Decode {
            url: url.to_string(),
            reason: err.to_string(),
        })
    }
}

/// Canonical form of a header name, as used by the HTTP client.
pub fn header_name(name: &str) -> String {
    match HeaderName::from_str(name) {
        Ok(name) => name.as_str().to_string(),
        Err(_) => name.to_string(),
    }
}

/// Look up a header by name, ignoring case.
pub fn header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    let name = header_name(name);
    headers
        .iter()
        .find(|(key, _)| header_name(key) == name)
        .map(|(_, value)| value.as_str())
}

/// Set a header, replacing any existing entry with the same name regardless of its case.
///
/// The entry is stored under the canonical name.
pub fn set_header(headers: &mut Headers, name: &str, value: &str) {
    let name = header_name(name);
    headers.retain(|key, _| header_name(key) != name);
    headers.insert(name, value.to_string());
}

/// Merge header layers. Later layers take precedence over earlier ones on name collision.
pub fn merge_headers<'a>(layers: impl IntoIterator<Item = &'a Headers>) -> Headers {
    let mut merged = Headers::new();
    for layer in layers {
        for (name, value) in layer {
            set_header(&mut merged, name, value);
        }
    }
    merged
}

// Display implementation for types which serialize to JSON. Displays as a valid JSON object.
pub fn fmt_as_json<T: Serialize>(v: &T, f: &mut Formatter<'_>) -> fmt::Result {
    let string = serde_json::to_string(v).map_err(|_| fmt::Error)?;
    write!(f, "{}", string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_methods() {
        let methods = CommandType::ALL
            .iter()
            .map(|command| (command.as_str(), command.default_method()))
            .collect::<Vec<_>>();
        assert_eq!(
            methods,
            vec![
                ("upload", Method::Post),
                ("download", Method::Get),
                ("create", Method::Put),
                ("update", Method::Post),
                ("delete", Method::Delete),
                ("query", Method::Get),
            ]
        );
    }

    #[test]
    fn request_event_wire_format() {
        let event = RequestEvent {
            request_id: "123456".into(),
            command_type: CommandType::Upload,
            step: RequestStep::Processing,
            total_count: -1,
            transferred_count: 12,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "requestId": "123456",
                "commandType": "upload",
                "step": "processing",
                "totalCount": -1,
                "transferredCount": 12,
            })
        );
        assert_eq!(
            event.to_string(),
            serde_json::to_string(&event).unwrap()
        );
    }

    #[test]
    fn later_header_layers_win_regardless_of_case() {
        let defaults = Headers::from([("X-Trace".to_string(), "default".to_string())]);
        let instance = Headers::from([("authorization".to_string(), "a".to_string())]);
        let caller = Headers::from([
            ("x-trace".to_string(), "caller".to_string()),
            ("Authorization".to_string(), "b".to_string()),
        ]);
        let merged = merge_headers([&defaults, &instance, &caller]);
        assert_eq!(merged.len(), 2);
        assert_eq!(header(&merged, "X-TRACE"), Some("caller"));
        assert_eq!(header(&merged, "authorization"), Some("b"));
        assert_eq!(merged.keys().collect::<Vec<_>>(), ["authorization", "x-trace"]);
    }

    #[test]
    fn text_payload_decodes_as_string() {
        let text: String = Payload::Text("<html/>".into()).into_typed("/view").unwrap();
        assert_eq!(text, "<html/>");
        let err = Payload::Blob(Blob::default())
            .into_typed::<Json>("/file")
            .unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }
}
