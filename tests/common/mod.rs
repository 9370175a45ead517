// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Net library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

#![allow(dead_code)]

use futures::channel::mpsc;
use futures::future::BoxFuture;
use futures::StreamExt;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use w3nest_net::transport::{Direction, ProgressHook, RawRequest, RawResponse, Transfer, Transport};
use w3nest_net::ws::{FrameStream, WsConnector};
use w3nest_net::{Error, Headers, Json};

type Handler = dyn Fn(&RawRequest) -> Result<RawResponse, Error> + Send + Sync;

/// In-memory [Transport] answering every request with a handler.
///
/// Request bodies and response bodies are reported to the progress hook in two halves.
pub struct MockTransport {
    handler: Box<Handler>,
    requests: Mutex<Vec<RawRequest>>,
}

impl MockTransport {
    pub fn new(
        handler: impl Fn(&RawRequest) -> Result<RawResponse, Error> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Answers every request with its own method, path, headers and JSON body.
    pub fn echo() -> Arc<Self> {
        Self::new(|req| {
            let body: Json = req
                .body
                .as_deref()
                .and_then(|body| serde_json::from_slice(body).ok())
                .unwrap_or(Json::Null);
            Ok(json_response(
                200,
                json!({
                    "method": req.method.to_string(),
                    "url": req.url,
                    "headers": req.headers,
                    "body": body,
                }),
            ))
        })
    }

    pub fn requests(&self) -> Vec<RawRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> RawRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

fn report_halves(hook: &ProgressHook, direction: Direction, len: usize, total: Option<u64>) {
    if len == 0 {
        return;
    }
    for loaded in [len / 2, len] {
        if loaded > 0 {
            hook(Transfer {
                direction,
                loaded: loaded as u64,
                total,
            });
        }
    }
}

impl Transport for MockTransport {
    fn execute(
        &self,
        request: RawRequest,
        progress: Option<ProgressHook>,
    ) -> BoxFuture<'_, Result<RawResponse, Error>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request.clone());
            async_std::task::yield_now().await;
            if let (Some(hook), Some(body)) = (&progress, &request.body) {
                report_halves(hook, Direction::Upload, body.len(), Some(body.len() as u64));
            }
            let res = (self.handler)(&request)?;
            if let Some(hook) = &progress {
                report_halves(
                    hook,
                    Direction::Download,
                    res.body.len(),
                    Some(res.body.len() as u64),
                );
            }
            Ok(res)
        })
    }
}

pub fn response(status: u16, content_type: Option<&str>, body: &[u8]) -> RawResponse {
    let mut headers = Headers::new();
    if let Some(content_type) = content_type {
        headers.insert("content-type".into(), content_type.into());
    }
    RawResponse {
        status,
        status_text: reason(status).into(),
        headers,
        body: body.to_vec(),
    }
}

pub fn json_response(status: u16, body: Json) -> RawResponse {
    response(status, Some("application/json"), body.to_string().as_bytes())
}

pub fn text_response(status: u16, body: &str) -> RawResponse {
    response(status, Some("text/plain; charset=utf-8"), body.as_bytes())
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "",
    }
}

/// Frames of one scripted connection. The connection closes once the sender is dropped.
pub type ScriptedConnection = mpsc::UnboundedSender<Result<String, Error>>;

/// [WsConnector] handing out connections registered per URL, and refusing to connect once there
/// are none left for the requested URL.
#[derive(Default)]
pub struct MockConnector {
    connections: Mutex<HashMap<String, VecDeque<FrameStream>>>,
    attempts: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register the next connection to `url` and return the handle feeding its frames.
    pub fn push_connection(&self, url: &str) -> ScriptedConnection {
        let (tx, rx) = mpsc::unbounded();
        self.connections
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(rx.boxed());
        tx
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl WsConnector for MockConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<FrameStream, Error>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self
            .connections
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front);
        let url = url.to_string();
        Box::pin(async move {
            next.ok_or(Error::WebSocket {
                url,
                reason: "connection refused".into(),
            })
        })
    }
}

pub fn send_frame(connection: &ScriptedConnection, frame: String) {
    connection.unbounded_send(Ok(frame)).unwrap();
}

pub fn ctx_message(labels: &[&str], attributes: &[(&str, &str)], data: Json) -> String {
    let attributes: serde_json::Map<String, Json> = attributes
        .iter()
        .map(|(k, v)| (k.to_string(), json!(v)))
        .collect();
    json!({
        "contextId": "ctx",
        "level": "INFO",
        "text": "message",
        "labels": labels,
        "parentContextId": null,
        "data": data,
        "attributes": attributes,
        "timestamp": 1700000000.0,
    })
    .to_string()
}
