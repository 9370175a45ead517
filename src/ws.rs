// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Net library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Server push over WebSockets.
//!
//! The local server publishes [ContextMessage]s on two sockets: `/ws-logs` for logs and
//! `/ws-data` for data updates. A [WebSocketClient] maintains one socket and fans the messages
//! out to any number of subscribers; [filter_ctx_message] narrows a subscription down to the
//! messages carrying some labels and attributes.
//!
//! Messages received while a socket is down are lost: nothing is queued or replayed.

use crate::error::Error;
use crate::types::Json;
use async_std::task;
use async_tungstenite::tungstenite::Message;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::channel::oneshot;
use futures::future::{self, AbortHandle, Abortable, BoxFuture, Either};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// A labelled record pushed by the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextMessage<T = Json> {
    pub context_id: String,
    pub level: LogLevel,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    pub parent_context_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, String>>,
    pub timestamp: f64,
}

impl<T> ContextMessage<T> {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels
            .as_ref()
            .map_or(false, |labels| labels.iter().any(|l| l == label))
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .as_ref()
            .and_then(|attributes| attributes.get(key))
            .map(String::as_str)
    }
}

impl ContextMessage<Json> {
    /// Deserialize the data of the message.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<ContextMessage<T>, serde_json::Error> {
        let data = self.data.map(serde_json::from_value).transpose()?;
        Ok(ContextMessage {
            context_id: self.context_id,
            level: self.level,
            text: self.text,
            labels: self.labels,
            parent_context_id: self.parent_context_id,
            data,
            attributes: self.attributes,
            timestamp: self.timestamp,
        })
    }
}

/// Condition on the value of an attribute.
#[derive(Clone)]
pub enum AttributeFilter {
    Equals(String),
    Matches(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl AttributeFilter {
    pub fn matching(predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        AttributeFilter::Matches(Arc::new(predicate))
    }

    pub fn accepts(&self, value: &str) -> bool {
        match self {
            AttributeFilter::Equals(expected) => expected == value,
            AttributeFilter::Matches(predicate) => predicate(value),
        }
    }
}

impl Debug for AttributeFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AttributeFilter::Equals(value) => f.debug_tuple("Equals").field(value).finish(),
            AttributeFilter::Matches(_) => f.write_str("Matches(..)"),
        }
    }
}

impl From<&str> for AttributeFilter {
    fn from(value: &str) -> Self {
        AttributeFilter::Equals(value.to_string())
    }
}

impl From<String> for AttributeFilter {
    fn from(value: String) -> Self {
        AttributeFilter::Equals(value)
    }
}

/// Selects the messages carrying all the given labels and attributes.
#[derive(Clone, Debug, Default)]
pub struct CtxFilter {
    pub with_labels: Vec<String>,
    pub with_attributes: Vec<(String, AttributeFilter)>,
}

impl CtxFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.with_labels.push(label.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, filter: impl Into<AttributeFilter>) -> Self {
        self.with_attributes.push((key.into(), filter.into()));
        self
    }

    /// Require `key` to equal `value`, when a value is given.
    pub fn with_optional_attribute(self, key: impl Into<String>, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.with_attribute(key, value),
            None => self,
        }
    }

    pub fn matches<T>(&self, message: &ContextMessage<T>) -> bool {
        filter_attributes(message, &self.with_attributes) && filter_labels(message, &self.with_labels)
    }
}

/// Whether every filtered attribute is present, non empty, and accepted by its filter.
pub fn filter_attributes<T>(message: &ContextMessage<T>, filters: &[(String, AttributeFilter)]) -> bool {
    filters.iter().all(|(key, filter)| match message.attribute(key) {
        Some(value) if !value.is_empty() => filter.accepts(value),
        _ => false,
    })
}

/// Whether every label of `labels` is carried by the message.
pub fn filter_labels<T>(message: &ContextMessage<T>, labels: &[String]) -> bool {
    labels.iter().all(|label| message.has_label(label))
}

/// Keep the messages selected by `filter` and deserialize their data as `T`.
///
/// Selected messages whose data can not be deserialized are logged and dropped.
pub fn filter_ctx_message<T, S>(source: S, filter: CtxFilter) -> impl Stream<Item = ContextMessage<T>>
where
    T: DeserializeOwned,
    S: Stream<Item = ContextMessage>,
{
    source.filter_map(move |message| {
        future::ready(if filter.matches(&message) {
            let context_id = message.context_id.clone();
            message
                .into_typed()
                .map_err(|err| warn!("unexpected data in context message {}: {}", context_id, err))
                .ok()
        } else {
            None
        })
    })
}

/// Text frames received on a socket. The stream ends when the socket closes.
pub type FrameStream = BoxStream<'static, Result<String, Error>>;

/// Opens WebSocket connections.
pub trait WsConnector: Send + Sync {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<FrameStream, Error>>;
}

/// [WsConnector] backed by `async-tungstenite`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TungsteniteConnector;

impl WsConnector for TungsteniteConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<FrameStream, Error>> {
        let url = url.to_string();
        Box::pin(async move {
            let (socket, _) = async_tungstenite::async_std::connect_async(url.as_str())
                .await
                .map_err(|err| Error::WebSocket {
                    url: url.clone(),
                    reason: err.to_string(),
                })?;
            let frames = socket.filter_map(move |message| {
                future::ready(match message {
                    Ok(Message::Text(text)) => Some(Ok(text)),
                    Ok(Message::Binary(bytes)) => Some(Ok(String::from_utf8_lossy(&bytes).into_owned())),
                    Ok(_) => None,
                    Err(err) => Some(Err(Error::WebSocket {
                        url: url.clone(),
                        reason: err.to_string(),
                    })),
                })
            });
            Ok(frames.boxed())
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WebSocketOptions {
    pub auto_reconnect: bool,
    pub auto_reconnect_delay: Duration,
}

impl Default for WebSocketOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: false,
            auto_reconnect_delay: Duration::from_millis(1000),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// Unbounded fan-out: a slow subscriber buffers, it never holds back the socket.
struct Subscribers<T> {
    senders: Mutex<Vec<UnboundedSender<T>>>,
}

impl<T: Clone> Subscribers<T> {
    fn new() -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
        }
    }

    fn subscribe(&self) -> UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded();
        lock(&self.senders).push(tx);
        rx
    }

    fn publish(&self, value: T) {
        lock(&self.senders).retain(|tx| tx.unbounded_send(value.clone()).is_ok());
    }

    fn clear(&self) {
        lock(&self.senders).clear();
    }
}

struct Shared {
    path: String,
    messages: Subscribers<ContextMessage>,
    status: Subscribers<bool>,
    connected: AtomicBool,
}

impl Shared {
    fn set_connected(&self, connected: bool) {
        if self.connected.swap(connected, Ordering::SeqCst) != connected {
            self.status.publish(connected);
        }
    }

    fn dispatch(&self, frame: &str) {
        for line in frame.lines().map(str::trim).filter(|line| !line.is_empty()) {
            match serde_json::from_str::<ContextMessage>(line) {
                Ok(message) => self.messages.publish(message),
                Err(err) => error!("can not parse data received on '{}': {}", self.path, err),
            }
        }
    }
}

/// A WebSocket connection to `path`, optionally re-established when it drops.
///
/// The connection runs in a background task. It is replaced by every call to
/// [connect](Self::connect) and stopped by [close](Self::close) or when the client is dropped.
/// Subscriptions outlive the connection: a stream obtained from [subscribe](Self::subscribe)
/// resumes with the next call to [connect](Self::connect), and only ends on
/// [close](Self::close) or when the client is dropped.
pub struct WebSocketClient {
    options: WebSocketOptions,
    connector: Arc<dyn WsConnector>,
    shared: Arc<Shared>,
    task: Mutex<Option<AbortHandle>>,
}

impl WebSocketClient {
    pub fn new(path: impl Into<String>, options: WebSocketOptions) -> Self {
        Self::with_connector(path, options, Arc::new(TungsteniteConnector))
    }

    pub fn with_connector(
        path: impl Into<String>,
        options: WebSocketOptions,
        connector: Arc<dyn WsConnector>,
    ) -> Self {
        Self {
            options,
            connector,
            shared: Arc::new(Shared {
                path: path.into(),
                messages: Subscribers::new(),
                status: Subscribers::new(),
                connected: AtomicBool::new(false),
            }),
            task: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &str {
        &self.shared.path
    }

    pub fn options(&self) -> WebSocketOptions {
        self.options
    }

    /// Messages received from now on.
    pub fn subscribe(&self) -> UnboundedReceiver<ContextMessage> {
        self.shared.messages.subscribe()
    }

    pub fn connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Changes of the connection status from now on.
    pub fn connected_changes(&self) -> UnboundedReceiver<bool> {
        self.shared.status.subscribe()
    }

    /// Open the socket, closing the current one if any.
    pub fn connect(&self) {
        self.spawn();
    }

    /// Open the socket and wait for its first message.
    ///
    /// Fails with [Error::ChannelClosed] if the connection task stops before any message.
    pub async fn first_message(&self) -> Result<ContextMessage, Error> {
        let mut messages = self.subscribe();
        let stopped = self.spawn();
        match future::select(messages.next(), stopped).await {
            Either::Left((Some(message), _)) => Ok(message),
            _ => Err(Error::ChannelClosed {
                url: self.shared.path.clone(),
            }),
        }
    }

    // Resolves once the connection task has stopped, whether it ended or was aborted.
    fn spawn(&self) -> oneshot::Receiver<()> {
        let (handle, registration) = AbortHandle::new_pair();
        if let Some(previous) = lock(&self.task).replace(handle) {
            previous.abort();
        }
        let connection = run(self.shared.clone(), self.connector.clone(), self.options);
        let (stop, stopped) = oneshot::channel();
        task::spawn(async move {
            let _ = Abortable::new(connection, registration).await;
            let _ = stop.send(());
        });
        stopped
    }

    /// Close the socket and cancel any pending reconnection.
    pub fn close(&self) {
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
            info!("websocket on '{}' closed", self.shared.path);
        }
        self.shared.set_connected(false);
        self.shared.messages.clear();
    }
}

impl Drop for WebSocketClient {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
        }
        self.shared.messages.clear();
    }
}

impl Debug for WebSocketClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketClient")
            .field("path", &self.shared.path)
            .field("options", &self.options)
            .field("connected", &self.connected())
            .finish()
    }
}

async fn run(shared: Arc<Shared>, connector: Arc<dyn WsConnector>, options: WebSocketOptions) {
    loop {
        match connector.connect(&shared.path).await {
            Ok(mut frames) => {
                info!("websocket on '{}' connected", shared.path);
                shared.set_connected(true);
                while let Some(frame) = frames.next().await {
                    match frame {
                        Ok(frame) => shared.dispatch(&frame),
                        Err(err) => {
                            error!("socket encountered error: {}", err);
                            break;
                        }
                    }
                }
            }
            Err(err) => error!("socket encountered error: {}", err),
        }
        shared.set_connected(false);
        if !options.auto_reconnect {
            break;
        }
        warn!(
            "websocket on '{}' closed, auto-reconnection will be attempted in {} ms",
            shared.path,
            options.auto_reconnect_delay.as_millis()
        );
        task::sleep(options.auto_reconnect_delay).await;
    }
    info!("websocket on '{}' closed", shared.path);
}

/// The two sockets of the local server: `/ws-logs` and `/ws-data`.
#[derive(Debug)]
pub struct WsRouter {
    log: WebSocketClient,
    data: WebSocketClient,
}

impl WsRouter {
    /// Sockets on `host`, given either as `host:port` or as an `http(s)://` or `ws(s)://` URL.
    pub fn new(host: &str, options: WebSocketOptions) -> Self {
        Self::with_connector(host, options, Arc::new(TungsteniteConnector))
    }

    pub fn with_connector(host: &str, options: WebSocketOptions, connector: Arc<dyn WsConnector>) -> Self {
        Self {
            log: WebSocketClient::with_connector(socket_url(host, "/ws-logs"), options, connector.clone()),
            data: WebSocketClient::with_connector(socket_url(host, "/ws-data"), options, connector),
        }
    }

    pub fn log_socket(&self) -> &WebSocketClient {
        &self.log
    }

    pub fn data_socket(&self) -> &WebSocketClient {
        &self.data
    }

    pub fn log(&self) -> UnboundedReceiver<ContextMessage> {
        self.log.subscribe()
    }

    pub fn data(&self) -> UnboundedReceiver<ContextMessage> {
        self.data.subscribe()
    }

    /// Whether both sockets are connected.
    pub fn connected(&self) -> bool {
        self.log.connected() && self.data.connected()
    }

    /// Connect both sockets and wait for the first message of each, returned as `(data, log)`.
    pub async fn start(&self) -> Result<(ContextMessage, ContextMessage), Error> {
        let (data, log) = futures::join!(self.data.first_message(), self.log.first_message());
        Ok((data?, log?))
    }

    pub fn close(&self) {
        self.data.close();
        self.log.close();
    }
}

fn socket_url(host: &str, path: &str) -> String {
    let host = host.trim_end_matches('/');
    if let Some(rest) = host.strip_prefix("https://") {
        format!("wss://{}{}", rest, path)
    } else if let Some(rest) = host.strip_prefix("http://") {
        format!("ws://{}{}", rest, path)
    } else if host.starts_with("ws://") || host.starts_with("wss://") {
        format!("{}{}", host, path)
    } else {
        format!("ws://{}{}", host, path)
    }
}
