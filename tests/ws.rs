// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Net library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

mod common;

use common::{ctx_message, send_frame, MockConnector};
use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use w3nest_net::local::projects::{ProjectStatus, ProjectsFilter, ProjectsWebSocket};
use w3nest_net::ws::{ContextMessage, WebSocketClient, WebSocketOptions, WsRouter};
use w3nest_net::Error;

const DATA_URL: &str = "ws://localhost:2000/ws-data";
const LOGS_URL: &str = "ws://localhost:2000/ws-logs";

#[async_std::test]
async fn malformed_messages_are_dropped() {
    let connector = MockConnector::new();
    let connection = connector.push_connection(DATA_URL);
    let client = WebSocketClient::with_connector(DATA_URL, WebSocketOptions::default(), connector);
    let mut messages = client.subscribe();
    client.connect();

    send_frame(&connection, "{not json".into());
    send_frame(&connection, ctx_message(&["A"], &[], json!(1)));
    let message = messages.next().await.unwrap();
    assert_eq!(message.labels, Some(vec!["A".to_string()]));
    assert_eq!(message.data, Some(json!(1)));
    assert!(client.connected());
}

#[async_std::test]
async fn subscriptions_resume_when_the_caller_reconnects() {
    let connector = MockConnector::new();
    let first = connector.push_connection(DATA_URL);
    let client =
        WebSocketClient::with_connector(DATA_URL, WebSocketOptions::default(), connector.clone());
    let mut messages = client.subscribe();
    let mut status = client.connected_changes();
    client.connect();

    send_frame(&first, ctx_message(&["first"], &[], json!(null)));
    assert!(messages.next().await.unwrap().has_label("first"));
    drop(first);
    assert_eq!(status.next().await, Some(true));
    assert_eq!(status.next().await, Some(false));
    assert!(!client.connected());
    assert_eq!(connector.attempts(), 1);

    let second = connector.push_connection(DATA_URL);
    client.connect();
    send_frame(&second, ctx_message(&["second"], &[], json!(null)));
    assert!(messages.next().await.unwrap().has_label("second"));
    assert_eq!(status.next().await, Some(true));
    assert_eq!(connector.attempts(), 2);

    client.close();
    assert!(messages.next().await.is_none());
}

#[async_std::test]
async fn subscriptions_end_when_the_client_is_dropped() {
    let connector = MockConnector::new();
    let connection = connector.push_connection(DATA_URL);
    let client = WebSocketClient::with_connector(DATA_URL, WebSocketOptions::default(), connector);
    let mut messages = client.subscribe();
    client.connect();

    send_frame(&connection, ctx_message(&[], &[], json!(null)));
    assert!(messages.next().await.is_some());
    drop(client);
    assert!(messages.next().await.is_none());
}

#[async_std::test]
async fn sockets_reconnect_after_the_delay() {
    let connector = MockConnector::new();
    let first = connector.push_connection(DATA_URL);
    let second = connector.push_connection(DATA_URL);
    let options = WebSocketOptions {
        auto_reconnect: true,
        auto_reconnect_delay: Duration::from_millis(10),
    };
    let client = WebSocketClient::with_connector(DATA_URL, options, connector.clone());
    let mut messages = client.subscribe();
    client.connect();

    send_frame(&first, ctx_message(&["first"], &[], json!(null)));
    assert!(messages.next().await.unwrap().has_label("first"));
    drop(first);

    send_frame(&second, ctx_message(&["second"], &[], json!(null)));
    assert!(messages.next().await.unwrap().has_label("second"));
    assert_eq!(connector.attempts(), 2);
    assert!(client.connected());

    client.close();
    assert!(!client.connected());
    assert!(messages.next().await.is_none());
}

#[async_std::test]
async fn start_waits_for_a_message_on_each_socket() {
    let connector = MockConnector::new();
    let data = connector.push_connection(DATA_URL);
    let logs = connector.push_connection(LOGS_URL);
    send_frame(&data, ctx_message(&["data"], &[], json!(null)));
    send_frame(&logs, ctx_message(&["log"], &[], json!(null)));

    let ws = WsRouter::with_connector("http://localhost:2000", WebSocketOptions::default(), connector);
    let (data_message, log_message): (ContextMessage, ContextMessage) = ws.start().await.unwrap();
    assert!(data_message.has_label("data"));
    assert!(log_message.has_label("log"));
    assert!(ws.connected());
    ws.close();
    assert!(!ws.connected());
}

#[async_std::test]
async fn start_fails_when_a_socket_can_not_connect() {
    let connector = MockConnector::new();
    let logs = connector.push_connection(LOGS_URL);
    send_frame(&logs, ctx_message(&["log"], &[], json!(null)));

    let ws = WsRouter::with_connector("localhost:2000", WebSocketOptions::default(), connector);
    match ws.start().await {
        Err(Error::ChannelClosed { url }) => assert_eq!(url, DATA_URL),
        other => panic!("unexpected result {:?}", other),
    }
}

#[async_std::test]
async fn project_updates_are_filtered() {
    let connector = MockConnector::new();
    let data = connector.push_connection(DATA_URL);
    let ws = Arc::new(WsRouter::with_connector(
        "localhost:2000",
        WebSocketOptions::default(),
        connector,
    ));
    let updates = ProjectsWebSocket::new(ws.clone()).project_status(&ProjectsFilter::project("p1"));
    let mut status = ws.data_socket().connected_changes();
    ws.data_socket().connect();

    let status_payload = |id: &str| {
        json!({"projectId": id, "projectName": id, "workspaceDependencies": []})
    };
    send_frame(&data, ctx_message(&["ProjectStatusResponse"], &[("projectId", "p2")], status_payload("p2")));
    send_frame(&data, ctx_message(&["CIStatusResponse"], &[("projectId", "p1")], json!({})));
    send_frame(&data, ctx_message(&["ProjectStatusResponse"], &[("projectId", "p1")], status_payload("p1")));
    send_frame(&data, ctx_message(&["ProjectStatusResponse"], &[("projectId", "p1")], json!("oops")));
    drop(data);
    assert_eq!(status.next().await, Some(true));
    assert_eq!(status.next().await, Some(false));
    ws.close();

    let updates: Vec<ContextMessage<ProjectStatus>> = updates.collect().await;
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].data.as_ref().unwrap().project_id, "p1");
}
