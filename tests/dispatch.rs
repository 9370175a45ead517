// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Net library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

mod common;

use common::{json_response, text_response, MockTransport};
use futures::channel::mpsc::UnboundedReceiver;
use futures::stream::{self, StreamExt};
use serde_json::json;
use std::sync::{Arc, Mutex};
use surf::StatusCode;
use w3nest_net::*;

fn drain(rx: &mut UnboundedReceiver<RequestEvent>) -> Vec<RequestEvent> {
    let mut events = Vec::new();
    while let Ok(Some(event)) = rx.try_next() {
        events.push(event);
    }
    events
}

#[async_std::test]
async fn commands_use_their_default_method() {
    let transport = MockTransport::echo();
    for command in CommandType::ALL {
        let res = send(
            transport.as_ref(),
            command,
            "/api/x",
            NativeRequestOptions::new(),
            None,
        )
        .await
        .unwrap()
        .unwrap();
        let echoed: Json = res.into_typed("/api/x").unwrap();
        assert_eq!(echoed["method"], json!(command.default_method().to_string()));
    }
    let methods: Vec<String> = transport
        .requests()
        .iter()
        .map(|req| req.method.to_string())
        .collect();
    assert_eq!(methods, ["POST", "GET", "PUT", "POST", "DELETE", "GET"]);
}

#[async_std::test]
async fn error_statuses_are_data() {
    let transport = MockTransport::new(|req| {
        Ok(if req.url.ends_with("/missing") {
            json_response(404, json!({"detail": "not found"}))
        } else {
            json_response(200, json!({"ok": true}))
        })
    });
    let ok = send(transport.as_ref(), CommandType::Query, "/found", Default::default(), None)
        .await
        .unwrap();
    assert_eq!(ok, Ok(Payload::Json(json!({"ok": true}))));

    let err = send(transport.as_ref(), CommandType::Query, "/missing", Default::default(), None)
        .await
        .unwrap();
    assert_eq!(err, Err(HttpError::new(404, json!({"detail": "not found"}))));
}

#[async_std::test]
async fn json_body_is_sent_and_echoed() {
    let transport = MockTransport::echo();
    let body = json!({"name": "foo", "tags": ["a", "b"]});
    let res = send(
        transport.as_ref(),
        CommandType::Create,
        "/api/projects",
        NativeRequestOptions::new().with_json(body.clone()),
        None,
    )
    .await
    .unwrap()
    .unwrap();
    let echoed: Json = res.into_typed("/api/projects").unwrap();
    assert_eq!(echoed["body"], body);
    assert_eq!(echoed["headers"]["content-type"], json!("application/json"));
}

#[async_std::test]
async fn muted_errors_reach_the_callback_only() {
    let transport = MockTransport::new(|req| {
        Ok(match req.url.as_str() {
            "/a" => text_response(200, "a"),
            _ => json_response(404, json!({"msg": "no"})),
        })
    });
    let seen = Arc::new(Mutex::new(Vec::new()));

    let res = send(transport.as_ref(), CommandType::Query, "/b", Default::default(), None)
        .await
        .unwrap();
    let sink = seen.clone();
    let values: Vec<Payload> = stream::iter([res])
        .mute_http_errors_with(move |err| sink.lock().unwrap().push(err.clone()))
        .collect()
        .await;
    assert!(values.is_empty());
    assert_eq!(
        *seen.lock().unwrap(),
        vec![HttpError::new(404, json!({"msg": "no"}))]
    );

    let mut results = Vec::new();
    for url in ["/a", "/b"] {
        let res = send(transport.as_ref(), CommandType::Query, url, Default::default(), None)
            .await
            .unwrap();
        results.push(res);
    }
    let values: Vec<Payload> = stream::iter(results).mute_http_errors().collect().await;
    assert_eq!(values, vec![Payload::Text("a".into())]);
}

#[async_std::test]
async fn raised_errors_terminate_the_stream() {
    let responses: Vec<HttpResponse<u32>> = vec![Ok(1), Err(HttpError::new(500, json!({}))), Ok(2)];
    let values: Vec<Result<u32, Error>> = stream::iter(responses).raise_http_errors().collect().await;
    assert_eq!(values.len(), 2);
    assert_eq!(*values[0].as_ref().unwrap(), 1);
    assert_eq!(values[1].as_ref().unwrap_err().http_error().unwrap().status, 500);
}

#[async_std::test]
async fn monitored_request_is_started_and_finished() {
    let transport = MockTransport::new(|_| Ok(json_response(200, json!({}))));
    let (tx, mut rx) = request_channel();
    let monitoring = RequestMonitoring::new(tx);
    send(
        transport.as_ref(),
        CommandType::Query,
        "/api/healthz",
        Default::default(),
        Some(&monitoring),
    )
    .await
    .unwrap()
    .unwrap();

    let events = drain(&mut rx);
    let steps: Vec<RequestStep> = events.iter().map(|e| e.step).collect();
    assert_eq!(steps, [RequestStep::Started, RequestStep::Finished]);
    assert!(events.iter().all(|e| e.request_id == "/api/healthz"));
    assert!(events.iter().all(|e| e.command_type == CommandType::Query));
    assert_eq!((events[1].total_count, events[1].transferred_count), (1, 1));
}

#[async_std::test]
async fn transport_failure_still_finishes() {
    let transport = MockTransport::new(|req| {
        Err(Error::Transport {
            url: req.url.clone(),
            error: surf::Error::from_str(StatusCode::BadGateway, "connection reset"),
        })
    });
    let (tx, mut rx) = request_channel();
    let monitoring = RequestMonitoring::new(tx).with_request_id("req-1");
    let res = send(
        transport.as_ref(),
        CommandType::Delete,
        "/api/x",
        Default::default(),
        Some(&monitoring),
    )
    .await;
    assert!(res.is_err());

    let events = drain(&mut rx);
    let steps: Vec<RequestStep> = events.iter().map(|e| e.step).collect();
    assert_eq!(steps, [RequestStep::Started, RequestStep::Finished]);
    assert_eq!(events[0].request_id, "req-1");
}

#[async_std::test]
async fn every_channel_receives_the_events() {
    let transport = MockTransport::new(|_| Ok(json_response(200, json!({}))));
    let (tx1, mut rx1) = request_channel();
    let (tx2, mut rx2) = request_channel();
    let monitoring = RequestMonitoring::new(tx1).with_channel(tx2);
    send(transport.as_ref(), CommandType::Update, "/x", Default::default(), Some(&monitoring))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(drain(&mut rx1), drain(&mut rx2));
}
