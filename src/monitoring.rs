// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Net library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Request progress monitoring.
//!
//! A [RequestFollower] is created for each monitored request. It emits [RequestEvent]s to the
//! channels supplied by the caller in [RequestMonitoring]. Channels are unbounded: emitting
//! never blocks the request, and a channel whose receiver has been dropped is silently skipped.

use crate::types::{CommandType, Headers, RequestEvent, RequestStep};
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use rand::Rng;
use std::sync::{Mutex, PoisonError};
use tracing::trace;

/// Sending half of a progress channel.
pub type RequestChannel = UnboundedSender<RequestEvent>;

/// Create a progress channel. The receiver is a [Stream](futures::Stream) of [RequestEvent]s.
pub fn request_channel() -> (RequestChannel, UnboundedReceiver<RequestEvent>) {
    mpsc::unbounded()
}

/// Progress monitoring requested by the caller.
#[derive(Clone, Debug, Default)]
pub struct RequestMonitoring {
    pub channels: Vec<RequestChannel>,
    /// Label used for the `requestId` of the emitted events.
    pub request_id: Option<String>,
}

impl RequestMonitoring {
    pub fn new(channel: RequestChannel) -> Self {
        Self {
            channels: vec![channel],
            request_id: None,
        }
    }

    pub fn with_channel(mut self, channel: RequestChannel) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Per-call options: extra headers and optional progress monitoring.
#[derive(Clone, Debug, Default)]
pub struct CallerRequestOptions {
    /// Headers taking precedence over the headers of the client.
    pub headers: Headers,
    pub monitoring: Option<RequestMonitoring>,
}

impl CallerRequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_monitoring(mut self, monitoring: RequestMonitoring) -> Self {
        self.monitoring = Some(monitoring);
        self
    }
}

#[derive(Debug)]
struct Progress {
    total_count: i64,
    transferred_count: i64,
    started: bool,
    finished: bool,
}

/// Emits the lifecycle events of a single request.
///
/// `started` and `finished` are emitted at most once each, and nothing is emitted after
/// `finished`. In between, every call to [progress_to](Self::progress_to) emits either
/// `transferring`, or `processing` once the whole payload has been transferred.
#[derive(Debug)]
pub struct RequestFollower {
    request_id: String,
    command_type: CommandType,
    channels: Vec<RequestChannel>,
    progress: Mutex<Progress>,
}

impl RequestFollower {
    /// Create a follower. Without an explicit id, a random 6-digit id is used.
    pub fn new(
        request_id: Option<String>,
        channels: Vec<RequestChannel>,
        command_type: CommandType,
    ) -> Self {
        Self {
            request_id: request_id.unwrap_or_else(random_request_id),
            command_type,
            channels,
            progress: Mutex::new(Progress {
                total_count: -1,
                transferred_count: 0,
                started: false,
                finished: false,
            }),
        }
    }

    /// Create a follower for a monitored request, if the caller supplied any channel.
    ///
    /// The id defaults to `default_id` when the caller did not choose one.
    pub fn from_monitoring(
        monitoring: Option<&RequestMonitoring>,
        default_id: Option<&str>,
        command_type: CommandType,
    ) -> Option<Self> {
        let monitoring = monitoring.filter(|m| !m.channels.is_empty())?;
        let request_id = monitoring
            .request_id
            .clone()
            .or_else(|| default_id.map(String::from));
        Some(Self::new(
            request_id,
            monitoring.channels.clone(),
            command_type,
        ))
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn command_type(&self) -> CommandType {
        self.command_type
    }

    pub fn start(&self, total_count: Option<i64>) {
        let mut progress = self.lock();
        if progress.started || progress.finished {
            return;
        }
        progress.started = true;
        progress.total_count = total_count.unwrap_or(-1);
        progress.transferred_count = 0;
        self.emit(RequestStep::Started, &progress);
    }

    pub fn progress_to(&self, transferred_count: i64, total_count: Option<i64>) {
        let mut progress = self.lock();
        if progress.finished {
            return;
        }
        if let Some(total) = total_count {
            progress.total_count = total;
        }
        progress.transferred_count = transferred_count;
        let step = if progress.total_count != -1 && transferred_count == progress.total_count {
            RequestStep::Processing
        } else {
            RequestStep::Transferring
        };
        self.emit(step, &progress);
    }

    pub fn end(&self) {
        let mut progress = self.lock();
        if progress.finished {
            return;
        }
        progress.finished = true;
        progress.transferred_count = progress.total_count;
        self.emit(RequestStep::Finished, &progress);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, step: RequestStep, progress: &Progress) {
        let event = RequestEvent {
            request_id: self.request_id.clone(),
            command_type: self.command_type,
            step,
            total_count: progress.total_count,
            transferred_count: progress.transferred_count,
        };
        trace!("request event {}", event);
        for channel in &self.channels {
            if channel.unbounded_send(event.clone()).is_err() {
                trace!("progress channel closed, dropping event for {}", self.request_id);
            }
        }
    }
}

fn random_request_id() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn drain(rx: &mut UnboundedReceiver<RequestEvent>) -> Vec<RequestEvent> {
        let mut events = Vec::new();
        while let Ok(Some(event)) = rx.try_next() {
            events.push(event);
        }
        events
    }

    fn steps(events: &[RequestEvent]) -> Vec<(RequestStep, i64, i64)> {
        events
            .iter()
            .map(|e| (e.step, e.transferred_count, e.total_count))
            .collect()
    }

    #[test]
    fn start_then_end() {
        let (tx, mut rx) = request_channel();
        let follower = RequestFollower::new(Some("req".into()), vec![tx], CommandType::Query);
        follower.start(Some(10));
        follower.end();
        let events = drain(&mut rx);
        assert_eq!(
            steps(&events),
            vec![(RequestStep::Started, 0, 10), (RequestStep::Finished, 10, 10)]
        );
        assert!(events.iter().all(|e| e.request_id == "req"));
        assert!(events.iter().all(|e| e.command_type == CommandType::Query));
    }

    #[test]
    fn processing_once_everything_is_transferred() {
        let (tx, mut rx) = request_channel();
        let follower = RequestFollower::new(None, vec![tx], CommandType::Upload);
        follower.start(Some(8));
        follower.progress_to(3, None);
        follower.progress_to(8, Some(8));
        follower.end();
        assert_eq!(
            steps(&drain(&mut rx)),
            vec![
                (RequestStep::Started, 0, 8),
                (RequestStep::Transferring, 3, 8),
                (RequestStep::Processing, 8, 8),
                (RequestStep::Finished, 8, 8),
            ]
        );
    }

    #[test]
    fn unknown_total_never_means_processing() {
        let (tx, mut rx) = request_channel();
        let follower = RequestFollower::new(None, vec![tx], CommandType::Download);
        follower.start(None);
        follower.progress_to(-1, None);
        let events = drain(&mut rx);
        assert_eq!(events[0].total_count, -1);
        assert_eq!(events[1].step, RequestStep::Transferring);
    }

    #[test]
    fn nothing_after_finished() {
        let (tx, mut rx) = request_channel();
        let follower = RequestFollower::new(None, vec![tx], CommandType::Query);
        follower.start(Some(1));
        follower.end();
        follower.progress_to(1, Some(1));
        follower.start(Some(1));
        follower.end();
        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[test]
    fn random_ids_have_six_digits() {
        for _ in 0..100 {
            let follower = RequestFollower::new(None, vec![], CommandType::Query);
            assert_eq!(follower.request_id().len(), 6);
            assert!(follower.request_id().chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[async_std::test]
    async fn closed_channels_do_not_block_the_others() {
        let (closed, rx) = request_channel();
        drop(rx);
        let (open, rx) = request_channel();
        let follower = RequestFollower::new(None, vec![closed, open], CommandType::Create);
        follower.start(None);
        follower.end();
        drop(follower);
        let events = rx.collect::<Vec<_>>().await;
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn monitoring_without_channels_has_no_follower() {
        let monitoring = RequestMonitoring::default().with_request_id("abc");
        assert!(RequestFollower::from_monitoring(
            Some(&monitoring),
            Some("/path"),
            CommandType::Query
        )
        .is_none());

        let (tx, _rx) = request_channel();
        let follower = RequestFollower::from_monitoring(
            Some(&RequestMonitoring::new(tx)),
            Some("/path"),
            CommandType::Query,
        )
        .unwrap();
        assert_eq!(follower.request_id(), "/path");
    }
}
