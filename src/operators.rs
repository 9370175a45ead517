// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Net library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Stream adapters deciding what happens to error responses.
//!
//! Requests deliver [HttpError]s as data. Once responses are collected into a stream (for
//! instance with [futures::stream::once] or by merging several requests), these adapters turn a
//! stream of [HttpResponse]s into a stream of plain values, each adapter implementing one
//! policy for the error elements.

use crate::error::{Error, HttpError, HttpResponse};
use futures::channel::mpsc::UnboundedSender;
use futures::future;
use futures::{Stream, StreamExt};
use tracing::trace;

pub trait HttpResponseStreamExt<T>: Stream<Item = HttpResponse<T>> + Sized {
    /// Drop error responses.
    fn mute_http_errors(self) -> impl Stream<Item = T> {
        self.mute_http_errors_with(|_| {})
    }

    /// Drop error responses, after handing each of them to `on_error`.
    fn mute_http_errors_with<F>(self, mut on_error: F) -> impl Stream<Item = T>
    where
        F: FnMut(&HttpError),
    {
        self.filter_map(move |resp| {
            future::ready(match resp {
                Ok(value) => Some(value),
                Err(err) => {
                    on_error(&err);
                    None
                }
            })
        })
    }

    /// Turn the first error response into an [Error::Http] and end the stream right after it.
    fn raise_http_errors(self) -> impl Stream<Item = Result<T, Error>> {
        self.scan(false, |raised, resp| {
            if *raised {
                return future::ready(None);
            }
            future::ready(Some(match resp {
                Ok(value) => Ok(value),
                Err(err) => {
                    *raised = true;
                    Err(Error::from(err))
                }
            }))
        })
    }

    /// Forward error responses to `errors` and drop them from this stream.
    ///
    /// Forwarding never blocks; errors are discarded if the receiving end has been dropped.
    fn dispatch_http_errors(self, errors: UnboundedSender<HttpError>) -> impl Stream<Item = T> {
        self.filter_map(move |resp| {
            future::ready(match resp {
                Ok(value) => Some(value),
                Err(err) => {
                    if let Err(err) = errors.unbounded_send(err) {
                        trace!("error channel closed, dropping {}", err.into_inner());
                    }
                    None
                }
            })
        })
    }

    /// Replace error responses by the value computed by `fallback`.
    fn on_http_errors<V, F>(self, mut fallback: F) -> impl Stream<Item = V>
    where
        T: Into<V>,
        F: FnMut(HttpError) -> V,
    {
        self.map(move |resp| match resp {
            Ok(value) => value.into(),
            Err(err) => fallback(err),
        })
    }
}

impl<T, S> HttpResponseStreamExt<T> for S where S: Stream<Item = HttpResponse<T>> {}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;
    use futures::stream;
    use serde_json::json;

    fn responses() -> Vec<HttpResponse<u32>> {
        vec![
            Ok(1),
            Err(HttpError::new(404, json!({"msg": "no"}))),
            Ok(2),
            Err(HttpError::new(500, json!({}))),
            Ok(3),
        ]
    }

    #[async_std::test]
    async fn mute_drops_errors_and_reports_them() {
        let mut seen = Vec::new();
        let values = stream::iter(responses())
            .mute_http_errors_with(|err| seen.push(err.status))
            .collect::<Vec<_>>()
            .await;
        assert_eq!(values, vec![1, 2, 3]);
        assert_eq!(seen, vec![404, 500]);
    }

    #[async_std::test]
    async fn raise_stops_at_first_error() {
        let results = stream::iter(responses())
            .raise_http_errors()
            .collect::<Vec<_>>()
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(*results[0].as_ref().unwrap(), 1);
        let err = results[1].as_ref().unwrap_err();
        assert_eq!(err.http_error().unwrap().status, 404);
    }

    #[async_std::test]
    async fn dispatch_moves_errors_to_their_channel() {
        let (tx, rx) = mpsc::unbounded();
        let values = stream::iter(responses())
            .dispatch_http_errors(tx)
            .collect::<Vec<_>>()
            .await;
        assert_eq!(values, vec![1, 2, 3]);
        let errors = rx.map(|e| e.status).collect::<Vec<_>>().await;
        assert_eq!(errors, vec![404, 500]);
    }

    #[async_std::test]
    async fn fallback_replaces_errors() {
        let values: Vec<i64> = stream::iter(responses())
            .on_http_errors(|err| -(err.status as i64))
            .collect()
            .await;
        assert_eq!(values, vec![1, -404, 2, -500, 3]);
    }
}
