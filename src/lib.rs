// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Net library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! # Typed clients for the W3Nest web APIs.
//!
//! Every endpoint of the backend is exposed as a method on a client or router which maps the
//! call to an HTTP verb, a URL path and a JSON request body. Response bodies are decoded
//! according to their Content-Type and converted into Rust data structures via serde.
//!
//! Failures come in two flavors which are kept apart by type. A well-formed HTTP response with
//! an error status is delivered as data: every request resolves to an
//! `Result<HttpResponse<T>, Error>` where [HttpResponse] is itself a `Result<T, HttpError>`.
//! The outer [Error] is reserved for transport failures (connection refused, malformed
//! response, ...). The [operators] module provides stream adapters to mute, raise, dispatch or
//! recover the inner [HttpError] values, so that the caller decides which application errors
//! are fatal.
//!
//! Long running requests can be followed through [RequestMonitoring]: a per-request
//! [RequestFollower] emits [RequestEvent]s (`started`, `transferring`, `processing`,
//! `finished`) to any number of channels.
//!
//! The HTTP layer is abstracted behind the [Transport] trait; [SurfTransport] is the production
//! implementation. Server push is consumed through the [ws] module, which multiplexes context
//! messages received on the `/ws-logs` and `/ws-data` sockets of the local server.

pub mod accounts;
pub mod assets_gateway;
pub mod client;
pub mod error;
pub mod explorer;
pub mod local;
pub mod monitoring;
pub mod operators;
pub mod router;
pub mod transfer;
pub mod transport;
pub mod types;
pub mod webpm;
pub mod webpm_sessions_storage;
pub mod ws;

pub use client::{send, NativeRequestOptions};
pub use error::*;
pub use monitoring::*;
pub use operators::HttpResponseStreamExt;
pub use router::{ClientConfig, Router};
pub use transfer::{FormData, QueryParameters};
pub use transport::{SurfTransport, Transport};
pub use types::*;
