/*
   Copyright 2019 Supercomputing Systems AG

   Licensed under the Apache License, Version 2.0 (the "License");
   you may not use this file except in compliance with the License.
   You may obtain a copy of the License at

	   http://www.apache.org/licenses/LICENSE-2.0

   Unless required by applicable law or agreed to in writing, software
   distributed under the License is distributed on an "AS IS" BASIS,
   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
   See the License for the specific language governing permissions and
   limitations under the License.

*/

//! A websocket JSON-RPC client that multiplexes requests and
//! subscriptions over a single connection.
//!
//! One background thread owns the socket. It drains outgoing frames,
//! reads inbound ones into the [`Dispatcher`](super::dispatch) and
//! reconnects with exponential backoff when the connection drops.
//! Pending requests are failed on disconnect, never replayed, and
//! subscriptions are not re-established; both are the caller's
//! responsibility by contract.

use crate::rpc::{
	to_json_req,
	tungstenite_client::{dispatch::Dispatcher, subscription::TungsteniteSubscriptionWrapper},
	Error, Request, Result, Subscribe,
};
use log::{debug, trace, warn};
use qapi_primitives::{rpc_params, RpcParams};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{
	io,
	net::TcpStream,
	sync::{
		atomic::{AtomicBool, AtomicU64, Ordering},
		mpsc::{channel, Receiver, RecvTimeoutError, Sender, TryRecvError},
		Arc, Mutex,
	},
	thread,
	thread::sleep,
	time::Duration,
};
use tungstenite::{
	client::connect_with_config, stream::MaybeTlsStream, Error as WsError, Message, WebSocket,
};
use url::Url;

pub(crate) type MySocket = WebSocket<MaybeTlsStream<TcpStream>>;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const INITIAL_BACKOFF: Duration = Duration::from_millis(250);
const MAX_BACKOFF: Duration = Duration::from_secs(10);
/// How long a blocking socket read may stall before the loop checks the
/// outgoing queue again.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(50);

enum Outgoing {
	Frame(String),
	Close,
}

struct Shared {
	url: Url,
	request_timeout: Duration,
	next_id: AtomicU64,
	reconnect: AtomicBool,
	dispatcher: Mutex<Dispatcher>,
}

/// Cloneable handle to one multiplexed websocket connection.
#[derive(Clone)]
pub struct TungsteniteRpcClient {
	shared: Arc<Shared>,
	outgoing: Sender<Outgoing>,
}

impl TungsteniteRpcClient {
	/// Connect to the given url, e.g. "ws://127.0.0.1:9944", retrying
	/// up to `max_attempts` times before giving up.
	pub fn new(url: &str, max_attempts: u8) -> Result<Self> {
		Self::with_request_timeout(url, max_attempts, DEFAULT_REQUEST_TIMEOUT)
	}

	/// Like [`new`](Self::new) with an explicit per-request deadline.
	pub fn with_request_timeout(
		url: &str,
		max_attempts: u8,
		request_timeout: Duration,
	) -> Result<Self> {
		let url: Url = Url::parse(url)?;
		let socket = attempt_connection_until(&url, max_attempts)?;

		let (outgoing, outgoing_rx) = channel();
		let shared = Arc::new(Shared {
			url,
			request_timeout,
			next_id: AtomicU64::new(0),
			reconnect: AtomicBool::new(true),
			dispatcher: Mutex::new(Dispatcher::new()),
		});
		let task_shared = shared.clone();
		thread::spawn(move || socket_loop(socket, task_shared, outgoing_rx));

		Ok(Self { shared, outgoing })
	}

	/// Connect to a node on localhost with the default Substrate port.
	pub fn with_default_url(max_attempts: u8) -> Result<Self> {
		Self::new("ws://127.0.0.1:9944", max_attempts)
	}

	/// Close the connection for good: no reconnect, and every pending
	/// request is failed with [`Error::TransportClosed`].
	pub fn close(&self) {
		self.shared.reconnect.store(false, Ordering::Relaxed);
		let _ = self.outgoing.send(Outgoing::Close);
	}

	/// Deregister a subscription and tell the server about it. Calling
	/// this twice for the same id is a no-op the second time; the
	/// handler is removed even if the unsubscribe RPC fails.
	pub fn unsubscribe(&self, unsub_method: &str, sub_id: &str) -> Result<()> {
		let was_registered =
			self.shared.dispatcher.lock().unwrap().remove_subscription(sub_id);
		if !was_registered {
			return Ok(())
		}
		self.request_value(unsub_method, rpc_params![sub_id]).map(|_| ())
	}

	fn request_value(&self, method: &str, params: RpcParams) -> Result<Value> {
		let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed) + 1;
		let request = to_json_req(method, id, params)?;
		trace!("sending request {request}");

		let (sender, receiver) = channel();
		self.shared.dispatcher.lock().unwrap().register_request(id, sender);
		if self.outgoing.send(Outgoing::Frame(request)).is_err() {
			self.shared.dispatcher.lock().unwrap().forget_request(id);
			return Err(Error::TransportClosed)
		}

		match receiver.recv_timeout(self.shared.request_timeout) {
			Ok(outcome) => outcome,
			Err(RecvTimeoutError::Timeout) => {
				self.shared.dispatcher.lock().unwrap().forget_request(id);
				Err(Error::Timeout(method.to_string()))
			},
			Err(RecvTimeoutError::Disconnected) => Err(Error::TransportClosed),
		}
	}
}

impl Request for TungsteniteRpcClient {
	fn request<R: DeserializeOwned>(&self, method: &str, params: RpcParams) -> Result<R> {
		let value = self.request_value(method, params)?;
		serde_json::from_value(value).map_err(Error::SerdeJson)
	}
}

impl Subscribe for TungsteniteRpcClient {
	type Subscription<Notification>
		= TungsteniteSubscriptionWrapper<Notification>
	where
		Notification: DeserializeOwned;

	fn subscribe<Notification: DeserializeOwned>(
		&self,
		sub: &str,
		params: RpcParams,
		unsub: &str,
	) -> Result<Self::Subscription<Notification>> {
		let sub_id = self.request_value(sub, params)?;
		let sub_id = match sub_id {
			Value::String(s) => s,
			Value::Number(n) => n.to_string(),
			other => return Err(Error::InvalidSubscriptionId(other)),
		};
		debug!("subscribed to {sub} with id {sub_id}");

		let (sender, receiver) = channel();
		self.shared
			.dispatcher
			.lock()
			.unwrap()
			.register_subscription(sub_id.clone(), sender);
		Ok(TungsteniteSubscriptionWrapper::new(
			self.clone(),
			sub_id,
			unsub.to_string(),
			receiver,
		))
	}
}

enum SessionEnd {
	/// Connection dropped; reconnect if allowed.
	Lost,
	/// Deliberate shutdown, no reconnect.
	Shutdown,
}

fn socket_loop(mut socket: MySocket, shared: Arc<Shared>, outgoing: Receiver<Outgoing>) {
	loop {
		if let Err(err) = set_read_timeout(&socket) {
			warn!("could not configure socket read timeout: {err}");
		}

		let end = run_session(&mut socket, &shared, &outgoing);
		shared.dispatcher.lock().unwrap().reset();
		let _ = socket.close(None);

		if matches!(end, SessionEnd::Shutdown) || !shared.reconnect.load(Ordering::Relaxed) {
			debug!("websocket client shut down");
			return
		}

		let mut backoff = INITIAL_BACKOFF;
		socket = loop {
			debug!("reconnecting in {backoff:?}");
			sleep(backoff);
			backoff = (backoff * 2).min(MAX_BACKOFF);
			if !shared.reconnect.load(Ordering::Relaxed) || Arc::strong_count(&shared) == 1 {
				return
			}
			match connect_once(&shared.url) {
				Ok(socket) => break socket,
				Err(err) => warn!("reconnect failed: {err}"),
			}
		};
	}
}

fn run_session(socket: &mut MySocket, shared: &Arc<Shared>, outgoing: &Receiver<Outgoing>) -> SessionEnd {
	loop {
		loop {
			match outgoing.try_recv() {
				Ok(Outgoing::Frame(frame)) =>
					if let Err(err) = socket.send(Message::text(frame)) {
						warn!("websocket send failed: {err}");
						return SessionEnd::Lost
					},
				Ok(Outgoing::Close) => return SessionEnd::Shutdown,
				Err(TryRecvError::Empty) => break,
				// All client handles are gone.
				Err(TryRecvError::Disconnected) => return SessionEnd::Shutdown,
			}
		}

		match socket.read() {
			Ok(Message::Text(text)) =>
				shared.dispatcher.lock().unwrap().dispatch(text.as_str()),
			Ok(Message::Close(_)) => {
				debug!("server closed the connection");
				return SessionEnd::Lost
			},
			// Pings are answered by tungstenite itself on the next
			// read/write; binary frames are not part of the protocol.
			Ok(_) => {},
			Err(WsError::Io(err))
				if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {},
			Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return SessionEnd::Lost,
			Err(err) => {
				warn!("websocket read failed: {err}");
				return SessionEnd::Lost
			},
		}
	}
}

fn connect_once(url: &Url) -> Result<MySocket> {
	let (socket, response) = connect_with_config(url.clone(), None, u8::MAX - 1)?;
	debug!("Connected to the server. Response HTTP code: {}", response.status());
	Ok(socket)
}

fn attempt_connection_until(url: &Url, max_attempts: u8) -> Result<MySocket> {
	let mut backoff = INITIAL_BACKOFF;
	let mut current_attempt: u8 = 0;
	while current_attempt <= max_attempts {
		match connect_once(url) {
			Ok(socket) => return Ok(socket),
			Err(err) => warn!("Connection attempt failed due to {err:?}"),
		}
		trace!("Trying to reconnect. Current attempt {current_attempt}");
		sleep(backoff);
		backoff = (backoff * 2).min(MAX_BACKOFF);
		current_attempt += 1;
	}
	Err(Error::MaxConnectionAttemptsExceeded)
}

/// Bound the blocking read so the session loop can interleave writes.
fn set_read_timeout(socket: &MySocket) -> io::Result<()> {
	let stream = match socket.get_ref() {
		MaybeTlsStream::Plain(stream) => stream,
		MaybeTlsStream::NativeTls(tls) => tls.get_ref(),
		_ => return Ok(()),
	};
	stream.set_read_timeout(Some(READ_POLL_INTERVAL))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn client_refuses_invalid_urls() {
		assert!(matches!(
			TungsteniteRpcClient::new("definitely not a url", 0),
			Err(Error::Url(_))
		));
	}
}
