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

//! Routes inbound frames of one websocket connection to their awaiters.
//!
//! Responses are matched to pending requests by id, notifications to
//! subscriptions by subscription id. Frames that match neither are
//! dropped: a notification can legitimately arrive after its
//! unsubscribe raced with the server.

use crate::rpc::{Error, Result};
use log::{debug, trace, warn};
use serde_json::Value;
use std::{collections::HashMap, sync::mpsc::Sender};

pub(crate) struct Dispatcher {
	pending: HashMap<u64, Sender<Result<Value>>>,
	subs: HashMap<String, Sender<String>>,
}

impl Dispatcher {
	pub(crate) fn new() -> Self {
		Self { pending: HashMap::new(), subs: HashMap::new() }
	}

	pub(crate) fn register_request(&mut self, id: u64, sender: Sender<Result<Value>>) {
		self.pending.insert(id, sender);
	}

	/// Drop a pending entry, e.g. when the request timed out on the
	/// caller side. A late response for it will be ignored.
	pub(crate) fn forget_request(&mut self, id: u64) {
		self.pending.remove(&id);
	}

	pub(crate) fn register_subscription(&mut self, sub_id: String, sender: Sender<String>) {
		self.subs.insert(sub_id, sender);
	}

	/// Remove a subscription handler. Returns whether it was present,
	/// so the caller can make unsubscribing idempotent.
	pub(crate) fn remove_subscription(&mut self, sub_id: &str) -> bool {
		self.subs.remove(sub_id).is_some()
	}

	/// Classify and route one inbound text frame.
	pub(crate) fn dispatch(&mut self, raw: &str) {
		let value: Value = match serde_json::from_str(raw) {
			Ok(value) => value,
			Err(err) => {
				warn!("dropping unparseable frame: {err}");
				return
			},
		};

		// Notification: has a method and a subscription id in params.
		let sub_id = &value["params"]["subscription"];
		if value.get("method").is_some() && !sub_id.is_null() {
			let key = match sub_id {
				Value::String(s) => s.clone(),
				other => other.to_string(),
			};
			let gone = match self.subs.get(&key) {
				Some(sender) => sender.send(value["params"]["result"].to_string()).is_err(),
				None => {
					debug!("notification for unknown subscription {key}");
					false
				},
			};
			if gone {
				self.subs.remove(&key);
			}
			return
		}

		// Response: has an id matching a pending request.
		if let Some(id) = value.get("id").and_then(Value::as_u64) {
			let Some(sender) = self.pending.remove(&id) else {
				debug!("response for unknown request id {id}");
				return
			};
			let outcome = match value.get("error") {
				Some(error) if !error.is_null() => Err(Error::RpcError(error.clone())),
				_ => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
			};
			// The caller may have timed out and dropped the receiver.
			let _ = sender.send(outcome);
			return
		}

		trace!("ignoring frame without subscription or known id");
	}

	/// Fail every pending request with [`Error::TransportClosed`] and
	/// terminate all subscription streams. Called when the connection
	/// goes down; the transport never replays requests or resubscribes.
	pub(crate) fn reset(&mut self) {
		for (_, sender) in self.pending.drain() {
			let _ = sender.send(Err(Error::TransportClosed));
		}
		self.subs.clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::mpsc::channel;

	#[test]
	fn responses_are_routed_by_id() {
		let mut dispatcher = Dispatcher::new();
		let (tx1, rx1) = channel();
		let (tx2, rx2) = channel();
		dispatcher.register_request(1, tx1);
		dispatcher.register_request(2, tx2);

		dispatcher.dispatch(r#"{"jsonrpc":"2.0","id":2,"result":"0xcafe"}"#);
		dispatcher.dispatch(r#"{"jsonrpc":"2.0","id":1,"result":41}"#);

		assert_eq!(rx1.recv().unwrap().unwrap(), serde_json::json!(41));
		assert_eq!(rx2.recv().unwrap().unwrap(), serde_json::json!("0xcafe"));
	}

	#[test]
	fn error_responses_complete_with_rpc_error() {
		let mut dispatcher = Dispatcher::new();
		let (tx, rx) = channel();
		dispatcher.register_request(5, tx);

		dispatcher
			.dispatch(r#"{"jsonrpc":"2.0","id":5,"error":{"code":-32601,"message":"nope"}}"#);

		match rx.recv().unwrap() {
			Err(Error::RpcError(payload)) => assert_eq!(payload["code"], -32601),
			other => panic!("expected RpcError, got {other:?}"),
		}
	}

	#[test]
	fn notifications_are_routed_in_arrival_order() {
		let mut dispatcher = Dispatcher::new();
		let (tx, rx) = channel();
		dispatcher.register_subscription("7".to_string(), tx);

		// Integer and string subscription ids key the same handler.
		dispatcher.dispatch(
			r#"{"jsonrpc":"2.0","method":"chain_newHead","params":{"subscription":7,"result":{"number":"0x1"}}}"#,
		);
		dispatcher.dispatch(
			r#"{"jsonrpc":"2.0","method":"chain_newHead","params":{"subscription":"7","result":{"number":"0x2"}}}"#,
		);

		assert_eq!(rx.recv().unwrap(), r#"{"number":"0x1"}"#);
		assert_eq!(rx.recv().unwrap(), r#"{"number":"0x2"}"#);
	}

	#[test]
	fn unknown_subscriptions_and_garbage_are_dropped() {
		let mut dispatcher = Dispatcher::new();
		// None of these may panic or linger.
		dispatcher.dispatch("not json at all");
		dispatcher.dispatch(r#"{"jsonrpc":"2.0","id":99,"result":null}"#);
		dispatcher.dispatch(
			r#"{"jsonrpc":"2.0","method":"chain_newHead","params":{"subscription":"gone","result":1}}"#,
		);
		dispatcher.dispatch(r#"{"jsonrpc":"2.0","weird":true}"#);
	}

	#[test]
	fn reset_fails_pending_and_ends_subscriptions() {
		let mut dispatcher = Dispatcher::new();
		let (req_tx, req_rx) = channel();
		let (sub_tx, sub_rx) = channel();
		dispatcher.register_request(1, req_tx);
		dispatcher.register_subscription("s".to_string(), sub_tx);

		dispatcher.reset();

		assert!(matches!(req_rx.recv().unwrap(), Err(Error::TransportClosed)));
		// Sender dropped: the subscription stream ends.
		assert!(sub_rx.recv().is_err());
	}

	#[test]
	fn remove_subscription_reports_prior_presence() {
		let mut dispatcher = Dispatcher::new();
		let (tx, _rx) = channel();
		dispatcher.register_subscription("x".to_string(), tx);
		assert!(dispatcher.remove_subscription("x"));
		assert!(!dispatcher.remove_subscription("x"));
	}
}
