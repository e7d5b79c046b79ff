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

//! A scripted stand-in for a node, for tests of everything above the
//! transport.

use crate::rpc::{Error, HandleSubscription, Request, Result, Subscribe};
use core::marker::PhantomData;
use qapi_primitives::RpcParams;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::{
	collections::{HashMap, VecDeque},
	sync::RwLock,
};

type MethodKey = String;
type SerializedValue = String;

/// Answers requests from per-method response queues and records every
/// method called. The last response of a queue is sticky, so a single
/// entry behaves like a fixed answer.
#[derive(Debug, Default)]
pub struct RpcClientMock {
	responses: RwLock<HashMap<MethodKey, VecDeque<SerializedValue>>>,
	notifications: RwLock<HashMap<MethodKey, VecDeque<SerializedValue>>>,
	calls: RwLock<Vec<MethodKey>>,
}

impl RpcClientMock {
	/// A mock with one fixed response per method.
	pub fn new(state: HashMap<MethodKey, SerializedValue>) -> Self {
		let responses = state.into_iter().map(|(k, v)| (k, VecDeque::from([v]))).collect();
		Self { responses: RwLock::new(responses), ..Default::default() }
	}

	/// A mock whose responses are played back in order, method by
	/// method; the final entry keeps repeating.
	pub fn with_response_queues(state: HashMap<MethodKey, Vec<SerializedValue>>) -> Self {
		let responses =
			state.into_iter().map(|(k, v)| (k, VecDeque::from(v))).collect();
		Self { responses: RwLock::new(responses), ..Default::default() }
	}

	/// Replace the response for one method.
	pub fn update_entry(&self, key: MethodKey, value: SerializedValue) {
		let mut lock = self.responses.write().unwrap();
		lock.insert(key, VecDeque::from([value]));
	}

	/// Queue the notifications a subscription to `method` will deliver.
	pub fn queue_notifications(&self, method: &str, items: Vec<SerializedValue>) {
		let mut lock = self.notifications.write().unwrap();
		lock.insert(method.to_string(), VecDeque::from(items));
	}

	/// Every method called so far, in call order.
	pub fn recorded_calls(&self) -> Vec<MethodKey> {
		self.calls.read().unwrap().clone()
	}

	/// How often `method` has been called.
	pub fn call_count(&self, method: &str) -> usize {
		self.calls.read().unwrap().iter().filter(|m| *m == method).count()
	}

	fn pop_response(&self, method: &str) -> Result<SerializedValue> {
		let mut lock = self.responses.write().unwrap();
		let queue = lock
			.get_mut(method)
			.ok_or_else(|| Error::RpcError(json!({ "message": format!("method {method} not mocked") })))?;
		if queue.len() > 1 {
			Ok(queue.pop_front().unwrap())
		} else {
			queue
				.front()
				.cloned()
				.ok_or_else(|| Error::RpcError(json!({ "message": "response queue drained" })))
		}
	}
}

impl Request for RpcClientMock {
	fn request<R: DeserializeOwned>(&self, method: &str, _params: RpcParams) -> Result<R> {
		self.calls.write().unwrap().push(method.to_string());
		let response = self.pop_response(method)?;
		let deserialized_value: R = serde_json::from_str(&response)?;
		Ok(deserialized_value)
	}
}

impl Subscribe for RpcClientMock {
	type Subscription<Notification>
		= MockSubscription<Notification>
	where
		Notification: DeserializeOwned;

	fn subscribe<Notification: DeserializeOwned>(
		&self,
		sub: &str,
		_params: RpcParams,
		_unsub: &str,
	) -> Result<Self::Subscription<Notification>> {
		self.calls.write().unwrap().push(sub.to_string());
		let items = self
			.notifications
			.write()
			.unwrap()
			.remove(sub)
			.unwrap_or_default();
		Ok(MockSubscription { items, _phantom: PhantomData })
	}
}

/// Plays back the queued notifications, then ends.
#[derive(Debug)]
pub struct MockSubscription<Notification> {
	items: VecDeque<String>,
	_phantom: PhantomData<Notification>,
}

impl<Notification: DeserializeOwned> HandleSubscription<Notification>
	for MockSubscription<Notification>
{
	fn next(&mut self) -> Option<Result<Notification>> {
		let item = self.items.pop_front()?;
		Some(serde_json::from_str(&item).map_err(Into::into))
	}

	fn unsubscribe(self) -> Result<()> {
		Ok(())
	}
}
