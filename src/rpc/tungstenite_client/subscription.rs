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

use crate::rpc::{HandleSubscription, Result, TungsteniteRpcClient};
use core::marker::PhantomData;
use serde::de::DeserializeOwned;
use std::sync::mpsc::Receiver;

pub struct TungsteniteSubscriptionWrapper<Notification> {
	client: TungsteniteRpcClient,
	sub_id: String,
	unsub_method: String,
	receiver: Receiver<String>,
	_phantom: PhantomData<Notification>,
}

impl<Notification> TungsteniteSubscriptionWrapper<Notification> {
	pub(crate) fn new(
		client: TungsteniteRpcClient,
		sub_id: String,
		unsub_method: String,
		receiver: Receiver<String>,
	) -> Self {
		Self { client, sub_id, unsub_method, receiver, _phantom: Default::default() }
	}

	/// The id the server assigned to this subscription.
	pub fn sub_id(&self) -> &str {
		&self.sub_id
	}
}

impl<Notification: DeserializeOwned> HandleSubscription<Notification>
	for TungsteniteSubscriptionWrapper<Notification>
{
	fn next(&mut self) -> Option<Result<Notification>> {
		// The sender is dropped on unsubscribe and on reconnect; both
		// end the stream.
		let notification = self.receiver.recv().ok()?;
		Some(serde_json::from_str(&notification).map_err(Into::into))
	}

	fn unsubscribe(self) -> Result<()> {
		self.client.unsubscribe(&self.unsub_method, &self.sub_id)
	}
}
