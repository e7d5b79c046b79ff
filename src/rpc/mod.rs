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

pub use error::*;
pub use tungstenite_client::TungsteniteRpcClient;

pub mod error;
pub mod mocks;
pub mod tungstenite_client;

use qapi_primitives::RpcParams;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

/// Trait to be implemented by a client for sending rpc requests.
pub trait Request {
	/// Sends an RPC request to the node and deserializes the answer.
	fn request<R: DeserializeOwned>(&self, method: &str, params: RpcParams) -> Result<R>;
}

/// Trait to be implemented by a client for subscribing to the node.
pub trait Subscribe {
	type Subscription<Notification>: HandleSubscription<Notification>
	where
		Notification: DeserializeOwned;

	fn subscribe<Notification: DeserializeOwned>(
		&self,
		sub: &str,
		params: RpcParams,
		unsub: &str,
	) -> Result<Self::Subscription<Notification>>;
}

/// Stream of notifications belonging to one subscription.
pub trait HandleSubscription<Notification: DeserializeOwned> {
	/// Returns the next notification, or `None` once the subscription
	/// has been terminated (by the server, by a reconnect, or by
	/// unsubscribing).
	fn next(&mut self) -> Option<Result<Notification>>;

	/// Unsubscribe and consume the subscription.
	fn unsubscribe(self) -> Result<()>;
}

/// Build the JSON-RPC 2.0 request string for `method` under `id`.
pub fn to_json_req(method: &str, id: u64, params: RpcParams) -> Result<String> {
	let params = params.into_value().unwrap_or(Value::Null);
	Ok(json!({
		"jsonrpc": "2.0",
		"id": id,
		"method": method,
		"params": params,
	})
	.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;
	use qapi_primitives::rpc_params;

	#[test]
	fn request_carries_id_method_and_params() {
		let req = to_json_req("chain_getBlockHash", 7, rpc_params![42u64]).unwrap();
		let value: Value = serde_json::from_str(&req).unwrap();
		assert_eq!(value["jsonrpc"], "2.0");
		assert_eq!(value["id"], 7);
		assert_eq!(value["method"], "chain_getBlockHash");
		assert_eq!(value["params"], json!([42]));
	}

	#[test]
	fn empty_params_serialize_as_null() {
		let req = to_json_req("state_getMetadata", 1, rpc_params![]).unwrap();
		let value: Value = serde_json::from_str(&req).unwrap();
		assert_eq!(value["params"], Value::Null);
	}
}
