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

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Serde json error: {0}")]
	SerdeJson(#[from] serde_json::Error),
	#[error("WebSocket tungstenite Error: {0}")]
	TungsteniteWebSocket(#[from] tungstenite::Error),
	#[error("The node returned an error response: {0}")]
	RpcError(serde_json::Value),
	#[error("The websocket connection was closed while the request was pending")]
	TransportClosed,
	#[error("Request `{0}` did not receive a response within the deadline")]
	Timeout(String),
	#[error("Could not parse websocket url: {0}")]
	Url(#[from] url::ParseError),
	#[error("The server returned an unusable subscription id: {0}")]
	InvalidSubscriptionId(serde_json::Value),
	#[error("Io error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Exceeded the maximum number of attempts to connect to the server")]
	MaxConnectionAttemptsExceeded,
}
