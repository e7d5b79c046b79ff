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

use crate::rpc::Error as RpcClientError;
use qapi_node_api::MetadataDecodeError;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// Rpc Client Error.
	#[error("Rpc Client Error: {0}")]
	RpcClient(#[from] RpcClientError),
	/// The runtime metadata could not be decoded.
	#[error("The runtime metadata could not be decoded: {0}")]
	Metadata(#[from] MetadataDecodeError),
	/// A hex string on the API boundary was malformed.
	#[error("A hex string on the API boundary was malformed: {0}")]
	Hex(#[from] hex::FromHexError),
	/// Could not find the expected block hash.
	#[error("Could not find the expected block hash.")]
	BlockHashNotFound,
	/// The block stayed unavailable through all retries.
	#[error("The block stayed unavailable through all retries: {0}")]
	BlockUnavailable(String),
	/// A new-head notification carried no usable block number.
	#[error("A new-head notification carried no usable block number: {0}")]
	InvalidHead(String),
}
