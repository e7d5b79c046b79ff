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

//! JSON shapes of the node responses the client works with.
//!
//! Nodes differ in how much of a header or block they report, so most
//! fields are optional and unknown fields are ignored.

use serde::Deserialize;
use serde_json::Value;

/// A block header as delivered by `chain_getHeader` and the new-head
/// subscription. The block number is hex-encoded on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
	pub number: String,
	#[serde(default)]
	pub parent_hash: Option<String>,
	#[serde(default)]
	pub state_root: Option<String>,
	#[serde(default)]
	pub extrinsics_root: Option<String>,
	#[serde(default)]
	pub digest: Option<Value>,
	/// Not part of the vanilla header; some nodes attach the hash to
	/// new-head notifications.
	#[serde(default)]
	pub hash: Option<String>,
}

/// A block body: the header plus the hex-encoded extrinsics.
#[derive(Debug, Clone, Deserialize)]
pub struct Block {
	pub header: Header,
	#[serde(default)]
	pub extrinsics: Vec<String>,
}

/// The two shapes `chain_getBlock` comes in: a signed-block wrapper
/// `{"block": {..}}` or the block fields directly. During block import
/// some nodes briefly answer `{"block": null}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BlockResponse {
	Flat(Block),
	Signed { block: Option<Block> },
}

impl BlockResponse {
	pub fn into_block(self) -> Option<Block> {
		match self {
			BlockResponse::Flat(block) => Some(block),
			BlockResponse::Signed { block } => block,
		}
	}
}

/// A fully resolved reference to a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRef {
	pub number: u64,
	pub hash: String,
}

/// The interesting part of `state_getRuntimeVersion`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeVersion {
	pub spec_name: String,
	pub spec_version: u32,
	#[serde(default)]
	pub impl_name: Option<String>,
	#[serde(default)]
	pub impl_version: Option<u32>,
	#[serde(default)]
	pub transaction_version: Option<u32>,
}

/// Chain properties as reported by `system_properties`. Chains are free
/// to put almost anything here, so the token fields stay opaque.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemProperties {
	#[serde(default)]
	pub ss58_format: Option<u32>,
	#[serde(default)]
	pub token_decimals: Option<Value>,
	#[serde(default)]
	pub token_symbol: Option<Value>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn block_response_unwraps_signed_shape() {
		let raw = r#"{"block":{"header":{"number":"0x2a"},"extrinsics":["0x00"]},"justifications":null}"#;
		let response: BlockResponse = serde_json::from_str(raw).unwrap();
		let block = response.into_block().unwrap();
		assert_eq!(block.header.number, "0x2a");
		assert_eq!(block.extrinsics, vec!["0x00"]);
	}

	#[test]
	fn block_response_accepts_flat_shape() {
		let raw = r#"{"header":{"number":"0x2a","parentHash":"0xaa"},"extrinsics":[]}"#;
		let response: BlockResponse = serde_json::from_str(raw).unwrap();
		let block = response.into_block().unwrap();
		assert_eq!(block.header.parent_hash.as_deref(), Some("0xaa"));
		assert!(block.extrinsics.is_empty());
	}

	#[test]
	fn block_response_tolerates_null_block_during_import() {
		let raw = r#"{"block":null}"#;
		let response: BlockResponse = serde_json::from_str(raw).unwrap();
		assert!(response.into_block().is_none());
	}

	#[test]
	fn runtime_version_ignores_extra_fields() {
		let raw = r#"{"specName":"quantus","implName":"quantus-node","authoringVersion":1,
			"specVersion":109,"implVersion":1,"apis":[],"transactionVersion":1,"stateVersion":1}"#;
		let version: RuntimeVersion = serde_json::from_str(raw).unwrap();
		assert_eq!(version.spec_name, "quantus");
		assert_eq!(version.spec_version, 109);
		assert_eq!(version.transaction_version, Some(1));
	}

	#[test]
	fn system_properties_reads_ss58_format() {
		let raw = r#"{"ss58Format":189,"tokenDecimals":12,"tokenSymbol":"QUAN"}"#;
		let properties: SystemProperties = serde_json::from_str(raw).unwrap();
		assert_eq!(properties.ss58_format, Some(189));

		let empty: SystemProperties = serde_json::from_str("{}").unwrap();
		assert_eq!(empty.ss58_format, None);
	}
}
