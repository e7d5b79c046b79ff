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

//! The runtime probe: what a node reports about its runtime, fetched
//! once at connect time and again per block when a runtime upgrade is
//! suspected.

use crate::{
	api::Result,
	rpc::Request,
	utils::FromHexString,
};
use log::debug;
use qapi_primitives::{rpc_params, RuntimeVersion, SystemProperties};

/// Identity of the runtime the connected node runs, plus its raw
/// metadata bytes.
#[derive(Debug, Clone)]
pub struct RuntimeInfo {
	pub spec_name: String,
	pub spec_version: u32,
	pub ss58_prefix: Option<u32>,
	/// Hex-decoded metadata payload, to be fed to the decoder. Empty
	/// when the probe was asked to skip the download.
	pub metadata: Vec<u8>,
}

impl RuntimeInfo {
	/// Probe the connected node: runtime version, metadata and chain
	/// properties. A failing `system_properties` is not fatal, the
	/// address prefix just stays unknown.
	pub fn fetch(client: &impl Request) -> Result<Self> {
		Self::fetch_inner(client, true)
	}

	/// Probe without downloading metadata, for callers that bring
	/// their own pallet table.
	pub(crate) fn fetch_without_metadata(client: &impl Request) -> Result<Self> {
		Self::fetch_inner(client, false)
	}

	fn fetch_inner(client: &impl Request, with_metadata: bool) -> Result<Self> {
		let version: RuntimeVersion =
			client.request("state_getRuntimeVersion", rpc_params![])?;
		let metadata = if with_metadata {
			let metadata_hex: String = client.request("state_getMetadata", rpc_params![])?;
			Vec::from_hex(&metadata_hex)?
		} else {
			Vec::new()
		};
		let ss58_prefix = match client.request::<SystemProperties>("system_properties", rpc_params![])
		{
			Ok(properties) => properties.ss58_format,
			Err(err) => {
				debug!("system_properties failed, leaving ss58 prefix unset: {err}");
				None
			},
		};
		Ok(Self {
			spec_name: version.spec_name,
			spec_version: version.spec_version,
			ss58_prefix,
			metadata,
		})
	}
}

/// Runtime version as of a specific block.
pub(crate) fn runtime_version_at(client: &impl Request, at: &str) -> Result<RuntimeVersion> {
	Ok(client.request("state_getRuntimeVersion", rpc_params![at])?)
}

/// Metadata bytes as of a specific block.
pub(crate) fn metadata_bytes_at(client: &impl Request, at: &str) -> Result<Vec<u8>> {
	let metadata_hex: String = client.request("state_getMetadata", rpc_params![at])?;
	Ok(Vec::from_hex(&metadata_hex)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::rpc::mocks::RpcClientMock;
	use std::collections::HashMap;

	fn runtime_version_json() -> String {
		r#"{"specName":"quantus","specVersion":109,"implName":"quantus-node"}"#.to_string()
	}

	#[test]
	fn probe_collects_version_metadata_and_prefix() {
		let client = RpcClientMock::new(HashMap::from([
			("state_getRuntimeVersion".to_string(), runtime_version_json()),
			("state_getMetadata".to_string(), "\"0x6d657461\"".to_string()),
			("system_properties".to_string(), r#"{"ss58Format":189}"#.to_string()),
		]));
		let info = RuntimeInfo::fetch(&client).unwrap();
		assert_eq!(info.spec_name, "quantus");
		assert_eq!(info.spec_version, 109);
		assert_eq!(info.ss58_prefix, Some(189));
		assert_eq!(info.metadata, b"meta");
	}

	#[test]
	fn missing_system_properties_are_not_fatal() {
		let client = RpcClientMock::new(HashMap::from([
			("state_getRuntimeVersion".to_string(), runtime_version_json()),
			("state_getMetadata".to_string(), "\"0x00\"".to_string()),
		]));
		let info = RuntimeInfo::fetch(&client).unwrap();
		assert_eq!(info.ss58_prefix, None);
	}

	#[test]
	fn probe_can_skip_the_metadata_download() {
		let client = RpcClientMock::new(HashMap::from([
			("state_getRuntimeVersion".to_string(), runtime_version_json()),
			("system_properties".to_string(), "{}".to_string()),
		]));
		let info = RuntimeInfo::fetch_without_metadata(&client).unwrap();
		assert!(info.metadata.is_empty());
		assert_eq!(client.call_count("state_getMetadata"), 0);
	}
}
