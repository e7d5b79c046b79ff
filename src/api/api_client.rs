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

//! The user-facing client: composes transport, runtime probe and
//! metadata decoding into chain following and extrinsic naming.

use crate::{
	api::{
		rpc_api::state::{metadata_bytes_at, runtime_version_at},
		ApiOptions, Result, RuntimeInfo, SignatureOverride,
	},
	rpc::Request,
	utils::FromHexString,
};
use log::{debug, error, info};
use qapi_node_api::{
	decode_metadata, identify_event, identify_extrinsic, DecodedMetadata, EventIdentity,
	ExtrinsicIdentity, Metadata, MetadataDecodeError,
};
use std::{
	collections::HashMap,
	sync::{Arc, RwLock},
};

/// Api to talk to a Substrate-family node and name what it produces.
///
/// It is generic over the rpc client, so any [`Request`] +
/// [`Subscribe`](crate::rpc::Subscribe) backend works, including the
/// mock client in tests.
pub struct Api<Client> {
	client: Client,
	runtime_info: RuntimeInfo,
	options: ApiOptions,
	/// Table decoded at connect time (or adopted from the overrides).
	latest_metadata: RwLock<Option<Arc<Metadata>>>,
	/// Read-through cache of tables per runtime spec version.
	metadata_cache: RwLock<HashMap<u32, Arc<Metadata>>>,
}

/// Getter calls to the local cache, no node calls involved.
impl<Client> Api<Client> {
	/// Get the rpc client.
	pub fn client(&self) -> &Client {
		&self.client
	}

	/// What the runtime probe found at connect time.
	pub fn runtime_info(&self) -> &RuntimeInfo {
		&self.runtime_info
	}

	/// The spec version the node ran when we connected.
	pub fn spec_version(&self) -> u32 {
		self.runtime_info.spec_version
	}

	/// Address prefix: the user override if given, else what the chain
	/// reported.
	pub fn ss58_prefix(&self) -> Option<u32> {
		self.runtime_info.ss58_prefix
	}

	/// The advertised signature scheme, if the caller set one. Unused
	/// by the client itself.
	pub fn signature_override(&self) -> Option<&SignatureOverride> {
		self.options.signature.as_ref()
	}

	/// The latest pallet table, if one could be established.
	pub fn metadata(&self) -> Option<Arc<Metadata>> {
		self.latest_metadata.read().unwrap().clone()
	}

	fn cache_metadata(&self, spec_version: u32, metadata: Arc<Metadata>) {
		self.metadata_cache.write().unwrap().insert(spec_version, metadata);
	}

	fn cached_metadata(&self, spec_version: u32) -> Option<Arc<Metadata>> {
		self.metadata_cache.read().unwrap().get(&spec_version).cloned()
	}

	fn parse_metadata(
		&self,
		bytes: &[u8],
	) -> core::result::Result<DecodedMetadata, MetadataDecodeError> {
		match &self.options.metadata.custom_parser {
			Some(parser) => parser(bytes),
			None => decode_metadata(bytes),
		}
	}
}

impl<Client: Request> Api<Client> {
	/// Connect with default options: probe the runtime, decode its
	/// metadata, and keep the table for extrinsic naming.
	pub fn new(client: Client) -> Result<Self> {
		Self::with_options(client, ApiOptions::default())
	}

	/// Connect with explicit [`ApiOptions`].
	///
	/// A failing metadata decode is not fatal: the api stays usable and
	/// extrinsic identification degrades to `unknown(<i>)` names.
	pub fn with_options(client: Client, options: ApiOptions) -> Result<Self> {
		// No point downloading metadata we would never decode.
		let mut runtime_info = if options.metadata.tables.is_some() {
			RuntimeInfo::fetch_without_metadata(&client)?
		} else {
			RuntimeInfo::fetch(&client)?
		};
		if let Some(prefix) = options.ss58_prefix {
			runtime_info.ss58_prefix = Some(prefix);
		}
		info!(
			"Connected to runtime {} spec version {}",
			runtime_info.spec_name, runtime_info.spec_version
		);

		let api = Self {
			client,
			runtime_info,
			options,
			latest_metadata: RwLock::new(None),
			metadata_cache: RwLock::new(HashMap::new()),
		};
		api.establish_initial_metadata();
		Ok(api)
	}

	fn establish_initial_metadata(&self) {
		if let Some(tables) = &self.options.metadata.tables {
			let metadata = Arc::new(tables.to_metadata());
			self.cache_metadata(self.runtime_info.spec_version, metadata.clone());
			*self.latest_metadata.write().unwrap() = Some(metadata);
			return
		}

		match self.parse_metadata(&self.runtime_info.metadata) {
			Ok(decoded) => {
				for line in &decoded.diagnostics {
					debug!("metadata diagnostics: {line}");
				}
				let metadata = Arc::new(decoded.metadata);
				self.cache_metadata(self.runtime_info.spec_version, metadata.clone());
				*self.latest_metadata.write().unwrap() = Some(metadata);
			},
			Err(err) =>
				if !self.options.metadata.ignore_parse_errors {
					error!("Could not decode the runtime metadata: {err}. Extrinsic names will degrade to unknown().");
				},
		}
	}

	/// The pallet table valid for the given block, or the latest one
	/// when no block is given. Tables are cached per spec version and
	/// re-fetched on a cache miss; every failure on the way degrades to
	/// the latest table.
	pub fn tables_for_block(&self, at: Option<&str>) -> Option<Arc<Metadata>> {
		let Some(hash) = at else { return self.metadata() };

		let version = match runtime_version_at(&self.client, hash) {
			Ok(version) => version,
			Err(err) => {
				debug!("runtime version at {hash} unavailable ({err}), using latest table");
				return self.metadata()
			},
		};
		if let Some(metadata) = self.cached_metadata(version.spec_version) {
			return Some(metadata)
		}

		let decoded = metadata_bytes_at(&self.client, hash)
			.map_err(|err| debug!("metadata at {hash} unavailable: {err}"))
			.ok()
			.and_then(|bytes| {
				self.parse_metadata(&bytes)
					.map_err(|err| debug!("metadata at {hash} undecodable: {err}"))
					.ok()
			});
		match decoded {
			Some(decoded) => {
				for line in &decoded.diagnostics {
					debug!("metadata diagnostics: {line}");
				}
				let metadata = Arc::new(decoded.metadata);
				self.cache_metadata(version.spec_version, metadata.clone());
				Some(metadata)
			},
			None => self.metadata(),
		}
	}

	/// Identify an extrinsic given as `0x`-prefixed hex. Identification
	/// itself cannot fail; an error here means the hex was malformed.
	pub fn decode_extrinsic_name(
		&self,
		extrinsic_hex: &str,
		at: Option<&str>,
	) -> Result<ExtrinsicIdentity> {
		let bytes = Vec::from_hex(extrinsic_hex)?;
		let metadata = self.tables_for_block(at);
		Ok(identify_extrinsic(&bytes, metadata.as_deref()))
	}

	/// Identify an event by its pallet and event indices.
	pub fn decode_event_name(
		&self,
		pallet_index: u8,
		event_index: u8,
		at: Option<&str>,
	) -> EventIdentity {
		let metadata = self.tables_for_block(at);
		identify_event(pallet_index, event_index, metadata.as_deref())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		api::{
			GetChainInfo, MetadataOptions, NamedIndex, PalletOverride, SubscribeChain,
			TableOverrides,
		},
		rpc::{mocks::RpcClientMock, HandleSubscription},
	};
	use qapi_node_api::{extrinsics::UnknownReason, PalletMetadata};
	use std::{
		collections::HashMap,
		sync::atomic::{AtomicUsize, Ordering},
		time::Instant,
	};

	const RUNTIME_VERSION: &str = r#"{"specName":"quantus","specVersion":109}"#;
	const RUNTIME_VERSION_NEXT: &str = r#"{"specName":"quantus","specVersion":110}"#;

	fn mock_without_metadata() -> RpcClientMock {
		RpcClientMock::new(HashMap::from([
			("state_getRuntimeVersion".to_string(), RUNTIME_VERSION.to_string()),
			("system_properties".to_string(), r#"{"ss58Format":189}"#.to_string()),
		]))
	}

	fn override_options() -> ApiOptions {
		ApiOptions {
			metadata: MetadataOptions {
				tables: Some(TableOverrides {
					version: 14,
					pallets: vec![
						PalletOverride {
							name: "System".into(),
							index: 0,
							calls: Some(vec![NamedIndex { name: "remark".into(), index: 0 }]),
							events: None,
						},
						PalletOverride {
							name: "Balances".into(),
							index: 2,
							calls: Some(vec![NamedIndex {
								name: "transfer_keep_alive".into(),
								index: 3,
							}]),
							events: None,
						},
					],
				}),
				..Default::default()
			},
			..Default::default()
		}
	}

	#[test]
	fn table_overrides_bypass_the_metadata_rpc() {
		let api = Api::with_options(mock_without_metadata(), override_options()).unwrap();
		assert_eq!(api.client().call_count("state_getMetadata"), 0);

		// compact(4) || version 0x04 || pallet 0 || call 0
		let identity = api.decode_extrinsic_name("0x10040000", None).unwrap();
		assert_eq!(identity.pallet, "System");
		assert_eq!(identity.method, "remark");
		assert!(!identity.signed);
		assert_eq!(identity.reason, None);
	}

	#[test]
	fn signed_extrinsics_resolve_with_the_signed_reason() {
		let api = Api::with_options(mock_without_metadata(), override_options()).unwrap();
		let identity = api.decode_extrinsic_name("0x10840203", None).unwrap();
		assert_eq!(identity.pallet, "Balances");
		assert_eq!(identity.method, "transfer_keep_alive");
		assert!(identity.signed);
		assert_eq!(identity.reason, Some(UnknownReason::SignedNotParsed));
	}

	#[test]
	fn undecodable_metadata_leaves_the_api_usable() {
		let client = mock_without_metadata();
		client.update_entry("state_getMetadata".to_string(), "\"0xdeadbeef\"".to_string());
		let api = Api::new(client).unwrap();

		assert!(api.metadata().is_none());
		let identity = api.decode_extrinsic_name("0x10040000", None).unwrap();
		assert_eq!(identity.pallet, "unknown(0)");
		assert_eq!(identity.method, "unknown(0)");
		assert_eq!(identity.reason, Some(UnknownReason::NoMetadata));
	}

	#[test]
	fn custom_parser_replaces_the_decoder() {
		let client = mock_without_metadata();
		client.update_entry("state_getMetadata".to_string(), "\"0x00\"".to_string());
		let options = ApiOptions {
			metadata: MetadataOptions {
				custom_parser: Some(Box::new(|_bytes| {
					Ok(DecodedMetadata {
						metadata: Metadata::new(
							16,
							vec![PalletMetadata {
								name: "Sudo".into(),
								index: 7,
								calls: Some(vec!["sudo".into()]),
								events: None,
							}],
						),
						diagnostics: Vec::new(),
					})
				})),
				..Default::default()
			},
			..Default::default()
		};
		let api = Api::with_options(client, options).unwrap();
		assert_eq!(api.metadata().unwrap().call_name(7, 0), Some("sudo"));
	}

	#[test]
	fn get_block_rides_out_the_import_race() {
		let client = RpcClientMock::with_response_queues(HashMap::from([
			("state_getRuntimeVersion".to_string(), vec![RUNTIME_VERSION.to_string()]),
			("system_properties".to_string(), vec!["{}".to_string()]),
			(
				"chain_getBlock".to_string(),
				vec![
					r#"{"block":null}"#.to_string(),
					r#"{"block":null}"#.to_string(),
					r#"{"block":null}"#.to_string(),
					r#"{"block":{"header":{"number":"0x2a"},"extrinsics":["0x10040000"]}}"#
						.to_string(),
				],
			),
		]));
		let api = Api::with_options(client, override_options()).unwrap();

		let started = Instant::now();
		let block = api.get_block("0xaa").unwrap();
		assert_eq!(block.extrinsics, vec!["0x10040000"]);
		assert_eq!(api.client().call_count("chain_getBlock"), 4);
		// Three sleeps of 150 ms sit between the four attempts.
		assert!(started.elapsed().as_millis() >= 450);
	}

	#[test]
	fn unavailable_block_degrades_to_the_bare_header() {
		let client = mock_without_metadata();
		client.update_entry("chain_getBlock".to_string(), "null".to_string());
		client.update_entry(
			"chain_getHeader".to_string(),
			r#"{"number":"0x2a","parentHash":"0xaa"}"#.to_string(),
		);
		let api = Api::with_options(client, override_options()).unwrap();

		let block = api.get_block("0xbb").unwrap();
		assert_eq!(block.header.number, "0x2a");
		assert!(block.extrinsics.is_empty());
		assert_eq!(api.client().call_count("chain_getBlock"), 5);
	}

	#[test]
	fn head_resolution_prefers_the_attached_hash() {
		let client = mock_without_metadata();
		client.update_entry("chain_getBlockHash".to_string(), "\"0xfeed\"".to_string());
		client.queue_notifications(
			"chain_subscribeNewHeads",
			vec![
				r#"{"number":"0x2a"}"#.to_string(),
				r#"{"number":"0x2b","hash":"0xbeef"}"#.to_string(),
			],
		);
		let api = Api::with_options(client, override_options()).unwrap();

		let mut heads = api.subscribe_new_heads().unwrap();

		let first = heads.next().unwrap().unwrap();
		let first = api.resolve_head(&first).unwrap();
		assert_eq!(first.number, 42);
		assert_eq!(first.hash, "0xfeed");
		assert_eq!(api.client().call_count("chain_getBlockHash"), 1);

		let second = heads.next().unwrap().unwrap();
		let second = api.resolve_head(&second).unwrap();
		assert_eq!(second.number, 43);
		assert_eq!(second.hash, "0xbeef");
		// The attached hash saved the lookup.
		assert_eq!(api.client().call_count("chain_getBlockHash"), 1);

		assert!(heads.next().is_none());
	}

	#[test]
	fn tables_are_cached_by_spec_version() {
		let parses = std::sync::Arc::new(AtomicUsize::new(0));
		let parses_seen = parses.clone();
		let client = RpcClientMock::with_response_queues(HashMap::from([
			(
				"state_getRuntimeVersion".to_string(),
				vec![RUNTIME_VERSION.to_string(), RUNTIME_VERSION_NEXT.to_string()],
			),
			("system_properties".to_string(), vec!["{}".to_string()]),
			("state_getMetadata".to_string(), vec!["\"0x00\"".to_string()]),
		]));
		let options = ApiOptions {
			metadata: MetadataOptions {
				custom_parser: Some(Box::new(move |_bytes| {
					parses.fetch_add(1, Ordering::Relaxed);
					Ok(DecodedMetadata {
						metadata: Metadata::new(14, Vec::new()),
						diagnostics: Vec::new(),
					})
				})),
				..Default::default()
			},
			..Default::default()
		};
		let api = Api::with_options(client, options).unwrap();
		assert_eq!(parses_seen.load(Ordering::Relaxed), 1);

		// First sighting of spec version 110 fetches and decodes ...
		api.tables_for_block(Some("0xcc")).unwrap();
		assert_eq!(parses_seen.load(Ordering::Relaxed), 2);
		assert_eq!(api.client().call_count("state_getMetadata"), 2);

		// ... the second sighting hits the cache.
		api.tables_for_block(Some("0xcc")).unwrap();
		assert_eq!(parses_seen.load(Ordering::Relaxed), 2);
		assert_eq!(api.client().call_count("state_getMetadata"), 2);
	}
}
