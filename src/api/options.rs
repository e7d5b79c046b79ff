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

//! User overrides accepted at connect time.

use qapi_node_api::{dense_names, DecodedMetadata, Metadata, MetadataDecodeError, PalletMetadata};
use serde::Deserialize;

/// A replacement for the built-in metadata decoder.
pub type MetadataParser =
	Box<dyn Fn(&[u8]) -> Result<DecodedMetadata, MetadataDecodeError> + Send + Sync>;

/// Everything the caller may override at connect time.
#[derive(Default)]
pub struct ApiOptions {
	/// Signature scheme advertised to higher layers. The client itself
	/// never signs anything.
	pub signature: Option<SignatureOverride>,
	/// Overrides the chain-reported address prefix.
	pub ss58_prefix: Option<u32>,
	pub metadata: MetadataOptions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignatureOverride {
	pub scheme: String,
	pub variant: String,
}

#[derive(Default)]
pub struct MetadataOptions {
	/// A pallet table provided directly, bypassing metadata download
	/// and decoding entirely.
	pub tables: Option<TableOverrides>,
	/// Replaces the built-in decoder.
	pub custom_parser: Option<MetadataParser>,
	/// Suppress the diagnostics normally logged when decoding fails.
	pub ignore_parse_errors: bool,
}

/// A user-supplied pallet table. Unlike the decoded form, calls and
/// events carry their variant index explicitly.
#[derive(Debug, Clone, Deserialize)]
pub struct TableOverrides {
	pub version: u8,
	pub pallets: Vec<PalletOverride>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PalletOverride {
	pub name: String,
	pub index: u8,
	#[serde(default)]
	pub calls: Option<Vec<NamedIndex>>,
	#[serde(default)]
	pub events: Option<Vec<NamedIndex>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedIndex {
	pub name: String,
	pub index: u8,
}

impl TableOverrides {
	/// Convert to the dense table form, projecting every entry at its
	/// declared index rather than its position in the source array.
	pub fn to_metadata(&self) -> Metadata {
		let pallets = self
			.pallets
			.iter()
			.map(|pallet| PalletMetadata {
				name: pallet.name.clone(),
				index: pallet.index,
				calls: pallet.calls.as_ref().map(|entries| project(entries)),
				events: pallet.events.as_ref().map(|entries| project(entries)),
			})
			.collect();
		Metadata::new(self.version, pallets)
	}
}

fn project(entries: &[NamedIndex]) -> Vec<String> {
	dense_names(entries.iter().map(|entry| (entry.index, entry.name.as_str())))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn overrides_project_by_declared_index_not_position() {
		let overrides = TableOverrides {
			version: 14,
			pallets: vec![PalletOverride {
				name: "Balances".into(),
				index: 2,
				calls: Some(vec![
					NamedIndex { name: "transfer_keep_alive".into(), index: 3 },
					NamedIndex { name: "transfer_allow_death".into(), index: 0 },
				]),
				events: None,
			}],
		};
		let metadata = overrides.to_metadata();
		let balances = metadata.pallet_by_index(2).unwrap();
		let calls = balances.calls.as_ref().unwrap();
		assert_eq!(
			calls,
			&vec![
				"transfer_allow_death".to_string(),
				"unknown(1)".to_string(),
				"unknown(2)".to_string(),
				"transfer_keep_alive".to_string(),
			]
		);
		assert!(balances.events.is_none());
	}

	#[test]
	fn overrides_deserialize_from_json() {
		let raw = r#"{
			"version": 14,
			"pallets": [
				{ "name": "System", "index": 0, "calls": [ { "name": "remark", "index": 0 } ] }
			]
		}"#;
		let overrides: TableOverrides = serde_json::from_str(raw).unwrap();
		let metadata = overrides.to_metadata();
		assert_eq!(metadata.call_name(0, 0), Some("remark"));
	}
}
