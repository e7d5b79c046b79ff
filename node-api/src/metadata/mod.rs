/*
	Copyright 2021 Supercomputing Systems AG
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

//! The pallet table extracted from runtime metadata.
//!
//! This is the part of the metadata the client actually needs to name
//! extrinsics and events: per pallet its name, its dispatch index and
//! the positional names of its call and event variants.

pub use decode::{decode_metadata, DecodedMetadata};
pub use error::{MetadataDecodeError, RecordError, TypeParseError};

mod decode;
pub mod error;

use std::fmt::Write;

/// Pallet index used for entries whose record could not be decoded.
pub const UNPARSED_PALLET_INDEX: u8 = 255;

/// Fallback label for an index that could not be resolved to a name.
pub fn unknown_name(index: u8) -> String {
	format!("unknown({index})")
}

/// The decoded pallet table of one runtime. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
	version: u8,
	pallets: Vec<PalletMetadata>,
}

/// One pallet of the table.
///
/// `calls`/`events` of `None` mean the pallet declared no such enum in
/// its metadata, which is distinct from an enum with zero variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PalletMetadata {
	pub name: String,
	pub index: u8,
	pub calls: Option<Vec<String>>,
	pub events: Option<Vec<String>>,
}

impl PalletMetadata {
	/// The entry recorded when a pallet record cannot be decoded.
	pub fn placeholder(ordinal: usize) -> Self {
		Self {
			name: format!("pallet_{ordinal}"),
			index: UNPARSED_PALLET_INDEX,
			calls: None,
			events: None,
		}
	}
}

impl Metadata {
	pub fn new(version: u8, pallets: Vec<PalletMetadata>) -> Self {
		Self { version, pallets }
	}

	/// The on-wire metadata version this table was decoded from.
	pub fn version(&self) -> u8 {
		self.version
	}

	/// All pallets in declaration order.
	pub fn pallets(&self) -> &[PalletMetadata] {
		&self.pallets
	}

	/// Access a pallet by its dispatch index.
	///
	/// Chains assign arbitrary u8 indices, so this is a scan for the
	/// first matching entry rather than an array access.
	pub fn pallet_by_index(&self, index: u8) -> Option<&PalletMetadata> {
		self.pallets.iter().find(|p| p.index == index)
	}

	/// Access a pallet by name.
	pub fn pallet_by_name(&self, name: &str) -> Option<&PalletMetadata> {
		self.pallets.iter().find(|p| p.name == name)
	}

	/// The name of a call, given pallet and call indices.
	pub fn call_name(&self, pallet_index: u8, call_index: u8) -> Option<&str> {
		let calls = self.pallet_by_index(pallet_index)?.calls.as_ref()?;
		calls.get(call_index as usize).map(String::as_str)
	}

	/// The name of an event, given pallet and event indices.
	pub fn event_name(&self, pallet_index: u8, event_index: u8) -> Option<&str> {
		let events = self.pallet_by_index(pallet_index)?.events.as_ref()?;
		events.get(event_index as usize).map(String::as_str)
	}

	/// A human-readable summary of the table, one line per pallet.
	pub fn pretty_format(&self) -> String {
		let mut out = format!("metadata v{} with {} pallets\n", self.version, self.pallets.len());
		for pallet in &self.pallets {
			let calls = pallet.calls.as_ref().map_or("-".to_string(), |c| c.len().to_string());
			let events = pallet.events.as_ref().map_or("-".to_string(), |e| e.len().to_string());
			let _ = writeln!(
				out,
				"  {:>3} {} (calls: {calls}, events: {events})",
				pallet.index, pallet.name
			);
		}
		out
	}
}

/// Project `(index, name)` pairs into a dense sequence where position i
/// holds the name declared at variant index i. Gaps are padded with the
/// `unknown(<i>)` marker.
pub fn dense_names<'a>(entries: impl IntoIterator<Item = (u8, &'a str)>) -> Vec<String> {
	let mut sorted: Vec<(u8, &str)> = entries.into_iter().collect();
	sorted.sort_by_key(|(index, _)| *index);
	let Some((last_index, _)) = sorted.last() else { return Vec::new() };
	let mut names: Vec<String> =
		(0..=*last_index).map(unknown_name).collect();
	for (index, name) in sorted {
		names[index as usize] = name.to_string();
	}
	names
}

#[cfg(test)]
mod tests {
	use super::*;

	fn table() -> Metadata {
		Metadata::new(
			14,
			vec![
				PalletMetadata {
					name: "System".into(),
					index: 0,
					calls: Some(vec!["remark".into(), "set_code".into()]),
					events: Some(vec!["ExtrinsicSuccess".into()]),
				},
				PalletMetadata {
					name: "Balances".into(),
					index: 10,
					calls: Some(vec!["transfer_allow_death".into()]),
					events: None,
				},
			],
		)
	}

	#[test]
	fn lookup_scans_by_declared_index() {
		let metadata = table();
		assert_eq!(metadata.pallet_by_index(10).unwrap().name, "Balances");
		assert!(metadata.pallet_by_index(1).is_none());
		assert_eq!(metadata.call_name(0, 1), Some("set_code"));
		assert_eq!(metadata.call_name(0, 2), None);
		assert_eq!(metadata.call_name(10, 0), Some("transfer_allow_death"));
		assert_eq!(metadata.event_name(10, 0), None);
		assert_eq!(metadata.event_name(0, 0), Some("ExtrinsicSuccess"));
	}

	#[test]
	fn dense_names_pads_gaps_with_unknown_markers() {
		let names = dense_names(vec![(5, "five"), (0, "zero"), (2, "two")]);
		assert_eq!(names, vec!["zero", "unknown(1)", "two", "unknown(3)", "unknown(4)", "five"]);
		assert!(dense_names(vec![]).is_empty());
	}

	#[test]
	fn placeholder_carries_the_sentinel_index() {
		let placeholder = PalletMetadata::placeholder(3);
		assert_eq!(placeholder.name, "pallet_3");
		assert_eq!(placeholder.index, UNPARSED_PALLET_INDEX);
		assert!(placeholder.calls.is_none());
	}
}
