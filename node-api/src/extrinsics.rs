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

//! Identify extrinsics by pallet and call name.
//!
//! Only the prefix of an extrinsic is parsed: the compact length, the
//! version byte with its signed bit, and the two index bytes that
//! follow. Signature material of signed extrinsics is bypassed, which
//! is recorded through [`UnknownReason::SignedNotParsed`].

use crate::{
	metadata::{unknown_name, Metadata},
	reader::{ReadError, ScaleReader},
};
use std::fmt;

/// The leading bytes of a SCALE-encoded extrinsic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtrinsicPrefix {
	/// Byte length the extrinsic declares for itself.
	pub declared_len: u32,
	/// Version byte; bit 7 is the signed flag, the low bits carry the
	/// extrinsic format version.
	pub version: u8,
	pub signed: bool,
	/// Offset of the first byte after the version byte.
	pub body_offset: usize,
}

/// Read the prefix of a single extrinsic.
pub fn read_extrinsic_prefix(bytes: &[u8]) -> Result<ExtrinsicPrefix, ReadError> {
	let mut reader = ScaleReader::new(bytes);
	let declared_len = reader.compact_u32()?;
	let version = reader.u8()?;
	Ok(ExtrinsicPrefix {
		declared_len,
		version,
		signed: version & 0x80 != 0,
		body_offset: reader.offset(),
	})
}

/// Why an identification could not be resolved to definitive names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownReason {
	/// No pallet table was available at all.
	NoMetadata,
	/// The extrinsic is signed; the index bytes were read from the
	/// start of the signature region without validating it.
	SignedNotParsed,
	/// No pallet in the table carries this index.
	PalletIndexNotFound,
	/// The pallet exists but has no call at this index.
	CallIndexOutOfRange,
}

impl fmt::Display for UnknownReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let text = match self {
			UnknownReason::NoMetadata => "no-metadata",
			UnknownReason::SignedNotParsed => "signed-not-parsed",
			UnknownReason::PalletIndexNotFound => "pallet-index-not-found",
			UnknownReason::CallIndexOutOfRange => "call-index-out-of-range",
		};
		f.write_str(text)
	}
}

/// The resolved identity of an extrinsic. `pallet` and `method` are
/// always populated; unresolvable indices fall back to `unknown(<i>)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtrinsicIdentity {
	pub pallet: String,
	pub method: String,
	pub signed: bool,
	pub reason: Option<UnknownReason>,
}

impl fmt::Display for ExtrinsicIdentity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let kind = if self.signed { "signed" } else { "unsigned" };
		write!(f, "{kind} {}.{}", self.pallet, self.method)?;
		if let Some(reason) = self.reason {
			write!(f, " ({reason})")?;
		}
		Ok(())
	}
}

/// The resolved identity of an event, symmetric to
/// [`ExtrinsicIdentity`] but without a signed flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventIdentity {
	pub pallet: String,
	pub event: String,
	pub reason: Option<UnknownReason>,
}

/// Identify an extrinsic from its raw bytes and an optional pallet
/// table. This never fails: missing metadata, unknown indices and even
/// an unreadable prefix all degrade to `unknown(<i>)` names plus a
/// reason tag.
pub fn identify_extrinsic(bytes: &[u8], metadata: Option<&Metadata>) -> ExtrinsicIdentity {
	let (signed, body_offset) = match read_extrinsic_prefix(bytes) {
		Ok(prefix) => (prefix.signed, prefix.body_offset),
		Err(_) => (false, bytes.len()),
	};
	let pallet_index = bytes.get(body_offset).copied().unwrap_or(0xff);
	let call_index = bytes.get(body_offset + 1).copied().unwrap_or(0xff);

	let Some(metadata) = metadata else {
		return ExtrinsicIdentity {
			pallet: unknown_name(pallet_index),
			method: unknown_name(call_index),
			signed,
			reason: Some(UnknownReason::NoMetadata),
		}
	};

	let pallet = metadata.pallet_by_index(pallet_index);
	let method = pallet
		.and_then(|p| p.calls.as_ref())
		.and_then(|calls| calls.get(call_index as usize));

	let reason = if signed {
		Some(UnknownReason::SignedNotParsed)
	} else if method.is_some() {
		None
	} else if pallet.is_none() {
		Some(UnknownReason::PalletIndexNotFound)
	} else {
		Some(UnknownReason::CallIndexOutOfRange)
	};

	ExtrinsicIdentity {
		pallet: pallet.map_or_else(|| unknown_name(pallet_index), |p| p.name.clone()),
		method: method.cloned().unwrap_or_else(|| unknown_name(call_index)),
		signed,
		reason,
	}
}

/// Identify an event from its pallet and event indices.
pub fn identify_event(
	pallet_index: u8,
	event_index: u8,
	metadata: Option<&Metadata>,
) -> EventIdentity {
	let Some(metadata) = metadata else {
		return EventIdentity {
			pallet: unknown_name(pallet_index),
			event: unknown_name(event_index),
			reason: Some(UnknownReason::NoMetadata),
		}
	};

	let pallet = metadata.pallet_by_index(pallet_index);
	let event = pallet
		.and_then(|p| p.events.as_ref())
		.and_then(|events| events.get(event_index as usize));

	let reason = if event.is_some() {
		None
	} else if pallet.is_none() {
		Some(UnknownReason::PalletIndexNotFound)
	} else {
		Some(UnknownReason::CallIndexOutOfRange)
	};

	EventIdentity {
		pallet: pallet.map_or_else(|| unknown_name(pallet_index), |p| p.name.clone()),
		event: event.cloned().unwrap_or_else(|| unknown_name(event_index)),
		reason,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::metadata::PalletMetadata;
	use codec::{Compact, Encode};

	fn table() -> Metadata {
		Metadata::new(
			14,
			vec![
				PalletMetadata {
					name: "System".into(),
					index: 0,
					calls: Some(vec!["remark".into(), "set_code".into()]),
					events: Some(vec!["ExtrinsicSuccess".into(), "ExtrinsicFailed".into()]),
				},
				PalletMetadata {
					name: "Balances".into(),
					index: 2,
					calls: Some(vec![
						"transfer_allow_death".into(),
						"unknown(1)".into(),
						"force_transfer".into(),
						"transfer_keep_alive".into(),
					]),
					events: None,
				},
			],
		)
	}

	fn extrinsic(version: u8, body: &[u8]) -> Vec<u8> {
		let mut payload = vec![version];
		payload.extend_from_slice(body);
		let mut out = Compact(payload.len() as u32).encode();
		out.extend(payload);
		out
	}

	#[test]
	fn prefix_reads_length_version_and_signed_bit() {
		let bytes = extrinsic(0x04, &[0x00, 0x00, 0xaa]);
		let prefix = read_extrinsic_prefix(&bytes).unwrap();
		assert_eq!(prefix.declared_len, 4);
		assert_eq!(prefix.version, 0x04);
		assert!(!prefix.signed);
		assert_eq!(prefix.body_offset, 2);

		let signed = extrinsic(0x84, &[0x02, 0x03]);
		assert!(read_extrinsic_prefix(&signed).unwrap().signed);

		assert!(read_extrinsic_prefix(&[]).is_err());
	}

	#[test]
	fn unsigned_remark_resolves_without_a_reason() {
		// compact(4) || version 0x04 || pallet 0 || call 0
		let bytes = extrinsic(0x04, &[0x00, 0x00, 0x12]);
		let identity = identify_extrinsic(&bytes, Some(&table()));
		assert_eq!(identity.pallet, "System");
		assert_eq!(identity.method, "remark");
		assert!(!identity.signed);
		assert_eq!(identity.reason, None);
	}

	#[test]
	fn signed_extrinsic_keeps_the_signed_not_parsed_reason() {
		let bytes = extrinsic(0x84, &[0x02, 0x03, 0xde, 0xad]);
		let identity = identify_extrinsic(&bytes, Some(&table()));
		assert_eq!(identity.pallet, "Balances");
		assert_eq!(identity.method, "transfer_keep_alive");
		assert!(identity.signed);
		assert_eq!(identity.reason, Some(UnknownReason::SignedNotParsed));
	}

	#[test]
	fn signed_bit_is_reported_with_and_without_metadata() {
		for (version, signed) in [(0x04u8, false), (0x84u8, true)] {
			let bytes = extrinsic(version, &[0x00, 0x00]);
			assert_eq!(identify_extrinsic(&bytes, Some(&table())).signed, signed);
			assert_eq!(identify_extrinsic(&bytes, None).signed, signed);
		}
	}

	#[test]
	fn missing_metadata_degrades_to_unknown_names() {
		let bytes = extrinsic(0x04, &[0x07, 0x09]);
		let identity = identify_extrinsic(&bytes, None);
		assert_eq!(identity.pallet, "unknown(7)");
		assert_eq!(identity.method, "unknown(9)");
		assert_eq!(identity.reason, Some(UnknownReason::NoMetadata));
	}

	#[test]
	fn unknown_pallet_index_is_flagged() {
		let bytes = extrinsic(0x04, &[0x63, 0x00]);
		let identity = identify_extrinsic(&bytes, Some(&table()));
		assert_eq!(identity.pallet, "unknown(99)");
		assert_eq!(identity.method, "unknown(0)");
		assert_eq!(identity.reason, Some(UnknownReason::PalletIndexNotFound));
	}

	#[test]
	fn out_of_range_call_index_is_flagged() {
		let bytes = extrinsic(0x04, &[0x00, 0x05]);
		let identity = identify_extrinsic(&bytes, Some(&table()));
		assert_eq!(identity.pallet, "System");
		assert_eq!(identity.method, "unknown(5)");
		assert_eq!(identity.reason, Some(UnknownReason::CallIndexOutOfRange));
	}

	#[test]
	fn truncated_extrinsic_still_identifies() {
		// Only a compact length, nothing behind it.
		let bytes = Compact(4u32).encode();
		let identity = identify_extrinsic(&bytes, Some(&table()));
		assert_eq!(identity.pallet, "unknown(255)");
		assert_eq!(identity.method, "unknown(255)");
		assert_eq!(identity.reason, Some(UnknownReason::PalletIndexNotFound));
	}

	#[test]
	fn events_resolve_symmetrically() {
		let identity = identify_event(0, 1, Some(&table()));
		assert_eq!(identity.pallet, "System");
		assert_eq!(identity.event, "ExtrinsicFailed");
		assert_eq!(identity.reason, None);

		// Balances declares no event enum at all.
		let identity = identify_event(2, 0, Some(&table()));
		assert_eq!(identity.reason, Some(UnknownReason::CallIndexOutOfRange));

		let identity = identify_event(9, 0, None);
		assert_eq!(identity.reason, Some(UnknownReason::NoMetadata));
	}

	#[test]
	fn display_matches_the_follower_line_format() {
		let bytes = extrinsic(0x84, &[0x02, 0x03]);
		let identity = identify_extrinsic(&bytes, Some(&table()));
		assert_eq!(
			identity.to_string(),
			"signed Balances.transfer_keep_alive (signed-not-parsed)"
		);

		let bytes = extrinsic(0x04, &[0x00, 0x00]);
		let identity = identify_extrinsic(&bytes, Some(&table()));
		assert_eq!(identity.to_string(), "unsigned System.remark");
	}
}
