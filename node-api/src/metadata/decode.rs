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

//! Tolerant decoder from raw metadata bytes to a [`Metadata`] table.
//!
//! The payload arrives in one of several wrappings (bare, `meta` magic,
//! SCALE length prefix, or both) and in metadata versions 14 to 16,
//! whose pallet records differ in small ways. Rather than modelling
//! every layout exactly, the decoder reads the fields it needs, skips
//! over the rest, and recovers at three granularities: per type, per
//! pallet, per normalization candidate. Recovered failures are reported
//! through [`DecodedMetadata::diagnostics`].

use crate::{
	metadata::{
		dense_names,
		error::{MetadataDecodeError, RecordError, TypeParseError},
		Metadata, PalletMetadata,
	},
	reader::{ReadError, ScaleReader},
};
use log::debug;
use std::{collections::BTreeMap, sync::OnceLock};

const METADATA_MAGIC: &[u8; 4] = b"meta";
const SUPPORTED_VERSIONS: [u8; 3] = [14, 15, 16];
/// How far the resync scanner probes past a corrupt record.
const RESYNC_WINDOW: usize = 1024;
/// Registry decoding stops after this many back-to-back type failures.
const MAX_CONSECUTIVE_TYPE_FAILURES: u32 = 5;

/// Outcome of a successful (possibly partial) metadata decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMetadata {
	pub metadata: Metadata,
	/// One entry per tolerated failure. Empty means the decode was clean.
	pub diagnostics: Vec<String>,
}

/// Decode a runtime metadata payload into a pallet table.
///
/// Set the `QAPI_DEBUG` environment variable to any non-empty value to
/// get verbose logging of the decode path.
pub fn decode_metadata(raw: &[u8]) -> Result<DecodedMetadata, MetadataDecodeError> {
	let verbose = verbose_decode_enabled();
	let mut rejected_version = None;

	for (label, candidate) in candidates(raw) {
		if verbose {
			debug!("metadata: trying candidate `{label}` ({} bytes)", candidate.len());
		}
		match try_candidate(candidate, verbose) {
			Ok(decoded) => {
				if verbose {
					debug!(
						"metadata: candidate `{label}` decoded v{} with {} pallets ({} diagnostics)",
						decoded.metadata.version(),
						decoded.metadata.pallets().len(),
						decoded.diagnostics.len()
					);
				}
				return Ok(decoded)
			},
			Err(CandidateError::Version(version)) => {
				if verbose {
					debug!("metadata: candidate `{label}` carries unsupported version {version}");
				}
				// A byte in the historic version range means this was
				// metadata of a vintage we do not handle; anything else
				// is indistinguishable from garbage.
				if (9..=31).contains(&version) {
					rejected_version.get_or_insert(version);
				}
			},
			Err(CandidateError::Structure(err)) => {
				if verbose {
					debug!("metadata: candidate `{label}` rejected: {err}");
				}
			},
		}
	}

	match rejected_version {
		Some(version) => Err(MetadataDecodeError::UnsupportedVersion(version)),
		None => Err(MetadataDecodeError::Unparseable { preview: preview(raw) }),
	}
}

fn verbose_decode_enabled() -> bool {
	static VERBOSE: OnceLock<bool> = OnceLock::new();
	*VERBOSE.get_or_init(|| std::env::var("QAPI_DEBUG").map(|v| !v.is_empty()).unwrap_or(false))
}

fn preview(bytes: &[u8]) -> String {
	hex::encode(&bytes[..bytes.len().min(16)])
}

/// The normalization candidates, in the order they are tried: the raw
/// payload, then the payload unwrapped from a `Vec<u8>` length prefix.
/// The `meta` magic is stripped from either when present. A length
/// prefix only counts when it spans the remainder exactly.
fn candidates(raw: &[u8]) -> Vec<(&'static str, &[u8])> {
	let mut list = vec![("raw", strip_magic(raw))];
	if let Some(unwrapped) = compact_unwrap(raw) {
		list.push(("length-wrapped", strip_magic(unwrapped)));
	}
	list
}

fn strip_magic(bytes: &[u8]) -> &[u8] {
	bytes.strip_prefix(METADATA_MAGIC.as_slice()).unwrap_or(bytes)
}

fn compact_unwrap(bytes: &[u8]) -> Option<&[u8]> {
	let mut reader = ScaleReader::new(bytes);
	let len = reader.compact_u32().ok()? as usize;
	let start = reader.offset();
	(start + len == bytes.len()).then(|| &bytes[start..])
}

enum CandidateError {
	Version(u8),
	Structure(ReadError),
}

fn try_candidate(bytes: &[u8], verbose: bool) -> Result<DecodedMetadata, CandidateError> {
	let mut reader = ScaleReader::new(bytes);
	let version = reader.u8().map_err(CandidateError::Structure)?;
	if !SUPPORTED_VERSIONS.contains(&version) {
		return Err(CandidateError::Version(version))
	}

	let mut diagnostics = Vec::new();
	let graph = decode_registry(&mut reader, &mut diagnostics, verbose)
		.map_err(CandidateError::Structure)?;
	// The candidate is committed once the registry parsed; everything
	// after this point degrades instead of rejecting.
	let pallets = decode_pallets(&mut reader, &graph, &mut diagnostics, verbose);
	Ok(DecodedMetadata { metadata: Metadata::new(version, pallets), diagnostics })
}

fn note(diagnostics: &mut Vec<String>, verbose: bool, message: String) {
	if verbose {
		debug!("metadata: {message}");
	}
	diagnostics.push(message);
}

/// The portable type registry, reduced to the one distinction the
/// client cares about: variant enums (with their `(index, name)` pairs)
/// versus everything else.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TypeDef {
	Variant { variants: Vec<(u8, String)> },
	Other,
}

struct PortableGraph {
	types: BTreeMap<u32, TypeDef>,
}

impl PortableGraph {
	/// Resolve a type id to the dense variant-name list, or `None` when
	/// the id is missing or does not refer to a variant enum.
	fn variant_names(&self, id: u32) -> Option<Vec<String>> {
		match self.types.get(&id)? {
			TypeDef::Variant { variants } =>
				Some(dense_names(variants.iter().map(|(index, name)| (*index, name.as_str())))),
			TypeDef::Other => None,
		}
	}
}

fn decode_registry(
	reader: &mut ScaleReader,
	diagnostics: &mut Vec<String>,
	verbose: bool,
) -> Result<PortableGraph, ReadError> {
	let count = reader.compact_len()?;
	if verbose {
		debug!("metadata: registry declares {count} types");
	}
	let mut types = BTreeMap::new();
	let mut consecutive_failures = 0;

	for ordinal in 0..count {
		if consecutive_failures >= MAX_CONSECUTIVE_TYPE_FAILURES {
			note(
				diagnostics,
				verbose,
				format!(
					"type registry: giving up after {consecutive_failures} consecutive failures, {} types dropped",
					count - ordinal
				),
			);
			break
		}
		let start = reader.offset();
		match decode_portable_type(reader) {
			Ok((id, def)) => {
				types.insert(id, def);
				consecutive_failures = 0;
			},
			Err(err) => {
				note(diagnostics, verbose, format!("type {ordinal} at offset {start}: {err}"));
				types.insert(ordinal, TypeDef::Other);
				consecutive_failures += 1;
				if !resync_to_type(reader, count) {
					note(
						diagnostics,
						verbose,
						format!(
							"type registry: no plausible type header within {RESYNC_WINDOW} bytes, {} types dropped",
							count - ordinal - 1
						),
					);
					break
				}
			},
		}
	}

	Ok(PortableGraph { types })
}

fn decode_portable_type(reader: &mut ScaleReader) -> Result<(u32, TypeDef), TypeParseError> {
	let id = reader.compact_u32()?;
	skip_text_vec(reader)?; // path

	let params = reader.compact_len()?;
	for _ in 0..params {
		reader.text()?; // parameter name
		reader.option(|r| r.compact_u32())?; // parameter type
		// Some chains append a type name per parameter, some do not.
		// An option tag is the only thing that starts with 0x00/0x01
		// here, so peek decides.
		if matches!(reader.peek(), Ok(0) | Ok(1)) {
			reader.option(|r| r.text())?;
		}
	}

	let tag_offset = reader.offset();
	let tag = reader.u8()?;
	let def = match tag {
		// composite
		0 => {
			skip_fields(reader)?;
			TypeDef::Other
		},
		// variant: the case the pallet table is built from
		1 => {
			let n = reader.compact_len()?;
			let mut variants = Vec::with_capacity((n as usize).min(256));
			for _ in 0..n {
				let name = reader.text()?;
				skip_fields(reader)?;
				let index = reader.u8()?;
				skip_text_vec(reader)?; // variant docs
				variants.push((index, name));
			}
			TypeDef::Variant { variants }
		},
		// sequence, compact
		2 | 6 => {
			reader.compact_u32()?;
			TypeDef::Other
		},
		// array
		3 => {
			reader.u32_le()?;
			reader.compact_u32()?;
			TypeDef::Other
		},
		// tuple
		4 => {
			let n = reader.compact_len()?;
			for _ in 0..n {
				reader.compact_u32()?;
			}
			TypeDef::Other
		},
		// primitive
		5 => {
			reader.u8()?;
			TypeDef::Other
		},
		// bit sequence
		7 => {
			reader.compact_u32()?;
			reader.compact_u32()?;
			TypeDef::Other
		},
		// historic metadata compatibility marker, no payload
		8 => TypeDef::Other,
		tag => return Err(TypeParseError::UnknownTypeDef { tag, offset: tag_offset }),
	};
	skip_text_vec(reader)?; // type docs
	Ok((id, def))
}

/// `Vec<Field>` as used by composite and variant definitions.
fn skip_fields(reader: &mut ScaleReader) -> Result<(), ReadError> {
	let n = reader.compact_len()?;
	for _ in 0..n {
		reader.option(|r| r.text())?; // field name
		reader.compact_u32()?; // type id
		reader.option(|r| r.text())?; // type name
		skip_text_vec(reader)?; // docs
	}
	Ok(())
}

fn skip_text_vec(reader: &mut ScaleReader) -> Result<(), ReadError> {
	let n = reader.compact_len()?;
	for _ in 0..n {
		reader.text()?;
	}
	Ok(())
}

fn decode_pallets(
	reader: &mut ScaleReader,
	graph: &PortableGraph,
	diagnostics: &mut Vec<String>,
	verbose: bool,
) -> Vec<PalletMetadata> {
	let count = match reader.compact_len() {
		Ok(count) => count as usize,
		Err(err) => {
			note(diagnostics, verbose, format!("pallet table length unreadable: {err}"));
			return Vec::new()
		},
	};
	if verbose {
		debug!("metadata: {count} pallet records");
	}

	let mut pallets = Vec::with_capacity(count.min(256));
	for ordinal in 0..count {
		let start = reader.offset();
		match decode_pallet_record(reader, graph) {
			Ok(pallet) => {
				if verbose {
					debug!("metadata: pallet {} index {}", pallet.name, pallet.index);
				}
				pallets.push(pallet);
			},
			Err(err) => {
				note(diagnostics, verbose, format!("pallet {ordinal} at offset {start}: {err}"));
				pallets.push(PalletMetadata::placeholder(ordinal));
				if !resync_to_pallet(reader) {
					if ordinal + 1 < count {
						note(
							diagnostics,
							verbose,
							format!(
								"pallet table: no plausible record within {RESYNC_WINDOW} bytes, {} records dropped",
								count - ordinal - 1
							),
						);
					}
					break
				}
			},
		}
	}
	pallets
}

/// One pallet record. The name and the trailing index are required; the
/// fields between them are read with per-step tolerance so that a
/// corrupt storage or constants block does not take the record down.
fn decode_pallet_record(
	reader: &mut ScaleReader,
	graph: &PortableGraph,
) -> Result<PalletMetadata, RecordError> {
	let name = reader.text()?;

	tolerant(reader, skip_storage);
	let calls_ty = tolerant(reader, |r| r.option(|r| r.compact_u32()).map_err(Into::into)).flatten();
	let events_ty =
		tolerant(reader, |r| r.option(|r| r.compact_u32()).map_err(Into::into)).flatten();
	tolerant(reader, skip_constants);
	tolerant(reader, skip_errors);

	let index = reader.u8()?;

	// v15 and later append pallet docs; v14 does not. Try and restore.
	tolerant(reader, |r| skip_text_vec(r).map_err(Into::into));

	Ok(PalletMetadata {
		name,
		index,
		calls: calls_ty.and_then(|id| graph.variant_names(id)),
		events: events_ty.and_then(|id| graph.variant_names(id)),
	})
}

/// Run one record step; on failure restore the cursor to where the step
/// began so the following steps read from a known position.
fn tolerant<T>(
	reader: &mut ScaleReader,
	step: impl FnOnce(&mut ScaleReader) -> Result<T, RecordError>,
) -> Option<T> {
	let start = reader.offset();
	match step(reader) {
		Ok(value) => Some(value),
		Err(_) => {
			reader.seek_to(start);
			None
		},
	}
}

/// `Option<StorageMetadata>`. Nothing of it is kept; the point is to
/// consume exactly the right number of bytes. The block ends after the
/// entries vec; there is no trailing flag byte.
fn skip_storage(reader: &mut ScaleReader) -> Result<(), RecordError> {
	let tag_offset = reader.offset();
	match reader.u8()? {
		0 => return Ok(()),
		1 => {},
		tag => return Err(ReadError::InvalidOptionTag { tag, offset: tag_offset }.into()),
	}
	reader.text()?; // prefix
	let entries = reader.compact_len()?;
	for _ in 0..entries {
		skip_storage_entry(reader)?;
	}
	Ok(())
}

fn skip_storage_entry(reader: &mut ScaleReader) -> Result<(), RecordError> {
	reader.text()?; // entry name
	reader.u8()?; // modifier
	let kind_offset = reader.offset();
	match reader.u8()? {
		// plain: value type
		0 => {
			reader.compact_u32()?;
		},
		// map / n-map: hashers, key type, value type
		1 | 2 => {
			reader.skip_bytes()?;
			reader.compact_u32()?;
			reader.compact_u32()?;
		},
		kind => return Err(RecordError::UnknownStorageKind { kind, offset: kind_offset }),
	}
	reader.skip_bytes()?; // fallback value
	skip_text_vec(reader)?; // docs
	Ok(())
}

fn skip_constants(reader: &mut ScaleReader) -> Result<(), RecordError> {
	let n = reader.compact_len()?;
	for _ in 0..n {
		reader.text()?; // name
		reader.compact_u32()?; // type id
		reader.skip_bytes()?; // value
		skip_text_vec(reader)?; // docs
	}
	Ok(())
}

/// The errors field changed shape across versions: an option over a
/// type id on current chains, a bare vec of error records on older
/// ones. The leading byte tells them apart.
fn skip_errors(reader: &mut ScaleReader) -> Result<(), RecordError> {
	match reader.peek()? {
		0 => {
			reader.u8()?;
		},
		1 => {
			reader.u8()?;
			reader.compact_u32()?;
		},
		_ => {
			let n = reader.compact_len()?;
			for _ in 0..n {
				reader.text()?; // error name
				skip_text_vec(reader)?; // docs
			}
		},
	}
	Ok(())
}

/// Probe forward for something that looks like the start of a type
/// record: a compact id within the declared count followed by a short
/// compact path length. Best effort; gives up after [`RESYNC_WINDOW`].
fn resync_to_type(reader: &mut ScaleReader, type_count: u32) -> bool {
	let from = reader.offset();
	let end = (from + RESYNC_WINDOW).min(reader.len());
	for pos in from..end {
		let mut probe = reader.clone();
		probe.seek_to(pos);
		let Ok(id) = probe.compact_u32() else { continue };
		if id >= type_count {
			continue
		}
		let Ok(path_len) = probe.compact_u32() else { continue };
		if path_len <= 32 {
			reader.seek_to(pos);
			return true
		}
	}
	false
}

/// Probe forward for something that looks like the start of a pallet
/// record: a short identifier-shaped name text.
fn resync_to_pallet(reader: &mut ScaleReader) -> bool {
	let from = reader.offset();
	let end = (from + RESYNC_WINDOW).min(reader.len());
	for pos in from..end {
		let mut probe = reader.clone();
		probe.seek_to(pos);
		let Ok(name) = probe.text() else { continue };
		if !name.is_empty()
			&& name.len() <= 48
			&& name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
		{
			reader.seek_to(pos);
			return true
		}
	}
	false
}
