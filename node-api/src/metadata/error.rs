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

use crate::reader::ReadError;

/// Terminal failure of a metadata decode: no normalization candidate
/// produced a usable pallet table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataDecodeError {
	/// The payload carried a recognizable version tag, but not one of
	/// the supported versions 14, 15, 16.
	#[error("unsupported metadata version {0}")]
	UnsupportedVersion(u8),
	/// Nothing in the payload looked like metadata.
	#[error("metadata bytes unparseable, payload starts with 0x{preview}")]
	Unparseable { preview: String },
}

/// Failure while decoding a single entry of the portable type registry.
/// These are recovered from; they surface only in the diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeParseError {
	#[error(transparent)]
	Read(#[from] ReadError),
	#[error("unknown type definition tag {tag} at offset {offset}")]
	UnknownTypeDef { tag: u8, offset: usize },
}

/// Failure while decoding a single pallet record. Recovered from with a
/// placeholder entry; surfaces only in the diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
	#[error(transparent)]
	Read(#[from] ReadError),
	#[error("unknown storage entry kind {kind} at offset {offset}")]
	UnknownStorageKind { kind: u8, offset: usize },
}
