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

//! Conversions for the hex-encoded numbers the node hands out over RPC.

/// Error when interpreting a string as a hex-encoded number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HexNumberError {
	#[error("empty hex number")]
	Empty,
	#[error("`{0}` is not a hex number")]
	InvalidDigit(String),
}

/// Parse a block number as reported in a header, e.g. `"0x38f6"`.
///
/// A missing `0x` prefix is tolerated since some tooling strips it.
pub fn from_hex_number(value: &str) -> Result<u64, HexNumberError> {
	let digits = value.trim_start_matches("0x");
	if digits.is_empty() {
		return Err(HexNumberError::Empty)
	}
	u64::from_str_radix(digits, 16).map_err(|_| HexNumberError::InvalidDigit(value.into()))
}
