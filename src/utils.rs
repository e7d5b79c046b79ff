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

//! Conversions between the `0x`-prefixed hex strings on the RPC
//! boundary and raw bytes.

pub trait FromHexString {
	fn from_hex(hex: &str) -> Result<Self, hex::FromHexError>
	where
		Self: Sized;
}

impl FromHexString for Vec<u8> {
	fn from_hex(hex: &str) -> Result<Self, hex::FromHexError> {
		let hexstr = hex.trim_matches('\"').trim_start_matches("0x");
		hex::decode(hexstr)
	}
}

pub trait ToHexString {
	fn to_hex(&self) -> String;
}

impl ToHexString for [u8] {
	fn to_hex(&self) -> String {
		format!("0x{}", hex::encode(self))
	}
}

impl ToHexString for Vec<u8> {
	fn to_hex(&self) -> String {
		self.as_slice().to_hex()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hex_round_trip_strips_prefix_and_quotes() {
		let bytes = Vec::from_hex("0x6d657461").unwrap();
		assert_eq!(bytes, b"meta");
		assert_eq!(Vec::from_hex("\"0x6d657461\"").unwrap(), b"meta");
		assert_eq!(bytes.to_hex(), "0x6d657461");
	}

	#[test]
	fn odd_length_hex_is_rejected() {
		assert!(Vec::from_hex("0xabc").is_err());
	}
}
