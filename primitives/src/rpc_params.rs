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

//! Positional JSON-RPC parameter builder.

use serde::Serialize;
use serde_json::Value;

/// Collects the positional parameters of a JSON-RPC request.
///
/// An empty builder produces no `params` value at all, which lets the
/// caller distinguish "no parameters" from an empty array.
#[derive(Debug, Clone, Default)]
pub struct RpcParams {
	values: Vec<Value>,
}

impl RpcParams {
	/// Construct a new [`RpcParams`].
	pub fn new() -> Self {
		Self::default()
	}

	/// Append a plain value to the parameter list.
	pub fn insert<P: Serialize>(&mut self, value: P) -> Result<(), serde_json::Error> {
		self.values.push(serde_json::to_value(value)?);
		Ok(())
	}

	/// Finish the building process and return the JSON array as a string,
	/// or `None` if no parameter was inserted.
	pub fn build(self) -> Option<String> {
		self.into_value().map(|v| v.to_string())
	}

	/// Finish the building process and return the JSON array value,
	/// or `None` if no parameter was inserted.
	pub fn into_value(self) -> Option<Value> {
		if self.values.is_empty() {
			None
		} else {
			Some(Value::Array(self.values))
		}
	}
}

/// Convenience macro to build [`RpcParams`] from a list of serializable values.
#[macro_export]
macro_rules! rpc_params {
	($($param:expr),* $(,)?) => {{
		#[allow(unused_mut)]
		let mut params = $crate::RpcParams::new();
		$(
			if let Err(err) = params.insert($param) {
				panic!("parameter `{}` cannot be serialized: {:?}", stringify!($param), err);
			}
		)*
		params
	}};
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_params_build_to_none() {
		assert_eq!(RpcParams::new().build(), None);
		assert_eq!(rpc_params![].build(), None);
	}

	#[test]
	fn params_build_to_json_array() {
		let mut params = RpcParams::new();
		params.insert("0xdeadbeef").unwrap();
		params.insert(42u32).unwrap();
		assert_eq!(params.build().unwrap(), r#"["0xdeadbeef",42]"#);
	}

	#[test]
	fn macro_matches_manual_builder() {
		let params = rpc_params![Some("0x00"), 7u64];
		assert_eq!(params.build().unwrap(), r#"["0x00",7]"#);
	}
}
