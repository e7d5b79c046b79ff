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

//! Lightweight json-rpc client for Substrate-family nodes.
//!
//! Point it at a websocket endpoint and it keeps one multiplexed
//! connection, follows new chain heads, fetches blocks, and names each
//! extrinsic (`pallet.method`, signed or unsigned) from the chain's own
//! runtime metadata:
//!
//! ```no_run
//! use qapi::{Api, GetChainInfo, SubscribeChain, rpc::{HandleSubscription, TungsteniteRpcClient}};
//!
//! let client = TungsteniteRpcClient::new("ws://127.0.0.1:9944", 3).unwrap();
//! let api = Api::new(client).unwrap();
//!
//! let mut heads = api.subscribe_new_heads().unwrap();
//! while let Some(header) = heads.next() {
//!     let head = api.resolve_head(&header.unwrap()).unwrap();
//!     let block = api.get_block(&head.hash).unwrap();
//!     for extrinsic in &block.extrinsics {
//!         let identity = api.decode_extrinsic_name(extrinsic, Some(&head.hash)).unwrap();
//!         println!("{identity}");
//!     }
//! }
//! ```

pub use api::{
	Api, ApiOptions, Error, GetChainInfo, MetadataOptions, NamedIndex, PalletOverride, Result,
	RuntimeInfo, SignatureOverride, SubscribeChain, TableOverrides,
};
pub use utils::{FromHexString, ToHexString};

// Re-export the sibling crates under their package names, the way the
// examples consume them.
pub use qapi_node_api;
pub use qapi_primitives;

pub mod api;
pub mod rpc;
pub mod utils;
