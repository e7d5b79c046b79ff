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

//! Follows chain heads and prints the identity of every extrinsic.
//!
//! The endpoint is taken from the first argument, the `QAPI_URL`
//! environment variable, or falls back to a local node.

use log::warn;
use qapi::{
	rpc::{HandleSubscription, TungsteniteRpcClient},
	Api, GetChainInfo, SubscribeChain,
};

fn main() {
	env_logger::init();

	let url = std::env::args()
		.nth(1)
		.or_else(|| std::env::var("QAPI_URL").ok())
		.unwrap_or_else(|| "ws://127.0.0.1:9944".to_string());

	let client = TungsteniteRpcClient::new(&url, 3).expect("could not connect to the node");
	let api = Api::new(client.clone()).expect("could not initialize the api");

	let runtime = api.runtime_info();
	println!("connected to {url}: runtime {} v{}", runtime.spec_name, runtime.spec_version);
	match api.metadata() {
		Some(metadata) => {
			println!("pallet table ready: {} pallets (metadata v{})",
				metadata.pallets().len(),
				metadata.version());
			log::debug!("{}", metadata.pretty_format());
		},
		None => println!("no pallet table available, extrinsics will print as unknown()"),
	}

	let mut heads = api.subscribe_new_heads().expect("could not subscribe to new heads");
	while let Some(header) = heads.next() {
		let header = match header {
			Ok(header) => header,
			Err(err) => {
				warn!("skipping undecodable head: {err}");
				continue
			},
		};
		let head = match api.resolve_head(&header) {
			Ok(head) => head,
			Err(err) => {
				warn!("could not resolve head: {err:?}");
				continue
			},
		};
		println!("block #{} {}", head.number, head.hash);

		let block = match api.get_block(&head.hash) {
			Ok(block) => block,
			Err(err) => {
				warn!("could not fetch block {}: {err:?}", head.hash);
				continue
			},
		};
		for (i, extrinsic) in block.extrinsics.iter().enumerate() {
			match api.decode_extrinsic_name(extrinsic, Some(&head.hash)) {
				Ok(identity) => println!("  #{i}: {identity}"),
				Err(err) => warn!("  #{i}: malformed extrinsic hex: {err:?}"),
			}
		}
	}

	client.close();
}
