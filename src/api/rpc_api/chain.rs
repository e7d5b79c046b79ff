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

use crate::{
	api::{Api, Error, Result},
	rpc::{Request, Subscribe},
};
use log::debug;
use qapi_primitives::{from_hex_number, rpc_params, Block, BlockRef, BlockResponse, Header};
use std::{thread::sleep, time::Duration};

/// Additional attempts after the first `chain_getBlock` comes back
/// empty. On a fast chain the new-head notification can outrun block
/// import, so the block may not be retrievable right away.
const BLOCK_RETRY_ATTEMPTS: usize = 4;
const BLOCK_RETRY_DELAY: Duration = Duration::from_millis(150);

pub trait GetChainInfo {
	fn get_header(&self, hash: Option<&str>) -> Result<Option<Header>>;

	fn get_block_hash(&self, number: Option<u64>) -> Result<Option<String>>;

	/// Fetch a block by hash, riding out the import race. If the block
	/// stays empty through all retries, degrade to the bare header with
	/// no extrinsics.
	fn get_block(&self, hash: &str) -> Result<Block>;

	fn get_block_by_number(&self, number: u64) -> Result<Block>;

	/// Resolve a new-head notification to `{number, hash}`. The number
	/// comes from the hex header number; the hash is taken from the
	/// header when the node attaches one, otherwise looked up by
	/// number.
	fn resolve_head(&self, header: &Header) -> Result<BlockRef>;
}

impl<Client: Request> GetChainInfo for Api<Client> {
	fn get_header(&self, hash: Option<&str>) -> Result<Option<Header>> {
		let header = self.client().request("chain_getHeader", rpc_params![hash])?;
		Ok(header)
	}

	fn get_block_hash(&self, number: Option<u64>) -> Result<Option<String>> {
		let block_hash = self.client().request("chain_getBlockHash", rpc_params![number])?;
		Ok(block_hash)
	}

	fn get_block(&self, hash: &str) -> Result<Block> {
		for attempt in 0..=BLOCK_RETRY_ATTEMPTS {
			if attempt > 0 {
				sleep(BLOCK_RETRY_DELAY);
			}
			let response: core::result::Result<Option<BlockResponse>, _> =
				self.client().request("chain_getBlock", rpc_params![hash]);
			match response {
				Ok(Some(response)) =>
					if let Some(block) = response.into_block() {
						return Ok(block)
					},
				Ok(None) => {},
				Err(err) => debug!("chain_getBlock attempt {attempt} failed: {err}"),
			}
		}

		debug!("block {hash} unavailable after retries, degrading to header only");
		match self.get_header(Some(hash))? {
			Some(header) => Ok(Block { header, extrinsics: Vec::new() }),
			None => Err(Error::BlockUnavailable(hash.to_string())),
		}
	}

	fn get_block_by_number(&self, number: u64) -> Result<Block> {
		let hash = self.get_block_hash(Some(number))?.ok_or(Error::BlockHashNotFound)?;
		self.get_block(&hash)
	}

	fn resolve_head(&self, header: &Header) -> Result<BlockRef> {
		let number = from_hex_number(&header.number)
			.map_err(|_| Error::InvalidHead(header.number.clone()))?;
		let hash = match &header.hash {
			Some(hash) => hash.clone(),
			None => self
				.get_block_hash(Some(number))?
				.ok_or(Error::BlockHashNotFound)?,
		};
		Ok(BlockRef { number, hash })
	}
}

pub trait SubscribeChain {
	type Client: Subscribe;

	/// Subscribe to new chain heads. Unsubscribing the returned
	/// subscription issues `chain_unsubscribeNewHeads`.
	fn subscribe_new_heads(
		&self,
	) -> Result<<Self::Client as Subscribe>::Subscription<Header>>;
}

impl<Client: Subscribe> SubscribeChain for Api<Client> {
	type Client = Client;

	fn subscribe_new_heads(
		&self,
	) -> Result<<Self::Client as Subscribe>::Subscription<Header>> {
		debug!("subscribing to new heads");
		self.client()
			.subscribe("chain_subscribeNewHeads", rpc_params![], "chain_unsubscribeNewHeads")
			.map_err(|e| e.into())
	}
}
