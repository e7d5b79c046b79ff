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

pub use api_client::Api;
pub use error::{Error, Result};
pub use options::{
	ApiOptions, MetadataOptions, MetadataParser, NamedIndex, PalletOverride, SignatureOverride,
	TableOverrides,
};
pub use rpc_api::*;

pub mod api_client;
pub mod error;
pub mod options;
pub mod rpc_api;
