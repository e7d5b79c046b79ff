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

//! Decodes what the node says about itself: the self-describing runtime
//! metadata, and the identity of the extrinsics found in blocks.

pub use extrinsics::*;
pub use metadata::{
	decode_metadata, dense_names, DecodedMetadata, Metadata, MetadataDecodeError, PalletMetadata,
};
pub use reader::{ReadError, ScaleReader};

pub mod extrinsics;
pub mod metadata;
pub mod reader;
