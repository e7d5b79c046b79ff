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

//! Byte-level cursor over SCALE-encoded data.
//!
//! The metadata decoder leans on the error offsets reported here to
//! re-synchronize after a bad record, so every failure names the
//! operation that was attempted and where.

pub type Result<T> = core::result::Result<T, ReadError>;

/// Error while reading SCALE primitives from a byte slice.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
	#[error("unexpected end of input at offset {offset} while reading {op}")]
	OutOfBounds { op: &'static str, offset: usize },
	#[error("compact at offset {offset} is too wide for a length (first byte {first_byte:#04x})")]
	InvalidCompactMode { first_byte: u8, offset: usize },
	#[error("invalid option tag {tag:#04x} at offset {offset}")]
	InvalidOptionTag { tag: u8, offset: usize },
	#[error("text at offset {offset} is not valid utf-8")]
	InvalidUtf8 { offset: usize },
}

/// A cursor over an immutable byte slice.
#[derive(Debug, Clone)]
pub struct ScaleReader<'a> {
	data: &'a [u8],
	offset: usize,
}

impl<'a> ScaleReader<'a> {
	pub fn new(data: &'a [u8]) -> Self {
		Self { data, offset: 0 }
	}

	/// Current read position.
	pub fn offset(&self) -> usize {
		self.offset
	}

	/// Total length of the underlying slice.
	pub fn len(&self) -> usize {
		self.data.len()
	}

	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}

	pub fn remaining(&self) -> usize {
		self.data.len() - self.offset
	}

	/// Move the cursor to an absolute position, clamped to the end of
	/// the slice. Used to restore a known-good position after a
	/// tolerated failure and by the resync scanner.
	pub fn seek_to(&mut self, offset: usize) {
		self.offset = offset.min(self.data.len());
	}

	/// Read one byte without advancing.
	pub fn peek(&self) -> Result<u8> {
		self.data
			.get(self.offset)
			.copied()
			.ok_or(ReadError::OutOfBounds { op: "peek", offset: self.offset })
	}

	pub fn u8(&mut self) -> Result<u8> {
		let byte = self
			.data
			.get(self.offset)
			.copied()
			.ok_or(ReadError::OutOfBounds { op: "u8", offset: self.offset })?;
		self.offset += 1;
		Ok(byte)
	}

	pub fn u32_le(&mut self) -> Result<u32> {
		let bytes = self.bytes(4, "u32")?;
		Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
	}

	/// Return a view of the next `n` bytes and advance past them.
	pub fn bytes(&mut self, n: usize, op: &'static str) -> Result<&'a [u8]> {
		if self.remaining() < n {
			return Err(ReadError::OutOfBounds { op, offset: self.offset })
		}
		let slice = &self.data[self.offset..self.offset + n];
		self.offset += n;
		Ok(slice)
	}

	/// Decode a SCALE compact integer, narrowed to `u32`.
	///
	/// Big-integer mode is consumed in full but only the four low
	/// bytes contribute to the value.
	pub fn compact_u32(&mut self) -> Result<u32> {
		let start = self.offset;
		let b0 = self.data.get(start).copied().ok_or(ReadError::OutOfBounds {
			op: "compact",
			offset: start,
		})?;
		self.offset += 1;
		match b0 & 0b11 {
			0 => Ok(u32::from(b0) >> 2),
			1 => {
				let b1 = self.u8().map_err(|_| ReadError::OutOfBounds {
					op: "compact",
					offset: start,
				})?;
				Ok((u32::from(b0) >> 2) | (u32::from(b1) << 6))
			},
			2 => {
				let rest = self.bytes(3, "compact").map_err(|_| ReadError::OutOfBounds {
					op: "compact",
					offset: start,
				})?;
				Ok((u32::from(b0) >> 2)
					| (u32::from(rest[0]) << 6)
					| (u32::from(rest[1]) << 14)
					| (u32::from(rest[2]) << 22))
			},
			_ => {
				let n = usize::from(b0 >> 2) + 4;
				let payload = self.bytes(n, "compact").map_err(|_| ReadError::OutOfBounds {
					op: "compact",
					offset: start,
				})?;
				let mut value: u32 = 0;
				for (i, byte) in payload.iter().take(4).enumerate() {
					value |= u32::from(*byte) << (8 * i);
				}
				Ok(value)
			},
		}
	}

	/// Like [`compact_u32`](Self::compact_u32) but for values that serve
	/// as lengths. A big-integer compact wider than four payload bytes
	/// cannot be a sane length and is rejected, which lets tolerant
	/// callers bail out at the point of corruption instead of looping
	/// over a garbage count.
	pub fn compact_len(&mut self) -> Result<u32> {
		let start = self.offset;
		let b0 = self.peek().map_err(|_| ReadError::OutOfBounds {
			op: "length",
			offset: start,
		})?;
		if b0 & 0b11 == 0b11 && b0 >> 2 != 0 {
			return Err(ReadError::InvalidCompactMode { first_byte: b0, offset: start })
		}
		self.compact_u32()
	}

	/// Compact length followed by that many bytes of strict UTF-8.
	pub fn text(&mut self) -> Result<String> {
		let len = self.compact_len()? as usize;
		let start = self.offset;
		let bytes = self.bytes(len, "text")?;
		String::from_utf8(bytes.to_vec()).map_err(|_| ReadError::InvalidUtf8 { offset: start })
	}

	/// Compact length followed by `len` invocations of `elem`.
	pub fn vec<T>(&mut self, mut elem: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
		let len = self.compact_len()? as usize;
		let mut out = Vec::with_capacity(len.min(1024));
		for _ in 0..len {
			out.push(elem(self)?);
		}
		Ok(out)
	}

	/// One-byte tag, then the payload for tag 1. Tags other than 0 and 1
	/// are an error.
	pub fn option<T>(&mut self, elem: impl FnOnce(&mut Self) -> Result<T>) -> Result<Option<T>> {
		let start = self.offset;
		match self.u8().map_err(|_| ReadError::OutOfBounds { op: "option", offset: start })? {
			0 => Ok(None),
			1 => elem(self).map(Some),
			tag => Err(ReadError::InvalidOptionTag { tag, offset: start }),
		}
	}

	/// Compact length, then forward-seek over that many bytes.
	pub fn skip_bytes(&mut self) -> Result<()> {
		let len = self.compact_len()? as usize;
		if self.remaining() < len {
			return Err(ReadError::OutOfBounds { op: "bytes", offset: self.offset })
		}
		self.offset += len;
		Ok(())
	}
}
