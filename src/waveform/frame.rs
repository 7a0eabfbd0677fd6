
// Locating the sample bytes inside a waveform transfer.
//
// Siglent scopes answer a waveform query with an IEEE 488.2 definite-length block, optionally
// preceded by an echo of the query:
//
//     C1:WF DAT2,#9000001000<1000 sample bytes>\n\n
//
// '#' is the marker, the next byte is the number of length digits and the digits give the payload
// length in bytes.

use log::{debug, warn};

use crate::error::{Error, Result};

pub const BLOCK_MARKER:u8 = b'#';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
	pub payload_offset: usize,
	pub payload_len: usize,
}

impl BlockHeader {
	pub fn payload_end(&self) -> usize { self.payload_offset + self.payload_len }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
	/// Length-prefixed block anywhere in the buffer; whatever follows the payload is ignored.
	DefiniteBlock,
	/// Known header length and trailing terminator length, as used by the DAT2 register transfer.
	FixedHeader { header_len: usize, trailer_len: usize },
	/// The buffer is already just samples.
	Stripped,
}

/// One waveform capture as received from the transport, before any scaling.
#[derive(Debug, Clone, Copy)]
pub struct AcquisitionFrame<'a> {
	pub raw: &'a [u8],
	pub framing: Framing,
	pub expected_points: Option<usize>,
}

impl<'a> AcquisitionFrame<'a> {
	pub fn new(raw:&'a [u8], framing:Framing) -> Self { Self{ raw, framing, expected_points: None } }

	pub fn expecting(mut self, points:usize) -> Self {
		self.expected_points = Some(points);
		self
	}

	pub fn samples(&self) -> Result<&'a [u8]> { extract_samples(self.raw, self.framing, self.expected_points) }
}

/// Parses the definite-length block header that starts at the first '#' in `buf`.
///
/// A header cut short fails with `InsufficientData`, a header with non-digit characters in the
/// count or length fields fails with `Parse`. Indefinite-length blocks ("#0") aren't used by the
/// instruments we support and are rejected.
pub fn block_header(buf:&[u8]) -> Result<BlockHeader> {
	let start:usize = buf.iter().position(|b| *b == BLOCK_MARKER)
		.ok_or_else(|| Error::parse("block marker", &String::from_utf8_lossy(prefix(buf))))?;

	let count_byte:u8 = match buf.get(start + 1) {
		Some(b) => *b,
		None => return Err(Error::InsufficientData{ declared: start + 2, available: buf.len() }),
	};

	let n_digits:usize = match count_byte {
		b'1'..=b'9' => (count_byte - b'0') as usize,
		_ => return Err(Error::parse("block length digit count", &String::from_utf8_lossy(&buf[start..start + 2]))),
	};

	let digits_start:usize = start + 2;
	let payload_offset:usize = digits_start + n_digits;
	if buf.len() < payload_offset {
		return Err(Error::InsufficientData{ declared: payload_offset, available: buf.len() });
	}

	let digits:&[u8] = &buf[digits_start..payload_offset];
	let text:String = String::from_utf8_lossy(digits).into_owned();
	if !digits.iter().all(|b| b.is_ascii_digit()) {
		return Err(Error::parse("block length", &text));
	}
	let payload_len:usize = text.parse::<usize>().map_err(|_| Error::parse("block length", &text))?;

	Ok(BlockHeader{ payload_offset, payload_len })
}

fn prefix(buf:&[u8]) -> &[u8] { &buf[..buf.len().min(32)] }

pub fn extract_samples(raw:&[u8], framing:Framing, expected:Option<usize>) -> Result<&[u8]> {
	let payload:&[u8] = match framing {
		Framing::DefiniteBlock => {
			let header:BlockHeader = block_header(raw)?;
			let available:usize = raw.len() - header.payload_offset;
			if header.payload_len > available {
				return Err(Error::InsufficientData{ declared: header.payload_len, available });
			}
			if raw.len() > header.payload_end() + 2 {
				warn!("{} unexpected bytes after waveform block", raw.len() - header.payload_end());
			}
			&raw[header.payload_offset..header.payload_end()]
		},
		Framing::FixedHeader{ header_len, trailer_len } => {
			if raw.len() < header_len + trailer_len {
				return Err(Error::InsufficientData{ declared: header_len + trailer_len, available: raw.len() });
			}
			let body:&[u8] = &raw[header_len..(raw.len() - trailer_len)];

			// The fixed header normally carries the block length too, in which case it wins
			match block_header(&raw[..header_len]) {
				Ok(h) if h.payload_offset == header_len => {
					if h.payload_len > body.len() {
						return Err(Error::InsufficientData{ declared: h.payload_len, available: body.len() });
					}
					&body[..h.payload_len]
				},
				_ => {
					debug!("no block length inside the {} byte header, using the whole body", header_len);
					body
				},
			}
		},
		Framing::Stripped => raw,
	};

	match expected {
		Some(n) if n > payload.len() => Err(Error::InsufficientData{ declared: n, available: payload.len() }),
		Some(n) => Ok(&payload[..n]),
		None    => Ok(payload),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn block(prefix:&str, payload:&[u8], trailer:&[u8]) -> Vec<u8> {
		let len:String = payload.len().to_string();
		let mut ans:Vec<u8> = format!("{}#{}{}", prefix, len.len(), len).into_bytes();
		ans.extend_from_slice(payload);
		ans.extend_from_slice(trailer);
		ans
	}

	#[test]
	fn header_after_echoed_query() {
		let raw = b"C1:WF DAT2,#9000001000";
		let h = block_header(raw).unwrap();
		assert_eq!(h, BlockHeader{ payload_offset: 22, payload_len: 1000 });
	}

	#[test]
	fn definite_block_ignores_terminator() {
		let payload:Vec<u8> = (0..=255).collect();
		let raw = block("DAT2,", &payload, b"\n\n");
		let samples = extract_samples(&raw, Framing::DefiniteBlock, None).unwrap();
		assert_eq!(samples, &payload[..]);
	}

	#[test]
	fn declared_length_longer_than_buffer() {
		let mut raw:Vec<u8> = b"#41000".to_vec();
		raw.extend(std::iter::repeat(7u8).take(800));
		match extract_samples(&raw, Framing::DefiniteBlock, None) {
			Err(Error::InsufficientData{ declared, available }) => {
				assert_eq!(declared, 1000);
				assert_eq!(available, 800);
			},
			other => panic!("unexpected {:?}", other),
		}
	}

	#[test]
	fn truncated_and_malformed_headers() {
		assert!(matches!(block_header(b"C1:WF DAT2,#"), Err(Error::InsufficientData{ .. })));
		assert!(matches!(block_header(b"#9000"), Err(Error::InsufficientData{ .. })));
		assert!(matches!(block_header(b"#x123"), Err(Error::Parse{ .. })));
		assert!(matches!(block_header(b"#0abc"), Err(Error::Parse{ .. })));
		assert!(matches!(block_header(b"#312a"), Err(Error::Parse{ .. })));
		assert!(matches!(block_header(b"no marker here"), Err(Error::Parse{ .. })));
	}

	#[test]
	fn fixed_header_uses_embedded_length() {
		let payload = [1u8, 2, 3, 4, 5];
		let raw = block("DAT2,", &payload, b"\n\n");
		// "DAT2," + "#1" + "5"
		let framing = Framing::FixedHeader{ header_len: 8, trailer_len: 2 };
		assert_eq!(extract_samples(&raw, framing, None).unwrap(), &payload[..]);
	}

	#[test]
	fn fixed_header_without_length_field() {
		let mut raw:Vec<u8> = vec![0xAA; 15];
		raw.extend_from_slice(&[10, 20, 30]);
		raw.extend_from_slice(b"\n\n");
		let framing = Framing::FixedHeader{ header_len: 15, trailer_len: 2 };
		assert_eq!(extract_samples(&raw, framing, None).unwrap(), &[10, 20, 30]);
		assert!(matches!(extract_samples(&raw[..10], framing, None), Err(Error::InsufficientData{ .. })));
	}

	#[test]
	fn expected_points_trim_or_fail() {
		let raw = [9u8; 10];
		let frame = AcquisitionFrame::new(&raw, Framing::Stripped).expecting(4);
		assert_eq!(frame.samples().unwrap().len(), 4);

		let frame = AcquisitionFrame::new(&raw, Framing::Stripped).expecting(11);
		assert!(matches!(frame.samples(), Err(Error::InsufficientData{ declared: 11, available: 10 })));
	}
}
