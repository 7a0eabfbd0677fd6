
use std::io::{self, Read, Write, Error, ErrorKind};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::info;

use crate::error;
use crate::waveform::frame;
use super::{Transport, terminated};

pub const DEFAULT_SCPI_PORT:u16 = 5025;
pub const DEFAULT_TIMEOUT_SEC:u64 = 5;
pub const DEFAULT_BUFFER_SIZE:usize = 4096;

/// Raw SCPI over a TCP socket, the way the Siglent "LAN" port (5025) expects it.
pub struct SocketClient {
	stream: TcpStream,
	buffer_size: usize,
}

/// True once `buf` holds a whole reply: a definite-length block plus its terminator, or a line of
/// text.  Blank lines left over from a previous block terminator don't count.
pub fn message_complete(buf:&[u8]) -> bool {
	let start:usize = match buf.iter().position(|b| !b.is_ascii_whitespace()) {
		Some(idx) => idx,
		None => return false,
	};
	let body:&[u8] = &buf[start..];

	match frame::block_header(body) {
		Ok(h) => body.len() > h.payload_end() && body.last() == Some(&b'\n'),
		Err(error::Error::InsufficientData{ .. }) => false,
		Err(_) => body.last() == Some(&b'\n'),
	}
}

impl SocketClient {

	pub fn connect<A: ToSocketAddrs>(addr:A) -> io::Result<Self> {
		let stream = TcpStream::connect(addr)?;
		stream.set_read_timeout(Some(Duration::from_secs(DEFAULT_TIMEOUT_SEC)))?;
		stream.set_nodelay(true)?;
		info!("SCPI socket connected to {}", stream.peer_addr()?);
		Ok(Self{ stream, buffer_size: DEFAULT_BUFFER_SIZE })
	}

	pub fn open(host:&str) -> io::Result<Self> { Self::connect((host, DEFAULT_SCPI_PORT)) }

	pub fn set_timeout(&mut self, timeout:Duration) -> io::Result<()> {
		self.stream.set_read_timeout(Some(timeout))
	}

}

impl Transport for SocketClient {

	fn write(&mut self, data:&[u8]) -> io::Result<()> {
		self.stream.write_all(&terminated(data))?;
		self.stream.flush()
	}

	fn read(&mut self) -> io::Result<Vec<u8>> {
		let mut ans:Vec<u8> = vec![];
		let mut chunk:Vec<u8> = vec![0; self.buffer_size];

		while !message_complete(&ans) {
			let n:usize = self.stream.read(&mut chunk)?;
			if n == 0 {
				return Err(Error::new(ErrorKind::UnexpectedEof, "Connection closed before the reply was complete"));
			}
			ans.extend_from_slice(&chunk[..n]);
		}

		Ok(ans)
	}

}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn text_line() {
		assert!(!message_complete(b""));
		assert!(!message_complete(b"\n"));
		assert!(!message_complete(b"C1:VDIV 5.00E-01"));
		assert!(message_complete(b"C1:VDIV 5.00E-01V\n"));
		assert!(message_complete(b"\nSARA 1.00GSa/s\n"));
	}

	#[test]
	fn block_with_newlines_inside() {
		let mut buf:Vec<u8> = b"#15".to_vec();
		buf.extend_from_slice(&[b'\n', 1, b'\n', 2, 3]);
		assert!(!message_complete(&buf));
		buf.push(b'\n');
		assert!(message_complete(&buf));
	}

	#[test]
	fn partial_header() {
		assert!(!message_complete(b"DAT2,#9000"));
	}
}
