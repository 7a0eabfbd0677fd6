
use std::io::{self, Read, Write, Error, ErrorKind};
use std::time::Duration;

use log::info;
use serialport::SerialPort;

use super::{Transport, terminated};

pub const DEFAULT_BAUD_RATE:u32 = 115200;
pub const DEFAULT_TIMEOUT_MS:u64 = 1000;

/// Newline-terminated text over a (USB) serial port
pub struct SerialClient {
	port: Box<dyn SerialPort>,
}

impl SerialClient {

	pub fn open(path:&str, baud_rate:u32, timeout:Duration) -> io::Result<Self> {
		let port = serialport::new(path, baud_rate).timeout(timeout).open()?;
		info!("opened serial port {} at {} baud", path, baud_rate);
		Ok(Self{ port })
	}

	pub fn open_default(path:&str) -> io::Result<Self> {
		Self::open(path, DEFAULT_BAUD_RATE, Duration::from_millis(DEFAULT_TIMEOUT_MS))
	}

}

impl Transport for SerialClient {

	fn write(&mut self, data:&[u8]) -> io::Result<()> {
		self.port.write_all(&terminated(data))?;
		self.port.flush()
	}

	fn read(&mut self) -> io::Result<Vec<u8>> {
		let mut ans:Vec<u8> = vec![];
		let mut byte:[u8; 1] = [0];

		loop {
			match self.port.read(&mut byte)? {
				0 => return Err(Error::new(ErrorKind::UnexpectedEof, "Serial port closed mid-reply")),
				_ if byte[0] == b'\n' => return Ok(ans),
				_ => ans.push(byte[0]),
			}
		}
	}

}
