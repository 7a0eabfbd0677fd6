
// The byte pipes the instrument drivers talk through.  A driver only needs to write a command and
// read back one complete message, so that's all a transport has to provide.

use std::io::{self, Error, ErrorKind};
use std::str;

use log::debug;

mod loopback;
mod serial;
mod socket;

pub use loopback::Loopback;
pub use serial::SerialClient;
pub use socket::SocketClient;

pub trait Transport {
	fn write(&mut self, data:&[u8]) -> io::Result<()>;

	/// Reads one complete message from the instrument.
	fn read(&mut self) -> io::Result<Vec<u8>>;

	fn ask(&mut self, data:&[u8]) -> io::Result<Vec<u8>> {
		self.write(data)?;
		self.read()
	}

	/// Sends a text command and returns the reply without its line terminator.
	fn ask_str(&mut self, cmd:&str) -> io::Result<String> {
		let resp:Vec<u8> = self.ask(cmd.as_bytes())?;
		let text:&str = str::from_utf8(&resp)
			.map_err(|_| Error::new(ErrorKind::InvalidData, "Unable to parse response as UTF-8"))?;
		debug!("{} -> {}", cmd, text.trim_end());
		Ok(text.trim_end().to_owned())
	}
}

impl<T: Transport + ?Sized> Transport for Box<T> {
	fn write(&mut self, data:&[u8]) -> io::Result<()> { (**self).write(data) }
	fn read(&mut self) -> io::Result<Vec<u8>> { (**self).read() }
}

// Appends the newline that SCPI-over-stream instruments use as the message terminator
pub(crate) fn terminated(data:&[u8]) -> Vec<u8> {
	let mut ans:Vec<u8> = data.to_vec();
	if ans.last() != Some(&b'\n') {
		ans.push(b'\n');
	}
	ans
}
