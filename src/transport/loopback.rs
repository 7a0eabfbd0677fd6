
use std::collections::VecDeque;
use std::io::{self, Error, ErrorKind};

use super::Transport;

/// A scripted instrument: replies are handed out in the order they were queued and every write is
/// recorded, so driver logic can be exercised without hardware.
#[derive(Debug, Default)]
pub struct Loopback {
	sent: Vec<Vec<u8>>,
	replies: VecDeque<Vec<u8>>,
}

impl Loopback {

	pub fn new() -> Self { Self::default() }

	pub fn reply<B: Into<Vec<u8>>>(mut self, data:B) -> Self {
		self.replies.push_back(data.into());
		self
	}

	pub fn push_reply<B: Into<Vec<u8>>>(&mut self, data:B) { self.replies.push_back(data.into()); }

	pub fn sent(&self) -> &[Vec<u8>] { &self.sent }

	pub fn sent_str(&self) -> Vec<String> {
		self.sent.iter().map(|s| String::from_utf8_lossy(s).into_owned()).collect()
	}

	pub fn pending_replies(&self) -> usize { self.replies.len() }

}

impl Transport for Loopback {

	fn write(&mut self, data:&[u8]) -> io::Result<()> {
		self.sent.push(data.to_vec());
		Ok(())
	}

	fn read(&mut self) -> io::Result<Vec<u8>> {
		self.replies.pop_front()
			.ok_or_else(|| Error::new(ErrorKind::TimedOut, "Loopback has no reply queued"))
	}

}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn replies_in_order() {
		let mut lb = Loopback::new().reply("first\n").reply(&b"second"[..]);
		assert_eq!(lb.ask_str("A?").unwrap(), "first");
		assert_eq!(lb.ask(b"B?").unwrap(), b"second");
		assert!(lb.read().is_err());
		assert_eq!(lb.sent_str(), vec!["A?", "B?"]);
	}
}
