
extern crate byteorder;

use std::io::{self, Read, Write, Error, ErrorKind};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use byteorder::{BigEndian, WriteBytesExt, ReadBytesExt};
use log::debug;

use crate::xdr::{Packer, Unpacker};
use super::{xdr_pack, xdr_unpack};

pub const LAST_FRAGMENT:u32 = 0x8000_0000;
pub const DEFAULT_IO_TIMEOUT_SEC:u64 = 30;

// Record marking (RFC 5531 section 11): each fragment is preceded by a u32 whose top bit flags the
// last fragment of the record and whose lower 31 bits give the fragment length
pub fn write_record<W: Write>(w:&mut W, msg:&[u8]) -> io::Result<()> {
	let mut send_bytes:Vec<u8> = Vec::with_capacity(msg.len() + 4);
	send_bytes.write_u32::<BigEndian>(msg.len() as u32 | LAST_FRAGMENT)?;
	send_bytes.extend_from_slice(msg);
	w.write_all(&send_bytes)?;
	w.flush()
}

pub fn read_record<R: Read>(r:&mut R) -> io::Result<Vec<u8>> {
	let mut record:Vec<u8> = vec![];

	let mut last:bool = false;
	while !last {
		let x:u32 = r.read_u32::<BigEndian>()?;
		last = (x & LAST_FRAGMENT) != 0;

		let n:usize = (x & !LAST_FRAGMENT) as usize;
		let start:usize = record.len();
		record.resize(start + n, 0);
		r.read_exact(&mut record[start..])?;
	}

	Ok(record)
}

pub struct TcpClient {
	stream: TcpStream,
	pub prog: u32,
	pub vers: u32,
	pub lastxid: u32,
	pub packer: Packer,
	pub unpacker: Unpacker,
}

impl TcpClient {

	pub fn connect<A: ToSocketAddrs>(addr:A, prog:u32, vers:u32) -> io::Result<Self> {
		let stream = TcpStream::connect(addr)?;
		stream.set_read_timeout(Some(Duration::from_secs(DEFAULT_IO_TIMEOUT_SEC)))?;
		stream.set_nodelay(true)?;

		// Start from a random xid so replies meant for an earlier connection can't be mistaken for ours
		let lastxid:u32 = rand::random::<u32>() >> 1;

		Ok(Self{ stream, prog, vers, lastxid, packer: Packer::new(), unpacker: Unpacker::new() })
	}

	pub fn set_timeout(&mut self, timeout:Duration) -> io::Result<()> {
		self.stream.set_read_timeout(Some(timeout))
	}

	/// Clears the packer and writes the call header for procedure `prc`; arguments follow.
	pub fn start_call(&mut self, prc:u32) -> io::Result<()> {
		self.lastxid = self.lastxid.wrapping_add(1);
		self.packer.reset();
		xdr_pack::pack_callheader_no_auth(&mut self.packer, self.lastxid, self.prog, self.vers, prc)
	}

	/// Sends the packed call and leaves the unpacker positioned just after the reply header.
	pub fn do_call(&mut self) -> io::Result<()> {
		write_record(&mut self.stream, self.packer.as_bytes())?;

		loop {
			let reply:Vec<u8> = read_record(&mut self.stream)?;
			self.unpacker.reset(reply);

			let xid:u32 = xdr_unpack::unpack_replyheader(&mut self.unpacker)?;
			if xid == self.lastxid {
				return Ok(());
			} else if xid < self.lastxid {
				// Packet from the past
				debug!("discarding stale RPC reply xid={} (waiting for {})", xid, self.lastxid);
				continue;
			} else {
				return Err(Error::new(ErrorKind::Other, "Somehow got a packet from the future"));
			}
		}
	}

}
