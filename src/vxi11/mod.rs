
// Device core
pub const DEVICE_CORE_PROG:u32  = 0x0607af;
pub const DEVICE_CORE_VERS:u32  = 1;
pub const CREATE_LINK:u32       = 10;
pub const DEVICE_WRITE:u32      = 11;
pub const DEVICE_READ:u32       = 12;
pub const DEVICE_CLEAR:u32      = 15;
pub const DESTROY_LINK:u32      = 23;

pub const CLIENT_ID:i32 = 3333;
pub const DEFAULT_LOCK_TIMEOUT:u32 = 10000;
pub const DEFAULT_IO_TIMEOUT:u32 = 30000;
pub const DEFAULT_DEVICE_NAME:&str = "inst0";

pub const OPERATION_FLAGS_END_ONLY:i32 = 8;

// Reason bits in a device_read reply
pub const REASON_REQCNT:i32 = 1;
pub const REASON_CHR:i32    = 2;
pub const REASON_END:i32    = 4;

use std::io::{self, Error, ErrorKind};
use std::ops::Drop;

use log::{debug, info, warn};

use crate::rpc::port_mapping::{TcpPortMapperClient, Mapping, Protocol};
use crate::rpc::tcp_clients::TcpClient;
use crate::transport::Transport;

fn err(msg:&str) -> io::Error { Error::new(ErrorKind::Other, msg) }

pub mod xdr_pack;

/// Maps a VXI-11 device_error code to an io::Error
pub fn device_error(code:i32) -> io::Result<()> {
	match code {
		0  => Ok(()),
		1  => Err(err("Syntax error")),
		3  => Err(err("Device not accessible")),
		4  => Err(err("Invalid link identifier")),
		5  => Err(err("Parameter error")),
		6  => Err(err("Channel not established")),
		8  => Err(err("Operation not supported")),
		9  => Err(err("Out of resources")),
		11 => Err(err("Device locked by another link")),
		12 => Err(err("No lock held by this link")),
		15 => Err(Error::new(ErrorKind::TimedOut, "I/O timeout")),
		17 => Err(err("I/O error")),
		21 => Err(err("Invalid address")),
		23 => Err(err("Abort")),
		29 => Err(err("Channel already established")),
		_  => Err(Error::new(ErrorKind::Other, format!("Unknown VXI-11 error code {}", code))),
	}
}

pub struct Link {
	pub link_id: i32,
	pub abort_port: u32,
	pub max_recv_size: u32,
}

pub struct CoreClient {
	client: TcpClient,
	opt_link: Option<Link>,
}

impl CoreClient {

	fn get_link(&self) -> io::Result<i32> {
		match self.opt_link {
			Some(Link{ link_id, .. }) => Ok(link_id),
			None => Err(err("No link")),
		}
	}

	pub fn new(host:&str) -> io::Result<Self> {

		// Find the port to use for the core program
		let mut pmap_client = TcpPortMapperClient::new(host)?;

		let mapping = Mapping {
			program: DEVICE_CORE_PROG,
			version: DEVICE_CORE_VERS,
			protocol: Protocol::TCP,
			port: 0,
		};

		let port:u16 = pmap_client.get_port(&mapping)?;
		let client = TcpClient::connect((host, port), DEVICE_CORE_PROG, DEVICE_CORE_VERS)?;

		info!("VXI-11 core channel to {} on port {}", host, port);
		Ok(CoreClient{ client, opt_link: None })
	}

	/// Connects and creates a link to the default `inst0` device in one step.
	pub fn open(host:&str) -> io::Result<Self> {
		let mut core = Self::new(host)?;
		core.create_link(DEFAULT_DEVICE_NAME)?;
		Ok(core)
	}

	pub fn create_link(&mut self, device:&str) -> io::Result<()> {
		if self.opt_link.is_some() {
			return Err(err("Already connected to a link"));
		}

		self.client.start_call(CREATE_LINK)?;
		xdr_pack::pack_create_link_parms(&mut self.client.packer, CLIENT_ID, false, DEFAULT_LOCK_TIMEOUT, device)?;
		self.client.do_call()?;

		let error:i32         = self.client.unpacker.unpack_i32()?;
		let link_id:i32       = self.client.unpacker.unpack_i32()?;
		let abort_port:u32    = self.client.unpacker.unpack_u32()?;
		let max_recv_size:u32 = self.client.unpacker.unpack_u32()?;

		device_error(error)?;

		debug!("created link {} to {} (max_recv_size={})", link_id, device, max_recv_size);
		self.opt_link = Some(Link{ link_id, abort_port, max_recv_size });
		Ok(())
	}

	pub fn destroy_link(&mut self) -> io::Result<()> {
		let link_id:i32 = self.get_link()?;

		self.client.start_call(DESTROY_LINK)?;
		xdr_pack::pack_device_link(&mut self.client.packer, link_id)?;
		self.client.do_call()?;
		self.opt_link = None;

		device_error(self.client.unpacker.unpack_i32()?)
	}

	pub fn clear(&mut self) -> io::Result<()> {
		let link_id:i32 = self.get_link()?;

		self.client.start_call(DEVICE_CLEAR)?;
		xdr_pack::pack_device_generic_parms(&mut self.client.packer, link_id, 0, DEFAULT_LOCK_TIMEOUT, DEFAULT_IO_TIMEOUT)?;
		self.client.do_call()?;

		device_error(self.client.unpacker.unpack_i32()?)
	}

	fn write_chunk(&mut self, link_id:i32, chunk:&[u8], flags:i32) -> io::Result<()> {
		self.client.start_call(DEVICE_WRITE)?;
		xdr_pack::pack_device_write_parms(&mut self.client.packer, link_id, DEFAULT_IO_TIMEOUT, DEFAULT_LOCK_TIMEOUT, flags, chunk)?;
		self.client.do_call()?;

		let error:i32 = self.client.unpacker.unpack_i32()?;
		let size:u32  = self.client.unpacker.unpack_u32()?;
		device_error(error)?;

		if size as usize != chunk.len() {
			return Err(err("Number of bytes in confirmation doesn't match number of bytes sent"));
		}
		Ok(())
	}

	fn read_chunk(&mut self, link_id:i32) -> io::Result<(i32, Vec<u8>)> {
		self.client.start_call(DEVICE_READ)?;
		xdr_pack::pack_device_read_parms(&mut self.client.packer, link_id, u32::MAX, DEFAULT_IO_TIMEOUT, DEFAULT_LOCK_TIMEOUT, 0, 0)?;
		self.client.do_call()?;

		let error:i32    = self.client.unpacker.unpack_i32()?;
		let reason:i32   = self.client.unpacker.unpack_i32()?;
		let data:Vec<u8> = self.client.unpacker.unpack_variable_len_opaque()?;
		device_error(error)?;

		Ok((reason, data))
	}

}

impl Transport for CoreClient {

	fn write(&mut self, data:&[u8]) -> io::Result<()> {
		let link_id:i32 = self.get_link()?;
		let max:usize = match self.opt_link {
			Some(Link{ max_recv_size, .. }) if max_recv_size > 0 => max_recv_size as usize,
			_ => data.len().max(1),
		};

		// The END flag only goes on the last piece of a message
		let n_chunks:usize = ((data.len() + max - 1) / max).max(1);
		for (idx, chunk) in data.chunks(max).enumerate() {
			let flags:i32 = if idx + 1 == n_chunks { OPERATION_FLAGS_END_ONLY } else { 0 };
			self.write_chunk(link_id, chunk, flags)?;
		}
		if data.is_empty() {
			self.write_chunk(link_id, data, OPERATION_FLAGS_END_ONLY)?;
		}
		Ok(())
	}

	// Large transfers (waveforms) arrive in several device_read replies; keep reading until the
	// device marks the end of the message
	fn read(&mut self) -> io::Result<Vec<u8>> {
		let link_id:i32 = self.get_link()?;
		let mut ans:Vec<u8> = vec![];

		loop {
			let (reason, mut data) = self.read_chunk(link_id)?;
			ans.append(&mut data);

			if reason & REASON_END != 0 {
				return Ok(ans);
			}
			if reason & !(REASON_REQCNT | REASON_CHR) != 0 {
				return Err(err("Bits in reason code that should be zero aren't zero"));
			}
		}
	}

}

impl Drop for CoreClient {

	fn drop(&mut self) {
		if self.opt_link.is_some() {
			if let Err(e) = self.destroy_link() {
				warn!("unable to destroy VXI-11 link: {}", e);
			}
		}
	}

}
