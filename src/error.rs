
use std::io;

use thiserror::Error;

/// Errors returned by the decoder and the instrument drivers.
///
/// The wire-level modules (`xdr`, `rpc`, `vxi11`, `transport`) report `io::Error` and get folded
/// into `Error::Io` at the driver boundary.
#[derive(Debug, Error)]
pub enum Error {
	/// A numeric reply or a block header could not be interpreted.
	#[error("unable to parse {what} from {text:?}")]
	Parse { what: &'static str, text: String },

	/// The buffer holds fewer sample bytes than were declared or requested.
	#[error("insufficient data: {declared} bytes declared but only {available} available")]
	InsufficientData { declared: usize, available: usize },

	/// A scale factor that has to be strictly positive isn't.
	#[error("invalid scaling: {name} must be positive and finite, got {value}")]
	InvalidScaling { name: &'static str, value: f64 },

	/// The instrument answered, but not in a way the driver can accept.
	#[error("instrument error: {0}")]
	Instrument(String),

	#[error("configuration error: {0}")]
	Config(String),

	#[error(transparent)]
	Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
	pub(crate) fn parse(what:&'static str, text:&str) -> Self {
		Error::Parse{ what, text: text.to_owned() }
	}

	pub(crate) fn instrument(msg:impl Into<String>) -> Self { Error::Instrument(msg.into()) }
}

// Failures of the underlying reader or writer stay I/O errors; everything else is bad JSON
impl From<serde_json::Error> for Error {
	fn from(e:serde_json::Error) -> Self {
		if e.is_io() { Error::Io(io::Error::from(e)) }
		else { Error::Config(e.to_string()) }
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::{ErrorKind, Write};

	struct FullDisk;

	impl Write for FullDisk {
		fn write(&mut self, _:&[u8]) -> io::Result<usize> { Err(io::Error::new(ErrorKind::Other, "no space left on device")) }
		fn flush(&mut self) -> io::Result<()> { Ok(()) }
	}

	#[test]
	fn json_write_failure_is_io() {
		let e:Error = serde_json::to_writer(FullDisk, &[1.0, 2.0]).unwrap_err().into();
		assert!(matches!(e, Error::Io(_)));
	}

	#[test]
	fn malformed_json_is_config() {
		let e:Error = serde_json::from_str::<Vec<f64>>("[1.0,").unwrap_err().into();
		assert!(matches!(e, Error::Config(_)));
	}
}
