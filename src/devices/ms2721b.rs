
use std::thread;
use std::time::Duration;

use log::info;

use crate::error::{Error, Result};
use crate::numeric::parse_numeric;
use crate::transport::Transport;
use crate::vxi11::CoreClient;

pub const DEFAULT_TX_THROTTLE_DURATION_SEC:f32 = 0.05;
pub const MARKER_COUNT:u8 = 4;

/// Anritsu MS2721B handheld spectrum analyzer
pub struct MS2721B<T: Transport> {
	transport: T,
	tx_throttle_duration: Duration,
}

pub fn marker_ok(n:u8) -> Result<()> {
	if n == 0 || n > MARKER_COUNT { Err(Error::instrument(format!("MS2721B has markers 1 through {}, marker {} requested", MARKER_COUNT, n))) }
	else { Ok(()) }
}

impl MS2721B<CoreClient> {

	pub fn connect_vxi11(host:&str) -> Result<Self> {
		let core = CoreClient::open(host)?;
		Self::new(core)
	}

}

impl<T: Transport> MS2721B<T> {

	pub fn new(transport:T) -> Result<Self> {
		let mut dev = Self{ transport, tx_throttle_duration: Duration::from_secs_f32(DEFAULT_TX_THROTTLE_DURATION_SEC) };

		let idn:String = dev.idn()?;
		if !idn.contains("MS2721B") {
			return Err(Error::instrument(format!("Successfully connected to a device but it doesn't appear to be the right model: {}", idn)));
		}

		info!("connected to {}", idn);
		Ok(dev)
	}

	pub fn with_tx_throttle(mut self, d:Duration) -> Self { self.tx_throttle_duration = d; self }

	pub fn transport(&self) -> &T { &self.transport }

	fn ask_str(&mut self, cmd:&str) -> Result<String> {
		thread::sleep(self.tx_throttle_duration);
		Ok(self.transport.ask_str(cmd)?)
	}

	pub fn idn(&mut self) -> Result<String> { self.ask_str("*IDN?") }

	/// Amplitude at a marker, in dBm
	pub fn marker_y(&mut self, marker:u8) -> Result<f64> {
		marker_ok(marker)?;
		let res:String = self.ask_str(&format!(":CALC:MARK{}:Y?", marker))?;
		parse_numeric(&res)
	}

}
