
// Windfreak SynthHD two-channel microwave synthesizer.  The serial protocol is one command per
// line: a single-character verb, optionally followed by a value, and a trailing '?' to query.
// Per-channel commands act on whichever channel was last selected with `C<n>`.

use std::thread;
use std::time::Duration;

use log::{debug, error, info};
use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::numeric::parse_numeric;
use crate::transport::{SerialClient, Transport};

pub const CHANNELS:[u8; 2] = [0, 1];
pub const DEFAULT_INIT_DELAY_SEC:f32 = 1.0;

const HZ_PER_MHZ:f64 = 1.0e6;

pub fn chan_ok(n:u8) -> Result<()> {
	if !CHANNELS.contains(&n) { Err(Error::instrument(format!("SynthHD has channels 0 and 1, channel {} requested", n))) }
	else { Ok(()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceMode {
	External,
	Internal27Mhz,
	Internal10Mhz,
}

impl ReferenceMode {
	fn code(self) -> u8 {
		match self {
			ReferenceMode::External      => 0,
			ReferenceMode::Internal27Mhz => 1,
			ReferenceMode::Internal10Mhz => 2,
		}
	}

	fn from_code(code:u8) -> Option<Self> {
		match code {
			0 => Some(ReferenceMode::External),
			1 => Some(ReferenceMode::Internal27Mhz),
			2 => Some(ReferenceMode::Internal10Mhz),
			_ => None,
		}
	}
}

/// Device-wide settings applied once after connecting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
	pub port: String,
	pub reference_mode: ReferenceMode,
	pub reference_frequency_hz: f64,
	pub channel_spacing_hz: f64,
	/// Raw commands sent after the reference is set up (reference doubler on, charge pump current)
	pub setup_commands: Vec<String>,
	pub init_delay_sec: f32,
}

impl Default for DeviceConfig {
	fn default() -> Self {
		Self {
			port: "COM11".to_owned(),
			reference_mode: ReferenceMode::External,
			reference_frequency_hz: 10.0e6,
			channel_spacing_hz: 10.0,
			setup_commands: vec!["b1".to_owned(), "U9".to_owned()],
			init_delay_sec: DEFAULT_INIT_DELAY_SEC,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
	pub channel: u8,
	pub power_dbm: f64,
	pub frequency_hz: f64,
	pub phase_deg: f64,
	pub enable: bool,
}

impl Default for ChannelConfig {
	fn default() -> Self {
		Self{ channel: 0, power_dbm: 17.0, frequency_hz: 6834.682e6, phase_deg: 0.0, enable: true }
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStatus {
	pub frequency_hz: f64,
	pub power_dbm: f64,
	pub phase_deg: f64,
	pub enabled: bool,
	pub locked: bool,
	pub reference_doubler: String,
	pub charge_pump: String,
}

pub struct SynthHD<T: Transport> {
	transport: T,
	selected: Option<u8>,
}

impl SynthHD<SerialClient> {

	pub fn connect_serial(config:&DeviceConfig) -> Result<Self> {
		let port = SerialClient::open_default(&config.port)?;
		let mut dev = Self::new(port);

		let model:String = dev.query_raw("+")?;
		info!("connected to Windfreak {} on {}", model, config.port);

		thread::sleep(Duration::from_secs_f32(config.init_delay_sec));
		Ok(dev)
	}

}

impl<T: Transport> SynthHD<T> {

	pub fn new(transport:T) -> Self { Self{ transport, selected: None } }

	pub fn transport(&self) -> &T { &self.transport }

	pub fn write_raw(&mut self, cmd:&str) -> Result<()> {
		debug!("{}", cmd);
		Ok(self.transport.write(cmd.as_bytes())?)
	}

	pub fn query_raw(&mut self, cmd:&str) -> Result<String> {
		Ok(self.transport.ask_str(cmd)?)
	}

	fn query_numeric(&mut self, cmd:&str) -> Result<f64> {
		let res:String = self.query_raw(cmd)?;
		parse_numeric(&res)
	}

	fn query_flag(&mut self, cmd:&str) -> Result<bool> {
		let res:String = self.query_raw(cmd)?;
		match res.trim() {
			"1" => Ok(true),
			"0" => Ok(false),
			_   => Err(Error::parse("flag", &res)),
		}
	}

	pub fn select_channel(&mut self, chan_num:u8) -> Result<()> {
		chan_ok(chan_num)?;
		if self.selected != Some(chan_num) {
			self.write_raw(&format!("C{}", chan_num))?;
			self.selected = Some(chan_num);
		}
		Ok(())
	}

	pub fn set_frequency(&mut self, chan_num:u8, hz:f64) -> Result<()> {
		self.select_channel(chan_num)?;
		self.write_raw(&format!("f{:.7}", hz / HZ_PER_MHZ))
	}

	pub fn get_frequency(&mut self, chan_num:u8) -> Result<f64> {
		self.select_channel(chan_num)?;
		Ok(self.query_numeric("f?")? * HZ_PER_MHZ)
	}

	pub fn set_power(&mut self, chan_num:u8, dbm:f64) -> Result<()> {
		self.select_channel(chan_num)?;
		self.write_raw(&format!("W{:.3}", dbm))
	}

	pub fn get_power(&mut self, chan_num:u8) -> Result<f64> {
		self.select_channel(chan_num)?;
		self.query_numeric("W?")
	}

	pub fn set_phase(&mut self, chan_num:u8, deg:f64) -> Result<()> {
		self.select_channel(chan_num)?;
		self.write_raw(&format!("~{:.3}", deg))
	}

	pub fn get_phase(&mut self, chan_num:u8) -> Result<f64> {
		self.select_channel(chan_num)?;
		self.query_numeric("~?")
	}

	/// Powers the PLL (`E`) and unmutes the RF output (`r`) together
	pub fn set_enabled(&mut self, chan_num:u8, enable:bool) -> Result<()> {
		self.select_channel(chan_num)?;
		let flag:u8 = if enable { 1 } else { 0 };
		self.write_raw(&format!("E{}", flag))?;
		self.write_raw(&format!("r{}", flag))
	}

	pub fn get_enabled(&mut self, chan_num:u8) -> Result<bool> {
		self.select_channel(chan_num)?;
		self.query_flag("r?")
	}

	pub fn is_locked(&mut self, chan_num:u8) -> Result<bool> {
		self.select_channel(chan_num)?;
		self.query_flag("p?")
	}

	pub fn set_channel_spacing(&mut self, chan_num:u8, hz:f64) -> Result<()> {
		self.select_channel(chan_num)?;
		self.write_raw(&format!("i{:.3}", hz))
	}

	pub fn set_reference_mode(&mut self, mode:ReferenceMode) -> Result<()> {
		self.write_raw(&format!("x{}", mode.code()))
	}

	pub fn get_reference_mode(&mut self) -> Result<ReferenceMode> {
		let res:String = self.query_raw("x?")?;
		res.trim().parse::<u8>().ok()
			.and_then(ReferenceMode::from_code)
			.ok_or_else(|| Error::parse("reference mode", &res))
	}

	pub fn set_reference_frequency(&mut self, hz:f64) -> Result<()> {
		self.write_raw(&format!("*{:.3}", hz / HZ_PER_MHZ))
	}

	pub fn configure_device(&mut self, config:&DeviceConfig) -> Result<()> {
		self.set_reference_mode(config.reference_mode)?;
		self.set_reference_frequency(config.reference_frequency_hz)?;
		for cmd in config.setup_commands.iter() {
			self.write_raw(cmd)?;
		}
		self.set_channel_spacing(0, config.channel_spacing_hz)
	}

	pub fn configure_channel(&mut self, config:&ChannelConfig) -> Result<()> {
		self.select_channel(config.channel)?;
		self.set_power(config.channel, config.power_dbm)?;
		self.set_frequency(config.channel, config.frequency_hz)?;
		self.set_phase(config.channel, config.phase_deg)?;
		self.set_enabled(config.channel, config.enable)
	}

	pub fn status(&mut self, chan_num:u8) -> Result<ChannelStatus> {
		let frequency_hz:f64 = self.get_frequency(chan_num)?;
		let power_dbm:f64 = self.get_power(chan_num)?;
		let phase_deg:f64 = self.get_phase(chan_num)?;
		let enabled:bool = self.get_enabled(chan_num)?;
		let locked:bool = self.is_locked(chan_num)?;
		let reference_doubler:String = self.query_raw("b?")?;
		let charge_pump:String = self.query_raw("U?")?;

		Ok(ChannelStatus{ frequency_hz, power_dbm, phase_deg, enabled, locked, reference_doubler, charge_pump })
	}

	/// Turns off both outputs
	pub fn shutdown(&mut self) -> Result<()> {
		for chan_num in CHANNELS.iter() {
			self.set_enabled(*chan_num, false)?;
		}
		info!("SynthHD outputs disabled");
		Ok(())
	}

	/// Runs `f`, then turns both outputs off whether or not it succeeded.  An error from `f` wins
	/// over one from the shutdown.
	pub fn run_then_shutdown<R, F>(&mut self, f:F) -> Result<R>
	where F: FnOnce(&mut Self) -> Result<R> {
		let res = f(self);
		match (res, self.shutdown()) {
			(Err(e), Err(off)) => {
				error!("unable to disable SynthHD outputs: {}", off);
				Err(e)
			},
			(res, Ok(())) => res,
			(Ok(_), Err(off)) => Err(off),
		}
	}

}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::transport::Loopback;

	#[test]
	fn selects_channel_once() {
		let mut synth = SynthHD::new(Loopback::new());
		synth.set_power(0, 17.0).unwrap();
		synth.set_frequency(0, 6834.682e6).unwrap();
		synth.set_power(1, -3.5).unwrap();
		assert_eq!(synth.transport().sent_str(), vec!["C0", "W17.000", "f6834.6820000", "C1", "W-3.500"]);
	}

	#[test]
	fn rejects_bad_channel() {
		let mut synth = SynthHD::new(Loopback::new());
		assert!(synth.set_power(2, 0.0).is_err());
		assert!(synth.transport().sent().is_empty());
	}

	#[test]
	fn frequency_reply_in_mhz() {
		let mut synth = SynthHD::new(Loopback::new().reply("6834.6820000\n"));
		let hz = synth.get_frequency(0).unwrap();
		assert!((hz - 6834.682e6).abs() < 1.0);
	}

	#[test]
	fn reference_mode_codes() {
		let mut synth = SynthHD::new(Loopback::new().reply("2\n").reply("7\n"));
		synth.set_reference_mode(ReferenceMode::External).unwrap();
		assert_eq!(synth.get_reference_mode().unwrap(), ReferenceMode::Internal10Mhz);
		assert!(synth.get_reference_mode().is_err());
		assert_eq!(synth.transport().sent_str()[0], "x0");
	}

	#[test]
	fn configure_device_sequence() {
		let mut synth = SynthHD::new(Loopback::new());
		synth.configure_device(&DeviceConfig::default()).unwrap();
		assert_eq!(synth.transport().sent_str(), vec!["x0", "*10.000", "b1", "U9", "C0", "i10.000"]);
	}

	#[test]
	fn status_reads_everything() {
		let lb = Loopback::new()
			.reply("6834.6820000\n").reply("17.000\n").reply("0.000\n")
			.reply("1\n").reply("1\n").reply("1\n").reply("9\n");
		let mut synth = SynthHD::new(lb);
		let st = synth.status(0).unwrap();
		assert!(st.enabled && st.locked);
		assert_eq!(st.power_dbm, 17.0);
		assert_eq!(st.charge_pump, "9");
	}

	#[test]
	fn outputs_off_after_failed_setup() {
		let mut synth = SynthHD::new(Loopback::new());
		let cfg = ChannelConfig{ channel: 3, ..ChannelConfig::default() };
		let res = synth.run_then_shutdown(|s| s.configure_channel(&cfg));

		assert!(matches!(res, Err(Error::Instrument(_))));
		assert_eq!(synth.transport().sent_str(), vec!["C0", "E0", "r0", "C1", "E0", "r0"]);
	}

	#[test]
	fn run_error_wins_over_shutdown_error() {
		struct Deaf;
		impl Transport for Deaf {
			fn write(&mut self, _:&[u8]) -> std::io::Result<()> { Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged")) }
			fn read(&mut self) -> std::io::Result<Vec<u8>> { Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged")) }
		}

		let mut synth = SynthHD::new(Deaf);
		let res:Result<()> = synth.run_then_shutdown(|_| Err(Error::instrument("sweep aborted")));
		assert!(matches!(res, Err(Error::Instrument(_))));

		let res:Result<u8> = synth.run_then_shutdown(|_| Ok(7));
		assert!(matches!(res, Err(Error::Io(_))));
	}

	#[test]
	fn shutdown_disables_both() {
		let mut synth = SynthHD::new(Loopback::new());
		synth.shutdown().unwrap();
		assert_eq!(synth.transport().sent_str(), vec!["C0", "E0", "r0", "C1", "E0", "r0"]);
	}
}
