
extern crate regex;

use std::io;
use std::thread;
use std::time::{Duration, Instant};

use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;
use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::numeric::{parse_numeric, parse_scaled};
use crate::profile::{parse_idn, ModelProfile, ProfileSet};
use crate::transport::{SocketClient, Transport};
use crate::vxi11::CoreClient;
use crate::waveform::{self, frame, FixedDivisor, Framing, OriginReference, Scaling, ScalingParameters, Waveform};

lazy_static! {
	static ref TRMD_RE: Regex = Regex::new("(AUTO|NORM|SINGLE|STOP)").unwrap();
}

pub const DEFAULT_TX_THROTTLE_DURATION_SEC:f32 = 0.1;
pub const DEFAULT_POLL_DURATION_SEC:f32 = 0.01;
pub const DEFAULT_WAIT_TIMEOUT_SEC:f32 = 30.0;

/// Siglent SDS1000X-E series oscilloscope.  Works over VXI-11 (the `TCPIP::host::INSTR` VISA
/// resource) or the raw SCPI socket on port 5025; the model constants come from a `ModelProfile`.
pub struct SDS1104X<T: Transport> {
	transport: T,
	profile: ModelProfile,
	tx_throttle_duration: Duration,
	poll_duration: Duration,
	wait_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
	pub manufacturer: String,
	pub model: String,
	pub serial_num: String,
	pub fw_version: String,
	pub time_division: f64,
	pub sample_rate: f64,
	pub trigger_mode: TriggerMode,
	pub channels: Vec<ChannelState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelState {
	pub channel: u8,
	pub voltage_division: f64,
	pub voltage_offset: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerMode { Auto, Norm, Single, Stop }

impl TriggerMode {
	fn as_scpi(self) -> &'static str {
		match self {
			TriggerMode::Auto   => "AUTO",
			TriggerMode::Norm   => "NORM",
			TriggerMode::Single => "SINGLE",
			TriggerMode::Stop   => "STOP",
		}
	}
}

impl SDS1104X<CoreClient> {

	pub fn connect_vxi11(host:&str, profiles:&ProfileSet) -> Result<Self> {
		let core = CoreClient::open(host)?;
		let mut dev = Self::new(core, profiles)?;

		// Bare values in replies, no echoed command header
		dev.send("CHDR OFF")?;
		Ok(dev)
	}

}

impl SDS1104X<SocketClient> {

	pub fn connect_socket(host:&str, profiles:&ProfileSet) -> Result<Self> {
		let client = SocketClient::open(host)?;
		Self::new(client, profiles)
	}

}

impl<T: Transport> SDS1104X<T> {

	/// Identifies the instrument with `*IDN?` and picks its profile.
	pub fn new(mut transport:T, profiles:&ProfileSet) -> Result<Self> {
		let idn:String = transport.ask_str("*IDN?")?;
		let profile:ModelProfile = profiles.for_idn(&idn)
			.map_err(|_| Error::instrument(format!("Successfully connected to a device but it doesn't appear to be a supported model: {}", idn)))?
			.clone();

		info!("connected to {}", idn);
		Ok(Self::with_profile(transport, profile))
	}

	pub fn with_profile(transport:T, profile:ModelProfile) -> Self {
		Self {
			transport,
			profile,
			tx_throttle_duration: Duration::from_secs_f32(DEFAULT_TX_THROTTLE_DURATION_SEC),
			poll_duration: Duration::from_secs_f32(DEFAULT_POLL_DURATION_SEC),
			wait_timeout: Duration::from_secs_f32(DEFAULT_WAIT_TIMEOUT_SEC),
		}
	}

	pub fn with_tx_throttle(mut self, d:Duration) -> Self { self.tx_throttle_duration = d; self }
	pub fn with_poll_interval(mut self, d:Duration) -> Self { self.poll_duration = d; self }
	pub fn with_wait_timeout(mut self, d:Duration) -> Self { self.wait_timeout = d; self }

	pub fn profile(&self) -> &ModelProfile { &self.profile }
	pub fn transport(&self) -> &T { &self.transport }
	pub fn into_transport(self) -> T { self.transport }

	pub fn send(&mut self, cmd:&str) -> Result<()> {
		thread::sleep(self.tx_throttle_duration);
		debug!("{}", cmd);
		Ok(self.transport.write(cmd.as_bytes())?)
	}

	pub fn ask(&mut self, cmd:&str) -> Result<Vec<u8>> {
		thread::sleep(self.tx_throttle_duration);
		debug!("{}", cmd);
		Ok(self.transport.ask(cmd.as_bytes())?)
	}

	pub fn ask_str(&mut self, cmd:&str) -> Result<String> {
		thread::sleep(self.tx_throttle_duration);
		Ok(self.transport.ask_str(cmd)?)
	}

	fn ask_numeric(&mut self, cmd:&str) -> Result<f64> {
		let res:String = self.ask_str(cmd)?;
		parse_numeric(&res)
	}

	pub fn get_full_state(&mut self) -> Result<State> {
		let str_idn:String = self.ask_str("*IDN?")?;
		let id = parse_idn(&str_idn)?;
		let (manufacturer, model, serial_num, fw_version) =
			(id.manufacturer.to_owned(), id.model.to_owned(), id.serial_num.to_owned(), id.fw_version.to_owned());

		let time_division:f64 = self.get_time_division()?;
		let sample_rate:f64 = self.get_sample_rate()?;
		let trigger_mode:TriggerMode = self.get_trigger_mode()?;

		let mut channels:Vec<ChannelState> = vec![];
		for chan_num in 1..=self.profile.channels {
			channels.push(self.get_channel_state(chan_num)?);
		}

		Ok(State{ manufacturer, model, serial_num, fw_version, time_division, sample_rate, trigger_mode, channels })
	}

	pub fn get_channel_state(&mut self, chan_num:u8) -> Result<ChannelState> {
		let voltage_division:f64 = self.get_voltage_div(chan_num)?;
		let voltage_offset:f64 = self.get_voltage_ofs(chan_num)?;

		Ok(ChannelState{ channel: chan_num, voltage_division, voltage_offset })
	}

	pub fn get_voltage_div(&mut self, chan_num:u8) -> Result<f64> {
		self.profile.chan_ok(chan_num)?;
		self.ask_numeric(&format!("C{}:VDIV?", chan_num))
	}

	pub fn set_voltage_div(&mut self, chan_num:u8, vdiv:f64) -> Result<()> {
		self.profile.chan_ok(chan_num)?;
		self.send(&format!("C{}:VDIV {:.3E}V", chan_num, vdiv))
	}

	pub fn get_voltage_ofs(&mut self, chan_num:u8) -> Result<f64> {
		self.profile.chan_ok(chan_num)?;
		self.ask_numeric(&format!("C{}:OFST?", chan_num))
	}

	pub fn set_voltage_ofs(&mut self, chan_num:u8, vofs:f64) -> Result<()> {
		self.profile.chan_ok(chan_num)?;
		self.send(&format!("C{}:OFST {:.3E}V", chan_num, vofs))
	}

	pub fn get_time_division(&mut self) -> Result<f64> { self.ask_numeric("TDIV?") }

	pub fn set_time_division(&mut self, tdiv:f64) -> Result<()> {
		self.send(&format!("TDIV {:.2E}S", tdiv))
	}

	pub fn get_sample_rate(&mut self) -> Result<f64> {
		let res:String = self.ask_str("SARA?")?;
		parse_scaled(&res, &self.profile.unit_multipliers)
	}

	pub fn get_trigger_mode(&mut self) -> Result<TriggerMode> {
		let res:String = self.ask_str("TRMD?")?;
		let cap = TRMD_RE.captures(&res).ok_or_else(|| Error::parse("trigger mode", &res))?;
		let ans:TriggerMode = match cap.get(1).map(|m| m.as_str()) {
			Some("AUTO")   => TriggerMode::Auto,
			Some("NORM")   => TriggerMode::Norm,
			Some("SINGLE") => TriggerMode::Single,
			Some("STOP")   => TriggerMode::Stop,
			_              => return Err(Error::parse("trigger mode", &res)),
		};

		Ok(ans)
	}

	pub fn set_trigger_mode(&mut self, trmd:TriggerMode) -> Result<()> {
		self.send(&format!("TRMD {}", trmd.as_scpi()))
	}

	pub fn arm_single(&mut self) -> Result<()> {
		self.set_trigger_mode(TriggerMode::Single)?;
		self.arm()
	}

	// One-liners
	pub fn arm(&mut self)           -> Result<()>     { self.send("ARM")  }
	pub fn force_trigger(&mut self) -> Result<()>     { self.send("FRTR") }
	pub fn stop(&mut self)          -> Result<()>     { self.send("STOP") }
	pub fn sample_status(&mut self) -> Result<String> { self.ask_str("SAST?") }

	fn poll_until_stopped(&mut self, query:&str) -> Result<()> {
		let start = Instant::now();
		loop {
			let status:String = self.ask_str(query)?;
			if status.to_ascii_lowercase().contains("stop") {
				return Ok(());
			}
			if start.elapsed() > self.wait_timeout {
				return Err(Error::Io(io::Error::new(io::ErrorKind::TimedOut, format!("{} still reports {:?}", query, status))));
			}
			thread::sleep(self.poll_duration);
		}
	}

	/// Blocks until the acquisition has stopped (`SAST?` reports Stop).
	pub fn wait(&mut self) -> Result<()> { self.poll_until_stopped("SAST?") }

	/// Mean voltage of the displayed trace, from the scope's own measurement.
	pub fn measure_mean(&mut self, chan_num:u8) -> Result<f64> {
		self.profile.chan_ok(chan_num)?;
		let res:String = self.ask_str(&format!("C{}:PAVA? MEAN", chan_num))?;

		// "C1:PAVA MEAN,1.23E-01V"
		let value:&str = res.rsplit(',').next().unwrap_or("");
		parse_numeric(value).map_err(|_| Error::parse("mean voltage", &res))
	}

	/// Current vertical and horizontal settings of a channel.  Always read from the instrument,
	/// never cached, since front panel changes between captures are common.
	pub fn scaling_parameters(&mut self, chan_num:u8) -> Result<ScalingParameters> {
		let volts_per_division:f64 = self.get_voltage_div(chan_num)?;
		let vertical_offset:f64 = self.get_voltage_ofs(chan_num)?;
		let time_per_division:f64 = self.get_time_division()?;
		let sample_rate:f64 = self.get_sample_rate()?;

		Ok(ScalingParameters{ channel: chan_num, volts_per_division, vertical_offset, time_per_division, sample_rate })
	}

	/// Sample bytes of the last acquisition via the `WF? DAT2` register transfer.
	pub fn transfer_waveform_raw(&mut self, chan_num:u8) -> Result<Vec<u8>> {
		self.profile.chan_ok(chan_num)?;

		let raw:Vec<u8> = self.ask(&format!("C{}:WF? DAT2", chan_num))?;
		let framing = Framing::FixedHeader{ header_len: self.profile.dat2_header_len, trailer_len: self.profile.dat2_trailer_len };
		let samples:&[u8] = frame::extract_samples(&raw, framing, None)?;

		Ok(samples.to_vec())
	}

	/// Waveform of the last acquisition, scaled with the fixed counts-per-division rule.
	pub fn transfer_waveform(&mut self, chan_num:u8) -> Result<Waveform> {
		let params:ScalingParameters = self.scaling_parameters(chan_num)?;
		let raw:Vec<u8> = self.transfer_waveform_raw(chan_num)?;

		waveform::decode(&raw, &params, &Scaling::FixedDivisor(FixedDivisor::for_profile(&self.profile)))
	}

	/// Single-shot capture of `points` samples through the `:WAVeform` subsystem, scaled with the
	/// origin/reference constants the scope reports for that capture.
	pub fn transfer_waveform_block(&mut self, chan_num:u8, points:usize) -> Result<Waveform> {
		self.profile.chan_ok(chan_num)?;

		self.send(":STOP")?;
		self.send(&format!(":WAV:SOUR C{}", chan_num))?;
		self.send(":WAV:FORM BYTE")?;
		self.send(&format!(":WAV:POIN {}", points))?;

		self.send(":SINGLE")?;
		self.poll_until_stopped(":TRIG:STAT?")?;

		let volts_per_division:f64 = self.ask_numeric(&format!(":C{}:VOLT_DIV?", chan_num))?;
		let vertical_offset:f64 = self.ask_numeric(&format!(":C{}:OFFSET?", chan_num))?;
		let time_per_division:f64 = self.ask_numeric(":TIM:MAIN:SCAL?")?;
		let sample_rate:f64 = {
			let res:String = self.ask_str(":ACQ:SRAT?")?;
			parse_scaled(&res, &self.profile.unit_multipliers)?
		};
		let params = ScalingParameters{ channel: chan_num, volts_per_division, vertical_offset, time_per_division, sample_rate };

		let raw:Vec<u8> = self.ask(":WAV:DATA?")?;
		let samples:&[u8] = frame::extract_samples(&raw, Framing::DefiniteBlock, Some(points))?;

		let constants = OriginReference {
			y_origin: self.ask_numeric(":WAV:YOR?")?,
			y_reference: self.ask_numeric(":WAV:YREF?")?,
			y_increment: self.ask_numeric(":WAV:YINC?")?,
			x_increment: self.ask_numeric(":WAV:XINC?")?,
			trigger_offset: self.ask_numeric(":TIM:OFFS?")?,
		};

		waveform::decode(samples, &params, &Scaling::OriginReference(constants))
	}

}

// Implemented
// *IDN?		*IDN?				MISCELLANEOUS
// ARM			ARM_ACQUISITION		ACQUISITION
// CHDR			COMM_HEADER			COMMUNICATION
// FRTR			FORCE_TRIGGER		ACQUISITION
// OFST			OFFSET				ACQUISITION
// PAVA?		PARAMETER_VALUE?	CURSOR			(MEAN only)
// SARA			SAMPLE_RATE			ACQUISITION
// SAST			SAMPLE_STATUS		ACQUISITION
// STOP			STOP				ACQUISITION
// TDIV			TIME_DIV			ACQUISITION
// TRMD			TRIG_MODE			ACQUISITION
// VDIV			VOLT_DIV			ACQUISITION
// WF			WAVEFORM			WAVEFORMTRANS	(DAT2 only)
// :WAVeform	SOUR/FORM/POIN/DATA/YOR/YREF/YINC/XINC
