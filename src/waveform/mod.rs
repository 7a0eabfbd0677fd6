
// Conversion of raw oscilloscope sample bytes into calibrated (time, voltage) pairs

use log::debug;
use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::profile::ModelProfile;

pub mod frame;

pub use frame::{AcquisitionFrame, Framing};

/// Per-channel settings read back from the scope around a capture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalingParameters {
	pub channel: u8,
	pub volts_per_division: f64,
	pub vertical_offset: f64,
	pub time_per_division: f64,
	pub sample_rate: f64,
}

fn positive(name:&'static str, value:f64) -> Result<()> {
	if value.is_finite() && value > 0.0 { Ok(()) }
	else { Err(Error::InvalidScaling{ name, value }) }
}

impl ScalingParameters {
	pub fn validate(&self) -> Result<()> {
		positive("volts_per_division", self.volts_per_division)?;
		positive("time_per_division", self.time_per_division)?;
		positive("sample_rate", self.sample_rate)
	}
}

/// Calibration constants reported by the instrument (`:WAV:YOR?`, `:WAV:YREF?`, `:WAV:YINC?`,
/// `:WAV:XINC?`, `:TIM:OFFS?`). Raw bytes are treated as unsigned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OriginReference {
	pub y_origin: f64,
	pub y_reference: f64,
	pub y_increment: f64,
	pub x_increment: f64,
	pub trigger_offset: f64,
}

/// Signed bytes with a fixed number of ADC counts per vertical division, time axis centred on
/// the middle of the horizontal grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedDivisor {
	pub counts_per_division: f64,
	pub horizontal_divisions: f64,
}

impl FixedDivisor {
	pub fn for_profile(profile:&ModelProfile) -> Self {
		Self {
			counts_per_division: profile.counts_per_division,
			horizontal_divisions: profile.horizontal_divisions,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Scaling {
	OriginReference(OriginReference),
	FixedDivisor(FixedDivisor),
}

impl Scaling {
	fn validate(&self) -> Result<()> {
		match self {
			Scaling::OriginReference(c) => positive("x_increment", c.x_increment),
			Scaling::FixedDivisor(c) => {
				positive("counts_per_division", c.counts_per_division)?;
				positive("horizontal_divisions", c.horizontal_divisions)
			},
		}
	}

	// (time of sample 0, time step)
	fn time_axis(&self, params:&ScalingParameters) -> (f64, f64) {
		match self {
			Scaling::OriginReference(c) => (-c.trigger_offset, c.x_increment),
			Scaling::FixedDivisor(c) => (-(params.time_per_division * c.horizontal_divisions / 2.0), 1.0 / params.sample_rate),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformMetadata {
	pub channel: u8,
	pub volts_per_division: f64,
	pub vertical_offset: f64,
	pub time_per_division: f64,
	pub sample_rate: f64,
	pub sample_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waveform {
	pub timestamps: Vec<f64>,
	pub voltages: Vec<f64>,
	pub metadata: WaveformMetadata,
}

impl Waveform {
	pub fn len(&self) -> usize { self.voltages.len() }
	pub fn is_empty(&self) -> bool { self.voltages.is_empty() }

	pub fn samples(&self) -> impl Iterator<Item=(f64, f64)> + '_ {
		self.timestamps.iter().copied().zip(self.voltages.iter().copied())
	}
}

/// Two's complement reinterpretation of a raw sample byte: values above 127 wrap, so 128 is
/// -128 and 255 is -1.
pub fn signed_sample(raw:u8) -> i8 { raw as i8 }

pub fn decode(raw:&[u8], params:&ScalingParameters, scaling:&Scaling) -> Result<Waveform> {
	params.validate()?;
	scaling.validate()?;

	let voltages:Vec<f64> = match scaling {
		Scaling::OriginReference(c) => {
			raw.iter()
				.map(|b| (*b as f64 - c.y_origin - c.y_reference) * c.y_increment + params.vertical_offset)
				.collect()
		},
		Scaling::FixedDivisor(c) => {
			raw.iter()
				.map(|b| (signed_sample(*b) as f64) / c.counts_per_division * params.volts_per_division - params.vertical_offset)
				.collect()
		},
	};

	let (t0, dt) = scaling.time_axis(params);
	let timestamps:Vec<f64> = (0..raw.len()).map(|idx| t0 + (idx as f64) * dt).collect();

	// A step below the float resolution of the time axis would repeat timestamps
	if !(t0.is_finite() && dt.is_finite()) || !timestamps.windows(2).all(|w| w[1] > w[0]) {
		return Err(Error::InvalidScaling{ name: "sample_interval", value: dt });
	}

	debug!("decoded {} samples on C{}, t0={:e} s, dt={:e} s", raw.len(), params.channel, t0, dt);

	let metadata = WaveformMetadata {
		channel: params.channel,
		volts_per_division: params.volts_per_division,
		vertical_offset: params.vertical_offset,
		time_per_division: params.time_per_division,
		sample_rate: params.sample_rate,
		sample_count: voltages.len(),
	};

	Ok(Waveform{ timestamps, voltages, metadata })
}

pub fn decode_frame(frame:&AcquisitionFrame, params:&ScalingParameters, scaling:&Scaling) -> Result<Waveform> {
	decode(frame.samples()?, params, scaling)
}
