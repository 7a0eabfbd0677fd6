
// Microwave power sweep: step the synthesizer output through a grid of powers and, at each step,
// log the photodiode DC voltage next to the power the spectrum analyzer sees.

use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::info;
use serde::{Serialize, Deserialize};

use crate::devices::{MS2721B, SDS1104X, SynthHD};
use crate::devices::synthhd::{ChannelConfig, DeviceConfig};
use crate::error::{Error, Result};
use crate::transport::Transport;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
	pub start_dbm: f64,
	pub stop_dbm: f64,
	pub points: usize,
	/// Readings taken at each power step
	pub averages: usize,
	pub settle_sec: f64,
	pub synth: DeviceConfig,
	pub synth_channel: ChannelConfig,
	pub analyzer_host: String,
	pub analyzer_marker: u8,
	pub scope_host: String,
	pub scope_channel: u8,
	pub output_path: String,
}

impl Default for SweepConfig {
	fn default() -> Self {
		Self {
			start_dbm: -10.0,
			stop_dbm: 16.0,
			points: 27,
			averages: 60,
			settle_sec: 1.0,
			synth: DeviceConfig::default(),
			synth_channel: ChannelConfig::default(),
			analyzer_host: "6.1.1.91".to_owned(),
			analyzer_marker: 1,
			scope_host: "6.1.1.92".to_owned(),
			scope_channel: 1,
			output_path: "varyMWAmplitude.jsonl".to_owned(),
		}
	}
}

impl SweepConfig {
	pub fn from_json_file<P: AsRef<Path>>(path:P) -> Result<Self> {
		let s:String = fs::read_to_string(path)?;
		Ok(serde_json::from_str(&s)?)
	}

	pub fn validate(&self) -> Result<()> {
		if self.points == 0 { return Err(Error::Config("sweep needs at least one power step".to_owned())); }
		if self.averages == 0 { return Err(Error::Config("sweep needs at least one reading per step".to_owned())); }
		if !(self.settle_sec >= 0.0 && self.settle_sec.is_finite()) {
			return Err(Error::Config(format!("settle time must be non-negative, got {}", self.settle_sec)));
		}
		Ok(())
	}

	pub fn powers(&self) -> Vec<f64> { linspace(self.start_dbm, self.stop_dbm, self.points) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRecord {
	/// Seconds since the Unix epoch
	pub time_s: f64,
	pub output_power_dbm: f64,
	pub pd_voltage_v: f64,
	pub pd_power_dbm: f64,
}

pub trait PowerSource {
	fn set_power_dbm(&mut self, dbm:f64) -> Result<()>;
}

pub trait VoltageReader {
	fn read_voltage(&mut self) -> Result<f64>;
}

pub trait PowerReader {
	fn read_power_dbm(&mut self) -> Result<f64>;
}

/// One synthesizer channel as a power source
pub struct SynthChannel<'a, T: Transport> {
	pub synth: &'a mut SynthHD<T>,
	pub channel: u8,
}

impl<'a, T: Transport> PowerSource for SynthChannel<'a, T> {
	fn set_power_dbm(&mut self, dbm:f64) -> Result<()> { self.synth.set_power(self.channel, dbm) }
}

/// Photodiode voltage taken as the scope's mean measurement on one channel
pub struct ScopeMean<'a, T: Transport> {
	pub scope: &'a mut SDS1104X<T>,
	pub channel: u8,
}

impl<'a, T: Transport> VoltageReader for ScopeMean<'a, T> {
	fn read_voltage(&mut self) -> Result<f64> { self.scope.measure_mean(self.channel) }
}

pub struct AnalyzerMarker<'a, T: Transport> {
	pub analyzer: &'a mut MS2721B<T>,
	pub marker: u8,
}

impl<'a, T: Transport> PowerReader for AnalyzerMarker<'a, T> {
	fn read_power_dbm(&mut self) -> Result<f64> { self.analyzer.marker_y(self.marker) }
}

/// `n` evenly spaced values from `start` to `stop` inclusive
pub fn linspace(start:f64, stop:f64, n:usize) -> Vec<f64> {
	match n {
		0 => vec![],
		1 => vec![start],
		_ => {
			let step:f64 = (stop - start) / (n - 1) as f64;
			(0..n).map(|i| if i == n - 1 { stop } else { start + step * i as f64 }).collect()
		}
	}
}

fn now_s() -> f64 {
	SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0)
}

/// Runs the whole sweep, handing each reading to `sink` as soon as it's taken.  Returns the
/// number of records produced, which is always `points * averages` on success.
pub fn run_sweep<S, V, P, F>(config:&SweepConfig, source:&mut S, volts:&mut V, power:&mut P, mut sink:F) -> Result<usize>
where S: PowerSource, V: VoltageReader, P: PowerReader, F: FnMut(&SweepRecord) -> Result<()> {
	config.validate()?;

	let settle = Duration::from_secs_f64(config.settle_sec);
	let mut count:usize = 0;

	for (step, output_power_dbm) in config.powers().into_iter().enumerate() {
		source.set_power_dbm(output_power_dbm)?;
		thread::sleep(settle);
		info!("step {}/{}: output {:.2} dBm", step + 1, config.points, output_power_dbm);

		for _ in 0..config.averages {
			let pd_voltage_v:f64 = volts.read_voltage()?;
			let pd_power_dbm:f64 = power.read_power_dbm()?;

			sink(&SweepRecord{ time_s: now_s(), output_power_dbm, pd_voltage_v, pd_power_dbm })?;
			count += 1;
		}
	}

	Ok(count)
}

#[cfg(test)]
mod tests {
	use super::*;

	struct FakeSource(Vec<f64>);
	impl PowerSource for FakeSource {
		fn set_power_dbm(&mut self, dbm:f64) -> Result<()> { self.0.push(dbm); Ok(()) }
	}

	struct FakeVolts(f64);
	impl VoltageReader for FakeVolts {
		fn read_voltage(&mut self) -> Result<f64> { self.0 += 0.001; Ok(self.0) }
	}

	struct FakePower;
	impl PowerReader for FakePower {
		fn read_power_dbm(&mut self) -> Result<f64> { Ok(-20.0) }
	}

	struct BrokenPower;
	impl PowerReader for BrokenPower {
		fn read_power_dbm(&mut self) -> Result<f64> { Err(Error::instrument("marker off screen")) }
	}

	fn quick(points:usize, averages:usize) -> SweepConfig {
		SweepConfig{ points, averages, settle_sec: 0.0, ..SweepConfig::default() }
	}

	#[test]
	fn default_grid_is_whole_dbm() {
		let p = SweepConfig::default().powers();
		assert_eq!(p.len(), 27);
		for (i, v) in p.iter().enumerate() {
			assert!((v - (-10.0 + i as f64)).abs() < 1e-12);
		}
	}

	#[test]
	fn linspace_edges() {
		assert!(linspace(0.0, 1.0, 0).is_empty());
		assert_eq!(linspace(3.0, 9.0, 1), vec![3.0]);
		assert_eq!(linspace(0.0, 1.0, 3), vec![0.0, 0.5, 1.0]);
	}

	#[test]
	fn records_per_step() {
		let mut src = FakeSource(vec![]);
		let mut records:Vec<SweepRecord> = vec![];
		let n = run_sweep(&quick(4, 3), &mut src, &mut FakeVolts(0.0), &mut FakePower, |r| { records.push(r.clone()); Ok(()) }).unwrap();

		assert_eq!(n, 12);
		assert_eq!(records.len(), 12);
		assert_eq!(src.0.len(), 4);
		assert!(records[..3].iter().all(|r| r.output_power_dbm == -10.0));
		assert_eq!(records[11].output_power_dbm, 16.0);
		assert_eq!(records[0].pd_power_dbm, -20.0);
	}

	#[test]
	fn reader_failure_stops_sweep() {
		let mut count = 0;
		let res = run_sweep(&quick(2, 2), &mut FakeSource(vec![]), &mut FakeVolts(0.0), &mut BrokenPower, |_| { count += 1; Ok(()) });
		assert!(res.is_err());
		assert_eq!(count, 0);
	}

	#[test]
	fn rejects_empty_sweep() {
		let res = run_sweep(&quick(0, 1), &mut FakeSource(vec![]), &mut FakeVolts(0.0), &mut FakePower, |_| Ok(()));
		assert!(matches!(res, Err(Error::Config(_))));
	}

	#[test]
	fn config_from_partial_json() {
		let cfg:SweepConfig = serde_json::from_str(r#"{"points": 5, "synth": {"port": "/dev/ttyACM0"}}"#).unwrap();
		assert_eq!(cfg.points, 5);
		assert_eq!(cfg.averages, 60);
		assert_eq!(cfg.synth.port, "/dev/ttyACM0");
		assert_eq!(cfg.synth.setup_commands, vec!["b1", "U9"]);
	}
}
