
extern crate labrig;

use std::env;
use std::fs::OpenOptions;
use std::io::Write;

use log::info;

use labrig::Result;
use labrig::devices::{MS2721B, SDS1104X, SynthHD};
use labrig::profile::ProfileSet;
use labrig::sweep::{self, AnalyzerMarker, ScopeMean, SweepConfig, SynthChannel};

// vary_mw_amplitude [config.json]
pub fn main() -> Result<()> {
	env_logger::init();

	let config:SweepConfig = match env::args().nth(1) {
		Some(path) => SweepConfig::from_json_file(path)?,
		None => SweepConfig::default(),
	};
	config.validate()?;

	// Windfreak
	let mut synth = SynthHD::connect_serial(&config.synth)?;

	// Outputs go off whether or not the sweep made it to the end
	synth.run_then_shutdown(|synth| {
		synth.configure_device(&config.synth)?;
		synth.configure_channel(&config.synth_channel)?;
		run(&config, synth)
	})
}

fn run<T: labrig::transport::Transport>(config:&SweepConfig, synth:&mut SynthHD<T>) -> Result<()> {
	let status = synth.status(config.synth_channel.channel)?;
	println!("Windfreak Status:");
	println!("{}", serde_json::to_string_pretty(&status)?);

	// Anritsu
	let mut analyzer = MS2721B::connect_vxi11(&config.analyzer_host)?;
	println!("Anritsu Connected to: {}", analyzer.idn()?);
	println!("\tMarker {} amplitude: {} dBm", config.analyzer_marker, analyzer.marker_y(config.analyzer_marker)?);

	// Photodiode on the scope
	let mut scope = SDS1104X::connect_vxi11(&config.scope_host, &ProfileSet::default())?;
	println!("\tMean voltage on channel {}: {:.4} V", config.scope_channel, scope.measure_mean(config.scope_channel)?);

	let mut file = OpenOptions::new().create(true).append(true).open(&config.output_path)?;

	let n:usize = sweep::run_sweep(
		config,
		&mut SynthChannel{ synth, channel: config.synth_channel.channel },
		&mut ScopeMean{ scope: &mut scope, channel: config.scope_channel },
		&mut AnalyzerMarker{ analyzer: &mut analyzer, marker: config.analyzer_marker },
		|rec| {
			serde_json::to_writer(&mut file, rec)?;
			file.write_all(b"\n")?;
			file.flush()?;
			Ok(())
		},
	)?;

	info!("{} records appended to {}", n, config.output_path);
	Ok(())
}
