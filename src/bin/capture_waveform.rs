
extern crate labrig;

use std::env;
use std::fs::File;
use std::io::BufWriter;

use labrig::Result;
use labrig::devices::SDS1104X;
use labrig::profile::ProfileSet;
use labrig::transport::Transport;
use labrig::waveform::Waveform;

// capture_waveform <host> [channel] [--socket [points]]
pub fn main() -> Result<()> {
	env_logger::init();

	let args:Vec<String> = env::args().collect();
	let host:&str = args.get(1).map(|s| s.as_str()).unwrap_or("6.1.1.92");
	let chan_num:u8 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(1);
	let socket:bool = args.iter().any(|a| a == "--socket");
	let points:usize = args.iter().skip_while(|a| *a != "--socket").nth(1).and_then(|s| s.parse().ok()).unwrap_or(1000);

	let profiles = ProfileSet::default();

	let wf:Waveform = if socket {
		let mut scope = SDS1104X::connect_socket(host, &profiles)?;
		capture_block(&mut scope, chan_num, points)?
	} else {
		let mut scope = SDS1104X::connect_vxi11(host, &profiles)?;
		eprintln!("{}", serde_json::to_string_pretty(&scope.get_full_state()?)?);
		scope.transfer_waveform(chan_num)?
	};

	eprintln!("{} samples, {:.3e} s/div, {:.3e} Sa/s", wf.len(), wf.metadata.time_per_division, wf.metadata.sample_rate);
	for (t, v) in wf.samples().take(10) {
		println!("{:+.6e} s  {:+.4} V", t, v);
	}

	let path = format!("./waveform_c{}.json", chan_num);
	let file = BufWriter::new(File::create(&path)?);
	serde_json::to_writer(file, &wf)?;
	eprintln!("Wrote {}", path);

	Ok(())
}

fn capture_block<T: Transport>(scope:&mut SDS1104X<T>, chan_num:u8, points:usize) -> Result<Waveform> {
	scope.transfer_waveform_block(chan_num, points)
}
