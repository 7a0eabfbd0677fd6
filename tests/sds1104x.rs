
use std::time::Duration;

use labrig::Error;
use labrig::devices::SDS1104X;
use labrig::devices::sds1104x::TriggerMode;
use labrig::profile::ProfileSet;
use labrig::transport::Loopback;

const IDN:&str = "Siglent Technologies,SDS1104X-E,SDSMMEBQ4R5097,8.2.6.1.37R9\n";

// A loopback whose first reply answers the identity check
fn lb() -> Loopback { Loopback::new().reply(IDN) }

fn scope(lb:Loopback) -> SDS1104X<Loopback> {
	SDS1104X::new(lb, &ProfileSet::default()).unwrap()
		.with_tx_throttle(Duration::from_secs(0))
		.with_poll_interval(Duration::from_secs(0))
}

fn dat2(payload:&[u8]) -> Vec<u8> {
	let mut raw:Vec<u8> = format!("ALL,#9{:09}", payload.len()).into_bytes();
	raw.extend_from_slice(payload);
	raw.extend_from_slice(b"\n\n");
	raw
}

#[test]
fn identifies_model() {
	let s = scope(lb());
	assert_eq!(s.profile().model, "SDS1104X-E");
	assert_eq!(s.profile().channels, 4);
	assert_eq!(s.transport().sent_str(), vec!["*IDN?"]);
}

#[test]
fn rejects_unknown_model() {
	let lb = Loopback::new().reply("Rigol Technologies,DS1054Z,DS1ZA000000001,00.04.04\n");
	let res = SDS1104X::new(lb, &ProfileSet::default());
	assert!(matches!(res, Err(Error::Instrument(_))));
}

#[test]
fn channel_checked_before_sending() {
	let mut s = scope(lb());
	assert!(s.get_voltage_div(5).is_err());
	assert!(s.get_voltage_div(0).is_err());
	assert_eq!(s.transport().sent().len(), 1);
}

#[test]
fn getters_parse_replies() {
	let lb = lb()
		.reply("C2:VDIV 5.00E-01V\n")
		.reply("-1.50E+00V\n")
		.reply("TDIV 1.00E-06S\n")
		.reply("SARA 500MSa/s\n")
		.reply("TRMD NORM\n");
	let mut s = scope(lb);

	assert_eq!(s.get_voltage_div(2).unwrap(), 0.5);
	assert_eq!(s.get_voltage_ofs(2).unwrap(), -1.5);
	assert_eq!(s.get_time_division().unwrap(), 1e-6);
	assert_eq!(s.get_sample_rate().unwrap(), 5e8);
	assert_eq!(s.get_trigger_mode().unwrap(), TriggerMode::Norm);

	assert_eq!(s.transport().sent_str()[1..], ["C2:VDIV?", "C2:OFST?", "TDIV?", "SARA?", "TRMD?"]);
}

#[test]
fn setters_format_commands() {
	let mut s = scope(lb());
	s.set_voltage_div(1, 0.5).unwrap();
	s.set_voltage_ofs(1, -0.25).unwrap();
	s.set_trigger_mode(TriggerMode::Single).unwrap();
	s.force_trigger().unwrap();

	assert_eq!(s.transport().sent_str()[1..], ["C1:VDIV 5.000E-1V", "C1:OFST -2.500E-1V", "TRMD SINGLE", "FRTR"]);
}

#[test]
fn wait_polls_until_stop() {
	let lb = lb().reply("SAST Trig'd\n").reply("SAST Trig'd\n").reply("SAST Stop\n");
	let mut s = scope(lb);
	s.wait().unwrap();
	assert_eq!(s.transport().sent().len(), 4);
	assert_eq!(s.transport().pending_replies(), 0);
}

#[test]
fn wait_times_out() {
	let lb = lb().reply("SAST Arm\n").reply("SAST Arm\n");
	let mut s = scope(lb).with_wait_timeout(Duration::from_secs(0));
	assert!(matches!(s.wait(), Err(Error::Io(_))));
}

#[test]
fn mean_measurement() {
	let lb = lb().reply("C3:PAVA MEAN,1.23E-01V\n").reply("C3:PAVA MEAN,****\n");
	let mut s = scope(lb);
	assert!((s.measure_mean(3).unwrap() - 0.123).abs() < 1e-12);
	assert!(matches!(s.measure_mean(3), Err(Error::Parse{ .. })));
	assert_eq!(s.transport().sent_str()[1], "C3:PAVA? MEAN");
}

#[test]
fn dat2_transfer() {
	let lb = lb()
		.reply("5.00E-01V\n")
		.reply("0.00E+00V\n")
		.reply("1.00E-06S\n")
		.reply("1.00GSa/s\n")
		.reply(dat2(&[0, 25, 231, 50]));
	let mut s = scope(lb);
	let wf = s.transfer_waveform(1).unwrap();

	assert_eq!(wf.voltages, vec![0.0, 0.5, -0.5, 1.0]);
	assert_eq!(wf.metadata.sample_count, 4);
	assert!((wf.timestamps[0] + 7e-6).abs() < 1e-15);
	assert!((wf.timestamps[1] - wf.timestamps[0] - 1e-9).abs() < 1e-15);
	assert_eq!(s.transport().sent_str().last().unwrap(), "C1:WF? DAT2");
}

#[test]
fn dat2_truncated() {
	let mut raw:Vec<u8> = b"ALL,#9000001000".to_vec();
	raw.extend_from_slice(&[0u8; 800]);
	raw.extend_from_slice(b"\n\n");

	let lb = lb()
		.reply("5.00E-01V\n").reply("0V\n").reply("1.00E-06S\n").reply("1.00GSa/s\n")
		.reply(raw);
	let mut s = scope(lb);
	match s.transfer_waveform(1) {
		Err(Error::InsufficientData{ declared, available }) => {
			assert_eq!(declared, 1000);
			assert_eq!(available, 800);
		},
		other => panic!("unexpected {:?}", other.map(|w| w.len())),
	}
}

#[test]
fn block_transfer() {
	let mut block:Vec<u8> = b"#14".to_vec();
	block.extend_from_slice(&[100, 150, 200, 250]);
	block.push(b'\n');

	let lb = lb()
		.reply("Run\n").reply("Stop\n")
		.reply("2.00E-01\n").reply("0\n").reply("1.00E-03\n").reply("1.00E+06\n")
		.reply(block)
		.reply("0\n").reply("0\n").reply("1.00E-02\n").reply("1.00E-06\n").reply("0.00E+00\n");
	let mut s = scope(lb);
	let wf = s.transfer_waveform_block(2, 2).unwrap();

	assert_eq!(wf.len(), 2);
	assert!((wf.voltages[0] - 1.0).abs() < 1e-12);
	assert!((wf.voltages[1] - 1.5).abs() < 1e-12);
	assert_eq!(wf.timestamps[0], 0.0);
	assert!((wf.timestamps[1] - 1e-6).abs() < 1e-18);

	let sent = s.transport().sent_str();
	assert_eq!(sent[1..6], [":STOP", ":WAV:SOUR C2", ":WAV:FORM BYTE", ":WAV:POIN 2", ":SINGLE"]);
	assert!(sent.contains(&":WAV:DATA?".to_owned()));
	assert_eq!(sent.last().unwrap(), ":TIM:OFFS?");
	assert_eq!(s.transport().pending_replies(), 0);
}

#[test]
fn full_state_covers_every_channel() {
	let mut lb = lb()
		.reply(IDN)
		.reply("1.00E-06S\n").reply("1.00GSa/s\n").reply("AUTO\n");
	for _ in 0..4 {
		lb.push_reply("1.00E+00V\n");
		lb.push_reply("0.00E+00V\n");
	}
	let mut s = scope(lb);
	let st = s.get_full_state().unwrap();
	assert_eq!(st.model, "SDS1104X-E");
	assert_eq!(st.channels.len(), 4);
	assert_eq!(st.trigger_mode, TriggerMode::Auto);
}
