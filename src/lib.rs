
pub mod error;

// Pulling numbers (and unit suffixes) out of SCPI replies
pub mod numeric;

// Per-model constants for the oscilloscopes
pub mod profile;

// Turning raw capture bytes into calibrated voltages and timestamps
pub mod waveform;

// External data representation, a protocol for serializing data to be sent over the network
pub mod xdr;

// Remote procedure call, a protocol build on top of XDR to provide something like C-style function calls over the network
pub mod rpc;

// A protocol using RPC that's meant to communicate with instruments like oscilloscopes, spectrum analyzers, etc
pub mod vxi11;

// Byte pipes to the instruments: VXI-11 links, raw sockets, serial ports
pub mod transport;

pub mod devices;

// Synthesizer power sweep with photodiode and spectrum analyzer readout
pub mod sweep;

pub use error::{Error, Result};
