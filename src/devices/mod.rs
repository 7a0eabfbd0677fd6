
// One module per instrument.  Each driver is generic over `Transport` so it can be pointed at a
// VXI-11 link, a raw socket, a serial port or a `Loopback` in tests.

pub mod ms2721b;
pub mod sds1104x;
pub mod synthhd;

pub use ms2721b::MS2721B;
pub use sds1104x::SDS1104X;
pub use synthhd::SynthHD;
