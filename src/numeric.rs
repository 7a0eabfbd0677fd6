
// Helpers for pulling numbers out of SCPI replies such as "C1:VDIV 500E-3V" or "SARA 2GSa/s"

use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitMultiplier {
	pub symbol: char,
	pub factor: f64,
}

pub const ENGINEERING_UNITS:[UnitMultiplier; 3] = [
	UnitMultiplier{ symbol: 'G', factor: 1e9 },
	UnitMultiplier{ symbol: 'M', factor: 1e6 },
	UnitMultiplier{ symbol: 'k', factor: 1e3 },
];

// Instruments may echo the command ahead of the value, so the value is always the last token
fn last_token(response:&str) -> Option<&str> {
	response.split_whitespace().last()
}

fn is_numeric_char(c:char) -> bool {
	c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | 'e' | 'E')
}

/// Parses the last whitespace-separated token of `response` after dropping any trailing unit
/// characters, e.g. `"C1:OFST -1.50E+00V"` gives `-1.5`.  Exponent markers and signs are kept, so
/// a cut-off exponent such as `"2.5E+"` is an error rather than `2.5`.
pub fn parse_numeric(response:&str) -> Result<f64> {
	let token:&str = last_token(response).ok_or_else(|| Error::parse("numeric value", response))?;
	let value_str:&str = token.trim_end_matches(|c:char| !is_numeric_char(c));

	if !value_str.chars().any(|c| c.is_ascii_digit()) {
		return Err(Error::parse("numeric value", response));
	}

	value_str.parse::<f64>().map_err(|_| Error::parse("numeric value", response))
}

/// Like `parse_numeric`, but a unit symbol from `units` found in the value token scales the
/// number in front of it. The first matching entry of the table wins.
pub fn parse_scaled(response:&str, units:&[UnitMultiplier]) -> Result<f64> {
	let token:&str = last_token(response).ok_or_else(|| Error::parse("scaled value", response))?;

	for unit in units {
		if let Some(idx) = token.find(unit.symbol) {
			let mantissa:f64 = parse_numeric(&token[..idx])
				.map_err(|_| Error::parse("scaled value", response))?;
			return Ok(mantissa * unit.factor);
		}
	}

	parse_numeric(token)
}
