
// Per-model constants for the oscilloscopes we talk to.  Anything that differs between instrument
// families (grid size, ADC counts per division, unit suffixes, DAT2 framing) belongs here rather
// than in the driver.

use std::fs;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::numeric::{UnitMultiplier, ENGINEERING_UNITS};

lazy_static! {
	static ref IDN_RE: Regex = Regex::new("([^,]+),([^,]+),([^,]+),([^,\\s]+)").unwrap();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
	pub model: String,
	pub channels: u8,
	pub horizontal_divisions: f64,
	pub counts_per_division: f64,
	pub unit_multipliers: Vec<UnitMultiplier>,
	pub dat2_header_len: usize,
	pub dat2_trailer_len: usize,
}

impl ModelProfile {
	fn siglent_x_e(model:&str, channels:u8) -> Self {
		Self {
			model: model.to_owned(),
			channels,
			horizontal_divisions: 14.0,
			counts_per_division: 25.0,
			unit_multipliers: ENGINEERING_UNITS.to_vec(),
			dat2_header_len: 15,
			dat2_trailer_len: 2,
		}
	}

	pub fn chan_ok(&self, n:u8) -> Result<()> {
		if n == 0 || n > self.channels {
			Err(Error::instrument(format!("{} only has {} channels, channel {} requested", self.model, self.channels, n)))
		} else {
			Ok(())
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSet {
	pub profiles: Vec<ModelProfile>,
}

impl Default for ProfileSet {
	fn default() -> Self {
		Self{ profiles: vec![
			ModelProfile::siglent_x_e("SDS1104X-E", 4),
			ModelProfile::siglent_x_e("SDS1202X-E", 2),
		]}
	}
}

impl ProfileSet {

	pub fn from_json_str(s:&str) -> Result<Self> {
		let set:ProfileSet = serde_json::from_str(s)?;
		if set.profiles.is_empty() {
			return Err(Error::Config("profile set contains no models".to_owned()));
		}
		Ok(set)
	}

	pub fn from_json_file<P: AsRef<Path>>(path:P) -> Result<Self> {
		let text:String = fs::read_to_string(path)?;
		Self::from_json_str(&text)
	}

	pub fn get(&self, model:&str) -> Option<&ModelProfile> {
		self.profiles.iter().find(|p| p.model.eq_ignore_ascii_case(model))
	}

	/// Finds the profile named by the model field of an `*IDN?` reply, e.g.
	/// `"Siglent Technologies,SDS1104X-E,SDSMMEBQ4R5097,8.2.6.1.37R9"`.
	pub fn for_idn(&self, idn:&str) -> Result<&ModelProfile> {
		let model:&str = parse_idn(idn)?.model;
		self.get(model).ok_or_else(|| Error::instrument(format!("no profile for model {}", model)))
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Identity<'a> {
	pub manufacturer: &'a str,
	pub model: &'a str,
	pub serial_num: &'a str,
	pub fw_version: &'a str,
}

pub fn parse_idn(idn:&str) -> Result<Identity<'_>> {
	let caps = IDN_RE.captures(idn.trim()).ok_or_else(|| Error::parse("*IDN? reply", idn))?;
	let field = |i:usize| caps.get(i).map(|m| m.as_str().trim()).unwrap_or("");
	Ok(Identity{ manufacturer: field(1), model: field(2), serial_num: field(3), fw_version: field(4) })
}

#[cfg(test)]
mod tests {
	use super::*;

	const IDN:&str = "Siglent Technologies,SDS1104X-E,SDSMMEBQ4R5097,8.2.6.1.37R9\n";

	#[test]
	fn idn_fields() {
		let id = parse_idn(IDN).unwrap();
		assert_eq!(id.manufacturer, "Siglent Technologies");
		assert_eq!(id.model, "SDS1104X-E");
		assert_eq!(id.serial_num, "SDSMMEBQ4R5097");
		assert_eq!(id.fw_version, "8.2.6.1.37R9");
	}

	#[test]
	fn built_in_profiles() {
		let set = ProfileSet::default();
		let p = set.for_idn(IDN).unwrap();
		assert_eq!(p.channels, 4);
		assert_eq!(p.horizontal_divisions, 14.0);
		assert_eq!(p.counts_per_division, 25.0);
		assert!(set.get("sds1202x-e").is_some());
		assert!(set.for_idn("Anritsu,MS2721B,123,1.0").is_err());
	}

	#[test]
	fn channel_range() {
		let set = ProfileSet::default();
		let p = set.get("SDS1202X-E").unwrap();
		assert!(p.chan_ok(1).is_ok());
		assert!(p.chan_ok(2).is_ok());
		assert!(p.chan_ok(0).is_err());
		assert!(p.chan_ok(3).is_err());
	}

	#[test]
	fn json_round_trip_keeps_new_models() {
		let mut set = ProfileSet::default();
		let mut wide = set.profiles[0].clone();
		wide.model = "SDS2104X Plus".to_owned();
		wide.horizontal_divisions = 10.0;
		set.profiles.push(wide);

		let text = serde_json::to_string(&set).unwrap();
		let loaded = ProfileSet::from_json_str(&text).unwrap();
		assert_eq!(loaded.get("SDS2104X Plus").unwrap().horizontal_divisions, 10.0);
		assert_eq!(loaded.profiles[0].unit_multipliers[0].symbol, 'G');
	}

	#[test]
	fn empty_profile_set_is_rejected() {
		assert!(matches!(ProfileSet::from_json_str("{\"profiles\":[]}"), Err(Error::Config(_))));
		assert!(matches!(ProfileSet::from_json_str("not json"), Err(Error::Config(_))));
	}
}
