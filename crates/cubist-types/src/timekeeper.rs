//! Per-data-cube cache of the latest known event time.
//!
//! A `Timekeeper` is an immutable value; every update returns a new one which
//! the owner swaps in atomically.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::data_cube::{DataCube, RefreshRule};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeTag {
	pub name: String,
	/// Latest event time reported by the last successful check
	pub time: Option<DateTime<Utc>>,
	/// When the last successful check completed
	pub updated: Option<DateTime<Utc>>,
}

impl TimeTag {
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: name.into(), time: None, updated: None }
	}

	/// Never checked, or last checked longer than `interval` ago
	pub fn is_stale(&self, now: DateTime<Utc>, interval: Duration) -> bool {
		match self.updated {
			None => true,
			Some(updated) => {
				let interval = chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::MAX);
				now.signed_duration_since(updated) > interval
			}
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timekeeper {
	time_tags: Vec<TimeTag>,
}

impl Timekeeper {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn time_tags(&self) -> &[TimeTag] {
		&self.time_tags
	}

	pub fn tag(&self, name: &str) -> Option<&TimeTag> {
		self.time_tags.iter().find(|t| t.name == name)
	}

	pub fn time(&self, name: &str) -> Option<DateTime<Utc>> {
		self.tag(name).and_then(|t| t.time)
	}

	/// Current max time of a data cube according to its refresh rule
	pub fn time_for(&self, cube: &DataCube) -> Option<DateTime<Utc>> {
		match &cube.refresh_rule {
			RefreshRule::Fixed { time } => Some(*time),
			RefreshRule::Realtime => Some(Utc::now()),
			RefreshRule::Query => self.time(&cube.name),
		}
	}

	/// Adds a fresh (stale) tag, replacing any existing one with the same name
	pub fn add_time_tag_for(&self, name: &str) -> Timekeeper {
		let mut time_tags: Vec<TimeTag> =
			self.time_tags.iter().filter(|t| t.name != name).cloned().collect();
		time_tags.push(TimeTag::new(name));
		Timekeeper { time_tags }
	}

	pub fn remove_time_tag_for(&self, name: &str) -> Timekeeper {
		Timekeeper { time_tags: self.time_tags.iter().filter(|t| t.name != name).cloned().collect() }
	}

	/// Records a check result; unknown names are ignored
	pub fn update_time(&self, name: &str, time: DateTime<Utc>, now: DateTime<Utc>) -> Timekeeper {
		let time_tags = self
			.time_tags
			.iter()
			.map(|t| {
				if t.name == name {
					TimeTag { name: t.name.clone(), time: Some(time), updated: Some(now) }
				} else {
					t.clone()
				}
			})
			.collect();
		Timekeeper { time_tags }
	}

	pub fn stale_tags(&self, now: DateTime<Utc>, interval: Duration) -> Vec<String> {
		self.time_tags
			.iter()
			.filter(|t| t.is_stale(now, interval))
			.map(|t| t.name.clone())
			.collect()
	}
}


// vim: ts=4
