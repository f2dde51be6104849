//! In-memory datasets backing native (file-based) data cubes

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::{collections::BTreeMap, sync::Arc};

use crate::external::{AttributeInfo, AttributeType, Executor};
use crate::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Null,
	Bool(bool),
	Number(f64),
	String(String),
	Time(DateTime<Utc>),
}

pub type Row = BTreeMap<String, Value>;

impl Value {
	pub fn from_json(value: serde_json::Value) -> Self {
		match value {
			serde_json::Value::Null => Value::Null,
			serde_json::Value::Bool(b) => Value::Bool(b),
			serde_json::Value::Number(n) => n.as_f64().map_or(Value::Null, Value::Number),
			serde_json::Value::String(s) => Value::String(s),
			other => Value::String(other.to_string()),
		}
	}

	/// Interprets one delimited-text cell
	pub fn from_text(cell: &str) -> Self {
		let cell = cell.trim();
		if cell.is_empty() {
			return Value::Null;
		}
		match cell {
			"true" => return Value::Bool(true),
			"false" => return Value::Bool(false),
			_ => {}
		}
		match cell.parse::<f64>() {
			Ok(n) if n.is_finite() => Value::Number(n),
			_ => Value::String(cell.to_string()),
		}
	}

	pub fn kind(&self) -> Option<AttributeType> {
		match self {
			Value::Null => None,
			Value::Bool(_) => Some(AttributeType::Boolean),
			Value::Number(_) => Some(AttributeType::Number),
			Value::String(_) => Some(AttributeType::String),
			Value::Time(_) => Some(AttributeType::Time),
		}
	}

	/// Textual form used when matching static subset values
	pub fn to_text(&self) -> Option<String> {
		match self {
			Value::Null => None,
			Value::Bool(b) => Some(b.to_string()),
			Value::Number(n) => Some(n.to_string()),
			Value::String(s) => Some(s.clone()),
			Value::Time(t) => Some(t.to_rfc3339()),
		}
	}

	/// Coerces a raw value into a point in time, `None` if it is not one
	#[allow(clippy::cast_possible_truncation)]
	pub fn to_time(&self) -> Option<DateTime<Utc>> {
		match self {
			Value::Time(t) => Some(*t),
			Value::Number(ms) => DateTime::from_timestamp_millis(*ms as i64),
			Value::String(s) => parse_time(s),
			Value::Null | Value::Bool(_) => None,
		}
	}
}

fn parse_time(s: &str) -> Option<DateTime<Utc>> {
	if let Ok(t) = DateTime::parse_from_rfc3339(s) {
		return Some(t.with_timezone(&Utc));
	}
	for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
		if let Ok(t) = NaiveDateTime::parse_from_str(s, fmt) {
			return Some(t.and_utc());
		}
	}
	NaiveDate::parse_from_str(s, "%Y-%m-%d")
		.ok()
		.and_then(|d| d.and_hms_opt(0, 0, 0))
		.map(|t| t.and_utc())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
	pub attributes: Vec<AttributeInfo>,
	pub rows: Vec<Row>,
	/// Whether default aggregations may sum this dataset's rows
	pub summable: bool,
}

impl Dataset {
	pub fn from_rows(rows: Vec<Row>) -> Self {
		let attributes = infer_attributes(&rows);
		Self { attributes, rows, summable: true }
	}

	/// Turns every value of `column` into a time (null if unparseable)
	pub fn coerce_time(mut self, column: &str) -> Self {
		let mut touched = false;
		for row in &mut self.rows {
			if let Some(value) = row.get_mut(column) {
				*value = value.to_time().map_or(Value::Null, Value::Time);
				touched = true;
			}
		}
		if touched {
			self.attributes = infer_attributes(&self.rows);
			if let Some(attr) = self.attributes.iter_mut().find(|a| a.name == column) {
				attr.kind = AttributeType::Time;
			}
		}
		self
	}

	pub fn hide(mut self) -> Self {
		self.summable = false;
		self
	}

	pub fn filter(mut self, keep: impl Fn(&Row) -> bool) -> Self {
		self.rows.retain(|row| keep(row));
		self
	}

	pub fn max_time(&self, column: &str) -> Option<DateTime<Utc>> {
		self.rows
			.iter()
			.filter_map(|row| match row.get(column) {
				Some(Value::Time(t)) => Some(*t),
				_ => None,
			})
			.max()
	}
}

/// Attribute list in column order, typed by the values seen in each column
fn infer_attributes(rows: &[Row]) -> Vec<AttributeInfo> {
	let mut kinds: BTreeMap<&str, Option<AttributeType>> = BTreeMap::new();
	for row in rows {
		for (name, value) in row {
			let seen = kinds.entry(name.as_str()).or_insert(None);
			*seen = match (*seen, value.kind()) {
				(prev, None) => prev,
				(None, kind) => kind,
				(Some(a), Some(b)) if a == b => Some(a),
				_ => Some(AttributeType::String),
			};
		}
	}
	kinds
		.into_iter()
		.map(|(name, kind)| AttributeInfo::new(name, kind.unwrap_or(AttributeType::String)))
		.collect()
}

/// Answers metadata probes directly from a loaded dataset
#[derive(Debug)]
pub struct DatasetExecutor {
	dataset: Arc<Dataset>,
}

impl DatasetExecutor {
	pub fn new(dataset: Arc<Dataset>) -> Self {
		Self { dataset }
	}
}

#[async_trait]
impl Executor for DatasetExecutor {
	async fn max_time(&self, time_attribute: &str) -> CuResult<Option<DateTime<Utc>>> {
		Ok(self.dataset.max_time(time_attribute))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	fn row(pairs: &[(&str, Value)]) -> Row {
		pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
	}

	#[test]
	fn test_from_text() {
		assert_eq!(Value::from_text(""), Value::Null);
		assert_eq!(Value::from_text("true"), Value::Bool(true));
		assert_eq!(Value::from_text(" 42 "), Value::Number(42.0));
		assert_eq!(Value::from_text("en"), Value::String("en".into()));
	}

	#[test]
	fn test_time_formats() {
		let expected = Utc.with_ymd_and_hms(2015, 9, 12, 23, 0, 0).single();
		assert_eq!(Value::String("2015-09-12T23:00:00Z".into()).to_time(), expected);
		assert_eq!(Value::String("2015-09-12T23:00:00.000Z".into()).to_time(), expected);
		assert_eq!(Value::String("2015-09-12 23:00:00".into()).to_time(), expected);
		assert_eq!(Value::Number(1_442_098_800_000.0).to_time(), expected);
		assert_eq!(Value::String("yesterday".into()).to_time(), None);
	}

	#[test]
	fn test_infer_and_coerce() {
		let rows = vec![
			row(&[
				("time", Value::String("2015-09-12T23:00:00Z".into())),
				("added", Value::Number(3.0)),
			]),
			row(&[
				("time", Value::String("2015-09-12T23:30:00Z".into())),
				("added", Value::Null),
			]),
		];
		let dataset = Dataset::from_rows(rows);
		assert_eq!(
			dataset.attributes,
			vec![
				AttributeInfo::new("added", AttributeType::Number),
				AttributeInfo::new("time", AttributeType::String),
			]
		);

		let dataset = dataset.coerce_time("time");
		assert!(dataset.attributes.contains(&AttributeInfo::new("time", AttributeType::Time)));
		assert_eq!(
			dataset.max_time("time"),
			Utc.with_ymd_and_hms(2015, 9, 12, 23, 30, 0).single()
		);
	}

	#[test]
	fn test_mixed_column_becomes_string() {
		let dataset = Dataset::from_rows(vec![
			row(&[("channel", Value::Number(1.0))]),
			row(&[("channel", Value::String("en".into()))]),
		]);
		assert_eq!(dataset.attributes, vec![AttributeInfo::new("channel", AttributeType::String)]);
	}

	#[tokio::test]
	async fn test_dataset_executor() {
		let dataset = Dataset::from_rows(vec![row(&[(
			"time",
			Value::String("2020-01-01T00:00:00Z".into()),
		)])])
		.coerce_time("time");
		let executor = DatasetExecutor::new(Arc::new(dataset));
		let max = executor.max_time("time").await.unwrap_or_default();
		assert_eq!(max, Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).single());
	}
}

// vim: ts=4
