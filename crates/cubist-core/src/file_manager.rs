//! File manager. Loads the dataset of one native data cube from a local file.
//!
//! Single shot: the file is read once during `init()`, there is no background
//! refresh. Load failures are logged and leave the cube unqueryable.

use std::{
	path::{Path, PathBuf},
	sync::Arc,
};

use cubist_types::{Dataset, Row, SubsetFilter, Value};

use crate::prelude::*;

/// Receives the loaded dataset
pub type DatasetCallback = Arc<dyn Fn(Dataset) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
	Csv,
	Tsv,
	Json,
}

impl FileFormat {
	pub fn from_path(path: &Path) -> CuResult<Self> {
		let ext = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
		match ext.as_deref() {
			Some("csv") => Ok(FileFormat::Csv),
			Some("tsv") => Ok(FileFormat::Tsv),
			Some("json") => Ok(FileFormat::Json),
			_ => Err(Error::Parse(format!("unsupported file type: {}", path.display()))),
		}
	}
}

/// Parses file content into rows.
///
/// JSON accepts either an array of objects or newline-delimited objects.
pub fn parse_data(content: &str, format: FileFormat) -> CuResult<Vec<Row>> {
	match format {
		FileFormat::Csv => parse_delimited(content, b','),
		FileFormat::Tsv => parse_delimited(content, b'\t'),
		FileFormat::Json => parse_json(content),
	}
}

fn parse_delimited(content: &str, delimiter: u8) -> CuResult<Vec<Row>> {
	let mut reader = csv::ReaderBuilder::new()
		.delimiter(delimiter)
		.quoting(delimiter != b'\t')
		.from_reader(content.as_bytes());
	let headers = reader.headers()?.clone();

	let mut rows = Vec::new();
	for record in reader.records() {
		let record = record?;
		let row: Row = headers
			.iter()
			.zip(record.iter())
			.map(|(name, cell)| (name.to_string(), Value::from_text(cell)))
			.collect();
		rows.push(row);
	}
	Ok(rows)
}

fn parse_json(content: &str) -> CuResult<Vec<Row>> {
	let content = content.trim_start();
	let objects: Vec<serde_json::Map<String, serde_json::Value>> = if content.starts_with('[') {
		serde_json::from_str(content)?
	} else {
		content
			.lines()
			.filter(|line| !line.trim().is_empty())
			.map(serde_json::from_str)
			.collect::<Result<_, _>>()?
	};

	Ok(objects
		.into_iter()
		.map(|obj| obj.into_iter().map(|(k, v)| (k, Value::from_json(v))).collect())
		.collect())
}

pub struct FileManagerOptions {
	/// Data cube the file belongs to (for logging)
	pub data_cube: String,
	pub anchor_path: PathBuf,
	/// File path, relative paths are resolved against `anchor_path`
	pub uri: String,
	pub time_attribute: String,
	pub subset: Option<SubsetFilter>,
	pub on_dataset_change: DatasetCallback,
}

pub struct FileManager {
	data_cube: String,
	path: PathBuf,
	time_attribute: String,
	subset: Option<SubsetFilter>,
	on_dataset_change: DatasetCallback,
}

impl FileManager {
	pub fn new(opts: FileManagerOptions) -> Self {
		let path = Path::new(&opts.uri);
		let path = if path.is_absolute() { path.to_path_buf() } else { opts.anchor_path.join(path) };
		Self {
			data_cube: opts.data_cube,
			path,
			time_attribute: opts.time_attribute,
			subset: opts.subset,
			on_dataset_change: opts.on_dataset_change,
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Loads the file and hands the dataset over. Never fails.
	pub async fn init(&self) {
		match self.load().await {
			Ok(dataset) => {
				info!(
					data_cube = %self.data_cube,
					"Loaded {} rows from {}",
					dataset.rows.len(),
					self.path.display()
				);
				(self.on_dataset_change)(dataset);
			}
			Err(err) => {
				error!(
					data_cube = %self.data_cube,
					"Failed to load {}: {}",
					self.path.display(),
					err
				);
			}
		}
	}

	async fn load(&self) -> CuResult<Dataset> {
		let format = FileFormat::from_path(&self.path)?;
		let content = tokio::fs::read_to_string(&self.path).await?;
		let rows = parse_data(&content, format)?;

		let mut dataset = Dataset::from_rows(rows).coerce_time(&self.time_attribute).hide();
		if let Some(subset) = &self.subset {
			dataset = dataset.filter(|row| subset.matches(row));
		}
		Ok(dataset)
	}

	/// Nothing to release
	pub fn destroy(&self) {}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_format_from_extension() {
		assert_eq!(FileFormat::from_path(Path::new("a/wiki.JSON")).ok(), Some(FileFormat::Json));
		assert_eq!(FileFormat::from_path(Path::new("wiki.tsv")).ok(), Some(FileFormat::Tsv));
		assert!(FileFormat::from_path(Path::new("wiki.parquet")).is_err());
		assert!(FileFormat::from_path(Path::new("wiki")).is_err());
	}

	#[test]
	fn test_parse_csv() {
		let rows = parse_data("time,channel,added\n2015-09-12T00:00:00Z,en,3\n", FileFormat::Csv)
			.unwrap();
		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0].get("channel"), Some(&Value::String("en".into())));
		assert_eq!(rows[0].get("added"), Some(&Value::Number(3.0)));
	}

	#[test]
	fn test_parse_tsv() {
		let rows = parse_data("page\tdelta\n\"Main\" page\t-2\n", FileFormat::Tsv).unwrap();
		assert_eq!(rows[0].get("page"), Some(&Value::String("\"Main\" page".into())));
		assert_eq!(rows[0].get("delta"), Some(&Value::Number(-2.0)));
	}

	#[test]
	fn test_parse_json_array_and_lines() {
		let array = parse_data(r#"[{"a": 1}, {"a": 2, "b": "x"}]"#, FileFormat::Json).unwrap();
		let lines = parse_data("{\"a\": 1}\n\n{\"a\": 2, \"b\": \"x\"}\n", FileFormat::Json).unwrap();
		assert_eq!(array, lines);
		assert_eq!(array[1].get("b"), Some(&Value::String("x".into())));
	}

	#[test]
	fn test_parse_json_garbage() {
		assert!(matches!(parse_data("{not json", FileFormat::Json), Err(Error::Parse(_))));
	}

	#[test]
	fn test_relative_path_is_anchored() {
		let manager = FileManager::new(FileManagerOptions {
			data_cube: "wiki".into(),
			anchor_path: PathBuf::from("/srv/cubist"),
			uri: "assets/wiki.json".into(),
			time_attribute: "time".into(),
			subset: None,
			on_dataset_change: Arc::new(|_: Dataset| {}),
		});
		assert_eq!(manager.path(), Path::new("/srv/cubist/assets/wiki.json"));
	}
}

// vim: ts=4
