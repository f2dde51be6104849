//! Source of the initial settings snapshot

use std::path::{Path, PathBuf};

use cubist_types::AppSettings;

use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsFormat {
	Yaml,
	Json,
}

impl SettingsFormat {
	/// `.json` is JSON, anything else is YAML
	pub fn from_path(path: &Path) -> Self {
		match path.extension().and_then(|e| e.to_str()) {
			Some(ext) if ext.eq_ignore_ascii_case("json") => SettingsFormat::Json,
			_ => SettingsFormat::Yaml,
		}
	}

	pub fn parse(self, content: &str) -> CuResult<AppSettings> {
		let settings: AppSettings = match self {
			SettingsFormat::Yaml => serde_yaml::from_str(content)?,
			SettingsFormat::Json => serde_json::from_str(content)?,
		};
		settings.validate()?;
		Ok(settings)
	}
}

#[derive(Debug)]
enum Backend {
	Transient(AppSettings),
	File { path: PathBuf, format: SettingsFormat },
}

/// Hands out the settings the manager bootstraps from
#[derive(Debug)]
pub struct SettingsStore {
	backend: Backend,
}

impl SettingsStore {
	/// Settings held in memory
	pub fn transient(settings: AppSettings) -> Self {
		Self { backend: Backend::Transient(settings) }
	}

	pub fn from_file(path: impl Into<PathBuf>, format: SettingsFormat) -> Self {
		Self { backend: Backend::File { path: path.into(), format } }
	}

	/// Like [`SettingsStore::from_file`], guessing the format from the extension
	pub fn from_path(path: impl Into<PathBuf>) -> Self {
		let path = path.into();
		let format = SettingsFormat::from_path(&path);
		Self::from_file(path, format)
	}

	pub async fn read_settings(&self) -> CuResult<AppSettings> {
		match &self.backend {
			Backend::Transient(settings) => {
				settings.validate()?;
				Ok(settings.clone())
			}
			Backend::File { path, format } => {
				debug!("Reading settings from {}", path.display());
				let content = tokio::fs::read_to_string(path).await?;
				format.parse(&content)
			}
		}
	}
}


// vim: ts=4
