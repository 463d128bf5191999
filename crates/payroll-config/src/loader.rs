//! Loading of configuration split across several files.
//!
//! The entry file may list further files under `include`, as a string or an
//! array of strings relative to the entry file's directory. Every top-level
//! section (`service`, `storage`, `api`, `seed`) is defined at most once
//! across the entry file and its includes. Included files hold sections only
//! and cannot include further files.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level sections of a configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Section {
	Service,
	Storage,
	Api,
	Seed,
}

impl Section {
	fn as_str(&self) -> &'static str {
		match self {
			Section::Service => "service",
			Section::Storage => "storage",
			Section::Api => "api",
			Section::Seed => "seed",
		}
	}

	fn from_key(key: &str) -> Option<Self> {
		match key {
			"service" => Some(Section::Service),
			"storage" => Some(Section::Storage),
			"api" => Some(Section::Api),
			"seed" => Some(Section::Seed),
			_ => None,
		}
	}
}

/// Assembles a [`Config`] from an entry file and the files it includes.
pub struct ConfigLoader {
	/// Directory that include paths are relative to.
	base_path: PathBuf,
	/// Each section collected so far, with the file that defined it.
	sections: BTreeMap<Section, (PathBuf, toml::Value)>,
}

impl ConfigLoader {
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			sections: BTreeMap::new(),
		}
	}

	/// Loads the entry file and its includes into a validated [`Config`].
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let entry = self.resolve_path(config_path.as_ref());
		let mut document = read_document(&entry).await?;

		let includes = match document.remove("include") {
			Some(value) => include_paths(value)?,
			None => Vec::new(),
		};
		self.collect(&entry, document)?;

		for include in includes {
			let path = self.resolve_path(&include);
			let document = read_document(&path).await?;
			if document.contains_key("include") {
				return Err(ConfigError::Validation(format!(
					"{} is included from {} and cannot include other files",
					path.display(),
					entry.display()
				)));
			}
			self.collect(&path, document)?;
		}

		self.assemble()
	}

	/// Records the sections of one document, rejecting unknown or repeated
	/// ones.
	fn collect(&mut self, source: &Path, document: toml::Table) -> Result<(), ConfigError> {
		for (key, value) in document {
			let section = Section::from_key(&key).ok_or_else(|| {
				ConfigError::Validation(format!(
					"Unknown section '{}' in {}. Expected service, storage, api or seed",
					key,
					source.display()
				))
			})?;

			if let Some((defined_in, _)) = self.sections.get(&section) {
				return Err(ConfigError::Validation(format!(
					"Duplicate section '{}' found in {} and {}",
					key,
					defined_in.display(),
					source.display()
				)));
			}
			self.sections.insert(section, (source.to_path_buf(), value));
		}
		Ok(())
	}

	fn assemble(&mut self) -> Result<Config, ConfigError> {
		let mut table = toml::Table::new();
		for (section, (_, value)) in std::mem::take(&mut self.sections) {
			table.insert(section.as_str().to_string(), value);
		}

		let config: Config = toml::Value::Table(table).try_into()?;
		config.validate()?;
		Ok(config)
	}

	fn resolve_path(&self, path: &Path) -> PathBuf {
		if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		}
	}
}

/// Reads a file and parses it after resolving environment references.
async fn read_document(path: &Path) -> Result<toml::Table, ConfigError> {
	let content = tokio::fs::read_to_string(path).await.map_err(|e| {
		ConfigError::Io(std::io::Error::new(
			e.kind(),
			format!("Cannot read configuration file {}: {}", path.display(), e),
		))
	})?;
	let resolved = resolve_env_vars(&content)?;
	Ok(toml::from_str(&resolved)?)
}

fn include_paths(value: toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
	match value {
		toml::Value::String(path) => Ok(vec![PathBuf::from(path)]),
		toml::Value::Array(items) => items
			.into_iter()
			.map(|item| match item {
				toml::Value::String(path) => Ok(PathBuf::from(path)),
				_ => Err(ConfigError::Validation(
					"Include array must contain only strings".into(),
				)),
			})
			.collect(),
		_ => Err(ConfigError::Validation(
			"Include must be a string or array of strings".into(),
		)),
	}
}
