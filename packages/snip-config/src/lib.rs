mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	BackendConfig, BackendKind, Config, EmbeddingProviderConfig, LlmProviderConfig, Local,
	Providers, Remote, Search, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	parse(&raw, path)
}

pub fn from_toml_str(raw: &str) -> Result<Config> {
	parse(raw, Path::new("<inline>"))
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}

	validate_local(&cfg.storage.local)?;

	if let Some(remote) = cfg.storage.remote.as_ref() {
		validate_remote(remote)?;
	}
	if cfg.storage.backend == BackendKind::Remote && cfg.storage.remote.is_none() {
		return Err(Error::Validation {
			message: "storage.remote is required when storage.backend is remote.".to_string(),
		});
	}

	let threshold = cfg.search.similarity_threshold;

	if !threshold.is_finite() {
		return Err(Error::Validation {
			message: "search.similarity_threshold must be a finite number.".to_string(),
		});
	}
	if !(-1.0..=1.0).contains(&threshold) {
		return Err(Error::Validation {
			message: "search.similarity_threshold must be in the range -1.0-1.0.".to_string(),
		});
	}
	if cfg.search.default_limit == 0 {
		return Err(Error::Validation {
			message: "search.default_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.search.answer_context_notes == 0 {
		return Err(Error::Validation {
			message: "search.answer_context_notes must be greater than zero.".to_string(),
		});
	}
	if let Some(dimensions) = cfg.providers.embedding.dimensions
		&& dimensions == 0
	{
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if !cfg.providers.llm.temperature.is_finite() {
		return Err(Error::Validation {
			message: "providers.llm.temperature must be a finite number.".to_string(),
		});
	}

	for (label, key) in
		[("embedding", &cfg.providers.embedding.api_key), ("llm", &cfg.providers.llm.api_key)]
	{
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	Ok(())
}

pub fn validate_backend(cfg: &BackendConfig) -> Result<()> {
	match cfg {
		BackendConfig::Local(local) => validate_local(local),
		BackendConfig::Remote(remote) => validate_remote(remote),
	}
}

fn parse(raw: &str, path: &Path) -> Result<Config> {
	let mut cfg: Config = toml::from_str(raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

fn validate_local(local: &Local) -> Result<()> {
	if local.path.trim().is_empty() {
		return Err(Error::Validation { message: "storage.local.path must be non-empty.".to_string() });
	}
	if local.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.local.pool_max_conns must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn validate_remote(remote: &Remote) -> Result<()> {
	if remote.dsn.trim().is_empty() {
		return Err(Error::Validation { message: "storage.remote.dsn must be non-empty.".to_string() });
	}
	if remote.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.remote.pool_max_conns must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if let Some(remote) = cfg.storage.remote.as_mut()
		&& remote.password.as_deref().map(|password| password.trim().is_empty()).unwrap_or(false)
	{
		remote.password = None;
	}
}
