use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub search: Search,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub backend: BackendKind,
	pub local: Local,
	pub remote: Option<Remote>,
}
impl Storage {
	/// Configuration of the backend currently selected by `storage.backend`.
	///
	/// Returns `None` when the remote backend is selected but `storage.remote` is absent.
	pub fn backend_config(&self) -> Option<BackendConfig> {
		match self.backend {
			BackendKind::Local => Some(BackendConfig::Local(self.local.clone())),
			BackendKind::Remote => self.remote.clone().map(BackendConfig::Remote),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
	Local,
	Remote,
}
impl fmt::Display for BackendKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Local => f.write_str("local"),
			Self::Remote => f.write_str("remote"),
		}
	}
}

/// Device-local SQLite store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Local {
	/// Database file, or `:memory:` for a process-private store.
	pub path: String,
	#[serde(default = "default_pool_max_conns")]
	pub pool_max_conns: u32,
}

/// Hosted Postgres with the pgvector extension.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remote {
	pub dsn: String,
	/// Overrides any password embedded in `dsn`.
	pub password: Option<String>,
	#[serde(default = "default_pool_max_conns")]
	pub pool_max_conns: u32,
}
impl fmt::Debug for Remote {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Remote")
			.field("dsn", &self.dsn)
			.field("password", &self.password.as_ref().map(|_| "<redacted>"))
			.field("pool_max_conns", &self.pool_max_conns)
			.finish()
	}
}

/// Everything needed to construct one storage backend. Two equal values describe the same
/// backend instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
	Local(Local),
	Remote(Remote),
}
impl BackendConfig {
	pub fn kind(&self) -> BackendKind {
		match self {
			Self::Local(_) => BackendKind::Local,
			Self::Remote(_) => BackendKind::Remote,
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub llm: LlmProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	/// Requested output size. Providers that ignore it return their native length.
	pub dimensions: Option<u32>,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Search {
	pub similarity_threshold: f32,
	pub default_limit: usize,
	pub max_tags: usize,
	pub answer_context_notes: usize,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			similarity_threshold: 0.3,
			default_limit: 10,
			max_tags: 5,
			answer_context_notes: 5,
		}
	}
}

fn default_pool_max_conns() -> u32 {
	4
}
