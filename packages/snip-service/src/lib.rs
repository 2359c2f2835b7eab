pub mod ask;
pub mod capture;
pub mod notes;
pub mod search;

mod error;

pub use ask::{AskRequest, AskResponse};
pub use capture::CaptureRequest;
pub use error::{Diagnostics, Error, Result};
pub use notes::UpdateRequest;
pub use search::{SearchHit, SemanticSearchRequest, SemanticSearchResponse, VectorSearchRequest};

use std::{future::Future, pin::Pin, sync::Arc};

use snip_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use snip_providers::{answer, embedding, tagging};
use snip_storage::selector::{BackendHandle, BackendSelector};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

pub trait TagProvider
where
	Self: Send + Sync,
{
	fn generate_tags<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		text: &'a str,
		max_tags: usize,
	) -> BoxFuture<'a, color_eyre::Result<Vec<String>>>;
}

pub trait AnswerProvider
where
	Self: Send + Sync,
{
	fn answer<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		question: &'a str,
		context: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub tags: Arc<dyn TagProvider>,
	pub answer: Arc<dyn AnswerProvider>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		tags: Arc<dyn TagProvider>,
		answer: Arc<dyn AnswerProvider>,
	) -> Self {
		Self { embedding, tags, answer }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), tags: provider.clone(), answer: provider }
	}
}

/// Note capture and retrieval on top of whichever storage backend is currently selected.
pub struct SnipService {
	pub cfg: Config,
	pub selector: Arc<BackendSelector>,
	pub providers: Providers,
}
impl SnipService {
	pub fn new(cfg: Config, selector: Arc<BackendSelector>) -> Self {
		Self { cfg, selector, providers: Providers::default() }
	}

	pub fn with_providers(cfg: Config, selector: Arc<BackendSelector>, providers: Providers) -> Self {
		Self { cfg, selector, providers }
	}

	pub(crate) async fn backend(&self) -> Result<BackendHandle> {
		Ok(self.selector.backend().await?)
	}

	/// Embeds a single text with the configured provider.
	pub(crate) async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
		let texts = [text.to_string()];
		let vectors = self.providers.embedding.embed(&self.cfg.providers.embedding, &texts).await?;
		let count = vectors.len();
		let mut vectors = vectors.into_iter();

		match (vectors.next(), count) {
			(Some(vec), 1) => Ok(vec),
			_ => Err(Error::Provider {
				message: format!("Embedding provider returned {count} vectors for one input."),
			}),
		}
	}
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl TagProvider for DefaultProviders {
	fn generate_tags<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		text: &'a str,
		max_tags: usize,
	) -> BoxFuture<'a, color_eyre::Result<Vec<String>>> {
		Box::pin(tagging::generate_tags(cfg, text, max_tags))
	}
}

impl AnswerProvider for DefaultProviders {
	fn answer<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		question: &'a str,
		context: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(answer::answer_question(cfg, question, context))
	}
}
