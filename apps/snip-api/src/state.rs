use std::sync::Arc;

use color_eyre::eyre;
use tokio::sync::watch;

use snip_config::{BackendConfig, Config};
use snip_service::{Providers, SnipService};
use snip_storage::selector::{self, BackendSelector};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<SnipService>,
	/// Published backend configuration. The selector follows it.
	pub backend_config: Arc<watch::Sender<BackendConfig>>,
}
impl AppState {
	pub async fn new(config: Config) -> color_eyre::Result<Self> {
		Self::with_providers(config, selector::global(), Providers::default()).await
	}

	pub async fn with_providers(
		config: Config,
		selector: Arc<BackendSelector>,
		providers: Providers,
	) -> color_eyre::Result<Self> {
		let initial = config
			.storage
			.backend_config()
			.ok_or_else(|| eyre::eyre!("storage.remote is required when backend is remote."))?;

		selector.select(initial.clone()).await?;

		let (tx, rx) = watch::channel(initial);

		// Detached: the follower lives as long as the sender in this state.
		let _ = selector.follow(rx);

		let service = SnipService::with_providers(config, selector, providers);

		Ok(Self { service: Arc::new(service), backend_config: Arc::new(tx) })
	}
}
