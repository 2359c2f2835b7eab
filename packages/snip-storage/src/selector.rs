//! Chooses which backend serves requests and swaps it when configuration changes.
//!
//! At most one backend instance is live at a time. Handles given out by
//! [`BackendSelector::backend`] are bound to the instance that was live when they were taken;
//! after a reselection they fail with [`Error::Reselected`] instead of reaching the new store.

use std::sync::{
	Arc, LazyLock,
	atomic::{AtomicBool, Ordering},
};

use tokio::{
	sync::{Mutex, OnceCell, RwLock, RwLockReadGuard, watch},
	task::JoinHandle,
};

use snip_config::{BackendConfig, BackendKind};
use snip_domain::{
	note::{NewNote, Note, NoteId, NoteUpdate, ScoredNote},
	similarity::VectorQuery,
};

use crate::{BoxFuture, Error, NoteBackend, Result, backend};

pub type BackendFactory = Arc<dyn Fn(&BackendConfig) -> Arc<dyn NoteBackend> + Send + Sync>;

static GLOBAL: LazyLock<Arc<BackendSelector>> = LazyLock::new(|| Arc::new(BackendSelector::new()));

/// The process-wide selector.
pub fn global() -> Arc<BackendSelector> {
	GLOBAL.clone()
}

pub struct BackendSelector {
	state: Mutex<SelectorState>,
	/// Serializes [`BackendSelector::publish`] with the follower so published values and
	/// selections happen in the same order.
	publishing: Mutex<()>,
	factory: BackendFactory,
}
impl BackendSelector {
	pub fn new() -> Self {
		Self::with_factory(Arc::new(backend::build_backend))
	}

	/// A selector that builds backends with `factory` instead of connecting to real stores.
	pub fn with_factory(factory: BackendFactory) -> Self {
		Self { state: Mutex::new(SelectorState::default()), publishing: Mutex::new(()), factory }
	}

	/// Records the configuration future calls are served with.
	///
	/// Selecting the configuration already in effect does nothing. Otherwise the live instance,
	/// if any, is retired: handles bound to it start failing, requests already running against
	/// it are allowed to finish, and then its connections are closed. The next instance is not
	/// built until someone asks for it. An instance that is still initializing is abandoned
	/// without waiting for it.
	pub async fn select(&self, cfg: BackendConfig) -> Result<()> {
		snip_config::validate_backend(&cfg)
			.map_err(|err| Error::InvalidArgument(err.to_string()))?;

		let retired = {
			let mut state = self.state.lock().await;

			if state.live.as_ref().is_some_and(|slot| slot.cfg == cfg) {
				return Ok(());
			}

			tracing::info!(
				from = ?state.live.as_ref().map(|slot| slot.cfg.kind()),
				to = %cfg.kind(),
				"Storage backend reselected."
			);

			state.epoch += 1;

			let slot = Arc::new(Slot::new(state.epoch, cfg));
			let retired = state.live.replace(slot);

			if let Some(slot) = retired.as_ref() {
				slot.retired.store(true, Ordering::SeqCst);
			}

			retired
		};

		if let Some(slot) = retired {
			// Waits for every in-flight request on the old instance.
			let _drained = slot.inflight.write().await;

			slot.shut_down().await;
		}

		Ok(())
	}

	/// Selects `cfg` and then publishes it on `tx`, as one step with respect to other
	/// publishers and to [`BackendSelector::follow`].
	pub async fn publish(
		&self,
		tx: &watch::Sender<BackendConfig>,
		cfg: BackendConfig,
	) -> Result<()> {
		let _publishing = self.publishing.lock().await;

		self.select(cfg.clone()).await?;
		tx.send_replace(cfg);

		Ok(())
	}

	/// A handle to the live backend, constructing and initializing it on first use.
	///
	/// Initialization runs outside the selector's lock, so a store that is slow to connect
	/// delays only the requests waiting on it.
	pub async fn backend(&self) -> Result<BackendHandle> {
		let slot = self.state.lock().await.live.clone().ok_or(Error::NoBackend)?;
		let backend = slot
			.backend
			.get_or_try_init(|| async {
				let backend = (self.factory)(&slot.cfg);

				backend.init().await?;

				tracing::info!(epoch = slot.epoch, kind = %backend.kind(), "Storage backend ready.");

				Ok::<_, Error>(backend)
			})
			.await?
			.clone();

		// A reselection may have retired the slot while it was initializing. Whichever side
		// sees the other closes the instance; closing twice is harmless.
		if slot.retired.load(Ordering::SeqCst) {
			slot.shut_down().await;

			return Err(Error::Reselected);
		}

		Ok(BackendHandle { slot, backend })
	}

	pub async fn current_kind(&self) -> Option<BackendKind> {
		self.current_config().await.as_ref().map(BackendConfig::kind)
	}

	pub async fn current_config(&self) -> Option<BackendConfig> {
		self.state.lock().await.live.as_ref().map(|slot| slot.cfg.clone())
	}

	/// Reselects every time `rx` publishes a new configuration. The value current at the time of
	/// the call counts only if the receiver has not seen it yet (see
	/// [`watch::Receiver::mark_changed`]). The task ends when the sender is dropped.
	pub fn follow(self: &Arc<Self>, mut rx: watch::Receiver<BackendConfig>) -> JoinHandle<()> {
		let selector = self.clone();

		tokio::spawn(async move {
			while rx.changed().await.is_ok() {
				let _publishing = selector.publishing.lock().await;
				// Read under the lock so a value published meanwhile is not applied out of order.
				let cfg = rx.borrow_and_update().clone();

				if let Err(err) = selector.select(cfg).await {
					tracing::error!(error = %err, "Rejected backend configuration.");
				}
			}
		})
	}
}
impl Default for BackendSelector {
	fn default() -> Self {
		Self::new()
	}
}

#[derive(Default)]
struct SelectorState {
	epoch: u64,
	live: Option<Arc<Slot>>,
}

/// One selection: its configuration and, once built, the instance serving it.
struct Slot {
	epoch: u64,
	cfg: BackendConfig,
	backend: OnceCell<Arc<dyn NoteBackend>>,
	retired: AtomicBool,
	inflight: RwLock<()>,
}
impl Slot {
	fn new(epoch: u64, cfg: BackendConfig) -> Self {
		Self {
			epoch,
			cfg,
			backend: OnceCell::new(),
			retired: AtomicBool::new(false),
			inflight: RwLock::new(()),
		}
	}

	async fn serving(&self) -> Result<RwLockReadGuard<'_, ()>> {
		if self.retired.load(Ordering::SeqCst) {
			return Err(Error::Reselected);
		}

		let guard = self.inflight.read().await;

		// Retirement may have happened while this request waited for the lock.
		if self.retired.load(Ordering::SeqCst) {
			return Err(Error::Reselected);
		}

		Ok(guard)
	}

	async fn shut_down(&self) {
		if let Some(backend) = self.backend.get() {
			backend.close().await;

			tracing::info!(epoch = self.epoch, kind = %backend.kind(), "Retired storage backend.");
		}
	}
}

/// A backend bound to the instance that was live when it was obtained.
#[derive(Clone)]
pub struct BackendHandle {
	slot: Arc<Slot>,
	backend: Arc<dyn NoteBackend>,
}
impl BackendHandle {
	/// Selection generation this handle belongs to. Increases with every reselection.
	pub fn epoch(&self) -> u64 {
		self.slot.epoch
	}

	pub fn is_retired(&self) -> bool {
		self.slot.retired.load(Ordering::SeqCst)
	}
}

impl NoteBackend for BackendHandle {
	fn kind(&self) -> BackendKind {
		self.backend.kind()
	}

	fn init(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			let _guard = self.slot.serving().await?;

			self.backend.init().await
		})
	}

	fn save_note(&self, note: NewNote) -> BoxFuture<'_, Result<Note>> {
		Box::pin(async move {
			let _guard = self.slot.serving().await?;

			self.backend.save_note(note).await
		})
	}

	fn get_note(&self, id: NoteId) -> BoxFuture<'_, Result<Option<Note>>> {
		Box::pin(async move {
			let _guard = self.slot.serving().await?;

			self.backend.get_note(id).await
		})
	}

	fn get_all_notes(&self) -> BoxFuture<'_, Result<Vec<Note>>> {
		Box::pin(async move {
			let _guard = self.slot.serving().await?;

			self.backend.get_all_notes().await
		})
	}

	fn update_note(&self, id: NoteId, update: NoteUpdate) -> BoxFuture<'_, Result<Note>> {
		Box::pin(async move {
			let _guard = self.slot.serving().await?;

			self.backend.update_note(id, update).await
		})
	}

	fn delete_note(&self, id: NoteId) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			let _guard = self.slot.serving().await?;

			self.backend.delete_note(id).await
		})
	}

	fn search_notes<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<Vec<Note>>> {
		Box::pin(async move {
			let _guard = self.slot.serving().await?;

			self.backend.search_notes(query).await
		})
	}

	fn search_by_vector<'a>(
		&'a self,
		embedding: &'a [f32],
		query: VectorQuery,
	) -> BoxFuture<'a, Result<Vec<ScoredNote>>> {
		Box::pin(async move {
			let _guard = self.slot.serving().await?;

			self.backend.search_by_vector(embedding, query).await
		})
	}

	fn search_by_tag<'a>(&'a self, tag: &'a str) -> BoxFuture<'a, Result<Vec<Note>>> {
		Box::pin(async move {
			let _guard = self.slot.serving().await?;

			self.backend.search_by_tag(tag).await
		})
	}

	fn get_recent_notes(&self, limit: usize) -> BoxFuture<'_, Result<Vec<Note>>> {
		Box::pin(async move {
			let _guard = self.slot.serving().await?;

			self.backend.get_recent_notes(limit).await
		})
	}

	fn get_tags(&self) -> BoxFuture<'_, Result<Vec<String>>> {
		Box::pin(async move {
			let _guard = self.slot.serving().await?;

			self.backend.get_tags().await
		})
	}

	fn clear_all(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			let _guard = self.slot.serving().await?;

			self.backend.clear_all().await
		})
	}

	/// The selector owns the instance's lifecycle; closing a handle does nothing.
	fn close(&self) -> BoxFuture<'_, ()> {
		Box::pin(async {})
	}
}
