//! Throwaway Postgres databases for remote note store tests.
//!
//! Tests that need a real remote store call [`TestDatabase::from_env`] and skip themselves when
//! `SNIP_PG_DSN` is unset. Each database is dropped when the handle goes away, even if the test
//! panics.

mod error;

pub use error::{Error, Result};

use std::{env, str::FromStr, thread};

use sqlx::{
	ConnectOptions, Connection, Executor,
	postgres::{PgConnectOptions, PgConnection},
};
use tokio::runtime::Builder;
use uuid::Uuid;

use snip_config::Remote;

pub const DSN_ENV: &str = "SNIP_PG_DSN";

const MAINTENANCE_DATABASES: [&str; 2] = ["postgres", "template1"];

pub struct TestDatabase {
	name: String,
	options: PgConnectOptions,
	maintenance: PgConnectOptions,
	dropped: bool,
}
impl TestDatabase {
	/// A fresh database on the server named by `SNIP_PG_DSN`, or `None` when it is unset.
	pub async fn from_env() -> Result<Option<Self>> {
		match env_dsn() {
			Some(dsn) => Self::create(&dsn).await.map(Some),
			None => Ok(None),
		}
	}

	pub async fn create(server_dsn: &str) -> Result<Self> {
		let server = PgConnectOptions::from_str(server_dsn)
			.map_err(|err| Error::Message(format!("Failed to parse {DSN_ENV}: {err}.")))?;
		let (maintenance, mut conn) = connect_maintenance(&server).await?;
		let name = format!("snip_notes_{}", Uuid::new_v4().simple());

		conn.execute(format!(r#"CREATE DATABASE "{name}""#).as_str())
			.await
			.map_err(|err| Error::Message(format!("Failed to create {name}: {err}.")))?;

		let options = server.database(&name);

		Ok(Self { name, options, maintenance, dropped: false })
	}

	pub fn dsn(&self) -> String {
		self.options.to_url_lossy().to_string()
	}

	/// Remote backend settings pointing at this database.
	pub fn remote_config(&self, pool_max_conns: u32) -> Remote {
		Remote { dsn: self.dsn(), password: None, pool_max_conns }
	}

	/// Whether the server can load pgvector, which the remote schema requires.
	pub async fn has_pgvector(&self) -> Result<bool> {
		let mut conn = PgConnection::connect_with(&self.options).await?;
		let available: bool = sqlx::query_scalar(
			"SELECT EXISTS (SELECT 1 FROM pg_available_extensions WHERE name = 'vector')",
		)
		.fetch_one(&mut conn)
		.await?;

		conn.close().await?;

		Ok(available)
	}

	pub async fn cleanup(mut self) -> Result<()> {
		drop_database(&self.name, &self.maintenance).await?;

		self.dropped = true;

		Ok(())
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		if self.dropped {
			return;
		}

		let name = self.name.clone();
		let maintenance = self.maintenance.clone();
		// The test runtime may already be shutting down, so drop on a private one.
		let worker = thread::spawn(move || {
			let outcome = Builder::new_current_thread()
				.enable_all()
				.build()
				.map_err(|err| Error::Message(err.to_string()))
				.and_then(|runtime| runtime.block_on(drop_database(&name, &maintenance)));

			if let Err(err) = outcome {
				eprintln!("Failed to drop test database {name}: {err}");
			}
		});
		let _ = worker.join();
	}
}

pub fn env_dsn() -> Option<String> {
	env::var(DSN_ENV).ok().filter(|dsn| !dsn.trim().is_empty())
}

async fn connect_maintenance(
	server: &PgConnectOptions,
) -> Result<(PgConnectOptions, PgConnection)> {
	let mut last_err = None;

	for database in MAINTENANCE_DATABASES {
		let options = server.clone().database(database);

		match PgConnection::connect_with(&options).await {
			Ok(conn) => return Ok((options, conn)),
			Err(err) => last_err = Some(err),
		}
	}

	Err(Error::Message(format!("Failed to reach a maintenance database: {last_err:?}.")))
}

async fn drop_database(name: &str, maintenance: &PgConnectOptions) -> Result<()> {
	let mut conn = PgConnection::connect_with(maintenance).await?;

	conn.execute(format!(r#"DROP DATABASE IF EXISTS "{name}" WITH (FORCE)"#).as_str()).await?;
	conn.close().await?;

	Ok(())
}
