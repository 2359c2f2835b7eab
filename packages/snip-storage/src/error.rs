use sqlx::postgres::PgDatabaseError;

use snip_domain::note::NoteId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Storage backend is not initialized.")]
	NotInitialized,
	#[error("No storage backend is selected.")]
	NoBackend,
	#[error("Storage backend was reselected while the request was pending.")]
	Reselected,
	#[error("Note not found: {0}")]
	NotFound(NoteId),
	#[error("Write rejected: {message}")]
	WriteRejected {
		message: String,
		code: Option<String>,
		detail: Option<String>,
		hint: Option<String>,
	},
	#[error("Embedding has {actual} components, expected {expected}.")]
	DimensionMismatch { expected: usize, actual: usize },
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
}
impl Error {
	/// Wraps a failed write, keeping whatever diagnostics the database attached.
	pub(crate) fn write_rejected(err: sqlx::Error) -> Self {
		match err {
			sqlx::Error::Database(db) => {
				let (detail, hint) = db
					.try_downcast_ref::<PgDatabaseError>()
					.map(|pg| (pg.detail().map(str::to_string), pg.hint().map(str::to_string)))
					.unwrap_or_default();

				Self::WriteRejected {
					message: db.message().to_string(),
					code: db.code().map(|code| code.into_owned()),
					detail,
					hint,
				}
			},
			other =>
				Self::WriteRejected { message: other.to_string(), code: None, detail: None, hint: None },
		}
	}
}
