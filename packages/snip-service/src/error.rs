use serde::Serialize;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String, diagnostics: Option<Diagnostics> },
	#[error("Storage unavailable: {message}")]
	Unavailable { message: String },
	#[error("Storage backend changed while the request was running. Retry the request.")]
	Reselected,
}
impl From<color_eyre::Report> for Error {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<snip_storage::Error> for Error {
	fn from(err: snip_storage::Error) -> Self {
		match err {
			snip_storage::Error::NotFound(id) => Self::NotFound { message: format!("Note {id}.") },
			snip_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			snip_storage::Error::Reselected => Self::Reselected,
			err @ (snip_storage::Error::NoBackend | snip_storage::Error::NotInitialized) =>
				Self::Unavailable { message: err.to_string() },
			snip_storage::Error::WriteRejected { message, code, detail, hint } => Self::Storage {
				message: format!("Write rejected: {message}"),
				diagnostics: Some(Diagnostics { code, detail, hint }),
			},
			// Stored or normalized vectors of the wrong length are a defect, not a caller error.
			err @ (snip_storage::Error::DimensionMismatch { .. } | snip_storage::Error::Sqlx(_)) =>
				Self::Storage { message: err.to_string(), diagnostics: None },
		}
	}
}

/// Database diagnostics attached to a rejected write.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub code: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub detail: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub hint: Option<String>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejected_writes_keep_database_diagnostics() {
		let err = Error::from(snip_storage::Error::WriteRejected {
			message: "new row violates check constraint".to_string(),
			code: Some("23514".to_string()),
			detail: Some("Failing row contains (...).".to_string()),
			hint: Some("check content".to_string()),
		});

		match err {
			Error::Storage { message, diagnostics } => {
				assert_eq!(message, "Write rejected: new row violates check constraint");
				assert_eq!(
					diagnostics,
					Some(Diagnostics {
						code: Some("23514".to_string()),
						detail: Some("Failing row contains (...).".to_string()),
						hint: Some("check content".to_string()),
					})
				);
			},
			other => panic!("Expected a storage error, got {other:?}."),
		}
	}

	#[test]
	fn dimension_mismatch_is_a_storage_failure() {
		let err = Error::from(snip_storage::Error::DimensionMismatch { expected: 1_536, actual: 3 });

		assert!(matches!(err, Error::Storage { diagnostics: None, .. }));
	}
}
