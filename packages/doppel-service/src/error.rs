pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Webhook signature is missing or invalid.")]
	InvalidSignature,
	#[error("Malformed webhook payload: {message}")]
	MalformedPayload { message: String },
	#[error("Issue text is empty after normalization.")]
	EmptyInput,
	#[error(transparent)]
	Provider(#[from] doppel_providers::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	Storage(#[from] doppel_storage::Error),
}
impl Error {
	/// Terminal errors will not succeed on retry; the worker dead-letters the
	/// job immediately instead of burning its attempt budget.
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::EmptyInput | Self::MalformedPayload { .. })
	}
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage(doppel_storage::Error::Sqlx(err))
	}
}
