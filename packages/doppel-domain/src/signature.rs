use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Verifies a GitHub `X-Hub-Signature-256` header against the raw request body.
///
/// The header carries `sha256=<hex>` where the digest is HMAC-SHA256 over the
/// exact body bytes. Comparison is constant-time via `Mac::verify_slice`.
pub fn verify(secret: &str, body: &[u8], signature: &str) -> bool {
	let Some(hex_digest) = signature.strip_prefix(SIGNATURE_PREFIX) else {
		return false;
	};
	let Ok(expected) = hex::decode(hex_digest) else {
		return false;
	};
	let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
		return false;
	};

	mac.update(body);

	mac.verify_slice(&expected).is_ok()
}

/// Renders the signature header value for a body. Test and tooling helper.
pub fn sign(secret: &str, body: &[u8]) -> String {
	let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
		.unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length."));

	mac.update(body);

	format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}
