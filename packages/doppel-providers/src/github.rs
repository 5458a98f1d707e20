use std::time::Duration;

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{
	Client,
	header::{ACCEPT, AUTHORIZATION, HeaderMap, USER_AGENT},
};
use serde::Serialize;
use serde_json::Value;

use crate::{Error, Result};

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_USER_AGENT: &str = concat!("doppel/", env!("CARGO_PKG_VERSION"));
// GitHub caps app JWT lifetimes at 10 minutes; stay under it and allow for
// clock skew on the issuing side.
const JWT_SKEW_SECONDS: i64 = 30;
const JWT_LIFETIME_SECONDS: i64 = 9 * 60;

#[derive(Debug, Serialize)]
struct AppClaims {
	iat: i64,
	exp: i64,
	iss: String,
}

fn build_claims(app_id: u64, now_unix: i64) -> AppClaims {
	AppClaims {
		iat: now_unix - JWT_SKEW_SECONDS,
		exp: now_unix + JWT_LIFETIME_SECONDS,
		iss: app_id.to_string(),
	}
}

/// Signs a short-lived RS256 app JWT with the GitHub App's private key.
pub fn app_jwt(cfg: &doppel_config::Github, now_unix: i64) -> Result<String> {
	let key = EncodingKey::from_rsa_pem(cfg.private_key_pem.as_bytes())?;
	let claims = build_claims(cfg.app_id, now_unix);

	Ok(jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)?)
}

/// Exchanges an app JWT for a short-lived installation access token.
pub async fn installation_token(cfg: &doppel_config::Github, jwt: &str) -> Result<String> {
	let client = client(cfg)?;
	let url = format!("{}/app/installations/{}/access_tokens", cfg.api_base, cfg.installation_id);
	let res = client.post(url).headers(github_headers(jwt)?).send().await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_token_response(json)
}

/// Posts a comment on an issue using an installation token.
pub async fn post_issue_comment(
	cfg: &doppel_config::Github,
	token: &str,
	repo: &str,
	issue_number: i64,
	body: &str,
) -> Result<()> {
	let client = client(cfg)?;
	let url = format!("{}/repos/{repo}/issues/{issue_number}/comments", cfg.api_base);

	client
		.post(url)
		.headers(github_headers(token)?)
		.json(&serde_json::json!({ "body": body }))
		.send()
		.await?
		.error_for_status()?;

	Ok(())
}

/// Lists the bodies of an issue's comments. Used to detect an already-posted
/// duplicate report before posting another one.
pub async fn list_issue_comments(
	cfg: &doppel_config::Github,
	token: &str,
	repo: &str,
	issue_number: i64,
) -> Result<Vec<String>> {
	let client = client(cfg)?;
	let url = format!("{}/repos/{repo}/issues/{issue_number}/comments?per_page=100", cfg.api_base);
	let res = client.get(url).headers(github_headers(token)?).send().await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_comments_response(json)
}

fn client(cfg: &doppel_config::Github) -> Result<Client> {
	Ok(Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?)
}

fn github_headers(bearer: &str) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, format!("Bearer {bearer}").parse()?);
	headers.insert(ACCEPT, GITHUB_ACCEPT.parse()?);
	headers.insert(USER_AGENT, GITHUB_USER_AGENT.parse()?);

	Ok(headers)
}

fn parse_token_response(json: Value) -> Result<String> {
	json.get("token")
		.and_then(|v| v.as_str())
		.map(str::to_string)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Installation token response is missing token.".to_string(),
		})
}

fn parse_comments_response(json: Value) -> Result<Vec<String>> {
	let comments = json.as_array().ok_or_else(|| Error::InvalidResponse {
		message: "Comments response is not an array.".to_string(),
	})?;

	Ok(comments
		.iter()
		.filter_map(|comment| comment.get("body").and_then(|v| v.as_str()))
		.map(str::to_string)
		.collect())
}
