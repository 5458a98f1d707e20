use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Result};

const SYSTEM_PROMPT: &str = "I have two GitHub issues, and I want you to analyze their similarity. \
	Provide a similarity score as an integer percentage (0 = completely different, 100 = identical) \
	and a one-sentence rationale. Analyze their content, intent, and meaning. \
	Answer with JSON only: {\"score\": <0-100>, \"rationale\": \"...\"}";

/// The judge's verdict on a single candidate pair.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Verdict {
	pub score: u32,
	#[serde(default)]
	pub rationale: String,
}

/// Asks the LLM whether two issues describe the same problem. The model is
/// instructed to answer with a JSON object; malformed answers are retried up
/// to three times before the call fails.
pub async fn compare(
	cfg: &doppel_config::JudgeProviderConfig,
	issue_text: &str,
	candidate_text: &str,
) -> Result<Verdict> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let query = build_query(issue_text, candidate_text);

	for _ in 0..3 {
		let body = serde_json::json!({
			"model": cfg.model,
			"temperature": cfg.temperature,
			"messages": [
				{ "role": "system", "content": SYSTEM_PROMPT },
				{ "role": "user", "content": query },
			],
		});
		let res = client
			.post(&url)
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&body)
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;

		if let Ok(verdict) = parse_verdict(json) {
			return Ok(verdict);
		}
	}

	Err(Error::InvalidResponse { message: "Judge response is not a valid verdict.".to_string() })
}

fn build_query(issue_text: &str, candidate_text: &str) -> String {
	format!(
		"Are these two GitHub issues similar?\n\
		**Issue 1:**\n\"{issue_text}\"\n\n\
		**Issue 2:**\n\"{candidate_text}\"\n"
	)
}

fn parse_verdict(json: Value) -> Result<Verdict> {
	let content = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.ok_or_else(|| Error::InvalidResponse {
			message: "Judge response is missing message content.".to_string(),
		})?;
	let verdict: Verdict = serde_json::from_str(content.trim()).map_err(|_| {
		Error::InvalidResponse { message: "Judge content is not valid JSON.".to_string() }
	})?;

	if verdict.score > 100 {
		return Err(Error::InvalidResponse {
			message: "Judge score must be in the range 0-100.".to_string(),
		});
	}

	Ok(verdict)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_choice_content_verdict() {
		let json = serde_json::json!({
			"choices": [
				{ "message": { "content": "{\"score\": 92, \"rationale\": \"Same crash.\"}" } }
			]
		});
		let verdict = parse_verdict(json).expect("parse failed");
		assert_eq!(verdict.score, 92);
		assert_eq!(verdict.rationale, "Same crash.");
	}

	#[test]
	fn rejects_out_of_range_score() {
		let json = serde_json::json!({
			"choices": [
				{ "message": { "content": "{\"score\": 150}" } }
			]
		});
		assert!(parse_verdict(json).is_err());
	}

	#[test]
	fn rejects_prose_content() {
		let json = serde_json::json!({
			"choices": [
				{ "message": { "content": "They look pretty similar to me!" } }
			]
		});
		assert!(parse_verdict(json).is_err());
	}

	#[test]
	fn query_embeds_both_issue_texts() {
		let query = build_query("Crash on startup", "App crashes when launched");
		assert!(query.contains("Crash on startup"));
		assert!(query.contains("App crashes when launched"));
	}
}
