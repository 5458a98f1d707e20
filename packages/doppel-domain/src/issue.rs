use std::{fmt, sync::OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Identity of a GitHub issue: the `owner/repo` slug plus the issue number.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IssueKey {
	pub repo: String,
	pub issue_number: i64,
}
impl IssueKey {
	pub fn new(repo: impl Into<String>, issue_number: i64) -> Self {
		Self { repo: repo.into(), issue_number }
	}
}
impl fmt::Display for IssueKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}#{}", self.repo, self.issue_number)
	}
}

pub fn is_valid_repo(repo: &str) -> bool {
	static REPO_RE: OnceLock<Regex> = OnceLock::new();

	let re = REPO_RE.get_or_init(|| {
		Regex::new(r"^[A-Za-z0-9\-_.]+/[A-Za-z0-9\-_.]+$").unwrap_or_else(|_| unreachable!())
	});

	re.is_match(repo)
}
