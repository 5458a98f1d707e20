use crate::ranking::ConfirmedDuplicate;

/// Hidden marker embedded in every posted comment. The publisher scans the
/// issue's comments for it before posting, which heals the seam where a
/// comment landed but the surrounding transaction did not commit.
pub const MARKER: &str = "<!-- doppel:duplicate-report -->";

/// Renders the duplicate-report comment. `duplicates` must already be in the
/// final order (descending score).
pub fn render(duplicates: &[ConfirmedDuplicate]) -> String {
	let mut body = String::from(MARKER);

	body.push('\n');

	if duplicates.len() == 1 {
		body.push_str("Found 1 issue similar to this one:\n");
	} else {
		body.push_str(&format!("Found {} issues similar to this one:\n", duplicates.len()));
	}

	for (index, duplicate) in duplicates.iter().enumerate() {
		body.push_str(&format!(
			"{}. #{} ({}% similar)\n",
			index + 1,
			duplicate.key.issue_number,
			duplicate.score
		));
	}

	body
}

pub fn is_duplicate_report(comment_body: &str) -> bool {
	comment_body.contains(MARKER)
}
