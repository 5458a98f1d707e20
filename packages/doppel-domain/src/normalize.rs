/// Builds the text that gets embedded for an issue: the title, a blank line,
/// then the body truncated at a fixed char count. Char-based truncation keeps
/// the input deterministic, so the same issue always embeds identically.
pub fn embedding_input(title: &str, body: &str, max_body_chars: u32) -> String {
	let title = title.trim();
	let body = truncate_chars(body.trim(), max_body_chars as usize);

	match (title.is_empty(), body.is_empty()) {
		(true, true) => String::new(),
		(false, true) => title.to_string(),
		(true, false) => body,
		(false, false) => format!("{title}\n\n{body}"),
	}
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
	match text.char_indices().nth(max_chars) {
		Some((byte_index, _)) => text[..byte_index].to_string(),
		None => text.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn joins_title_and_body() {
		assert_eq!(embedding_input("Crash on startup", "It crashes.", 100), "Crash on startup\n\nIt crashes.");
	}

	#[test]
	fn truncates_body_deterministically() {
		let body = "x".repeat(50);
		let first = embedding_input("t", &body, 10);
		let second = embedding_input("t", &body, 10);

		assert_eq!(first, second);
		assert_eq!(first, format!("t\n\n{}", "x".repeat(10)));
	}

	#[test]
	fn truncates_on_char_boundaries() {
		let body = "héllo wörld";
		let input = embedding_input("", body, 4);

		assert_eq!(input, "héll");
	}

	#[test]
	fn empty_title_and_body_yield_empty_input() {
		assert_eq!(embedding_input("  ", "\n\t", 100), "");
	}

	#[test]
	fn title_alone_is_enough() {
		assert_eq!(embedding_input("Just a title", "", 100), "Just a title");
	}
}
