//! Naming helpers

/// Replaces every character outside `[A-Za-z0-9_-]` with `_`
pub fn make_url_safe_name(name: &str) -> String {
	let safe: String = name
		.chars()
		.map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
		.collect();
	if safe.is_empty() { "_".into() } else { safe }
}

/// `base`, then `base1`, `base2`, ... until `taken` rejects the candidate
pub fn unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
	let base = make_url_safe_name(base);
	let mut candidate = base.clone();
	let mut i = 0u32;
	while taken(&candidate) {
		i += 1;
		candidate = format!("{}{}", base, i);
	}
	candidate
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_make_url_safe_name() {
		assert_eq!(make_url_safe_name("wikiticker"), "wikiticker");
		assert_eq!(make_url_safe_name("my events/2024"), "my_events_2024");
		assert_eq!(make_url_safe_name("a-b_c"), "a-b_c");
		assert_eq!(make_url_safe_name(""), "_");
	}

	#[test]
	fn test_unique_name() {
		let taken = ["events", "events1"];
		assert_eq!(unique_name("events", |n| taken.contains(&n)), "events2");
		assert_eq!(unique_name("wiki", |n| taken.contains(&n)), "wiki");
	}
}

// vim: ts=4
