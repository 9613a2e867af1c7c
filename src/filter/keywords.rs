//! Search text matching
//!
//! The search text is split on whitespace into keywords. A file matches when
//! every plain keyword occurs in its name or in its modifier's nickname, and
//! no `-`prefixed keyword does. Matching ignores case.

use crate::types::FileInfo;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Keyword {
	Include(String),
	Exclude(String),
}

/// Parsed search text
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeywordFilter {
	keywords: Vec<Keyword>,
}

impl KeywordFilter {
	pub fn parse(text: &str) -> Self {
		let keywords = text
			.split_whitespace()
			.filter_map(|token| {
				let token = token.to_lowercase();
				match token.strip_prefix('-') {
					// a lone "-" means nothing
					Some("") => None,
					Some(negated) => Some(Keyword::Exclude(negated.to_string())),
					None => Some(Keyword::Include(token)),
				}
			})
			.collect();
		KeywordFilter { keywords }
	}

	/// No keywords: every file matches
	pub fn is_empty(&self) -> bool {
		self.keywords.is_empty()
	}

	pub fn matches(&self, file: &FileInfo) -> bool {
		if self.keywords.is_empty() {
			return true;
		}
		let name = file.filename_only().to_lowercase();
		let nick = file.modifier_nick().map(str::to_lowercase);
		let hit = |word: &str| name.contains(word) || nick.as_deref().map_or(false, |n| n.contains(word));

		self.keywords.iter().all(|keyword| match keyword {
			Keyword::Include(word) => hit(word),
			Keyword::Exclude(word) => !hit(word),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::{FolderId, MemberInfo};

	fn file(name: &str, nick: &str) -> FileInfo {
		FileInfo::new(FolderId::new("f1").unwrap(), name)
			.unwrap()
			.with_modified_by(MemberInfo::new("id", nick))
	}

	#[test]
	fn test_include_and_exclude() {
		let filter = KeywordFilter::parse("report -draft");
		assert!(filter.matches(&file("Annual Report Final.pdf", "alice")));
		assert!(!filter.matches(&file("Report Draft.pdf", "alice")));
		assert!(!filter.matches(&file("notes.txt", "alice")));
	}

	#[test]
	fn test_matches_modifier_nick() {
		let filter = KeywordFilter::parse("ALICE");
		assert!(filter.matches(&file("notes.txt", "Alice")));
		assert!(!filter.matches(&file("notes.txt", "bob")));

		let filter = KeywordFilter::parse("-bob");
		assert!(!filter.matches(&file("notes.txt", "bob")));
	}

	#[test]
	fn test_directory_part_is_not_searched() {
		let filter = KeywordFilter::parse("music");
		assert!(!filter.matches(&file("music/song.mp3", "alice")));
	}

	#[test]
	fn test_empty_text_matches_everything() {
		assert!(KeywordFilter::parse("  ").is_empty());
		assert!(KeywordFilter::parse(" - ").matches(&file("x", "y")));
	}
}

// vim: ts=4
