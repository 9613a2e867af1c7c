//! Cross-platform filename legality checks
//!
//! A name that is fine on the local machine may be impossible to create on a
//! peer running another operating system. Directory names mostly share the
//! same restrictions.

pub mod unique;

pub use unique::{get_shorter_filename, is_unique, make_unique, resolve};

/// Longest filename accepted on any supported platform, in UTF-16 code units
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Characters that cannot appear in a Linux filename
pub const ILLEGAL_LINUX_CHARS: &[char] = &['/'];

/// Characters that cannot appear in a macOS filename
pub const ILLEGAL_MACOSX_CHARS: &[char] = &['/', ':'];

/// Characters that cannot appear in a Windows filename
pub const ILLEGAL_WINDOWS_CHARS: &[char] = &['|', '\\', '?', '"', '*', '<', ':', '>', '/'];

/// Characters a Windows filename may not end with
pub const ILLEGAL_WINDOWS_ENDINGS: &[char] = &['.', ' '];

/// Device names Windows reserves, with or without extension
const RESERVED_WINDOWS_NAMES: &[&str] = &[
	"CON", "PRN", "AUX", "CLOCK$", "NUL", "COM0", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6",
	"COM7", "COM8", "COM9", "LPT0", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8",
	"LPT9",
];

/// Does the name violate any rule of any supported platform
pub fn has_problems(filename: &str) -> bool {
	contains_illegal_linux_chars(filename)
		|| contains_illegal_macosx_chars(filename)
		|| contains_illegal_windows_chars(filename)
		|| ends_with_illegal_windows_char(filename)
		|| is_reserved_windows_filename(filename)
		|| is_too_long(filename)
}

pub fn contains_illegal_linux_chars(filename: &str) -> bool {
	filename.contains(ILLEGAL_LINUX_CHARS)
}

pub fn contains_illegal_macosx_chars(filename: &str) -> bool {
	filename.contains(ILLEGAL_MACOSX_CHARS)
}

/// Control characters are accepted; only the reserved punctuation counts
pub fn contains_illegal_windows_chars(filename: &str) -> bool {
	filename.contains(ILLEGAL_WINDOWS_CHARS)
}

pub fn ends_with_illegal_windows_char(filename: &str) -> bool {
	filename.ends_with(ILLEGAL_WINDOWS_ENDINGS)
}

/// True for `AUX`, `aux` and `aux.txt` alike
pub fn is_reserved_windows_filename(filename: &str) -> bool {
	let stem = strip_extension(filename);
	RESERVED_WINDOWS_NAMES.iter().any(|reserved| reserved.eq_ignore_ascii_case(stem))
}

pub fn is_too_long(filename: &str) -> bool {
	name_length(filename) > MAX_FILENAME_LENGTH
}

/// Length of a name in UTF-16 code units
pub fn name_length(filename: &str) -> usize {
	filename.encode_utf16().count()
}

/// Name without its last extension. Path elements must already be removed.
pub fn strip_extension(filename: &str) -> &str {
	match filename.rfind('.') {
		Some(idx) => &filename[..idx],
		None => filename,
	}
}

/// Split into stem and extension (including the dot).
///
/// A leading dot does not start an extension, so `.profile` has none.
pub fn split_extension(filename: &str) -> (&str, &str) {
	match filename.rfind('.') {
		Some(idx) if idx > 0 => (&filename[..idx], &filename[idx..]),
		_ => (filename, ""),
	}
}

/// Remove every occurrence of every char in `chars`
pub fn remove_chars(filename: &str, chars: &[char]) -> String {
	filename.chars().filter(|c| !chars.contains(c)).collect()
}

/// Strip trailing dots and spaces until the name is acceptable on Windows
pub fn trim_illegal_endings(filename: &str) -> &str {
	filename.trim_end_matches(ILLEGAL_WINDOWS_ENDINGS)
}

/// First `units` UTF-16 code units of a name, never splitting a character
pub fn truncate_to_length(filename: &str, units: usize) -> &str {
	let mut used = 0;
	for (idx, c) in filename.char_indices() {
		if used + c.len_utf16() > units {
			return &filename[..idx];
		}
		used += c.len_utf16();
	}
	filename
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_windows_chars() {
		assert!(!contains_illegal_windows_chars("a valid filename.txt"));
		for bad in &["fhf/fjf", "hhhh\\", "?hhh", "ddfgd*", "<hhf", "\"gfgfg", ":sds", "gfgf>", "a|b"] {
			assert!(contains_illegal_windows_chars(bad), "{} should be illegal", bad);
		}
		assert!(!contains_illegal_windows_chars("日本語でのテスト"));
	}

	#[test]
	fn test_control_chars_are_accepted() {
		for i in 0u8..=31 {
			let name = format!("{}123", i as char);
			assert!(!contains_illegal_windows_chars(&name));
		}
	}

	#[test]
	fn test_reserved_names() {
		assert!(is_reserved_windows_filename("AUX"));
		assert!(is_reserved_windows_filename("aux"));
		assert!(is_reserved_windows_filename("AUX.txt"));
		assert!(is_reserved_windows_filename("LPT1"));
		assert!(is_reserved_windows_filename("clock$.log"));
		assert!(!is_reserved_windows_filename("xLPT1"));
		assert!(!is_reserved_windows_filename("xAUX.txt"));
		assert!(!is_reserved_windows_filename("CONSOLE.txt"));
	}

	#[test]
	fn test_has_problems() {
		assert!(!has_problems("a valid filename.whatever"));
		assert!(has_problems("CON.txt"));
		assert!(has_problems("a/b"));
		assert!(has_problems("file."));
		assert!(has_problems("file "));
		assert!(has_problems("time 10:30"));

		let long = format!("a{}", "x".repeat(260));
		assert!(has_problems(&long));
	}

	#[test]
	fn test_length_boundary() {
		let exact = "0".repeat(255);
		assert!(!has_problems(&exact));
		let over = "0".repeat(256);
		assert!(is_too_long(&over));
	}

	#[test]
	fn test_length_counts_utf16_units() {
		// U+1F600 needs two UTF-16 code units
		let name = "\u{1F600}".repeat(128);
		assert_eq!(name_length(&name), 256);
		assert!(is_too_long(&name));
		assert_eq!(name_length(truncate_to_length(&name, 255)), 254);
	}

	#[test]
	fn test_strip_extension() {
		assert_eq!(strip_extension("test.text"), "test");
		assert_eq!(strip_extension("test"), "test");
		assert_eq!(strip_extension("archive.tar.gz"), "archive.tar");
	}

	#[test]
	fn test_split_extension() {
		assert_eq!(split_extension("song.mp3"), ("song", ".mp3"));
		assert_eq!(split_extension("README"), ("README", ""));
		assert_eq!(split_extension(".profile"), (".profile", ""));
	}

	#[test]
	fn test_remove_chars() {
		assert_eq!(remove_chars("a:b::c", &[':']), "abc");
		assert_eq!(remove_chars("<<what?>>.txt", ILLEGAL_WINDOWS_CHARS), "what.txt");
		// order of the charset does not matter
		assert_eq!(remove_chars("a*b?c", &['*', '?']), remove_chars("a*b?c", &['?', '*']));
	}

	#[test]
	fn test_trim_illegal_endings() {
		assert_eq!(trim_illegal_endings("report. . "), "report");
		assert_eq!(trim_illegal_endings("fine.txt"), "fine.txt");
	}
}

// vim: ts=4
