//! File name sanitization for caller-supplied titles.

/// Characters stripped from caller-supplied file names, in removal order.
const DENYLIST: [char; 6] = ['"', '\'', '/', '?', ':', ';'];

/// Removes every occurrence of each denylisted character from `name`.
///
/// Pure and idempotent. Applied before any filesystem path is built from a
/// caller-supplied name. This is a character denylist, not a path-traversal
/// defense: `..` sequences and platform-reserved names pass through
/// unchanged.
pub fn sanitize_file_name(name: &str) -> String {
    DENYLIST
        .iter()
        .fold(name.to_string(), |acc, c| acc.replace(*c, ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_every_denylisted_occurrence() {
        assert_eq!(sanitize_file_name("a\"b\"c"), "abc");
        assert_eq!(sanitize_file_name("it's; a/b? c: d"), "its ab c d");
    }

    #[test]
    fn test_clean_names_pass_through() {
        assert_eq!(sanitize_file_name("Plain Song.mp3"), "Plain Song.mp3");
        assert_eq!(sanitize_file_name(""), "");
    }

    #[test]
    fn test_idempotent() {
        let dirty = "My: \"Song\"? (it's); a/remix";
        let once = sanitize_file_name(dirty);
        assert_eq!(sanitize_file_name(&once), once);
    }

    #[test]
    fn test_colon_and_question_mark_stripped() {
        assert_eq!(sanitize_file_name("My: Song?.mp3"), "My Song.mp3");
    }
}
