//! Filename sanitization for client-supplied names.

/// Reduces an untrusted filename to a safe basename.
///
/// Only the last path segment survives (`/` and `\` both count as separators).
/// Whitespace runs become `_`, anything outside `[A-Za-z0-9_.-]` is dropped and
/// leading/trailing dots and underscores are trimmed. Returns `None` when nothing
/// usable is left, so the result is never empty, `.` or `..`.
pub fn sanitize(raw: &str) -> Option<String> {
    let segment = raw.rsplit(['/', '\\']).next().unwrap_or("");
    if segment.is_empty() || segment == "." || segment == ".." {
        return None;
    }

    let joined = segment.split_whitespace().collect::<Vec<_>>().join("_");
    let filtered: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    let trimmed = filtered.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Lowercased text after the last `.` of a sanitized name, or `""` when there is none.
pub fn extension_of(name: &str) -> String {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assert_safe(out: &str) -> Result<(), TestCaseError> {
        prop_assert!(!out.is_empty());
        prop_assert!(!out.contains('/') && !out.contains('\\'), "separator in {:?}", out);
        prop_assert!(out != "." && out != "..");
        Ok(())
    }

    /// Names built from path segments, dot segments and awkward characters.
    fn path_like() -> impl Strategy<Value = String> {
        let segment = prop_oneof![
            Just(".".to_string()),
            Just("..".to_string()),
            Just(String::new()),
            "[a-zA-Z0-9 ._-]{1,10}",
            "[ .\\t_\\x00:*?]{1,4}",
        ];
        let separator = prop_oneof![Just("/"), Just("\\")];
        prop::collection::vec((segment, separator), 0..6).prop_map(|parts| {
            parts
                .into_iter()
                .map(|(segment, sep)| format!("{segment}{sep}"))
                .collect::<String>()
        })
        .prop_flat_map(|prefix| {
            "[a-zA-Z0-9 ._-]{0,10}".prop_map(move |last| format!("{prefix}{last}"))
        })
    }

    #[test]
    fn keeps_ordinary_names() {
        assert_eq!(sanitize("report.pdf").as_deref(), Some("report.pdf"));
        assert_eq!(sanitize("my-file_v2.tar.gz").as_deref(), Some("my-file_v2.tar.gz"));
    }

    #[test]
    fn strips_directory_components() {
        assert_eq!(sanitize("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize("C:\\Users\\me\\photo.png").as_deref(), Some("photo.png"));
        assert_eq!(sanitize("/abs/path/notes.txt").as_deref(), Some("notes.txt"));
    }

    #[test]
    fn rejects_empty_and_dot_names() {
        assert_eq!(sanitize(""), None);
        assert_eq!(sanitize("."), None);
        assert_eq!(sanitize(".."), None);
        assert_eq!(sanitize("foo/.."), None);
        assert_eq!(sanitize("dir/"), None);
        assert_eq!(sanitize("..."), None);
        assert_eq!(sanitize("___"), None);
    }

    #[test]
    fn replaces_whitespace_and_drops_unsafe_chars() {
        assert_eq!(sanitize("my  summer photo.jpg").as_deref(), Some("my_summer_photo.jpg"));
        assert_eq!(sanitize("file:name?*.txt").as_deref(), Some("filename.txt"));
        assert_eq!(sanitize("caf\u{e9}.txt").as_deref(), Some("caf.txt"));
        assert_eq!(sanitize("nul\0byte.bin").as_deref(), Some("nulbyte.bin"));
    }

    #[test]
    fn trims_leading_dots_and_underscores() {
        assert_eq!(sanitize(".bashrc").as_deref(), Some("bashrc"));
        assert_eq!(sanitize("__init__.py").as_deref(), Some("init__.py"));
        assert_eq!(sanitize(" spaced .txt ").as_deref(), Some("spaced_.txt"));
    }

    #[test]
    fn output_is_always_a_safe_basename() {
        let inputs = [
            "../../etc/passwd",
            "..\\..\\windows\\system32",
            "a/b/../..",
            ". .",
            "./.",
            "\u{2215}fake-slash",
            "名前.txt",
            "  ..  ",
            "x/..\\.",
        ];
        for input in inputs {
            if let Some(out) = sanitize(input) {
                assert!(!out.is_empty(), "{input:?}");
                assert!(!out.contains('/') && !out.contains('\\'), "{input:?} -> {out:?}");
                assert!(out != "." && out != "..", "{input:?} -> {out:?}");
            }
        }
    }

    #[test]
    fn is_idempotent() {
        let inputs = [
            "report.pdf",
            "../x y/z  w.tar.gz",
            "._hidden_.",
            "a-b_c.d",
            "weird!!name##.png",
            "trailing.dot.",
        ];
        for input in inputs {
            let once = sanitize(input);
            let twice = once.as_deref().and_then(sanitize);
            assert_eq!(once, twice, "{input:?}");
        }
    }

    #[test]
    fn extension_is_lowercased_suffix() {
        assert_eq!(extension_of("photo.PNG"), "png");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("Makefile"), "");
    }

    proptest! {
        #[test]
        fn any_string_sanitizes_to_safe_basename(raw in any::<String>()) {
            if let Some(out) = sanitize(&raw) {
                assert_safe(&out)?;
            }
        }

        #[test]
        fn path_like_input_sanitizes_to_safe_basename(raw in path_like()) {
            if let Some(out) = sanitize(&raw) {
                assert_safe(&out)?;
            }
        }

        #[test]
        fn sanitize_is_idempotent_for_any_string(raw in any::<String>()) {
            let once = sanitize(&raw);
            prop_assert_eq!(once.as_deref().and_then(sanitize), once);
        }

        #[test]
        fn sanitize_is_idempotent_for_path_like_input(raw in path_like()) {
            let once = sanitize(&raw);
            prop_assert_eq!(once.as_deref().and_then(sanitize), once);
        }
    }
}
