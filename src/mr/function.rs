//! User-provided map/reduce functions.
//!
//! `spec.md` §1 treats these as an external collaborator: the coordinator
//! and dispatcher never look inside them. Signatures follow `spec.md`
//! §4.4 — map takes `(filename, contents)` and emits `(key, value)` pairs;
//! reduce takes `(key, values)` and emits the single result string written
//! to the output line.

/// Word Count application: the reference app used by the end-to-end
/// scenarios in `spec.md` §8.
pub mod wc {
    pub fn map(_filename: &str, contents: &str) -> Vec<(String, String)> {
        contents
            .split_whitespace()
            .map(|word| (word.to_string(), "1".to_string()))
            .collect()
    }

    pub fn reduce(_key: &str, values: Vec<String>) -> String {
        values.len().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::wc;

    #[test]
    fn word_count_matches_the_spec_scenario() {
        let a = wc::map("a.txt", "foo bar foo");
        let b = wc::map("b.txt", "bar baz");
        assert_eq!(
            a,
            vec![
                ("foo".to_string(), "1".to_string()),
                ("bar".to_string(), "1".to_string()),
                ("foo".to_string(), "1".to_string()),
            ]
        );
        assert_eq!(
            b,
            vec![
                ("bar".to_string(), "1".to_string()),
                ("baz".to_string(), "1".to_string()),
            ]
        );
        assert_eq!(wc::reduce("foo", vec!["1".into(), "1".into()]), "2");
        assert_eq!(wc::reduce("baz", vec!["1".into()]), "1");
    }
}
