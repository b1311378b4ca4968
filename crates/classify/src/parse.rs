//! Line grammar of the classifier's responses.
//!
//! Every response line reads `<path>: <value>`. Paths may themselves contain
//! `: `, so a line is matched against the paths of its batch rather than split
//! at the first colon.

use std::collections::HashMap;

/// `type/subtype; charset=encoding`, as printed by `file --mime`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MimeType {
    pub kind: String,
    pub subtype: String,
    pub encoding: String,
}

impl MimeType {
    /// Parse a MIME value. Every one of the three parts is required.
    pub fn parse(value: &str) -> Option<Self> {
        let (mime, charset) = value.split_once(';')?;
        let (kind, subtype) = mime.split_once('/')?;
        let (_, encoding) = charset.split_once('=')?;
        let (kind, subtype, encoding) = (kind.trim(), subtype.trim(), encoding.trim());
        if kind.is_empty() || subtype.is_empty() || encoding.is_empty() {
            return None;
        }
        Some(Self { kind: kind.to_string(), subtype: subtype.to_string(), encoding: encoding.to_string() })
    }
}

/// Split `line` into one of the `known` paths and the trimmed value after it.
///
/// When several known paths prefix the line the longest one wins. Returns
/// `None` if no known path is followed by a colon.
pub fn split_line<'a, V>(line: &'a str, known: &HashMap<String, V>) -> Option<(&'a str, &'a str)> {
    line.match_indices(':')
        .rev()
        .map(|(idx, _)| (&line[..idx], &line[idx + 1..]))
        .find(|(path, _)| known.contains_key(*path))
        .map(|(path, value)| (path, value.trim()))
}

/// Non-blank lines of a response, trimmed.
pub fn lines(output: &str) -> impl Iterator<Item = &str> {
    output.lines().map(str::trim).filter(|line| !line.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn known(paths: &[&str]) -> HashMap<String, ()> {
        paths.iter().map(|p| (p.to_string(), ())).collect()
    }

    #[rstest]
    #[case("text/plain; charset=us-ascii", Some(("text", "plain", "us-ascii")))]
    #[case("image/jpeg; charset=binary", Some(("image", "jpeg", "binary")))]
    #[case(" application/pdf ;  charset = binary ", Some(("application", "pdf", "binary")))]
    #[case("text/plain", None)]
    #[case("textplain; charset=utf-8", None)]
    #[case("text/plain; utf-8", None)]
    #[case("/; charset=", None)]
    #[case("cannot open `x' (No such file or directory)", None)]
    fn test_mime_grammar(#[case] value: &str, #[case] expected: Option<(&str, &str, &str)>) {
        let parsed = MimeType::parse(value);
        let parsed = parsed.as_ref().map(|m| (m.kind.as_str(), m.subtype.as_str(), m.encoding.as_str()));
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_split_known_path() {
        let known = known(&["/a/b.txt"]);
        assert_eq!(
            split_line("/a/b.txt: text/plain; charset=us-ascii", &known),
            Some(("/a/b.txt", "text/plain; charset=us-ascii"))
        );
        assert_eq!(split_line("/a/c.txt: text/plain; charset=us-ascii", &known), None);
        assert_eq!(split_line("no colon at all", &known), None);
    }

    #[test]
    fn test_split_prefers_longest_path() {
        let known = known(&["/x/a", "/x/a: b"]);
        assert_eq!(split_line("/x/a: b: ASCII text", &known), Some(("/x/a: b", "ASCII text")));
        assert_eq!(split_line("/x/a: data", &known), Some(("/x/a", "data")));
    }

    #[test]
    fn test_lines_skip_blanks() {
        let collected: Vec<_> = lines("  a: 1 \n\n\t\nb: 2\n").collect();
        assert_eq!(collected, vec!["a: 1", "b: 2"]);
    }
}
