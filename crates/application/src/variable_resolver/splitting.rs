//! `name=value` splitting that respects escapes and variable references

use super::search::{VariableMatches, VariableSearcher};

/// Splits `text` on the first `=` that is not escaped with a backslash and
/// not inside a variable reference.
///
/// Returns the whole text and `None` when there is no such `=`.
#[must_use]
pub fn split_from_equals(text: &str) -> (&str, Option<&str>) {
    if !text.contains('=') {
        return (text, None);
    }
    let matches =
        VariableMatches::with_searcher(text, VariableSearcher::new().ignore_errors(true));
    let mut start = 0;
    for found in matches.iter().flatten() {
        let span = found.absolute_span();
        if let Some(index) = find_unescaped_equals(&text[start..span.start]) {
            return split_at(text, start + index);
        }
        start = span.end;
    }
    match find_unescaped_equals(&text[start..]) {
        Some(index) => split_at(text, start + index),
        None => (text, None),
    }
}

fn split_at(text: &str, index: usize) -> (&str, Option<&str>) {
    (&text[..index], Some(&text[index + 1..]))
}

fn find_unescaped_equals(part: &str) -> Option<usize> {
    part.match_indices('=').map(|(index, _)| index).find(|&index| {
        part[..index]
            .bytes()
            .rev()
            .take_while(|&b| b == b'\\')
            .count()
            % 2
            == 0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_split() {
        assert_eq!(split_from_equals("name=value"), ("name", Some("value")));
        assert_eq!(split_from_equals("a=b=c"), ("a", Some("b=c")));
        assert_eq!(split_from_equals("no equals"), ("no equals", None));
        assert_eq!(split_from_equals("=value"), ("", Some("value")));
    }

    #[test]
    fn test_escaped_equals_is_skipped() {
        assert_eq!(split_from_equals(r"a\=b=c"), (r"a\=b", Some("c")));
        assert_eq!(split_from_equals(r"a\\=b"), (r"a\\", Some("b")));
        assert_eq!(split_from_equals(r"only\=escaped"), (r"only\=escaped", None));
    }

    #[test]
    fn test_equals_inside_variable_is_skipped() {
        assert_eq!(split_from_equals("${a=b}=c"), ("${a=b}", Some("c")));
        assert_eq!(split_from_equals("x${a=b}y=z"), ("x${a=b}y", Some("z")));
        assert_eq!(split_from_equals("${a=b}"), ("${a=b}", None));
        assert_eq!(split_from_equals("%{HOME=x}"), ("%{HOME=x}", None));
    }
}
