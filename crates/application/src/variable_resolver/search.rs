//! Variable reference scanner
//!
//! Finds `${name}`, `@{name}`, `&{name}`, `%{name}` and `*{name}` references
//! in a string. Braces inside the name are balanced, so `${a${b}}` is one
//! reference with an internal variable. A brace or sigil preceded by an odd
//! number of backslashes is literal. `$`, `@` and `&` references may be
//! followed by chained `[item]` accessors.

use std::fmt;
use std::ops::Range;

use scopevar_domain::{Sigil, VariableError, VariableResult};

/// One variable reference found in a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableMatch<'a> {
    /// The searched string.
    pub string: &'a str,
    /// The sigil that starts the reference.
    pub identifier: Sigil,
    /// Text between the outer braces, excluding a parsed type annotation.
    pub base: &'a str,
    /// Text after the last `": "` in the braces, when type parsing was requested.
    pub type_annotation: Option<&'a str>,
    /// Bracketed item accessors, in order, without the brackets.
    pub items: Vec<&'a str>,
    /// Byte offset of the sigil in `string`.
    pub start: usize,
    /// Byte offset just past the reference, including items.
    pub end: usize,
    /// Byte offset of `string` in the text originally given to [`VariableMatches`].
    pub offset: usize,
}

impl<'a> VariableMatch<'a> {
    /// Text before the reference.
    #[must_use]
    pub fn before(&self) -> &'a str {
        &self.string[..self.start]
    }

    /// The reference text itself, including items.
    #[must_use]
    pub fn matched(&self) -> &'a str {
        &self.string[self.start..self.end]
    }

    /// Text after the reference.
    #[must_use]
    pub fn after(&self) -> &'a str {
        &self.string[self.end..]
    }

    /// Span of the reference in `string`.
    #[must_use]
    pub const fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Span of the reference in the text originally searched by [`VariableMatches`].
    #[must_use]
    pub const fn absolute_span(&self) -> Range<usize> {
        self.offset + self.start..self.offset + self.end
    }

    /// The decorated name without items, e.g. `${name}`.
    #[must_use]
    pub fn name(&self) -> String {
        self.identifier.decorate(self.base)
    }

    /// Returns true if the reference spans the whole string and has a name.
    #[must_use]
    pub fn is_variable(&self) -> bool {
        !self.base.is_empty() && self.start == 0 && self.end == self.string.len()
    }

    /// Returns true for a whole-string `${...}` reference.
    #[must_use]
    pub fn is_scalar_variable(&self) -> bool {
        self.identifier == Sigil::Scalar && self.is_variable()
    }

    /// Returns true for a whole-string `@{...}` reference.
    #[must_use]
    pub fn is_list_variable(&self) -> bool {
        self.identifier == Sigil::List && self.is_variable()
    }

    /// Returns true for a whole-string `&{...}` reference.
    #[must_use]
    pub fn is_dict_variable(&self) -> bool {
        self.identifier == Sigil::Dict && self.is_variable()
    }

    /// Returns true if the base contains variable references of its own.
    #[must_use]
    pub fn has_internal_variables(&self) -> bool {
        self.base.contains('{')
            && matches!(
                VariableSearcher::default().ignore_errors(true).search(self.base),
                Ok(Some(_))
            )
    }

    /// Returns true if the string can be used as an assignment target.
    ///
    /// With `allow_assign_mark` a trailing `=` (and whitespace before it) is
    /// accepted. Targets with items or internal variables are rejected
    /// unless explicitly allowed.
    #[must_use]
    pub fn is_assign(&self, allow_assign_mark: bool, allow_nested: bool, allow_items: bool) -> bool {
        if allow_assign_mark && self.string.ends_with('=') {
            let target = self.string[..self.string.len() - 1].trim_end();
            return matches!(
                VariableSearcher::default().ignore_errors(true).search(target),
                Ok(Some(m)) if m.is_assign(false, allow_nested, allow_items)
            );
        }
        self.is_variable()
            && self.identifier.is_assignable()
            && (allow_items || self.items.is_empty())
            && (allow_nested || !self.has_internal_variables())
    }
}

impl fmt::Display for VariableMatch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{{}}}", self.identifier.as_char(), self.base)?;
        for item in &self.items {
            write!(f, "[{item}]")?;
        }
        Ok(())
    }
}

/// Configurable variable reference scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableSearcher {
    identifiers: u8,
    parse_type: bool,
    ignore_errors: bool,
}

impl Default for VariableSearcher {
    fn default() -> Self {
        Self {
            identifiers: Sigil::ALL.iter().fold(0, |mask, sigil| mask | bit(*sigil)),
            parse_type: false,
            ignore_errors: false,
        }
    }
}

const fn bit(sigil: Sigil) -> u8 {
    1 << (sigil as u8)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Variable,
    WaitingItem,
    Item,
}

impl VariableSearcher {
    /// Creates a searcher recognizing all sigils.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the recognized sigils.
    #[must_use]
    pub fn identifiers(mut self, sigils: &[Sigil]) -> Self {
        self.identifiers = sigils.iter().fold(0, |mask, sigil| mask | bit(*sigil));
        self
    }

    /// Splits a `": type"` annotation off the base.
    #[must_use]
    pub const fn parse_type(mut self, parse_type: bool) -> Self {
        self.parse_type = parse_type;
        self
    }

    /// Treats unclosed references as "no match" instead of failing.
    #[must_use]
    pub const fn ignore_errors(mut self, ignore_errors: bool) -> Self {
        self.ignore_errors = ignore_errors;
        self
    }

    /// Finds the first reference in `string`.
    ///
    /// # Errors
    ///
    /// Returns a syntax error if a reference or item is not closed, unless
    /// errors are ignored.
    pub fn search<'a>(&self, string: &'a str) -> VariableResult<Option<VariableMatch<'a>>> {
        if !string.contains('{') {
            return Ok(None);
        }
        let Some((start, identifier)) = self.find_variable_start(string.as_bytes()) else {
            return Ok(None);
        };
        match self.scan(string, start, identifier) {
            Ok(found) => Ok(Some(found)),
            Err(_) if self.ignore_errors => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn sigil_at(&self, byte: u8) -> Option<Sigil> {
        Sigil::from_char(char::from(byte)).filter(|sigil| self.identifiers & bit(*sigil) != 0)
    }

    fn find_variable_start(&self, bytes: &[u8]) -> Option<(usize, Sigil)> {
        let mut from = 1;
        while from < bytes.len() {
            let brace = from + bytes[from..].iter().position(|&b| b == b'{')?;
            let start = brace - 1;
            if let Some(sigil) = self.sigil_at(bytes[start])
                && !is_escaped(bytes, start)
            {
                return Some((start, sigil));
            }
            from = brace + 1;
        }
        None
    }

    fn scan<'a>(
        &self,
        string: &'a str,
        start: usize,
        identifier: Sigil,
    ) -> VariableResult<VariableMatch<'a>> {
        let bytes = string.as_bytes();
        let mut state = State::Variable;
        let mut open = 1_usize;
        let mut escaped = false;
        let mut base_end = start + 2;
        let mut end = start + 2;
        let mut item_start = 0;
        let mut items = Vec::new();
        let mut finished = false;

        for (index, &byte) in bytes.iter().enumerate().skip(start + 2) {
            match state {
                State::Variable => {
                    if byte == b'}' && !escaped {
                        open -= 1;
                        if open == 0 {
                            base_end = index;
                            end = index + 1;
                            if !identifier.can_have_items() {
                                finished = true;
                                break;
                            }
                            state = State::WaitingItem;
                        }
                    } else if byte == b'{' && !escaped {
                        open += 1;
                    }
                }
                State::WaitingItem => {
                    if byte != b'[' {
                        finished = true;
                        break;
                    }
                    open = 1;
                    item_start = index + 1;
                    state = State::Item;
                }
                State::Item => {
                    if byte == b']' && !escaped {
                        open -= 1;
                        if open == 0 {
                            items.push(&string[item_start..index]);
                            end = index + 1;
                            state = State::WaitingItem;
                        }
                    } else if byte == b'[' && !escaped {
                        open += 1;
                    }
                }
            }
            escaped = byte == b'\\' && !escaped;
        }

        if !finished {
            match state {
                State::Variable => {
                    return Err(VariableError::syntax(format!(
                        "Variable '{}' was not closed properly.",
                        &string[start..]
                    )));
                }
                State::Item => {
                    return Err(VariableError::syntax(format!(
                        "Variable item '{}' was not closed properly.",
                        &string[start..]
                    )));
                }
                State::WaitingItem => {}
            }
        }

        let mut base = &string[start + 2..base_end];
        let mut type_annotation = None;
        if self.parse_type
            && let Some(split) = base.rfind(": ")
        {
            type_annotation = Some(&base[split + 2..]);
            base = &base[..split];
        }

        Ok(VariableMatch {
            string,
            identifier,
            base,
            type_annotation,
            items,
            start,
            end,
            offset: 0,
        })
    }
}

fn is_escaped(bytes: &[u8], index: usize) -> bool {
    bytes[..index]
        .iter()
        .rev()
        .take_while(|&&b| b == b'\\')
        .count()
        % 2
        == 1
}

/// Finds the first reference in `string` using all sigils.
///
/// # Errors
///
/// Returns a syntax error if the first reference is not closed properly.
pub fn search_variable(string: &str) -> VariableResult<Option<VariableMatch<'_>>> {
    VariableSearcher::default().search(string)
}

fn lenient(string: &str) -> Option<VariableMatch<'_>> {
    VariableSearcher::default()
        .ignore_errors(true)
        .search(string)
        .ok()
        .flatten()
}

/// Returns true if `string` is exactly one `${}`, `@{}`, `&{}`, `%{}` or `*{}` reference.
#[must_use]
pub fn is_variable(string: &str) -> bool {
    lenient(string).is_some_and(|m| m.is_variable())
}

/// Returns true if `string` is exactly one `@{}` reference.
#[must_use]
pub fn is_list_variable(string: &str) -> bool {
    lenient(string).is_some_and(|m| m.is_list_variable())
}

/// Returns true if `string` is exactly one `&{}` reference.
#[must_use]
pub fn is_dict_variable(string: &str) -> bool {
    lenient(string).is_some_and(|m| m.is_dict_variable())
}

/// Returns true if `string` is a valid `${}`, `@{}` or `&{}` assignment target.
#[must_use]
pub fn is_assign(string: &str, allow_assign_mark: bool) -> bool {
    lenient(string).is_some_and(|m| m.is_assign(allow_assign_mark, false, false))
}

/// All non-overlapping references in a string.
///
/// Each iteration rescans from the start, so the same value can be iterated
/// any number of times. Matches carry the remaining text as their `string`,
/// with `offset` locating it in the original.
#[derive(Debug, Clone, Copy)]
pub struct VariableMatches<'a> {
    string: &'a str,
    searcher: VariableSearcher,
}

impl<'a> VariableMatches<'a> {
    /// Creates matches over `string` recognizing all sigils.
    #[must_use]
    pub fn new(string: &'a str) -> Self {
        Self::with_searcher(string, VariableSearcher::default())
    }

    /// Creates matches using a configured searcher.
    #[must_use]
    pub const fn with_searcher(string: &'a str, searcher: VariableSearcher) -> Self {
        Self { string, searcher }
    }

    /// Iterates over the matches.
    #[must_use]
    pub const fn iter(&self) -> MatchIter<'a> {
        MatchIter {
            remaining: self.string,
            offset: 0,
            searcher: self.searcher,
            done: false,
        }
    }

    /// Counts the matches.
    ///
    /// # Errors
    ///
    /// Returns the first scan error.
    pub fn count(&self) -> VariableResult<usize> {
        self.iter().try_fold(0, |count, found| found.map(|_| count + 1))
    }

    /// Returns true if there are no matches.
    ///
    /// # Errors
    ///
    /// Returns a scan error for the first reference.
    pub fn is_empty(&self) -> VariableResult<bool> {
        self.iter().next().transpose().map(|first| first.is_none())
    }
}

impl<'a> IntoIterator for &VariableMatches<'a> {
    type Item = VariableResult<VariableMatch<'a>>;
    type IntoIter = MatchIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over [`VariableMatches`].
#[derive(Debug, Clone)]
pub struct MatchIter<'a> {
    remaining: &'a str,
    offset: usize,
    searcher: VariableSearcher,
    done: bool,
}

impl<'a> Iterator for MatchIter<'a> {
    type Item = VariableResult<VariableMatch<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.searcher.search(self.remaining) {
            Ok(Some(mut found)) => {
                found.offset = self.offset;
                self.offset += found.end;
                self.remaining = found.after();
                Some(Ok(found))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn found(input: &str) -> VariableMatch<'_> {
        search_variable(input)
            .unwrap()
            .unwrap_or_else(|| panic!("no match in {input:?}"))
    }

    fn check(input: &str, variable: &str, start: usize, items: &[&str]) {
        let m = found(input);
        assert_eq!(m.start, start, "start of {input:?}");
        assert_eq!(m.identifier.as_char(), variable.chars().next().unwrap());
        assert_eq!(m.base, &variable[2..variable.len() - 1], "base of {input:?}");
        assert_eq!(m.items, items, "items of {input:?}");
        let items_len: usize = items.iter().map(|i| i.len() + 2).sum();
        assert_eq!(m.end, start + variable.len() + items_len, "end of {input:?}");
        assert_eq!(m.before(), &input[..start]);
    }

    fn no_match(input: &str) {
        assert_eq!(search_variable(input).unwrap(), None, "{input:?}");
    }

    #[test]
    fn test_no_variables() {
        for input in [
            "",
            "hello world",
            "$hello",
            "{hello}",
            r"$\{hello}",
            "$h{ello}",
            "\\",
            "\\\\\\",
        ] {
            no_match(input);
        }
    }

    #[test]
    fn test_one_variable() {
        check("${hello}", "${hello}", 0, &[]);
        check("1 @{hello} more", "@{hello}", 2, &[]);
        check("*{hi}}", "*{hi}", 0, &[]);
        check("{%{{hi}}", "%{{hi}}", 1, &[]);
        check("-= ${} =-", "${}", 3, &[]);
    }

    #[test]
    fn test_escaped_internal_braces() {
        check(r"${embed:\d\{2\}}", r"${embed:\d\{2\}}", 0, &[]);
        check(r"$&{\{\}\{\}\\}{}", r"&{\{\}\{\}\\}", 1, &[]);
        check(r"${x\}y}", r"${x\}y}", 0, &[]);
    }

    #[test]
    fn test_matching_internal_braces() {
        check(r"${embed:\d{2}}", r"${embed:\d{2}}", 0, &[]);
        check(r"{}{${e:\d{4}-\d{2}}}}", r"${e:\d{4}-\d{2}}", 3, &[]);
    }

    #[test]
    fn test_unclosed_variable() {
        for input in ["${x", "${x:{}", "xx${z:{}xx", r"${x\}", "${var${int}"] {
            let err = search_variable(input).unwrap_err();
            let start = input.find('$').unwrap();
            assert_eq!(
                err.to_string(),
                format!("Variable '{}' was not closed properly.", &input[start..])
            );
            let lenient = VariableSearcher::new().ignore_errors(true).search(input);
            assert_eq!(lenient.unwrap(), None);
        }
    }

    #[test]
    fn test_escaped_variables() {
        no_match("\\${hello}");
        no_match("hi \\\\\\${hello} moi");
        check("\\\\${hello}", "${hello}", 2, &[]);
        check("\\ ${hello}", "${hello}", 2, &[]);
        check("\\${esc} ${not}", "${not}", 8, &[]);
    }

    #[test]
    fn test_internal_variables() {
        check("${hello${hi}}", "${hello${hi}}", 0, &[]);
        check("bef ${${hi}hello} aft", "${${hi}hello}", 4, &[]);
        check(r"\${${hi${hi}}}", "${hi${hi}}", 3, &[]);
        assert!(found("${a${b}}").has_internal_variables());
        assert!(!found("${ab}").has_internal_variables());
    }

    #[test]
    fn test_item_access() {
        check("${x}[0]", "${x}", 0, &["0"]);
        check(".${x}[key]..", "${x}", 1, &["key"]);
        check("${x}[]", "${x}", 0, &[""]);
        check("${x}}[0]", "${x}", 0, &[]);
        check("xx${x}[key][42][-1]", "${x}", 2, &["key", "42", "-1"]);
        check("${x}[${i}][${k}]", "${x}", 0, &["${i}", "${k}"]);
        check("${x}[${y}[0]][key]", "${x}", 0, &["${y}[0]", "key"]);
        check(r"${x}[\]]", "${x}", 0, &[r"\]"]);
        check(r"${x}\[k]", "${x}", 0, &[]);
        check("@{x}[0]", "@{x}", 0, &["0"]);
        check("&{x}[a][b]", "&{x}", 0, &["a", "b"]);
    }

    #[test]
    fn test_no_items_for_environment_and_reserved() {
        check("%{x}[0]", "%{x}", 0, &[]);
        check("*{x}[0]", "*{x}", 0, &[]);
    }

    #[test]
    fn test_unclosed_item() {
        for input in ["${x}[0", "${x}[0][key", r"${x}[0\]"] {
            let err = search_variable(input).unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("Variable item '{input}' was not closed properly.")
            );
        }
        check("[${var}[i]][", "${var}", 1, &["i"]);
    }

    #[test]
    fn test_custom_identifiers() {
        let searcher = VariableSearcher::new().identifiers(&[Sigil::Scalar]);
        let m = searcher.search("@{x}%{y} ${z}").unwrap().unwrap();
        assert_eq!(m.start, 9);
        assert_eq!(m.base, "z");
    }

    #[test]
    fn test_type_annotation() {
        let searcher = VariableSearcher::new().parse_type(true);
        let m = searcher.search("${count: int}").unwrap().unwrap();
        assert_eq!(m.base, "count");
        assert_eq!(m.type_annotation, Some("int"));
        assert_eq!(found("${count: int}").base, "count: int");
    }

    #[test]
    fn test_many_possible_starts() {
        no_match(&"{}".repeat(10_000));
        let input = format!("{}${{var}}", "{{}}".repeat(1000));
        check(&input, "${var}", 4000, &[]);
    }

    #[test]
    fn test_is_variable_helpers() {
        for no in ["", "xxx", "${var} not alone", r"\${notvar}", r"\\${var}", "${x}${y}"] {
            assert!(!is_variable(no), "{no:?}");
        }
        for yes in ["${var}", r"${var$\{}", "${var${internal}}", "@{var}", "@{var}[0]"] {
            assert!(is_variable(yes), "{yes:?}");
        }
        assert!(is_list_variable("@{grandpa}[mother][child]"));
        assert!(!is_list_variable("${scalar}"));
        assert!(is_dict_variable("&{x}[k]"));
        assert!(!is_dict_variable("@{list}"));
    }

    #[test]
    fn test_is_assign() {
        assert!(is_assign("${x}", false));
        assert!(is_assign("@{x} =", true));
        assert!(!is_assign("@{x} =", false));
        assert!(!is_assign("%{x}", false));
        assert!(!is_assign("${x}[0]", false));
        assert!(!is_assign("${a${b}}", false));
        assert!(found("${a${b}}").is_assign(false, true, false));
    }

    #[test]
    fn test_display_and_name() {
        let m = found("${x}[a][b]");
        assert_eq!(m.name(), "${x}");
        assert_eq!(m.to_string(), "${x}[a][b]");
    }

    #[test]
    fn test_matches_no_variables() {
        let matches = VariableMatches::new("no vars here");
        assert_eq!(matches.count().unwrap(), 0);
        assert!(matches.is_empty().unwrap());
    }

    #[test]
    fn test_matches_multiple_variables() {
        let matches = VariableMatches::new("${1} @{2} and %{3}");
        let found: Vec<_> = matches.iter().map(Result::unwrap).collect();
        assert_eq!(found.len(), 3);
        assert_eq!((found[0].before(), found[0].matched()), ("", "${1}"));
        assert_eq!((found[1].before(), found[1].matched()), (" ", "@{2}"));
        assert_eq!(found[1].after(), " and %{3}");
        assert_eq!(found[2].absolute_span(), 14..18);
    }

    #[test]
    fn test_matches_adjacent_variables() {
        let matches = VariableMatches::new("${x}${y}");
        let spans: Vec<_> = matches.iter().map(|m| m.unwrap().absolute_span()).collect();
        assert_eq!(spans, vec![0..4, 4..8]);
    }

    #[test]
    fn test_matches_can_be_iterated_many_times() {
        let matches = VariableMatches::new("one ${var} here");
        assert_eq!(matches.count().unwrap(), 1);
        assert_eq!(matches.count().unwrap(), 1);
        let first = (&matches).into_iter().next().unwrap().unwrap();
        assert_eq!(first.matched(), "${var}");
    }
}
