//! Backslash escaping of literal text
//!
//! `escape` makes text safe to pass through substitution unchanged;
//! `unescape` is applied to the literal parts of every substituted string.

use super::search::VariableSearcher;

const VARIABLE_STARTS: [&str; 5] = ["${", "@{", "%{", "&{", "*{"];

/// Escapes backslashes and variable starts so `text` is substituted as-is.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut escaped = text.replace('\\', "\\\\");
    for start in VARIABLE_STARTS {
        if escaped.contains(start) {
            escaped = escaped.replace(start, &format!("\\{start}"));
        }
    }
    escaped
}

/// Removes escaping backslashes.
///
/// A pair of backslashes becomes one backslash. A single backslash is
/// dropped, except that `\n`, `\r`, `\t`, `\xHH`, `\uHHHH` and
/// `\UHHHHHHHH` are decoded into the characters they name.
#[must_use]
pub fn unescape(text: &str) -> String {
    if !text.contains('\\') {
        return text.to_string();
    }
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::with_capacity(text.len());
    let mut index = 0;
    while index < chars.len() {
        if chars[index] != '\\' {
            result.push(chars[index]);
            index += 1;
            continue;
        }
        let run = chars[index..].iter().take_while(|&&c| c == '\\').count();
        result.extend(std::iter::repeat_n('\\', run / 2));
        index += run;
        if run % 2 == 1 {
            index += decode_escape(&chars[index..], &mut result);
        }
    }
    result
}

/// Decodes an escape sequence at the start of `rest`, returning how many
/// characters were consumed.
fn decode_escape(rest: &[char], result: &mut String) -> usize {
    let (digits, width) = match rest.first() {
        Some('n') => {
            result.push('\n');
            return 1;
        }
        Some('r') => {
            result.push('\r');
            return 1;
        }
        Some('t') => {
            result.push('\t');
            return 1;
        }
        Some('x') => (rest.get(1..3), 2),
        Some('u') => (rest.get(1..5), 4),
        Some('U') => (rest.get(1..9), 8),
        _ => return 0,
    };
    let decoded = digits
        .filter(|digits| digits.len() == width && digits.iter().all(char::is_ascii_hexdigit))
        .and_then(|digits| u32::from_str_radix(&digits.iter().collect::<String>(), 16).ok())
        .and_then(char::from_u32);
    match decoded {
        Some(ch) => {
            result.push(ch);
            width + 1
        }
        None => 0,
    }
}

/// Removes only the backslashes that escape variable syntax or braces.
///
/// Unlike [`unescape`], other escapes such as `\n` are left untouched.
#[must_use]
pub fn unescape_variable_syntax(text: &str) -> String {
    if !text.contains('\\') {
        return text.to_string();
    }
    let searcher = VariableSearcher::new().ignore_errors(true);
    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(position) = rest.find('\\') {
        result.push_str(&rest[..position]);
        let run = rest[position..].bytes().take_while(|&b| b == b'\\').count();
        let after = &rest[position + run..];
        let escapes_syntax = after.starts_with(['{', '}'])
            || matches!(searcher.search(after), Ok(Some(m)) if m.start == 0);
        let keep = if run % 2 == 1 && escapes_syntax { run - 1 } else { run };
        result.extend(std::iter::repeat_n('\\', keep));
        rest = after;
    }
    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("${x}"), r"\${x}");
        assert_eq!(escape(r"a\b"), r"a\\b");
        assert_eq!(escape("@{l} &{d} %{e} *{r}"), r"\@{l} \&{d} \%{e} \*{r}");
    }

    #[test]
    fn test_unescape_backslashes() {
        assert_eq!(unescape(r"\\"), "\\");
        assert_eq!(unescape(r"\\\\"), r"\\");
        assert_eq!(unescape(r"\${x}"), "${x}");
        assert_eq!(unescape(r"\\\${x}"), r"\${x}");
        assert_eq!(unescape(r"a\b"), "ab");
        assert_eq!(unescape("trailing\\"), "trailing");
    }

    #[test]
    fn test_unescape_sequences() {
        assert_eq!(unescape(r"a\nb"), "a\nb");
        assert_eq!(unescape(r"\t\r"), "\t\r");
        assert_eq!(unescape(r"\\n"), r"\n");
        assert_eq!(unescape(r"\x41ä\U0001F600"), "A\u{e4}\u{1F600}");
        assert_eq!(unescape(r"\xZZ"), "xZZ");
        assert_eq!(unescape(r"\u12"), "u12");
    }

    #[test]
    fn test_escape_then_unescape() {
        for text in ["${x}", r"a\b", "plain", "@{x}[0]", r"\${y}"] {
            assert_eq!(unescape(&escape(text)), text);
        }
    }

    #[test]
    fn test_unescape_variable_syntax() {
        assert_eq!(unescape_variable_syntax(r"\n"), r"\n");
        assert_eq!(unescape_variable_syntax(r"\$"), r"\$");
        assert_eq!(unescape_variable_syntax(r"\${var}"), "${var}");
        assert_eq!(unescape_variable_syntax(r"=\&{var}="), "=&{var}=");
        assert_eq!(unescape_variable_syntax(r"\\${var}"), r"\\${var}");
        assert_eq!(unescape_variable_syntax(r"\\\${var}"), r"\\${var}");
        assert_eq!(unescape_variable_syntax(r"=\}=\{="), "=}={=");
        assert_eq!(unescape_variable_syntax(r"$\{foo\}"), "${foo}");
        assert_eq!(unescape_variable_syntax(r"\${\n}"), r"${\n}");
        assert_eq!(unescape_variable_syntax(r"\${foo"), r"\${foo");
    }
}
