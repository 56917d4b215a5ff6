use lazy_static::lazy_static;
use std::borrow::Cow;
use std::collections::HashMap;

lazy_static! {
    static ref NAMED: HashMap<&'static str, char> = HashMap::from([
        ("amp", '&'),
        ("lt", '<'),
        ("gt", '>'),
        ("quot", '"'),
        ("apos", '\''),
        ("nbsp", '\u{a0}'),
        ("copy", '\u{a9}'),
        ("reg", '\u{ae}'),
        ("trade", '\u{2122}'),
        ("hellip", '\u{2026}'),
        ("mdash", '\u{2014}'),
        ("ndash", '\u{2013}'),
        ("lsquo", '\u{2018}'),
        ("rsquo", '\u{2019}'),
        ("ldquo", '\u{201c}'),
        ("rdquo", '\u{201d}'),
        ("laquo", '\u{ab}'),
        ("raquo", '\u{bb}'),
        ("middot", '\u{b7}'),
        ("bull", '\u{2022}'),
        ("euro", '\u{20ac}'),
        ("pound", '\u{a3}'),
        ("yen", '\u{a5}'),
        ("cent", '\u{a2}'),
        ("sect", '\u{a7}'),
        ("deg", '\u{b0}'),
        ("plusmn", '\u{b1}'),
        ("times", '\u{d7}'),
        ("divide", '\u{f7}'),
        ("para", '\u{b6}'),
        ("shy", '\u{ad}'),
        ("iexcl", '\u{a1}'),
        ("iquest", '\u{bf}'),
    ]);
}

/// References that are still recognised without a trailing `;`
static LEGACY: &[&str] = &["amp", "lt", "gt", "quot", "nbsp", "copy", "reg"];

/// Longest name in [`NAMED`]
const MAX_NAME_LEN: usize = 6;

/// Decode character references in `input`. Unknown or malformed references are kept as written.
///
/// `in_attribute` applies the attribute-value rule that a legacy reference without `;`
/// followed by `=` is left alone, so query strings like `?a=1&copy=2` survive.
pub fn decode(input: &str, in_attribute: bool) -> Cow<str> {
    if !input.contains('&') {
        return Cow::Borrowed(input);
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        match reference(after, in_attribute) {
            Some((c, consumed)) => {
                out.push(c);
                rest = &after[consumed..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Resolve the reference at the start of `input` (just past the `&`), returning the
/// character and the number of bytes it occupied
fn reference(input: &str, in_attribute: bool) -> Option<(char, usize)> {
    if let Some(numeric) = input.strip_prefix('#') {
        let (digits, radix, prefix) = match numeric.strip_prefix(|c: char| c == 'x' || c == 'X') {
            Some(hex) => (hex, 16, 2),
            None => (numeric, 10, 1),
        };
        let len = digits
            .find(|c: char| !c.is_digit(radix))
            .unwrap_or(digits.len());
        if len == 0 {
            return None;
        }
        let c = u32::from_str_radix(&digits[..len], radix)
            .ok()
            .filter(|&n| n != 0)
            .and_then(char::from_u32)
            .unwrap_or('\u{fffd}');
        let semicolon = usize::from(digits[len..].starts_with(';'));
        return Some((c, prefix + len + semicolon));
    }

    let len = input
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(input.len());
    if len == 0 || len > MAX_NAME_LEN {
        return None;
    }
    let name = &input[..len];
    let c = *NAMED.get(name)?;
    let next = input[len..].chars().next();
    match next {
        Some(';') => Some((c, len + 1)),
        Some('=') if in_attribute => None,
        _ if LEGACY.contains(&name) => Some((c, len)),
        _ => None,
    }
}

#[cfg(test)]
#[test]
fn test_decode_named() {
    assert_eq!(decode("a &amp; b", false), "a & b");
    assert_eq!(decode("&lt;p&gt;", false), "<p>");
    assert_eq!(decode("&copy 2024", false), "\u{a9} 2024");
    assert_eq!(decode("&hellip;", false), "\u{2026}");
    // Not a legacy name, so the semicolon is required
    assert_eq!(decode("&hellip", false), "&hellip");
    assert_eq!(decode("&bogus;", false), "&bogus;");
    assert_eq!(decode("fish & chips", false), "fish & chips");
}

#[cfg(test)]
#[test]
fn test_decode_numeric() {
    assert_eq!(decode("&#65;&#x42;&#X43", false), "ABC");
    assert_eq!(decode("&#0;", false), "\u{fffd}");
    assert_eq!(decode("&#xD800;", false), "\u{fffd}");
    assert_eq!(decode("&#;", false), "&#;");
}

#[cfg(test)]
#[test]
fn test_decode_attribute() {
    assert_eq!(decode("?a=1&copy=2", true), "?a=1&copy=2");
    assert_eq!(decode("?a=1&copy=2", false), "?a=1\u{a9}=2");
    assert_eq!(decode("a&amp;b", true), "a&b");
}
