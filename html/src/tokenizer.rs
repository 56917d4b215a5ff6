//! Splits markup into a stream of [`Token`]s.
//!
//! Tokenizing never fails. Markup that cannot be recognised is emitted as text and
//! scanning resumes at the next `<`.

use crate::elements::{is_escapable_raw_text_element, is_raw_text_element};
use crate::entities::decode;
use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_till, take_till1, take_until, take_while, take_while1},
    character::complete::{char, multispace0, satisfy},
    combinator::{map, not, opt, recognize, rest},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    StartTag {
        name: String,
        attributes: Vec<(String, String)>,
        self_closing: bool,
    },
    EndTag {
        name: String,
    },
    Text(String),
    Comment(String),
    /// The doctype name, e.g. `html`
    Doctype(String),
}

/// Lazily tokenizes an input string. Each call to [`Iterator::next`] scans just enough input
/// to produce one token.
pub struct Tokenizer<'a> {
    input: &'a str,
    /// Set after a `<script>`, `<style>`, `<title>` or `<textarea>` start tag: the element whose
    /// close tag ends the raw text
    raw_text: Option<String>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            raw_text: None,
        }
    }

    /// Plain text up to the next `<`, or a `<` that did not open any markup plus the text after it
    fn text(&mut self) -> Token {
        let start = usize::from(self.input.starts_with('<'));
        let end = self.input[start..]
            .find('<')
            .map_or(self.input.len(), |i| i + start);
        let (text, rest) = self.input.split_at(end);
        self.input = rest;
        Token::Text(decode(text, false).into_owned())
    }

    fn take_raw_text(&mut self, name: &str) -> Option<Token> {
        let end = find_close_tag(self.input, name).unwrap_or_else(|| {
            trace!(element = name, "raw text runs to end of input");
            self.input.len()
        });
        let (text, rest) = self.input.split_at(end);
        self.input = rest;
        if text.is_empty() {
            return None;
        }
        let text = if is_escapable_raw_text_element(name) {
            decode(text, false).into_owned()
        } else {
            text.to_string()
        };
        Some(Token::Text(text))
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if let Some(name) = self.raw_text.take() {
            if let Some(token) = self.take_raw_text(&name) {
                return Some(token);
            }
        }
        while !self.input.is_empty() {
            if !self.input.starts_with('<') {
                return Some(self.text());
            }
            match markup(self.input) {
                Ok((rest, Some(token))) => {
                    self.input = rest;
                    // `<script/>` still opens raw text, as in browsers
                    if let Token::StartTag { name, .. } = &token {
                        if is_raw_text_element(name) || is_escapable_raw_text_element(name) {
                            self.raw_text = Some(name.clone());
                        }
                    }
                    return Some(token);
                }
                Ok((rest, None)) => {
                    trace!("dropping empty end tag");
                    self.input = rest;
                }
                Err(_) => {
                    trace!("unrecognised markup kept as text");
                    return Some(self.text());
                }
            }
        }
        None
    }
}

/// Byte offset of the `</name` that closes a raw text element, matched case-insensitively
fn find_close_tag(input: &str, name: &str) -> Option<usize> {
    let bytes = input.as_bytes();
    let mut from = 0;
    while let Some(found) = input[from..].find("</") {
        let start = from + found;
        let name_start = start + 2;
        let name_end = name_start + name.len();
        if bytes.len() >= name_end
            && bytes[name_start..name_end].eq_ignore_ascii_case(name.as_bytes())
        {
            match bytes.get(name_end) {
                None | Some(b'>' | b'/' | b' ' | b'\t' | b'\n' | b'\r' | b'\x0c') => {
                    return Some(start)
                }
                _ => {}
            }
        }
        from = name_start;
    }
    None
}

/// Anything starting with `<`. `Ok(None)` means the markup was consumed but produces no token.
fn markup(input: &str) -> IResult<&str, Option<Token>> {
    alt((
        map(comment, Some),
        map(doctype, Some),
        map(bogus_comment, Some),
        end_tag,
        map(start_tag, Some),
    ))(input)
}

/// `<!-- data -->`; an unterminated comment swallows the rest of the input
fn comment(input: &str) -> IResult<&str, Token> {
    let (input, _) = tag("<!--")(input)?;
    let (input, data) = alt((terminated(take_until("-->"), tag("-->")), rest))(input)?;
    Ok((input, Token::Comment(data.to_string())))
}

fn doctype(input: &str) -> IResult<&str, Token> {
    let (input, (_, _, name, _, _)) = tuple((
        tag_no_case("<!doctype"),
        multispace0,
        take_while(|c: char| !c.is_whitespace() && c != '>'),
        take_till(|c: char| c == '>'),
        opt(char('>')),
    ))(input)?;
    Ok((input, Token::Doctype(name.to_ascii_lowercase())))
}

/// `<!anything>` and `<?anything>`
fn bogus_comment(input: &str) -> IResult<&str, Token> {
    let (input, (data, _)) = pair(
        alt((
            preceded(tag("<!"), take_till(|c: char| c == '>')),
            preceded(
                char('<'),
                recognize(pair(char('?'), take_till(|c: char| c == '>'))),
            ),
        )),
        opt(char('>')),
    )(input)?;
    Ok((input, Token::Comment(data.to_string())))
}

/// `</name ...>`. `</>` yields nothing and `</` followed by a non-letter is a bogus comment.
fn end_tag(input: &str) -> IResult<&str, Option<Token>> {
    let (input, _) = tag("</")(input)?;
    alt((
        map(char('>'), |_| None::<Token>),
        map(
            terminated(tag_name, pair(take_till(|c: char| c == '>'), opt(char('>')))),
            |name: &str| {
                Some(Token::EndTag {
                    name: name.to_ascii_lowercase(),
                })
            },
        ),
        map(
            terminated(take_till1(|c: char| c == '>'), opt(char('>'))),
            |data: &str| Some(Token::Comment(data.to_string())),
        ),
    ))(input)
}

fn tag_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c: char| c.is_ascii_alphabetic()),
        take_while(|c: char| !c.is_whitespace() && c != '/' && c != '>'),
    ))(input)
}

/// `<name attr=value ...>` or `<name ... />`
fn start_tag(input: &str) -> IResult<&str, Token> {
    let (input, name) = preceded(char('<'), tag_name)(input)?;
    let (input, found) = many0(preceded(
        multispace0,
        alt((map(attribute, Some), map(junk, |_| None))),
    ))(input)?;
    let (input, closing) = preceded(multispace0, alt((tag("/>"), tag(">"))))(input)?;

    let mut attributes: Vec<(String, String)> = Vec::with_capacity(found.len());
    for (key, value) in found.into_iter().flatten() {
        if attributes.iter().any(|(existing, _)| *existing == key) {
            trace!(%key, "duplicate attribute dropped");
            continue;
        }
        attributes.push((key, value));
    }
    Ok((
        input,
        Token::StartTag {
            name: name.to_ascii_lowercase(),
            attributes,
            self_closing: closing == "/>",
        },
    ))
}

/// A character inside a tag that cannot start an attribute: skipped
fn junk(input: &str) -> IResult<&str, char> {
    alt((
        satisfy(|c: char| c != '>' && c != '/' && !c.is_whitespace()),
        terminated(char('/'), not(char('>'))),
    ))(input)
}

// Attribute parsing below

fn attribute_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace() && !matches!(c, '"' | '\'' | '>' | '/' | '='))(input)
}

fn attribute_value(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('"'), take_till(|c: char| c == '"'), char('"')),
        delimited(char('\''), take_till(|c: char| c == '\''), char('\'')),
        take_while1(|c: char| !c.is_whitespace() && c != '>'),
    ))(input)
}

fn attribute(input: &str) -> IResult<&str, (String, String)> {
    let (input, name) = attribute_name(input)?;
    let (input, value) = opt(preceded(
        tuple((multispace0, char('='), multispace0)),
        attribute_value,
    ))(input)?;
    let value = value
        .map(|v| decode(v, true).into_owned())
        .unwrap_or_default();
    Ok((input, (name.to_ascii_lowercase(), value)))
}

#[cfg(test)]
fn tokenize(input: &str) -> Vec<Token> {
    Tokenizer::new(input).collect()
}

#[cfg(test)]
fn start(name: &str, attributes: &[(&str, &str)], self_closing: bool) -> Token {
    Token::StartTag {
        name: name.to_string(),
        attributes: attributes
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        self_closing,
    }
}

#[cfg(test)]
fn end(name: &str) -> Token {
    Token::EndTag {
        name: name.to_string(),
    }
}

#[cfg(test)]
#[test]
fn test_tag_tokens() {
    let data = r#"<DIV class=nothing id='x' data-a="1 2" hidden>Hi</Div>"#;
    assert_eq!(
        tokenize(data),
        vec![
            start(
                "div",
                &[("class", "nothing"), ("id", "x"), ("data-a", "1 2"), ("hidden", "")],
                false
            ),
            Token::Text("Hi".to_string()),
            end("div"),
        ]
    );

    let data = r#"<br/><img src=a.png /><input value = "a > b">"#;
    assert_eq!(
        tokenize(data),
        vec![
            start("br", &[], true),
            start("img", &[("src", "a.png")], true),
            start("input", &[("value", "a > b")], false),
        ]
    );
}

#[cfg(test)]
#[test]
fn test_attribute_recovery() {
    assert_eq!(
        tokenize(r#"<div "foo" a=1>"#),
        vec![start("div", &[("foo", ""), ("a", "1")], false)]
    );
    assert_eq!(
        tokenize("<a href=1 HREF=2>"),
        vec![start("a", &[("href", "1")], false)]
    );
    assert_eq!(
        tokenize(r#"<a title="Q&amp;A" href="?x=1&copy=2">"#),
        vec![start("a", &[("title", "Q&A"), ("href", "?x=1&copy=2")], false)]
    );
}

#[cfg(test)]
#[test]
fn test_comments_and_doctype() {
    assert_eq!(
        tokenize("<!DOCTYPE html><!-- hi --><?xml x?><!bogus>"),
        vec![
            Token::Doctype("html".to_string()),
            Token::Comment(" hi ".to_string()),
            Token::Comment("?xml x?".to_string()),
            Token::Comment("bogus".to_string()),
        ]
    );
    assert_eq!(
        tokenize("a<!-- never closed"),
        vec![
            Token::Text("a".to_string()),
            Token::Comment(" never closed".to_string()),
        ]
    );
}

#[cfg(test)]
#[test]
fn test_malformed_markup_is_text() {
    assert_eq!(
        tokenize("a < b <3 </> c"),
        vec![
            Token::Text("a ".to_string()),
            Token::Text("< b ".to_string()),
            Token::Text("<3 ".to_string()),
            Token::Text(" c".to_string()),
        ]
    );
    assert_eq!(
        tokenize(r#"x<div class="a"#),
        vec![
            Token::Text("x".to_string()),
            Token::Text(r#"<div class="a"#.to_string()),
        ]
    );
    assert_eq!(
        tokenize("<p>x</p"),
        vec![start("p", &[], false), Token::Text("x".to_string()), end("p")]
    );
    assert_eq!(tokenize("</ 3>"), vec![Token::Comment(" 3".to_string())]);
}

#[cfg(test)]
#[test]
fn test_raw_text() {
    let data = r#"<script>if (a < b) { x = "</div>"; }</SCRIPT><p>"#;
    assert_eq!(
        tokenize(data),
        vec![
            start("script", &[], false),
            Token::Text(r#"if (a < b) { x = "</div>"; }"#.to_string()),
            end("script"),
            start("p", &[], false),
        ]
    );
    assert_eq!(
        tokenize("<title>A &amp; <b>B</b></title>"),
        vec![
            start("title", &[], false),
            Token::Text("A & <b>B</b>".to_string()),
            end("title"),
        ]
    );
    assert_eq!(
        tokenize("<style>p { color: red }"),
        vec![
            start("style", &[], false),
            Token::Text("p { color: red }".to_string()),
        ]
    );
    assert_eq!(
        tokenize("<script></script>"),
        vec![start("script", &[], false), end("script")]
    );
    assert_eq!(
        tokenize(r#"<script src="a.js"/><p>x</p></script>y"#),
        vec![
            start("script", &[("src", "a.js")], true),
            Token::Text("<p>x</p>".to_string()),
            end("script"),
            Token::Text("y".to_string()),
        ]
    );
}

#[cfg(test)]
#[test]
fn test_text_entities() {
    assert_eq!(
        tokenize("Tom &amp; Jerry&nbsp;&#33;"),
        vec![Token::Text("Tom & Jerry\u{a0}!".to_string())]
    );
}
