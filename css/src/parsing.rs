use nom::branch::alt;
use nom::bytes::complete::{tag, tag_no_case, take_while1, take_while_m_n};
use nom::character::complete::{
    anychar, char, digit1, multispace0, multispace1, none_of, one_of, satisfy,
};
use nom::combinator::{all_consuming, cut, eof, map, map_res, not, opt, value};
use nom::error::{Error, ErrorKind};
use nom::multi::{fold_many1, many0, separated_list1};
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use nom::IResult;
use tracing::trace;

use super::{
    AttributeOperator, AttributeSelector, Combinator, CompoundSelector, Nth, Pattern, PseudoClass,
    RelativeSelector, Selector, SelectorGroup, SelectorSyntaxError, SimpleSelector,
};

/// Compile selector text into a [`SelectorGroup`]
pub fn compile(input: &str) -> Result<SelectorGroup, SelectorSyntaxError> {
    match all_consuming(delimited(multispace0, selector_group, multispace0))(input) {
        Ok((_, group)) => {
            trace!(
                selector = input,
                alternatives = group.selectors.len(),
                "compiled selector"
            );
            Ok(group)
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let position = input.len() - e.input.len();
            trace!(selector = input, position, "rejected selector");
            Err(SelectorSyntaxError {
                position,
                fragment: e.input.to_string(),
            })
        }
        Err(nom::Err::Incomplete(_)) => Err(SelectorSyntaxError {
            position: input.len(),
            fragment: String::new(),
        }),
    }
}

#[cfg(test)]
#[test]
fn test_compile_errors() {
    let err = |i: &str| compile(i).unwrap_err();
    assert_eq!(err(""), SelectorSyntaxError { position: 0, fragment: "".to_string() });
    assert_eq!(err("   ").position, 3);
    assert_eq!(err("div >").position, 5);
    assert_eq!(err("> a").position, 0);
    assert_eq!(err("a,").position, 2);
    assert_eq!(err("a,,b").position, 2);
    assert_eq!(err("p:hover").fragment, "hover");
    assert_eq!(err("[href").position, 5);
    assert_eq!(err("div)").fragment, ")");
    assert_eq!(err("li:contains(x").position, 12);
    assert_eq!(err("li:contains()").position, 12);
}

fn selector_group(input: &str) -> IResult<&str, SelectorGroup> {
    let (input, first) = selector(input)?;
    let (input, rest) = many0(preceded(
        tuple((multispace0, char(','), multispace0)),
        cut(selector),
    ))(input)?;
    let mut selectors = Vec::with_capacity(rest.len() + 1);
    selectors.push(first);
    selectors.extend(rest);
    Ok((input, SelectorGroup { selectors }))
}

#[cfg(test)]
#[test]
fn test_selector_group() {
    let (rest, group) = selector_group("h1, h2 ,h3").unwrap();
    assert_eq!(rest, "");
    assert_eq!(
        group.selectors,
        vec![
            Selector::new(compound_selector!(simple_selector!(h1))),
            Selector::new(compound_selector!(simple_selector!(h2))),
            Selector::new(compound_selector!(simple_selector!(h3))),
        ]
    );
}

fn selector(input: &str) -> IResult<&str, Selector> {
    let (input, first) = compound(input)?;
    let (input, steps) = many0(pair(combinator, cut(compound)))(input)?;
    let selector = steps
        .into_iter()
        .fold(Selector::new(first), |chain, (c, next)| chain.then(c, next));
    Ok((input, selector))
}

fn combinator(input: &str) -> IResult<&str, Combinator> {
    alt((
        delimited(
            multispace0,
            alt((
                value(Combinator::Child, char('>')),
                value(Combinator::NextSibling, char('+')),
                value(Combinator::SubsequentSibling, char('~')),
            )),
            multispace0,
        ),
        // Whitespace before a comma, a closing paren or the end is not a combinator
        value(
            Combinator::Descendant,
            terminated(multispace1, not(alt((eof, tag(","), tag(")"))))),
        ),
    ))(input)
}

#[cfg(test)]
#[test]
fn test_combinators() {
    let (rest, sel) = selector("div > p.a + span ~ em b").unwrap();
    assert_eq!(rest, "");
    assert_eq!(
        sel,
        combinator_selector!(
            compound_selector!(simple_selector!(div)),
            Combinator::Child,
            compound_selector!(simple_selector!(p), simple_selector!(.a)),
            Combinator::NextSibling,
            compound_selector!(simple_selector!(span)),
            Combinator::SubsequentSibling,
            compound_selector!(simple_selector!(em)),
            Combinator::Descendant,
            compound_selector!(simple_selector!(b)),
        )
    );
    assert_eq!(selector("a>b").unwrap().1.combinators(), &[Combinator::Child]);
    assert_eq!(selector("a b ").unwrap().0, " ");
}

fn compound(input: &str) -> IResult<&str, CompoundSelector> {
    let (rest, head) = opt(alt((universal, type_selector)))(input)?;
    let (rest, tail) = many0(subclass)(rest)?;
    if head.is_none() && tail.is_empty() {
        return Err(nom::Err::Error(Error::new(input, ErrorKind::Verify)));
    }
    Ok((rest, CompoundSelector(head.into_iter().chain(tail).collect())))
}

#[cfg(test)]
#[test]
fn test_compound() {
    assert_eq!(
        compound("*#main.a.b[title]").unwrap(),
        (
            "",
            compound_selector!(
                simple_selector!(*),
                simple_selector!(#main),
                simple_selector!(.a),
                simple_selector!(.b),
                simple_selector!([title]),
            )
        )
    );
    assert_eq!(
        compound("DIV.Item").unwrap().1,
        compound_selector!(
            SimpleSelector::Type("div".to_string()),
            SimpleSelector::Class("Item".to_string())
        )
    );
    assert!(compound("> a").is_err());
}

fn universal(input: &str) -> IResult<&str, SimpleSelector> {
    value(SimpleSelector::Universal, char('*'))(input)
}

fn type_selector(input: &str) -> IResult<&str, SimpleSelector> {
    map(identifier, |name| SimpleSelector::Type(name.to_ascii_lowercase()))(input)
}

fn subclass(input: &str) -> IResult<&str, SimpleSelector> {
    alt((
        map(preceded(char('#'), cut(identifier)), SimpleSelector::ID),
        map(preceded(char('.'), cut(identifier)), SimpleSelector::Class),
        map(attribute, SimpleSelector::Attribute),
        map(pseudo_class, SimpleSelector::PseudoClass),
    ))(input)
}

type OperatorConstructor = fn(String) -> AttributeOperator;

fn attribute(input: &str) -> IResult<&str, AttributeSelector> {
    let (input, _) = char('[')(input)?;
    cut(terminated(attribute_body, pair(multispace0, char(']'))))(input)
}

fn attribute_body(input: &str) -> IResult<&str, AttributeSelector> {
    let (input, name) = preceded(multispace0, identifier)(input)?;
    let (input, op) = opt(pair(
        delimited(multispace0, attribute_operator, multispace0),
        cut(alt((quoted, bare_value))),
    ))(input)?;
    let op = match op {
        Some((constructor, value)) => constructor(value),
        None => AttributeOperator::Has,
    };
    Ok((
        input,
        AttributeSelector {
            name: name.to_ascii_lowercase(),
            op,
        },
    ))
}

fn attribute_operator(input: &str) -> IResult<&str, OperatorConstructor> {
    alt((
        value(AttributeOperator::Equals as OperatorConstructor, tag("=")),
        value(AttributeOperator::Includes as OperatorConstructor, tag("~=")),
        value(AttributeOperator::DashMatch as OperatorConstructor, tag("|=")),
        value(AttributeOperator::Prefix as OperatorConstructor, tag("^=")),
        value(AttributeOperator::Suffix as OperatorConstructor, tag("$=")),
        value(AttributeOperator::Substring as OperatorConstructor, tag("*=")),
    ))(input)
}

fn bare_value(input: &str) -> IResult<&str, String> {
    fold_many1(
        alt((escape, none_of("]\\\"' \t\r\n\x0c"))),
        String::new,
        |mut acc, c| {
            acc.push(c);
            acc
        },
    )(input)
}

#[cfg(test)]
#[test]
fn test_attribute() {
    let attr = |i: &str| attribute(i).unwrap().1;
    assert_eq!(
        attr("[HREF]"),
        AttributeSelector {
            name: "href".to_string(),
            op: AttributeOperator::Has
        }
    );
    assert_eq!(
        attr("[ lang |= en ]").op,
        AttributeOperator::DashMatch("en".to_string())
    );
    assert_eq!(
        attr("[href^=http://example.com/]").op,
        AttributeOperator::Prefix("http://example.com/".to_string())
    );
    assert_eq!(
        attr(r#"[title="a ] b"]"#).op,
        AttributeOperator::Equals("a ] b".to_string())
    );
    assert_eq!(attr("[class~='x']").op, AttributeOperator::Includes("x".to_string()));
    assert_eq!(attr("[src$=.png]").op, AttributeOperator::Suffix(".png".to_string()));
    assert_eq!(attr("[id*=Item]").op, AttributeOperator::Substring("Item".to_string()));
    assert!(attribute("[=x]").is_err());
    assert!(attribute("[a=]").is_err());
}

fn pseudo_class(input: &str) -> IResult<&str, PseudoClass> {
    let (input, _) = char(':')(input)?;
    cut(pseudo_class_body)(input)
}

fn pseudo_class_body(input: &str) -> IResult<&str, PseudoClass> {
    let (rest, name) = identifier(input)?;
    match name.to_ascii_lowercase().as_str() {
        "first-child" => Ok((rest, PseudoClass::FirstChild)),
        "last-child" => Ok((rest, PseudoClass::LastChild)),
        "only-child" => Ok((rest, PseudoClass::OnlyChild)),
        "first-of-type" => Ok((rest, PseudoClass::NthOfType(Nth::new(0, 1)))),
        "last-of-type" => Ok((rest, PseudoClass::NthLastOfType(Nth::new(0, 1)))),
        "only-of-type" => Ok((rest, PseudoClass::OnlyOfType)),
        "nth-child" => map(nth_argument, PseudoClass::NthChild)(rest),
        "nth-last-child" => map(nth_argument, PseudoClass::NthLastChild)(rest),
        "nth-of-type" => map(nth_argument, PseudoClass::NthOfType)(rest),
        "nth-last-of-type" => map(nth_argument, PseudoClass::NthLastOfType)(rest),
        "eq" => map(index_argument, PseudoClass::Eq)(rest),
        "lt" => map(index_argument, PseudoClass::Lt)(rest),
        "gt" => map(index_argument, PseudoClass::Gt)(rest),
        "empty" => Ok((rest, PseudoClass::Empty)),
        "root" => Ok((rest, PseudoClass::Root)),
        "contains" => map(text_argument, PseudoClass::Contains)(rest),
        "containsown" => map(text_argument, PseudoClass::ContainsOwn)(rest),
        "matches" => map(pattern_argument, PseudoClass::Matches)(rest),
        "matchesown" => map(pattern_argument, PseudoClass::MatchesOwn)(rest),
        "not" => map(
            delimited(
                pair(char('('), multispace0),
                compound,
                pair(multispace0, char(')')),
            ),
            PseudoClass::Not,
        )(rest),
        "has" => map(
            delimited(
                pair(char('('), multispace0),
                separated_list1(tuple((multispace0, char(','), multispace0)), relative_selector),
                pair(multispace0, char(')')),
            ),
            PseudoClass::Has,
        )(rest),
        _ => Err(nom::Err::Error(Error::new(input, ErrorKind::Tag))),
    }
}

fn relative_selector(input: &str) -> IResult<&str, RelativeSelector> {
    let (input, combinator) = opt(terminated(
        alt((
            value(Combinator::Child, char('>')),
            value(Combinator::NextSibling, char('+')),
            value(Combinator::SubsequentSibling, char('~')),
        )),
        multispace0,
    ))(input)?;
    let (input, selector) = selector(input)?;
    Ok((
        input,
        RelativeSelector {
            combinator: combinator.unwrap_or(Combinator::Descendant),
            selector,
        },
    ))
}

/// `(text)` or `("text")`. Unquoted text runs to the `)` that balances the opening one.
fn text_argument(input: &str) -> IResult<&str, String> {
    delimited(
        pair(char('('), multispace0),
        alt((quoted, balanced_text(true))),
        pair(multispace0, char(')')),
    )(input)
}

/// A regular expression, taken as written up to the balancing `)`
fn pattern_argument(input: &str) -> IResult<&str, Pattern> {
    let (source_start, _) = pair(char('('), multispace0)(input)?;
    let (rest, source) = terminated(balanced_text(false), char(')'))(source_start)?;
    match Pattern::new(&source) {
        Ok(pattern) => Ok((rest, pattern)),
        Err(e) => {
            trace!(error = %e, "invalid pattern");
            Err(nom::Err::Failure(Error::new(source_start, ErrorKind::MapRes)))
        }
    }
}

/// Text up to an unbalanced `)`, trimmed. With `unescape`, a backslash makes the next
/// character literal and is dropped; otherwise it is kept for the consumer to interpret.
fn balanced_text(unescape: bool) -> impl Fn(&str) -> IResult<&str, String> {
    move |input: &str| {
        let mut depth = 0usize;
        let mut text = String::new();
        let mut chars = input.char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                ')' if depth == 0 => {
                    let trimmed = text.trim_end();
                    if trimmed.is_empty() {
                        return Err(nom::Err::Error(Error::new(input, ErrorKind::Verify)));
                    }
                    return Ok((&input[i..], trimmed.to_string()));
                }
                ')' => depth -= 1,
                '(' => depth += 1,
                '\\' => {
                    if !unescape {
                        text.push(c);
                    }
                    if let Some((_, escaped)) = chars.next() {
                        text.push(escaped);
                    }
                    continue;
                }
                _ => {}
            }
            text.push(c);
        }
        Err(nom::Err::Error(Error::new(input, ErrorKind::Char)))
    }
}

fn nth_argument(input: &str) -> IResult<&str, Nth> {
    delimited(
        pair(char('('), multispace0),
        nth,
        pair(multispace0, char(')')),
    )(input)
}

fn nth(input: &str) -> IResult<&str, Nth> {
    alt((
        value(Nth::new(2, 1), tag_no_case("odd")),
        value(Nth::new(2, 0), tag_no_case("even")),
        step_and_offset,
        map(integer, |offset| Nth::new(0, offset)),
    ))(input)
}

/// `2n+1`, `-n + 3`, `n`, ...
fn step_and_offset(input: &str) -> IResult<&str, Nth> {
    let (input, sign) = opt(one_of("+-"))(input)?;
    let (input, step) = opt(unsigned)(input)?;
    let (input, _) = one_of("nN")(input)?;
    let (input, offset) = opt(preceded(
        multispace0,
        pair(one_of("+-"), preceded(multispace0, unsigned)),
    ))(input)?;
    let step = step.unwrap_or(1);
    let step = if sign == Some('-') { -step } else { step };
    let offset = match offset {
        Some(('-', offset)) => -offset,
        Some((_, offset)) => offset,
        None => 0,
    };
    Ok((input, Nth::new(step, offset)))
}

fn unsigned(input: &str) -> IResult<&str, i32> {
    map_res(digit1, |digits: &str| digits.parse::<i32>())(input)
}

fn integer(input: &str) -> IResult<&str, i32> {
    map(pair(opt(one_of("+-")), unsigned), |(sign, n)| {
        if sign == Some('-') {
            -n
        } else {
            n
        }
    })(input)
}

#[cfg(test)]
#[test]
fn test_nth() {
    assert_eq!(nth("odd"), Ok(("", Nth::new(2, 1))));
    assert_eq!(nth("EVEN"), Ok(("", Nth::new(2, 0))));
    assert_eq!(nth("3"), Ok(("", Nth::new(0, 3))));
    assert_eq!(nth("-2"), Ok(("", Nth::new(0, -2))));
    assert_eq!(nth("2n+1"), Ok(("", Nth::new(2, 1))));
    assert_eq!(nth("-n + 3"), Ok(("", Nth::new(-1, 3))));
    assert_eq!(nth("n"), Ok(("", Nth::new(1, 0))));
    assert_eq!(nth("3n - 2 "), Ok((" ", Nth::new(3, -2))));
    assert!(nth("x").is_err());
}

fn index_argument(input: &str) -> IResult<&str, usize> {
    delimited(
        pair(char('('), multispace0),
        map_res(digit1, |digits: &str| digits.parse::<usize>()),
        pair(multispace0, char(')')),
    )(input)
}

#[cfg(test)]
#[test]
fn test_pseudo_classes() {
    let pseudo = |i: &'static str| pseudo_class(i).unwrap();
    assert_eq!(pseudo(":first-child"), ("", PseudoClass::FirstChild));
    assert_eq!(pseudo(":Empty"), ("", PseudoClass::Empty));
    assert_eq!(
        pseudo(":contains(Price (USD))"),
        ("", PseudoClass::Contains("Price (USD)".to_string()))
    );
    assert_eq!(
        pseudo(r#":containsOwn( "a, b" )"#),
        ("", PseudoClass::ContainsOwn("a, b".to_string()))
    );
    assert_eq!(
        pseudo(":not(.hidden)"),
        (
            "",
            PseudoClass::Not(compound_selector!(simple_selector!(.hidden)))
        )
    );
    assert_eq!(pseudo(":nth-child(2)"), ("", PseudoClass::NthChild(Nth::new(0, 2))));
    assert_eq!(
        pseudo(":nth-last-of-type( 2n+1 )"),
        ("", PseudoClass::NthLastOfType(Nth::new(2, 1)))
    );
    assert_eq!(pseudo(":first-of-type"), ("", PseudoClass::NthOfType(Nth::new(0, 1))));
    assert_eq!(pseudo(":gt(1)"), ("", PseudoClass::Gt(1)));
    assert_eq!(
        pseudo(":has(> li, .x b)"),
        (
            "",
            PseudoClass::Has(vec![
                RelativeSelector {
                    combinator: Combinator::Child,
                    selector: Selector::new(compound_selector!(simple_selector!(li))),
                },
                RelativeSelector {
                    combinator: Combinator::Descendant,
                    selector: combinator_selector!(
                        compound_selector!(simple_selector!(.x)),
                        Combinator::Descendant,
                        compound_selector!(simple_selector!(b)),
                    ),
                },
            ])
        )
    );
    assert!(pseudo_class(":not(a b)").is_err());
    assert!(pseudo_class(":eq(-1)").is_err());
    assert!(pseudo_class(":nth-child(x)").is_err());
}

#[cfg(test)]
#[test]
fn test_pattern_argument() {
    let (rest, pseudo) = pseudo_class(r":matches(^\d+(\.\d+)?$)").unwrap();
    assert_eq!(rest, "");
    match pseudo {
        PseudoClass::Matches(pattern) => {
            assert_eq!(pattern.as_str(), r"^\d+(\.\d+)?$");
            assert!(pattern.is_match("3.50"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(
        pseudo_class(":matchesOwn(a\\)b)").unwrap().1,
        PseudoClass::MatchesOwn(p) if p.as_str() == r"a\)b"
    ));
    assert_eq!(compile("li:matches([)").unwrap_err().position, 11);
}

fn quoted(input: &str) -> IResult<&str, String> {
    let (rest, quote) = one_of("\"'")(input)?;
    let (rest, body) = many0(alt((escape, satisfy(move |c| c != quote && c != '\\'))))(rest)?;
    let (rest, _) = cut(char(quote))(rest)?;
    Ok((rest, body.into_iter().collect()))
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

/// Name characters plus backslash escapes, unescaped
fn identifier(input: &str) -> IResult<&str, String> {
    fold_many1(
        alt((
            map(take_while1(is_name_char), String::from),
            map(escape, String::from),
        )),
        String::new,
        |mut acc, part| {
            acc.push_str(&part);
            acc
        },
    )(input)
}

/// `\` followed by up to six hex digits (and one optional space), or any other character
fn escape(input: &str) -> IResult<&str, char> {
    preceded(char('\\'), alt((hex_escape, anychar)))(input)
}

fn hex_escape(input: &str) -> IResult<&str, char> {
    let (input, digits) = take_while_m_n(1, 6, |c: char| c.is_ascii_hexdigit())(input)?;
    let (input, _) = opt(one_of(" \t\r\n\x0c"))(input)?;
    let c = u32::from_str_radix(digits, 16)
        .ok()
        .and_then(char::from_u32)
        .filter(|&c| c != '\0')
        .unwrap_or('\u{fffd}');
    Ok((input, c))
}

#[cfg(test)]
#[test]
fn test_identifier() {
    assert_eq!(identifier("item-1_b rest"), Ok((" rest", "item-1_b".to_string())));
    assert_eq!(identifier(r"a\:b"), Ok(("", "a:b".to_string())));
    assert_eq!(identifier(r"\31 0"), Ok(("", "10".to_string())));
    assert_eq!(identifier("héllo"), Ok(("", "héllo".to_string())));
    assert!(identifier(".x").is_err());
}
