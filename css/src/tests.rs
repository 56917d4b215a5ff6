use super::*;

#[test]
fn test_compile() {
    let i = "div.item > a[href^=http], li:contains(Price) , #main p";
    let target = SelectorGroup {
        selectors: vec![
            combinator_selector!(
                compound_selector!(simple_selector!(div), simple_selector!(.item)),
                Combinator::Child,
                compound_selector!(
                    simple_selector!(a),
                    SimpleSelector::Attribute(AttributeSelector {
                        name: "href".to_string(),
                        op: AttributeOperator::Prefix("http".to_string()),
                    })
                ),
            ),
            Selector::new(compound_selector!(
                simple_selector!(li),
                SimpleSelector::PseudoClass(PseudoClass::Contains("Price".to_string()))
            )),
            combinator_selector!(
                compound_selector!(simple_selector!(#main)),
                Combinator::Descendant,
                compound_selector!(simple_selector!(p)),
            ),
        ],
    };
    assert_eq!(compile(i), Ok(target));
}

#[test]
fn test_from_str() {
    let group: SelectorGroup = "  ul  li  ".parse().unwrap();
    assert_eq!(group.selectors.len(), 1);
    let sel = &group.selectors[0];
    assert_eq!(sel.combinators(), &[Combinator::Descendant]);
    assert_eq!(sel.compounds().last(), Some(&compound_selector!(simple_selector!(li))));

    let err = "ul >> li".parse::<SelectorGroup>().unwrap_err();
    assert_eq!(err.position, 4);
    assert_eq!(err.fragment, "> li");
    assert_eq!(
        err.to_string(),
        r#"malformed selector at offset 4 near "> li""#
    );
}

#[test]
fn test_attribute_operators() {
    let includes = AttributeOperator::Includes("b".to_string());
    assert!(includes.matches("a b c"));
    assert!(!includes.matches("abc"));
    assert!(!AttributeOperator::Includes(String::new()).matches(""));

    let dash = AttributeOperator::DashMatch("en".to_string());
    assert!(dash.matches("en"));
    assert!(dash.matches("en-GB"));
    assert!(!dash.matches("english"));

    assert!(AttributeOperator::Has.matches(""));
    assert!(AttributeOperator::Equals(String::new()).matches(""));
    assert!(AttributeOperator::Prefix("ht".to_string()).matches("http"));
    assert!(!AttributeOperator::Prefix(String::new()).matches("http"));
    assert!(AttributeOperator::Suffix(".png".to_string()).matches("a.png"));
    assert!(AttributeOperator::Substring("ell".to_string()).matches("hello"));
    assert!(!AttributeOperator::Substring("Ell".to_string()).matches("hello"));
}

#[test]
fn test_nth() {
    let odd = Nth::new(2, 1);
    assert!(odd.matches(1));
    assert!(!odd.matches(2));
    assert!(odd.matches(5));

    let third = Nth::new(0, 3);
    assert!(third.matches(3));
    assert!(!third.matches(6));

    // -n+3: the first three
    let first_three = Nth::new(-1, 3);
    assert!(first_three.matches(1));
    assert!(first_three.matches(3));
    assert!(!first_three.matches(4));

    // n+2: everything from the second on
    assert!(!Nth::new(1, 2).matches(1));
    assert!(Nth::new(1, 2).matches(7));
}

#[test]
fn test_patterns_compare_by_source() {
    assert_eq!(Pattern::new(r"\d+").unwrap(), Pattern::new(r"\d+").unwrap());
    assert_ne!(Pattern::new("a").unwrap(), Pattern::new("b").unwrap());
    assert!(Pattern::new(r"^\$\d").unwrap().is_match("$5"));
    assert!(Pattern::new("(").is_err());
}

#[test]
fn test_compiled_selectors_are_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SelectorGroup>();
    assert_send_sync::<SelectorSyntaxError>();
}
