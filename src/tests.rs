use super::*;
use std::thread;

const LIST: &str = r#"<ul><li class="x">A</li><li>B</li></ul>"#;

#[test]
fn test_select_list() {
    let found = select(LIST, "li.x");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].tag, "li");
    assert_eq!(found[0].text, "A");
    assert_eq!(found[0].child_count, 0);
    assert_eq!(found[0].attributes.get("class").map(String::as_str), Some("x"));
    assert_eq!(get_text(LIST, "li"), "A B");
    assert_eq!(get_html(LIST, "li"), r#"<li class="x">A</li><li>B</li>"#);
}

#[test]
fn test_next_sibling() {
    let page = r#"<div id="p"><h2>Title</h2></div>"#;
    assert_eq!(next_sibling(page, "div#p > h2"), None);
    assert_eq!(next_sibling(page, "h3"), None);

    let page = "<div><h2>Title</h2> text <!--c--><p>Body</p></div>";
    let sibling = next_sibling(page, "h2").unwrap();
    assert_eq!(sibling.tag, "p");
    assert_eq!(sibling.outer_html, "<p>Body</p>");
}

#[test]
fn test_parse() {
    let result = parse("<title> My  page </title><p>Hello</p>");
    assert_eq!(
        result,
        ParseResult {
            title: "My page".to_string(),
            body: "<p>Hello</p>".to_string(),
        }
    );
    assert_eq!(parse(""), ParseResult::default());
}

#[test]
fn test_attribute_asymmetry() {
    // A present but empty attribute is skipped by the plural form and returned by the
    // singular one, where it is indistinguishable from a missing attribute
    let page = r#"<a href="">x</a>"#;
    assert_eq!(get_attribute_by_query(page, "a", "href"), "");
    assert_eq!(get_attributes_by_query(page, "a", "href"), Vec::<String>::new());
    assert_eq!(get_attribute_by_query(page, "a", "title"), "");

    let page = r#"<a href="/1">1</a><a>2</a><a href="">3</a><a HREF="/4">4</a>"#;
    assert_eq!(get_attributes_by_query(page, "a", "href"), vec!["/1", "/4"]);
    assert_eq!(get_attribute_by_query(page, "a", "HREF"), "/1");
    assert_eq!(get_attribute_by_query(page, "a:not([href])", "href"), "");
}

#[test]
fn test_malformed_selector_gives_empty_results() {
    let bad = "li[";
    assert_eq!(select(LIST, bad), Vec::<Element>::new());
    assert_eq!(select_first(LIST, bad), None);
    assert_eq!(get_text(LIST, bad), "");
    assert_eq!(get_html(LIST, bad), "");
    assert_eq!(get_attributes_by_query(LIST, bad, "class"), Vec::<String>::new());
    assert_eq!(get_attribute_by_query(LIST, bad, "class"), "");
    assert_eq!(next_sibling(LIST, bad), None);

    match try_select(LIST, bad) {
        Err(Error::Selector(e)) => assert_eq!(e.position, 3),
        other => panic!("expected a selector error, got {other:?}"),
    }
}

#[test]
fn test_idempotent_parsing() {
    let page = "<div><p>a<p>b</div><ul><li>x<li>y</ul><br><span>z</span><!--c-->";
    assert_eq!(document(page), document(page));
    assert_eq!(select(page, "*"), select(page, "*"));
}

#[test]
fn test_document_order_and_deduplication() {
    let page = r#"<ul><li class="item">1</li><li>2</li></ul><ol><li class="item">3</li></ol>"#;
    let found = select(page, "li, .item, ol > li");
    let texts: Vec<&str> = found.iter().map(|e| e.text.as_str()).collect();
    assert_eq!(texts, vec!["1", "2", "3"]);

    let doc = document(page);
    let group = compile("li, ul, ol").unwrap();
    let ids = select::select(&doc, doc.root(), &group);
    let order: Vec<NodeId> = doc.subtree(doc.root()).collect();
    let positions: Vec<usize> = ids
        .iter()
        .map(|id| order.iter().position(|n| n == id).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_void_elements_never_have_children() {
    let found = select("<br><span>x</span>", "br");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].child_count, 0);
    assert_eq!(found[0].html, "");
    assert_eq!(select("<br><span>x</span>", "body > span").len(), 1);
    assert_eq!(select("<br><span>x</span>", "br span").len(), 0);
}

#[test]
fn test_unclosed_paragraphs_become_siblings() {
    let page = "<div><p>a<p>b</div>";
    let found = select(page, "div > p");
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].outer_html, "<p>a</p>");
    assert_eq!(found[1].outer_html, "<p>b</p>");
    assert_eq!(select(page, "p p").len(), 0);
}

#[test]
fn test_select_first() {
    let first = select_first(LIST, "li").unwrap();
    assert_eq!(first.text, "A");
    assert_eq!(select_first(LIST, "table"), None);
    assert_eq!(try_select_first(LIST, "li:contains(B)").unwrap().unwrap().text, "B");
}

#[test]
fn test_parallel_calls() {
    let handles: Vec<_> = (0..8)
        .map(|i| {
            thread::spawn(move || {
                let page = format!(r#"<ul><li class="n">{i}</li><li>other</li></ul>"#);
                get_text(&page, "li.n")
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), i.to_string());
    }
}

#[test]
fn test_structural_pseudo_classes() {
    let page = "<ul><li>a</li><li>b</li></ul>";
    assert_eq!(get_text(page, "li:nth-child(2)"), "b");
    assert_eq!(get_text(page, "li:last-of-type"), "b");
    assert_eq!(get_text(page, "ul:has(li)"), "a b");
    assert_eq!(get_text(page, "ul:has(> p)"), "");
    assert_eq!(get_text(page, "li:gt(0)"), "b");
    assert_eq!(get_text(page, "li:matches(^[ab]$)"), "a b");
    assert!(try_get_text(page, "li:matches(()").is_err());
}

#[test]
fn test_deeply_nested_page() {
    let depth = 100_000;
    let page = format!("{}x", "<b>".repeat(depth));
    let first = select_first(&page, "b").unwrap();
    assert_eq!(first.text, "x");
    assert_eq!(first.child_count, 1);
    assert_eq!(first.outer_html.len(), depth * "<b></b>".len() + 1);
    assert_eq!(parse(&page).body, first.outer_html);
}
