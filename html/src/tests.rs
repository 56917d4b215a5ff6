use super::*;

fn find(doc: &Document, name: &str) -> NodeId {
    doc.subtree(doc.root())
        .find(|&id| doc.tag_name(id) == Some(name))
        .unwrap()
}

#[test]
fn test_document() {
    let i = r#"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8"/>
        <title>The minimal, valid HTML5 document</title>
    </head>
    <body>
        <!-- User-visible content goes in the body -->
        <p>Some paragraph</p>
        Some untagged text
    </body>
</html>"#;
    let doc = document(i);
    let html = doc.document_element().unwrap();
    assert_eq!(doc.element(html).unwrap().attributes, attributes!(lang => "en"));

    let head = doc.head().unwrap();
    let names: Vec<_> = doc
        .element_children(head)
        .filter_map(|id| doc.tag_name(id))
        .collect();
    assert_eq!(names, vec!["meta", "title"]);
    let meta = find(&doc, "meta");
    assert_eq!(
        doc.element(meta).unwrap().attributes,
        attributes!(charset => "utf-8")
    );
    assert_eq!(doc.title(), "The minimal, valid HTML5 document");

    let body = doc.body().unwrap();
    assert_eq!(doc.text(body), "Some paragraph Some untagged text");
    assert!(doc.children(body).iter().any(|&id| matches!(
        &doc.node(id).node_type,
        DOMNodeType::Comment(c) if c == " User-visible content goes in the body "
    )));
    assert_eq!(doc.element_children(body).count(), 1);
}

#[test]
fn test_single_html_head_body() {
    for input in [
        "",
        "text",
        "<html><html><body><body>",
        "<head><title>a</title></head><head></head>",
        "</body></html><p>x",
    ] {
        let doc = document(input);
        let html = doc.document_element().unwrap();
        assert_eq!(doc.element_children(doc.root()).count(), 1, "{input:?}");
        let names: Vec<_> = doc
            .element_children(html)
            .filter_map(|id| doc.tag_name(id))
            .collect();
        assert_eq!(names, vec!["head", "body"], "{input:?}");
    }
}

#[test]
fn test_void_elements_have_no_children() {
    let doc = document("<br>a<img>b</img><input><span>c</span></input><hr/>d");
    for id in doc.subtree(doc.root()) {
        if doc.tag_name(id).map_or(false, is_void_element) {
            assert!(doc.children(id).is_empty());
        }
    }
    // Only <br> and block elements separate words
    assert_eq!(doc.text(doc.body().unwrap()), "abc d");
}

#[test]
fn test_every_child_points_back_to_its_parent() {
    let doc = document("<div><p>a<ul><li>1<li>2</ul><table><tr><td>x</table></div>tail");
    for id in doc.subtree(doc.root()) {
        for &child in doc.children(id) {
            assert_eq!(doc.parent(child), Some(id));
        }
    }
}

#[test]
fn test_reparsing_serialized_markup_is_stable() {
    for input in [
        "<p>a<p>b<ul><li>x<li>y</ul>",
        "<table><tr><td>1<td>2</table>",
        "<a href='x'>t &amp; <b>u</a>v",
        "<div><span>unclosed",
        "<title>x &lt; y</title><script>a<b</script>",
    ] {
        let first = document(input);
        let markup = first.outer_html(first.root());
        let second = document(&markup);
        assert_eq!(second.outer_html(second.root()), markup, "{input:?}");
    }
}

#[test]
fn test_tokenizer_is_public() {
    let tokens: Vec<Token> = Tokenizer::new("<b>x</b>").collect();
    assert_eq!(tokens.len(), 3);
    assert!(matches!(&tokens[1], Token::Text(t) if t == "x"));
}
