//! Element categories used by the tokenizer, tree builder and serializer

/// Elements that can never have children and are never closed
static VOID: &[&str] = &[
    "area", "base", "basefont", "bgsound", "br", "col", "embed", "frame", "hr", "img", "input",
    "keygen", "link", "meta", "param", "source", "track", "wbr",
];

/// Elements whose content is taken verbatim up to the matching close tag
static RAW_TEXT: &[&str] = &["script", "style"];

/// Like [`RAW_TEXT`], but character references are still decoded
static ESCAPABLE_RAW_TEXT: &[&str] = &["title", "textarea"];

/// Elements that belong in `<head>` when they appear before any body content
static HEAD_CONTENT: &[&str] = &[
    "base", "link", "meta", "noscript", "script", "style", "template", "title",
];

/// Start tags that implicitly close an open `<p>`
static CLOSES_P: &[&str] = &[
    "address", "article", "aside", "blockquote", "center", "dd", "details", "dialog", "dir",
    "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3",
    "h4", "h5", "h6", "header", "hgroup", "hr", "li", "main", "menu", "nav", "ol", "p", "pre",
    "section", "summary", "table", "ul",
];

static HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

// Elements that separate words when extracting text
static BLOCK: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "caption", "center", "col", "colgroup",
    "dd", "details", "dialog", "dir", "div", "dl", "dt", "fieldset", "figcaption", "figure",
    "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "head", "header", "hgroup", "hr",
    "html", "legend", "li", "main", "menu", "nav", "ol", "optgroup", "option", "p", "pre",
    "section", "summary", "table", "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

// Taken from https://html.spec.whatwg.org/multipage/parsing.html#special
static SPECIAL: &[&str] = &[
    "address", "applet", "area", "article", "aside", "base", "basefont", "bgsound",
    "blockquote", "body", "br", "button", "caption", "center", "col", "colgroup", "dd",
    "details", "dir", "div", "dl", "dt", "embed", "fieldset", "figcaption", "figure", "footer",
    "form", "frame", "frameset", "h1", "h2", "h3", "h4", "h5", "h6", "head", "header", "hgroup",
    "hr", "html", "iframe", "img", "input", "keygen", "li", "link", "listing", "main",
    "marquee", "menu", "meta", "nav", "noembed", "noframes", "noscript", "object", "ol", "p",
    "param", "plaintext", "pre", "script", "section", "select", "source", "style", "summary",
    "table", "tbody", "td", "template", "textarea", "tfoot", "th", "thead", "title", "tr",
    "track", "ul", "wbr", "xmp",
];

/// Elements that bound the "in scope" search of the open element stack
pub(crate) static SCOPE_BOUNDARY: &[&str] = &[
    "applet", "caption", "html", "table", "td", "th", "marquee", "object", "template",
];

pub fn is_void_element(name: &str) -> bool {
    VOID.contains(&name)
}

pub fn is_raw_text_element(name: &str) -> bool {
    RAW_TEXT.contains(&name)
}

pub fn is_escapable_raw_text_element(name: &str) -> bool {
    ESCAPABLE_RAW_TEXT.contains(&name)
}

pub fn is_block_element(name: &str) -> bool {
    BLOCK.contains(&name)
}

pub(crate) fn is_head_content(name: &str) -> bool {
    HEAD_CONTENT.contains(&name)
}

pub(crate) fn closes_p(name: &str) -> bool {
    CLOSES_P.contains(&name)
}

pub(crate) fn is_heading(name: &str) -> bool {
    HEADINGS.contains(&name)
}

pub(crate) fn is_special(name: &str) -> bool {
    SPECIAL.contains(&name)
}

#[cfg(test)]
#[test]
fn test_categories() {
    assert!(is_void_element("br"));
    assert!(is_void_element("img"));
    assert!(!is_void_element("div"));
    assert!(is_raw_text_element("script"));
    assert!(!is_raw_text_element("title"));
    assert!(is_escapable_raw_text_element("title"));
    assert!(closes_p("ul"));
    assert!(!closes_p("span"));
    assert!(is_block_element("li"));
    assert!(!is_block_element("a"));
}
