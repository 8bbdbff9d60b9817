use serde::Deserialize;

const HTML_TAGS: &[&str] = &[
    "a", "abbr", "address", "area", "article", "aside", "audio", "b", "base", "bdi", "bdo", "blockquote", "body",
    "br", "button", "canvas", "caption", "cite", "code", "col", "colgroup", "data", "datalist", "dd", "del", "dfn",
    "div", "dl", "dt", "em", "embed", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4",
    "h5", "h6", "head", "header", "hr", "html", "i", "iframe", "img", "input", "ins", "kbd", "keygen", "label",
    "legend", "li", "link", "main", "map", "mark", "meta", "meter", "nav", "noscript", "object", "ol", "optgroup",
    "option", "output", "p", "param", "pre", "progress", "q", "rb", "rp", "rt", "rtc", "ruby", "s", "samp",
    "script", "section", "select", "small", "source", "span", "strong", "style", "sub", "sup", "table", "tbody",
    "td", "template", "textarea", "tfoot", "th", "thead", "time", "title", "tr", "track", "u", "ul", "var",
    "video", "wbr",
];

/// Knobs of the markup dialect. Every field has a default, so `{}` is a valid config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkupConfig {
    /// Prefix of statement attributes, e.g. `wx:` in `wx:if`.
    pub namespace: String,
    /// Element whose body is a script module and is scanned verbatim.
    pub script_tag: String,
    /// Tags rendered as plain elements rather than looked up as components.
    pub native_tags: Vec<String>,
    pub collapse_whitespace: bool,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        MarkupConfig {
            namespace: "wx:".to_string(),
            script_tag: "wxs".to_string(),
            native_tags: HTML_TAGS.iter().map(|t| t.to_string()).collect(),
            collapse_whitespace: true,
        }
    }
}

impl MarkupConfig {
    /// Lower-cases the tag names, matching how the scanner reads tags. The namespace
    /// prefixes attribute names, which keep their case.
    pub fn normalized(mut self) -> Self {
        self.script_tag.make_ascii_lowercase();
        for tag in &mut self.native_tags {
            tag.make_ascii_lowercase();
        }
        self
    }

    pub fn is_native(&self, tag: &str) -> bool {
        self.native_tags.iter().any(|t| t == tag)
    }

    /// Strips the statement namespace, e.g. `wx:for-item` -> `for-item`.
    pub fn statement_name<'a>(&self, attr: &'a str) -> Option<&'a str> {
        attr.strip_prefix(self.namespace.as_str())
    }
}
