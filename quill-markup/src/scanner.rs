use crate::error::{MarkupError, Result, fragment};

/// An attribute as written. `value` is `None` for a bare attribute like `checked`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttr {
    pub name: String,
    pub value: Option<String>,
}

/// Why an element was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndKind {
    /// Its own end tag.
    Explicit,
    /// The end tag of an ancestor.
    Implicit,
    /// Still open when the input ran out.
    EndOfInput,
}

/// Receives scanner events in document order.
pub trait Handler {
    fn start(&mut self, tag: &str, attrs: Vec<RawAttr>, self_closing: bool) -> Result<()>;
    fn end(&mut self, tag: &str, kind: EndKind) -> Result<()>;
    fn text(&mut self, text: &str) -> Result<()>;
}

/// Tokenizes `markup`, feeding start/end/text events into `handler`.
///
/// The body of `raw_tag` is passed through as a single text event.
pub fn scan(markup: &str, raw_tag: &str, handler: &mut impl Handler) -> Result<()> {
    let mut scanner = Scanner {
        src: markup,
        pos: 0,
        stack: Vec::new(),
        raw_tag: raw_tag.to_ascii_lowercase(),
    };
    scanner.run(handler)
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    stack: Vec<String>,
    raw_tag: String,
}

impl Scanner<'_> {
    fn run(&mut self, handler: &mut impl Handler) -> Result<()> {
        while self.pos < self.src.len() {
            let before = self.pos;
            let src = self.src;
            let rest = &src[self.pos..];

            if self.stack.last() == Some(&self.raw_tag) {
                self.raw_body(handler)?;
            } else {
                let mut is_text = true;
                if rest.starts_with("<!--") {
                    if let Some(end) = rest.find("-->") {
                        self.pos += end + 3;
                        is_text = false;
                    }
                } else if rest.starts_with("</") {
                    if let Some((tag, used)) = end_tag(rest) {
                        self.pos += used;
                        self.close(&tag, handler)?;
                        is_text = false;
                    }
                } else if rest.starts_with('<') {
                    if let Some((tag, attrs, self_closing, used)) = start_tag(rest) {
                        self.pos += used;
                        if !self_closing {
                            self.stack.push(tag.clone());
                        }
                        handler.start(&tag, attrs, self_closing)?;
                        is_text = false;
                    }
                }

                if is_text {
                    let len = rest.find('<').unwrap_or(rest.len());
                    if len > 0 {
                        handler.text(&rest[..len])?;
                    }
                    self.pos += len;
                }
            }

            if self.pos == before {
                return Err(MarkupError::Scan {
                    offset: self.pos,
                    fragment: fragment(&self.src[self.pos..]),
                });
            }
        }

        while let Some(tag) = self.stack.pop() {
            handler.end(&tag, EndKind::EndOfInput)?;
        }
        Ok(())
    }

    /// Emits everything up to the matching end tag verbatim.
    fn raw_body(&mut self, handler: &mut impl Handler) -> Result<()> {
        let src = self.src;
        let rest = &src[self.pos..];
        let needle = format!("</{}", self.raw_tag);
        let lowered = rest.to_ascii_lowercase();
        let mut from = 0;
        while let Some(found) = lowered[from..].find(&needle) {
            let at = from + found;
            if let Some((tag, used)) = end_tag(&rest[at..]) {
                if tag == self.raw_tag {
                    if at > 0 {
                        handler.text(&rest[..at])?;
                    }
                    self.pos += at + used;
                    return self.close(&tag, handler);
                }
            }
            from = at + needle.len();
        }
        if !rest.is_empty() {
            handler.text(rest)?;
        }
        self.pos = self.src.len();
        Ok(())
    }

    /// Closes `tag` and everything opened after it. Unknown end tags are ignored.
    fn close(&mut self, tag: &str, handler: &mut impl Handler) -> Result<()> {
        let Some(at) = self.stack.iter().rposition(|open| open == tag) else {
            tracing::trace!(tag, "ignoring end tag without matching start");
            return Ok(());
        };
        while self.stack.len() > at + 1 {
            if let Some(inner) = self.stack.pop() {
                handler.end(&inner, EndKind::Implicit)?;
            }
        }
        self.stack.truncate(at);
        handler.end(tag, EndKind::Explicit)
    }
}

fn is_tag_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

fn is_attr_char(b: u8) -> bool {
    is_tag_char(b) || b == b':'
}

fn skip_ws(bytes: &[u8], i: &mut usize) -> usize {
    let start = *i;
    while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
        *i += 1;
    }
    *i - start
}

fn read_while(bytes: &[u8], i: &mut usize, pred: fn(u8) -> bool) -> usize {
    let start = *i;
    while *i < bytes.len() && pred(bytes[*i]) {
        *i += 1;
    }
    *i - start
}

/// `</name ...>` -> (lower-cased name, bytes consumed)
fn end_tag(rest: &str) -> Option<(String, usize)> {
    let bytes = rest.as_bytes();
    let mut i = 2;
    let name_start = i;
    if read_while(bytes, &mut i, is_tag_char) == 0 {
        return None;
    }
    let name = rest[name_start..i].to_ascii_lowercase();
    let close = rest[i..].find('>')?;
    Some((name, i + close + 1))
}

/// `<name attr="v" ... /?>` -> (lower-cased name, attributes, self-closing, bytes consumed)
fn start_tag(rest: &str) -> Option<(String, Vec<RawAttr>, bool, usize)> {
    let bytes = rest.as_bytes();
    let mut i = 1;
    if read_while(bytes, &mut i, is_tag_char) == 0 {
        return None;
    }
    let name = rest[1..i].to_ascii_lowercase();
    let mut attrs = Vec::new();

    loop {
        let ws = skip_ws(bytes, &mut i);
        match bytes.get(i)? {
            b'>' => return Some((name, attrs, false, i + 1)),
            b'/' => {
                return (bytes.get(i + 1) == Some(&b'>')).then(|| (name, attrs, true, i + 2));
            }
            _ if ws == 0 => return None,
            _ => attrs.push(attribute(rest, &mut i)?),
        }
    }
}

fn attribute(rest: &str, i: &mut usize) -> Option<RawAttr> {
    let bytes = rest.as_bytes();
    let name_start = *i;
    if read_while(bytes, i, is_attr_char) == 0 {
        return None;
    }
    let name = rest[name_start..*i].to_string();

    let mut j = *i;
    skip_ws(bytes, &mut j);
    if bytes.get(j) != Some(&b'=') {
        return Some(RawAttr { name, value: None });
    }
    j += 1;
    skip_ws(bytes, &mut j);
    let value = match bytes.get(j)? {
        b'"' | b'\'' => {
            let quote = bytes[j];
            let start = j + 1;
            let mut k = start;
            loop {
                match bytes.get(k)? {
                    b'\\' => k += 2,
                    b if *b == quote => break,
                    _ => k += 1,
                }
            }
            j = k + 1;
            rest.get(start..k)?.to_string()
        }
        _ => {
            let start = j;
            if read_while(bytes, &mut j, |b| b != b'>' && !b.is_ascii_whitespace()) == 0 {
                return None;
            }
            rest[start..j].to_string()
        }
    };
    *i = j;
    Some(RawAttr {
        name,
        value: Some(value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_tag_forms() {
        let (name, attrs, unary, used) = start_tag("<Input id=\"b\" type='checkbox' checked/>rest").unwrap();
        assert_eq!(name, "input");
        assert!(unary);
        assert_eq!(used, "<Input id=\"b\" type='checkbox' checked/>".len());
        assert_eq!(
            attrs,
            vec![
                RawAttr {
                    name: "id".into(),
                    value: Some("b".into())
                },
                RawAttr {
                    name: "type".into(),
                    value: Some("checkbox".into())
                },
                RawAttr {
                    name: "checked".into(),
                    value: None
                },
            ]
        );
    }

    #[test]
    fn unquoted_and_escaped_values() {
        let (_, attrs, unary, _) = start_tag(r#"<a href=x.html title="say \"hi\"">"#).unwrap();
        assert!(!unary);
        assert_eq!(attrs[0].value.as_deref(), Some("x.html"));
        assert_eq!(attrs[1].value.as_deref(), Some(r#"say \"hi\""#));
    }

    #[test]
    fn malformed_tags_do_not_match() {
        assert!(start_tag("< div>").is_none());
        assert!(start_tag("<div").is_none());
        assert!(start_tag("<div a=\"x>").is_none());
        assert!(start_tag("<div a=\"x\"b>").is_none());
        assert!(end_tag("</>").is_none());
        assert_eq!(end_tag("</DIV >"), Some(("div".to_string(), 7)));
    }
}
