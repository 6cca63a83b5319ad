//! Minimal tag scanner/parser for the outer element stream.
//!
//! Two passes:
//! - `scan_element` works on raw bytes and only finds where a top-level element
//!   ends (balanced tags, quote-aware). It never allocates text, so a UTF-8
//!   character split between reads is just "incomplete".
//! - `parse_element` builds a small tree from one complete, UTF-8 validated
//!   element.

use crate::error::{NaimError, Result};

/// Result of scanning the front of a buffer for one top-level element.
#[derive(Debug, PartialEq, Eq)]
pub enum Scan {
    /// Element occupies `buf[..len]`.
    Complete(usize),
    /// More bytes are needed.
    Incomplete,
    /// Structurally broken; drop `buf[..skip]` and resume.
    Malformed { skip: usize, reason: String },
}

fn find(buf: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from > buf.len() {
        return None;
    }
    buf[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| from + p)
}

/// Index of the `>` closing the tag whose body starts at `from`, skipping quoted attribute values.
fn find_tag_end(buf: &[u8], from: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, &b) in buf.iter().enumerate().skip(from) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return Some(i),
            None => {}
        }
    }
    None
}

fn tag_name(body: &[u8]) -> &[u8] {
    let end = body
        .iter()
        .position(|b| b.is_ascii_whitespace() || *b == b'/' || *b == b'>')
        .unwrap_or(body.len());
    &body[..end]
}

/// Locate the end of the top-level element at the start of `buf`.
///
/// `buf` must start with `<` opening a regular start tag.
pub fn scan_element(buf: &[u8]) -> Scan {
    let mut stack: Vec<&[u8]> = Vec::new();
    let mut pos = 0usize;

    loop {
        let Some(start) = buf[pos..].iter().position(|&b| b == b'<').map(|p| pos + p) else {
            return Scan::Incomplete;
        };
        let rest = &buf[start..];

        if rest.starts_with(b"<!--") {
            match find(buf, start + 4, b"-->") {
                Some(end) => {
                    pos = end + 3;
                    continue;
                }
                None => return Scan::Incomplete,
            }
        }
        if rest.starts_with(b"<?") {
            match find(buf, start + 2, b"?>") {
                Some(end) => {
                    pos = end + 2;
                    continue;
                }
                None => return Scan::Incomplete,
            }
        }
        let Some(end) = find_tag_end(buf, start + 1) else {
            return Scan::Incomplete;
        };
        let body = &buf[start + 1..end];

        if let Some(close) = body.strip_prefix(b"/") {
            let name = close.trim_ascii();
            match stack.pop() {
                Some(open) if open == name => {}
                Some(open) => {
                    return Scan::Malformed {
                        skip: end + 1,
                        reason: format!(
                            "mismatched close tag </{}> for <{}>",
                            String::from_utf8_lossy(name),
                            String::from_utf8_lossy(open)
                        ),
                    }
                }
                None => {
                    return Scan::Malformed {
                        skip: end + 1,
                        reason: format!("stray close tag </{}>", String::from_utf8_lossy(name)),
                    }
                }
            }
            if stack.is_empty() {
                return Scan::Complete(end + 1);
            }
        } else {
            let name = tag_name(body);
            if name.is_empty() {
                return Scan::Malformed {
                    skip: end + 1,
                    reason: "empty tag name".into(),
                };
            }
            let self_closing = body.last() == Some(&b'/');
            if !self_closing {
                stack.push(name);
            } else if stack.is_empty() {
                return Scan::Complete(end + 1);
            }
        }
        pos = end + 1;
    }
}

/// One parsed element.
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Parse exactly one element from `src` (surrounding whitespace allowed).
pub fn parse_element(src: &str) -> Result<Element> {
    let mut p = Parser { src, pos: 0 };
    p.skip_ws();
    let el = p.element()?;
    p.skip_ws();
    if p.pos != src.len() {
        return Err(NaimError::Frame("trailing data after element".into()));
    }
    Ok(el)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn expect(&mut self, s: &str) -> Result<()> {
        if self.rest().starts_with(s) {
            self.pos += s.len();
            Ok(())
        } else {
            Err(NaimError::Frame(format!("expected `{s}` at offset {}", self.pos)))
        }
    }

    fn skip_past(&mut self, terminator: &str) -> Result<()> {
        match self.rest().find(terminator) {
            Some(i) => {
                self.pos += i + terminator.len();
                Ok(())
            }
            None => Err(NaimError::Frame(format!("unterminated `{terminator}`"))),
        }
    }

    fn name(&mut self) -> Result<&'a str> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| c.is_whitespace() || matches!(c, '/' | '>' | '='))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(NaimError::Frame(format!("expected a name at offset {}", self.pos)));
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    fn element(&mut self) -> Result<Element> {
        self.expect("<")?;
        let mut el = Element {
            name: self.name()?.to_string(),
            ..Element::default()
        };

        loop {
            self.skip_ws();
            if self.rest().starts_with("/>") {
                self.pos += 2;
                return Ok(el);
            }
            if self.rest().starts_with('>') {
                self.pos += 1;
                break;
            }
            let key = self.name()?.to_string();
            self.skip_ws();
            self.expect("=")?;
            self.skip_ws();
            let quote = match self.rest().chars().next() {
                Some(q @ ('"' | '\'')) => q,
                _ => return Err(NaimError::Frame(format!("attribute `{key}` is not quoted"))),
            };
            self.pos += 1;
            let Some(len) = self.rest().find(quote) else {
                return Err(NaimError::Frame(format!("attribute `{key}` is unterminated")));
            };
            let raw = &self.rest()[..len];
            self.pos += len + 1;
            el.attrs.push((key, unescape(raw)?));
        }

        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return Err(NaimError::Frame(format!("element <{}> is not closed", el.name)));
            }
            if rest.starts_with("</") {
                self.pos += 2;
                let close = self.name()?;
                if close != el.name {
                    return Err(NaimError::Frame(format!(
                        "mismatched close tag </{close}> for <{}>",
                        el.name
                    )));
                }
                self.skip_ws();
                self.expect(">")?;
                return Ok(el);
            }
            if rest.starts_with("<!--") {
                self.skip_past("-->")?;
            } else if rest.starts_with("<?") {
                self.skip_past("?>")?;
            } else if rest.starts_with('<') {
                let child = self.element()?;
                el.children.push(child);
            } else {
                let len = rest.find('<').unwrap_or(rest.len());
                el.text.push_str(&unescape(&rest[..len])?);
                self.pos += len;
            }
        }
    }
}

/// Decode the predefined entities and numeric character references.
pub fn unescape(raw: &str) -> Result<String> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let Some(semi) = after.find(';') else {
            return Err(NaimError::Decode("unterminated entity".into()));
        };
        let entity = &after[..semi];
        let ch = match entity {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32)
                    .ok_or_else(|| NaimError::Decode(format!("unknown entity &{entity};")))?
            }
        };
        out.push(ch);
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Escape a string for use inside a double-quoted attribute.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\r' => out.push_str("&#13;"),
            '\n' => out.push_str("&#10;"),
            c => out.push(c),
        }
    }
    out
}
