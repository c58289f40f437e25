// Copyright 2024 the Vgsvg Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A minimal markup scanner.
//!
//! This is not a general XML parser. It splits the input into tags and text
//! runs and reads `name="value"` attribute pairs. Comments, processing
//! instructions and doctype declarations are skipped. There is no entity
//! expansion and no well-formedness checking: unbalanced input simply
//! produces whatever tags it contains.

use smallvec::SmallVec;

use crate::lexer::{is_space, trim};

/// Attribute pairs beyond this many on one tag are dropped.
pub(crate) const MAX_ATTRIBUTES: usize = 126;

/// The attribute pairs of one tag, in document order.
pub(crate) type Attributes<'a> = SmallVec<[(&'a str, &'a str); 8]>;

/// A tag read from the markup.
#[derive(Clone, Debug, Default)]
pub(crate) struct Tag<'a> {
    pub(crate) name: &'a str,
    pub(crate) attrs: Attributes<'a>,
    /// This is a start tag or an empty-element tag.
    pub(crate) opens: bool,
    /// This is an end tag or an empty-element tag.
    pub(crate) closes: bool,
    /// Byte offset of the `<`.
    pub(crate) start: usize,
    /// Byte offset just past the `>`.
    pub(crate) end: usize,
}

impl<'a> Tag<'a> {
    /// The value of the first attribute called `name`.
    pub(crate) fn attr(&self, name: &str) -> Option<&'a str> {
        self.attrs.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }
}

/// One step of the scan.
#[derive(Clone, Debug)]
pub(crate) enum Event<'a> {
    Tag(Tag<'a>),
    /// A text run with its leading whitespace removed. Never empty.
    Text(&'a str),
}

/// Scanner state over a borrowed document.
#[derive(Clone, Debug)]
pub(crate) struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(input: &'a str) -> Scanner<'a> {
        Scanner { input, pos: 0 }
    }

    /// The whole document.
    pub(crate) fn input(&self) -> &'a str {
        self.input
    }

    /// Resume scanning at byte offset `pos`.
    ///
    /// Used to step over content that was captured verbatim.
    pub(crate) fn skip_to(&mut self, pos: usize) {
        self.pos = pos.clamp(self.pos, self.input.len());
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Event<'a>;

    fn next(&mut self) -> Option<Event<'a>> {
        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return None;
            }
            if !rest.starts_with('<') {
                // Text up to the next tag.
                let len = rest.find('<').unwrap_or(rest.len());
                self.pos += len;
                let text =
                    rest[..len].trim_start_matches(|c: char| c.is_ascii() && is_space(c as u8));
                if text.is_empty() {
                    continue;
                }
                return Some(Event::Text(text));
            }
            if let Some(body) = rest.strip_prefix("<!--") {
                self.pos += body.find("-->").map_or(rest.len(), |i| i + 4 + 3);
                continue;
            }
            if let Some(body) = rest.strip_prefix("<![CDATA[") {
                let len = body.find("]]>").unwrap_or(body.len());
                self.pos += (9 + len + 3).min(rest.len());
                let text = trim(&body[..len]);
                if text.is_empty() {
                    continue;
                }
                return Some(Event::Text(text));
            }
            let start = self.pos;
            let len = rest.find('>').map_or(rest.len(), |i| i + 1);
            self.pos += len;
            let inner = rest[1..len].strip_suffix('>').unwrap_or(&rest[1..len]);
            if let Some(mut tag) = parse_tag(inner) {
                tag.start = start;
                tag.end = self.pos;
                return Some(Event::Tag(tag));
            }
        }
    }
}

/// Parse the text between `<` and `>`.
///
/// Returns `None` for declarations and processing instructions.
pub(crate) fn parse_tag(s: &str) -> Option<Tag<'_>> {
    let mut s = s.trim_start_matches(|c: char| c.is_ascii() && is_space(c as u8));
    let mut tag = Tag::default();
    match s.as_bytes().first() {
        None | Some(b'?' | b'!') => return None,
        Some(b'/') => {
            tag.closes = true;
            s = &s[1..];
        }
        Some(_) => tag.opens = true,
    }
    let name_len = s
        .find(|c: char| c == '/' || (c.is_ascii() && is_space(c as u8)))
        .unwrap_or(s.len());
    tag.name = &s[..name_len];
    s = &s[name_len..];

    while tag.opens && !tag.closes && tag.attrs.len() < MAX_ATTRIBUTES {
        s = s.trim_start_matches(|c: char| c.is_ascii() && is_space(c as u8));
        if s.is_empty() {
            break;
        }
        if s.starts_with('/') {
            tag.closes = true;
            break;
        }
        let name_len = s
            .find(|c: char| c == '=' || (c.is_ascii() && is_space(c as u8)))
            .unwrap_or(s.len());
        let name = &s[..name_len];
        s = &s[name_len..];
        let Some(q) = s.find(['"', '\'']) else {
            break;
        };
        let quote = s.as_bytes()[q] as char;
        s = &s[q + 1..];
        let value_len = s.find(quote).unwrap_or(s.len());
        tag.attrs.push((name, &s[..value_len]));
        s = s.get(value_len + 1..).unwrap_or("");
    }
    Some(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(input: &str) -> Vec<(String, bool, bool)> {
        Scanner::new(input)
            .filter_map(|ev| match ev {
                Event::Tag(t) => Some((t.name.to_string(), t.opens, t.closes)),
                Event::Text(_) => None,
            })
            .collect()
    }

    #[test]
    fn start_end_and_empty_tags() {
        let got = tags("<svg><g><rect/></g><circle r='1' /></svg>");
        let want = [
            ("svg", true, false),
            ("g", true, false),
            ("rect", true, true),
            ("g", false, true),
            ("circle", true, true),
            ("svg", false, true),
        ];
        let want: Vec<_> = want.iter().map(|(n, o, c)| (n.to_string(), *o, *c)).collect();
        assert_eq!(got, want);
    }

    #[test]
    fn attributes() {
        let Some(Event::Tag(tag)) = Scanner::new(r#"<rect x="1" y='2'  fill = "red"/>"#).next() else {
            panic!("expected a tag");
        };
        assert_eq!(tag.name, "rect");
        assert_eq!(tag.attrs.as_slice(), &[("x", "1"), ("y", "2"), ("fill", "red")]);
        assert_eq!(tag.attr("y"), Some("2"));
        assert_eq!(tag.attr("z"), None);
        assert!(tag.closes, "empty-element tag");
    }

    #[test]
    fn skips_comments_and_declarations() {
        let got = tags("<?xml version='1.0'?><!DOCTYPE svg><!-- <rect/> --><svg/>");
        assert_eq!(got, vec![("svg".to_string(), true, true)]);
    }

    #[test]
    fn text_runs_are_left_trimmed() {
        let events: Vec<_> = Scanner::new("<text>  Hello world </text>")
            .filter_map(|ev| match ev {
                Event::Text(t) => Some(t),
                Event::Tag(_) => None,
            })
            .collect();
        assert_eq!(events, vec!["Hello world "]);
    }

    #[test]
    fn cdata_is_text() {
        let events: Vec<_> = Scanner::new("<style><![CDATA[ .a{fill:red} ]]></style>")
            .filter_map(|ev| match ev {
                Event::Text(t) => Some(t),
                Event::Tag(_) => None,
            })
            .collect();
        assert_eq!(events, vec![".a{fill:red}"]);
    }

    #[test]
    fn attribute_bound() {
        let mut doc = String::from("<g");
        for i in 0..200 {
            doc.push_str(&format!(" a{i}=\"{i}\""));
        }
        doc.push('>');
        let Some(Event::Tag(tag)) = Scanner::new(&doc).next() else {
            panic!("expected a tag");
        };
        assert_eq!(tag.attrs.len(), MAX_ATTRIBUTES);
    }

    #[test]
    fn offsets_allow_skipping() {
        let doc = "<symbol id='s'><rect/></symbol><circle/>";
        let mut scanner = Scanner::new(doc);
        let Some(Event::Tag(tag)) = scanner.next() else {
            panic!("expected a tag");
        };
        assert_eq!(&doc[tag.start..tag.end], "<symbol id='s'>");
        let close = doc.find("</symbol>").unwrap() + "</symbol>".len();
        scanner.skip_to(close);
        let Some(Event::Tag(next)) = scanner.next() else {
            panic!("expected a tag");
        };
        assert_eq!(next.name, "circle");
    }

    #[test]
    fn unterminated_input() {
        assert_eq!(tags("<svg><rect x='1"), vec![
            ("svg".to_string(), true, false),
            ("rect".to_string(), true, false),
        ]);
    }
}
