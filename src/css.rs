// Copyright 2024 the Vgsvg Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The style sheet subset understood inside `<style>`.
//!
//! Rules are either `.name { decl; ... }` or `name { decl; ... }`. Selectors
//! are plain names; there are no combinators. One `@media (feature: N)`
//! block is recognized, whose body is not parsed as rules. Instead, every
//! rule whose name appears anywhere inside the block receives the block's
//! size range.

use smallvec::SmallVec;

use crate::lexer::{atof, is_space, trim};

/// `name: value` pairs of one declaration block.
pub(crate) type Declarations<'a> = SmallVec<[(&'a str, &'a str); 8]>;

/// A rule before it is folded into a [`StyleRule`](crate::style::StyleRule).
#[derive(Clone, Debug)]
pub(crate) struct Rule<'a> {
    pub(crate) name: &'a str,
    pub(crate) declarations: Declarations<'a>,
}

/// The size feature tested by a media block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MediaFeature {
    MinWidth,
    MaxWidth,
    MinHeight,
    MaxHeight,
}

/// A parsed `@media` block.
#[derive(Clone, Debug)]
pub(crate) struct MediaQuery<'a> {
    /// `None` when the feature name is not one of the four size features.
    pub(crate) feature: Option<MediaFeature>,
    pub(crate) value: f64,
    /// The whole block, from `@media` through the closing brace.
    pub(crate) block: &'a str,
}

impl MediaQuery<'_> {
    /// Does a rule called `name` fall under this block?
    pub(crate) fn mentions(&self, name: &str) -> bool {
        !name.is_empty() && self.block.contains(name)
    }
}

/// The result of scanning one `<style>` body.
#[derive(Clone, Debug, Default)]
pub(crate) struct StyleSheet<'a> {
    pub(crate) rules: Vec<Rule<'a>>,
    /// The last media block in the sheet, if any.
    pub(crate) media: Option<MediaQuery<'a>>,
}

fn skip_space(s: &str) -> &str {
    s.trim_start_matches(|c: char| c.is_ascii() && is_space(c as u8))
}

/// Scan a style sheet.
pub(crate) fn parse_stylesheet(s: &str) -> StyleSheet<'_> {
    let mut sheet = StyleSheet::default();
    let mut rest = skip_space(s);
    while !rest.is_empty() {
        if rest.starts_with("@media") {
            let len = balanced_block_len(rest);
            sheet.media = Some(parse_media(&rest[..len]));
            rest = &rest[len..];
        } else {
            let selector = rest.strip_prefix('.').unwrap_or(rest);
            let Some(open) = selector.find('{') else {
                break;
            };
            let body = &selector[open + 1..];
            let close = body.find('}').unwrap_or(body.len());
            let name = trim(&selector[..open]);
            let name = name.split(|c: char| c.is_ascii() && is_space(c as u8)).next().unwrap_or("");
            sheet.rules.push(Rule {
                name,
                declarations: parse_declarations(&body[..close]),
            });
            rest = body.get(close + 1..).unwrap_or("");
        }
        rest = skip_space(rest);
    }
    sheet
}

/// Split a declaration block into trimmed `name: value` pairs.
///
/// Pieces without a colon are dropped.
pub(crate) fn parse_declarations(s: &str) -> Declarations<'_> {
    s.split(';')
        .filter_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            let name = trim(name);
            (!name.is_empty()).then(|| (name, trim(value)))
        })
        .collect()
}

/// Length of `s` through the brace that closes its first `{`.
fn balanced_block_len(s: &str) -> usize {
    let Some(open) = s.find('{') else {
        return s.len();
    };
    let mut depth = 0_usize;
    for (i, b) in s.bytes().enumerate().skip(open) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
    }
    s.len()
}

fn parse_media(block: &str) -> MediaQuery<'_> {
    let mut query = MediaQuery {
        feature: None,
        value: 0.0,
        block,
    };
    let Some((_, condition)) = block.split_once('(') else {
        return query;
    };
    let condition = condition.split(')').next().unwrap_or("");
    let Some((feature, value)) = condition.split_once(':') else {
        return query;
    };
    query.feature = match trim(feature) {
        "min-width" => Some(MediaFeature::MinWidth),
        "max-width" => Some(MediaFeature::MaxWidth),
        "min-height" => Some(MediaFeature::MinHeight),
        "max-height" => Some(MediaFeature::MaxHeight),
        _ => None,
    };
    let value = skip_space(value);
    let digits = value
        .find(|c: char| !matches!(c, '-' | '.' | '/' | '0'..='9'))
        .unwrap_or(value.len());
    query.value = atof(&value[..digits]);
    query
}
