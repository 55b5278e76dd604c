use std::collections::BTreeMap;

use bot_core::{MarkupParser, Token};

const SEGMENT_OPEN: &str = "[CQ:";

/// Splits CQ-coded messages such as `hi [CQ:at,qq=123]` into tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct CqCodeParser;

impl MarkupParser for CqCodeParser {
    fn parse(&self, raw: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut rest = raw;
        while let Some(start) = rest.find(SEGMENT_OPEN) {
            push_text(&mut tokens, &rest[..start]);
            let candidate = &rest[start..];
            let parsed = candidate
                .find(']')
                .and_then(|end| parse_segment(&candidate[SEGMENT_OPEN.len()..end]).map(|t| (t, end)));
            if let Some((token, end)) = parsed {
                tokens.push(token);
                rest = &candidate[end + 1..];
            } else {
                push_text(&mut tokens, SEGMENT_OPEN);
                rest = &candidate[SEGMENT_OPEN.len()..];
            }
        }
        push_text(&mut tokens, rest);
        tokens
    }

    fn escape(&self, text: &str) -> String {
        escape(text)
    }
}

/// `type,key=value,...` without the surrounding brackets.
fn parse_segment(body: &str) -> Option<Token> {
    if body.contains('[') {
        return None;
    }
    let mut parts = body.split(',');
    let kind = parts.next()?;
    if kind.is_empty() || !kind.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    let mut data = BTreeMap::new();
    for part in parts {
        let (key, value) = part.split_once('=')?;
        data.insert(key.to_owned(), unescape(value));
    }
    Some(Token {
        kind: kind.to_owned(),
        data,
    })
}

/// Appends text, merging with a preceding text token.
fn push_text(tokens: &mut Vec<Token>, raw: &str) {
    if raw.is_empty() {
        return;
    }
    let text = unescape(raw);
    if let Some(last) = tokens.last_mut()
        && last.kind == "text"
        && let Some(existing) = last.data.get_mut("text")
    {
        existing.push_str(&text);
        return;
    }
    tokens.push(Token::text(text));
}

fn unescape(s: &str) -> String {
    s.replace("&#91;", "[")
        .replace("&#93;", "]")
        .replace("&#44;", ",")
        .replace("&amp;", "&")
}

/// Escapes text so the gateway sends it literally.
fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('[', "&#91;")
        .replace(']', "&#93;")
        .replace(',', "&#44;")
}
