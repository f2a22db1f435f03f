//! Tolerant extraction of JSON values and fenced code blocks from model text
//!
//! Models wrap structured output in prose and markdown fences more often than
//! not. These helpers find the payload without assuming any particular layout.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

/// A fenced block: optional language tag on the opening line, body up to the
/// next closing fence.
static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[ \t]*([A-Za-z0-9_+.#-]*)[^\n]*\n(.*?)```")
        .expect("fenced block pattern is valid")
});

struct Fence<'a> {
    language: &'a str,
    body: &'a str,
}

fn fences(text: &str) -> impl Iterator<Item = Fence<'_>> {
    FENCED_BLOCK.captures_iter(text).filter_map(|caps| {
        Some(Fence {
            language: caps.get(1)?.as_str(),
            body: caps.get(2)?.as_str(),
        })
    })
}

/// Parse the first JSON value in `text` that deserializes as `T`.
///
/// Search order: fenced blocks tagged `json`, then other fenced blocks, then
/// every balanced `{...}` / `[...]` span of the raw text from left to right.
/// Returns `None` when nothing matches.
#[must_use]
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Option<T> {
    let (tagged, untagged): (Vec<Fence<'_>>, Vec<Fence<'_>>) =
        fences(text).partition(|f| f.language.eq_ignore_ascii_case("json"));

    tagged
        .iter()
        .chain(untagged.iter())
        .find_map(|fence| first_balanced_json(fence.body))
        .or_else(|| first_balanced_json(text))
}

fn first_balanced_json<T: DeserializeOwned>(text: &str) -> Option<T> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }
    text.char_indices()
        .filter(|(_, c)| *c == '{' || *c == '[')
        .filter_map(|(start, _)| balanced_end(&text[start..]).map(|len| &text[start..start + len]))
        .find_map(|candidate| serde_json::from_str(candidate).ok())
}

/// Byte length of the balanced bracket span starting at `text[0]`, skipping
/// brackets inside string literals.
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

/// Extract a code block from model output.
///
/// With a `language`, a fence tagged with that language wins; otherwise (or
/// if none is tagged) the first fenced block is used; with no fences at all
/// the trimmed raw text is returned. `None` only for blank input.
#[must_use]
pub fn extract_code_block(text: &str, language: Option<&str>) -> Option<String> {
    let all: Vec<Fence<'_>> = fences(text).collect();

    let tagged = language.and_then(|lang| {
        all.iter()
            .find(|f| f.language.eq_ignore_ascii_case(lang))
    });

    if let Some(fence) = tagged.or_else(|| all.first()) {
        return Some(fence.body.trim_end().to_string());
    }

    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Language tag of the first fenced block, if it has one.
#[must_use]
pub fn first_fence_language(text: &str) -> Option<String> {
    fences(text)
        .next()
        .map(|f| f.language.to_ascii_lowercase())
        .filter(|lang| !lang.is_empty())
}
