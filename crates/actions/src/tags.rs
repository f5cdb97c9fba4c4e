//! Tag extraction: tolerant parsing of the XML-like markup models emit.
//!
//! Model output is not XML. Tags carry no attributes, content is free text
//! (code, diffs, prose), and the model regularly forgets a closing tag or
//! drops the brackets entirely. Everything here works on plain string
//! matching and never fails hard: absent data is `None` or an empty `Vec`.

use regex_lite::Regex;

/// A balanced `<name>…</name>` element found by [`top_level_tags`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSpan {
    pub name: String,
    /// Raw text between the opening and closing tag, untrimmed
    pub inner: String,
    /// Byte offset of the opening `<`
    pub start: usize,
    /// Byte offset just past the closing `>`
    pub end: usize,
}

/// A structural problem found by [`validate_structure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureIssue {
    /// The registered action name the problem concerns
    pub tag: String,
    pub message: String,
}

impl std::fmt::Display for StructureIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

fn tag_regex(tag: &str) -> Option<Regex> {
    let escaped = regex_lite::escape(tag);
    Regex::new(&format!(r"(?s)<{escaped}>(.*?)</{escaped}>")).ok()
}

/// Trimmed inner text of the first `<tag>…</tag>`, or `None`.
pub fn extract_tag(text: &str, tag: &str) -> Option<String> {
    let re = tag_regex(tag)?;
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Trimmed inner text of every `<tag>…</tag>`, in document order.
pub fn extract_all(text: &str, tag: &str) -> Vec<String> {
    let Some(re) = tag_regex(tag) else {
        return Vec::new();
    };
    re.captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

/// The first `<tag>` block split into trimmed, non-blank lines.
pub fn extract_lines(text: &str, tag: &str) -> Vec<String> {
    extract_tag(text, tag)
        .map(|content| split_lines(&content))
        .unwrap_or_default()
}

/// Trimmed, non-blank lines of `content`.
pub fn split_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

/// Every `<child>` inside the first `<parent>` block.
///
/// The parent block is found with same-name nesting counted, so children
/// of a later sibling parent are never picked up.
pub fn extract_nested(text: &str, parent: &str, child: &str) -> Vec<String> {
    find_block(text, parent)
        .map(|inner| extract_all(inner, child))
        .unwrap_or_default()
}

/// Balanced top-level elements in document order.
///
/// An opening tag with no matching close is skipped and scanning resumes
/// just after it, so a stray `<foo>` cannot swallow the rest of the text.
pub fn top_level_tags(text: &str) -> Vec<TagSpan> {
    let mut spans = Vec::new();
    let mut pos = 0;

    while let Some(offset) = text[pos..].find('<') {
        let at = pos + offset;
        if let Some(tag) = parse_tag_at(text, at)
            && !tag.closing
            && let Some((close_start, close_end)) = find_close(text, tag.name, tag.end)
        {
            spans.push(TagSpan {
                name: tag.name.to_string(),
                inner: text[tag.end..close_start].to_string(),
                start: at,
                end: close_end,
            });
            pos = close_end;
        } else {
            pos = at + 1;
        }
    }

    spans
}

/// Check the gross shape of `text` against the registered action names.
///
/// Only text outside balanced registered elements is inspected, so a
/// `<write_file>` whose content mentions `<end_task>` is not flagged.
/// Unbalanced tags for any registered name are reported first. If no
/// registered name appears as a tag pair, a bare mention of one is reported
/// as missing its tag structure. Otherwise the text is accepted.
pub fn validate_structure(text: &str, action_names: &[&str]) -> Result<(), StructureIssue> {
    let mut outside = String::with_capacity(text.len());
    let any_pair = strip_registered(text, action_names, &mut outside);

    for name in action_names {
        let opens = outside.matches(&format!("<{name}>")).count();
        let closes = outside.matches(&format!("</{name}>")).count();

        if opens > closes {
            return Err(StructureIssue {
                tag: name.to_string(),
                message: format!(
                    "Found opening tag <{name}> without a matching closing tag </{name}>"
                ),
            });
        }
        if closes > opens {
            return Err(StructureIssue {
                tag: name.to_string(),
                message: format!(
                    "Found closing tag </{name}> without a matching opening tag <{name}>"
                ),
            });
        }
    }

    if any_pair {
        return Ok(());
    }

    for name in action_names {
        if let Some(fragment) = bare_mention(&outside, name) {
            return Err(StructureIssue {
                tag: name.to_string(),
                message: format!(
                    "Found bare action name '{name}' in \"{fragment}\" without proper XML tag structure"
                ),
            });
        }
    }

    Ok(())
}

/// Copy `text` into `out` with every balanced registered element replaced
/// by a space. Unregistered wrappers are kept and their content descended.
/// Returns whether any registered element was found.
fn strip_registered(text: &str, action_names: &[&str], out: &mut String) -> bool {
    let mut found = false;
    let mut pos = 0;

    for span in top_level_tags(text) {
        out.push_str(&text[pos..span.start]);
        if action_names.contains(&span.name.as_str()) {
            out.push(' ');
            found = true;
        } else {
            // `<name>` is the only opening form parse_tag_at accepts
            let inner_start = span.start + span.name.len() + 2;
            let inner_end = inner_start + span.inner.len();
            out.push_str(&text[span.start..inner_start]);
            found |= strip_registered(&span.inner, action_names, out);
            out.push_str(&text[inner_end..span.end]);
        }
        pos = span.end;
    }

    out.push_str(&text[pos..]);
    found
}

/// The line containing a word-bounded mention of `name`, shortened.
fn bare_mention(text: &str, name: &str) -> Option<String> {
    let re = Regex::new(&format!(r"\b{}\b", regex_lite::escape(name))).ok()?;
    let m = re.find(text)?;
    let line_start = text[..m.start()].rfind('\n').map_or(0, |i| i + 1);
    let line_end = text[m.end()..].find('\n').map_or(text.len(), |i| m.end() + i);
    let line = text[line_start..line_end].trim();

    const MAX_FRAGMENT: usize = 80;
    if line.chars().count() > MAX_FRAGMENT {
        let short: String = line.chars().take(MAX_FRAGMENT).collect();
        Some(format!("{short}..."))
    } else {
        Some(line.to_string())
    }
}

struct RawTag<'a> {
    name: &'a str,
    closing: bool,
    /// Byte offset just past `>`
    end: usize,
}

/// Parse `<name>` or `</name>` starting at byte `at`.
fn parse_tag_at(text: &str, at: usize) -> Option<RawTag<'_>> {
    let bytes = text.as_bytes();
    let mut i = at + 1;
    let closing = bytes.get(i) == Some(&b'/');
    if closing {
        i += 1;
    }

    let name_start = i;
    match bytes.get(i) {
        Some(b) if b.is_ascii_alphabetic() || *b == b'_' => i += 1,
        _ => return None,
    }
    while let Some(b) = bytes.get(i) {
        if b.is_ascii_alphanumeric() || *b == b'_' || *b == b'-' {
            i += 1;
        } else {
            break;
        }
    }

    if bytes.get(i) != Some(&b'>') {
        return None;
    }

    Some(RawTag {
        name: &text[name_start..i],
        closing,
        end: i + 1,
    })
}

/// Find the `</name>` that balances an opening tag ending at `from`.
/// Returns the close tag's start and end offsets.
fn find_close(text: &str, name: &str, from: usize) -> Option<(usize, usize)> {
    let mut depth = 1usize;
    let mut pos = from;

    while let Some(offset) = text[pos..].find('<') {
        let at = pos + offset;
        match parse_tag_at(text, at) {
            Some(tag) if tag.name == name => {
                if tag.closing {
                    depth -= 1;
                    if depth == 0 {
                        return Some((at, tag.end));
                    }
                } else {
                    depth += 1;
                }
                pos = tag.end;
            }
            _ => pos = at + 1,
        }
    }

    None
}

/// Inner text of the first balanced `<name>` block anywhere in `text`.
fn find_block<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let open = format!("<{name}>");
    let mut pos = 0;
    while let Some(offset) = text[pos..].find(&open) {
        let start = pos + offset + open.len();
        if let Some((close_start, _)) = find_close(text, name, start) {
            return Some(&text[start..close_start]);
        }
        pos = start;
    }
    None
}
