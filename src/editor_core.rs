use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Canonical serialization of a document with no content. Submission is
/// gated on the current html being exactly this value.
pub const EMPTY_HTML: &str = "<p></p>";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    pub fn new(start: usize, end: usize) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    pub fn cursor(pos: usize) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    pub fn is_cursor(self) -> bool {
        self.start == self.end
    }

    pub fn clamp(self, len: usize) -> Self {
        Self::new(self.start.min(len), self.end.min(len))
    }
}

/// Inline style attached to a span of the plain-text projection. The widget
/// itself only ever produces `Mention`; `Bold` and `Italic` exist so that
/// seeded content keeps its emphasis across a round-trip.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum InlineStyle {
    Mention,
    Bold,
    Italic,
}

impl InlineStyle {
    /// Tag pair used on the wire. Mention styling is presentation-only and
    /// is not serialized: the submitted html carries the mention as plain
    /// text, so `None`.
    fn wire_tags(self) -> Option<(&'static str, &'static str)> {
        match self {
            InlineStyle::Mention => None,
            InlineStyle::Bold => Some(("<strong>", "</strong>")),
            InlineStyle::Italic => Some(("<em>", "</em>")),
        }
    }
}

/// Byte range of the plain-text projection carrying an inline style.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StyleSpan {
    pub start: usize,
    pub end: usize,
    pub style: InlineStyle,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("range {start}..{end} is invalid for a document of length {len}")]
    InvalidRange { start: usize, end: usize, len: usize },
}

/// Rich-text document: a plain-text projection (blocks are newline-separated
/// lines) plus inline style spans over byte ranges of that text.
///
/// All mutating operations return a new value; no two callers ever share a
/// mutable document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Document {
    text: String,
    spans: Vec<StyleSpan>,
    selection: Selection,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plain_text(&self) -> &str {
        &self.text
    }

    pub fn spans(&self) -> &[StyleSpan] {
        &self.spans
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        let clamped = selection.clamp(self.text.len());
        self.selection = Selection::new(
            snap_to_char_boundary(&self.text, clamped.start),
            snap_to_char_boundary(&self.text, clamped.end),
        );
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Replaces the plain-text byte range `[start, end)` with `insert`,
    /// optionally tagging the inserted text with an inline style.
    ///
    /// Spans strictly after the range shift with the edit; spans that
    /// intersect it are dropped (editing inside a mention breaks it). An
    /// insertion exactly at a span's end does not extend the span, so text
    /// typed right after a mention stays unstyled.
    pub fn replace_range(
        &self,
        start: usize,
        end: usize,
        insert: &str,
        style: Option<InlineStyle>,
    ) -> Result<Document, DocumentError> {
        let len = self.text.len();
        if start > end
            || end > len
            || !self.text.is_char_boundary(start)
            || !self.text.is_char_boundary(end)
        {
            return Err(DocumentError::InvalidRange { start, end, len });
        }

        let mut text = String::with_capacity(len - (end - start) + insert.len());
        text.push_str(&self.text[..start]);
        text.push_str(insert);
        text.push_str(&self.text[end..]);

        let mut spans = remap_spans(&self.spans, start, end, insert.len());
        if let Some(style) = style {
            if !insert.is_empty() {
                spans.push(StyleSpan {
                    start,
                    end: start + insert.len(),
                    style,
                });
            }
        }
        spans.sort_by_key(|span| (span.start, span.end));

        let selection = Selection::cursor(start + insert.len());
        Ok(Document {
            text,
            spans,
            selection,
        })
    }

    /// Inserts `text` at `offset`; shorthand for a zero-width replacement.
    pub fn insert_at(
        &self,
        offset: usize,
        text: &str,
        style: Option<InlineStyle>,
    ) -> Result<Document, DocumentError> {
        self.replace_range(offset, offset, text, style)
    }

    /// Applies a wholesale text replacement coming from the textarea.
    ///
    /// The old and new texts are reduced to a minimal common-prefix/suffix
    /// diff so existing spans can be carried through the edit instead of
    /// being discarded on every keystroke.
    pub fn apply_input(&self, new_text: &str, selection: Selection) -> Document {
        let (start, old_end, new_end) = diff_bounds(&self.text, new_text);
        let mut spans = remap_spans(&self.spans, start, old_end, new_end - start);
        spans.sort_by_key(|span| (span.start, span.end));

        let mut doc = Document {
            text: new_text.to_string(),
            spans,
            selection: Selection::default(),
        };
        doc.set_selection(selection);
        doc
    }

    /// Parses an HTML string into a document. Lossy and infallible: unknown
    /// tags are skipped, malformed fragments are tolerated, and input with
    /// no extractable text yields the empty document.
    pub fn from_html(html: &str) -> Document {
        static TAG: OnceLock<Regex> = OnceLock::new();
        let tag =
            TAG.get_or_init(|| Regex::new(r"</?[a-zA-Z][a-zA-Z0-9]*(?:\s[^>]*)?/?>").unwrap());

        let mut text = String::new();
        let mut spans = Vec::new();
        // (tag name, style opened by it, span start in `text`)
        let mut open: Vec<(String, Option<InlineStyle>, usize)> = Vec::new();
        let mut seen_block = false;
        let mut cursor = 0;

        for m in tag.find_iter(html) {
            let raw_text = &html[cursor..m.start()];
            if !raw_text.is_empty() {
                text.push_str(&decode_entities(raw_text));
            }
            cursor = m.end();

            let raw_tag = m.as_str();
            let closing = raw_tag.starts_with("</");
            let name = tag_name(raw_tag);

            match (name.as_str(), closing) {
                ("p", false) => {
                    if seen_block {
                        text.push('\n');
                    }
                    seen_block = true;
                }
                ("p", true) => {}
                ("br", _) => text.push('\n'),
                ("strong" | "b", false) => {
                    open.push((name, Some(InlineStyle::Bold), text.len()));
                }
                ("em" | "i", false) => {
                    open.push((name, Some(InlineStyle::Italic), text.len()));
                }
                ("span", false) => {
                    let style = if raw_tag.contains("mention") {
                        Some(InlineStyle::Mention)
                    } else {
                        None
                    };
                    open.push((name, style, text.len()));
                }
                ("strong" | "b" | "em" | "i" | "span", true) => {
                    match open.iter().rposition(|(n, _, _)| *n == name) {
                        Some(idx) => {
                            let (_, style, start) = open.remove(idx);
                            if let Some(style) = style {
                                if start < text.len() {
                                    spans.push(StyleSpan {
                                        start,
                                        end: text.len(),
                                        style,
                                    });
                                }
                            }
                        }
                        None => {
                            log::warn!("unmatched closing tag </{name}> in seed html, skipping");
                        }
                    }
                }
                _ => {
                    log::debug!("skipping unsupported tag {raw_tag} in seed html");
                }
            }
        }
        let raw_tail = &html[cursor..];
        if !raw_tail.is_empty() {
            text.push_str(&decode_entities(raw_tail));
        }

        // Close anything left dangling at end of input.
        for (name, style, start) in open.into_iter().rev() {
            log::warn!("unclosed <{name}> in seed html");
            if let Some(style) = style {
                if start < text.len() {
                    spans.push(StyleSpan {
                        start,
                        end: text.len(),
                        style,
                    });
                }
            }
        }

        if text.is_empty() {
            return Document::new();
        }

        spans.sort_by_key(|span| (span.start, span.end));
        let selection = Selection::cursor(text.len());
        Document {
            text,
            spans,
            selection,
        }
    }

    /// Serializes the document to HTML: one `<p>` per newline-separated
    /// block, emphasis runs nested in a fixed order so a second
    /// parse/serialize pass reproduces the string byte for byte. Mention
    /// spans appear as plain text.
    pub fn to_html(&self) -> String {
        if self.text.is_empty() {
            return EMPTY_HTML.to_string();
        }

        let mut html = String::new();
        let mut line_start = 0;
        for line in self.text.split('\n') {
            let line_end = line_start + line.len();
            html.push_str("<p>");
            self.render_runs(line_start, line_end, &mut html);
            html.push_str("</p>");
            line_start = line_end + 1;
        }
        html
    }

    /// Emits the styled runs of `[start, end)` into `out`.
    fn render_runs(&self, start: usize, end: usize, out: &mut String) {
        let mut bounds = vec![start, end];
        for span in &self.spans {
            if span.start > start && span.start < end {
                bounds.push(span.start);
            }
            if span.end > start && span.end < end {
                bounds.push(span.end);
            }
        }
        bounds.sort_unstable();
        bounds.dedup();

        for pair in bounds.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let mut styles: Vec<InlineStyle> = self
                .spans
                .iter()
                .filter(|span| span.start <= a && span.end >= b)
                .map(|span| span.style)
                .collect();
            styles.sort_unstable();
            styles.dedup();
            let tags: Vec<_> = styles.iter().filter_map(|s| s.wire_tags()).collect();

            for (open, _) in &tags {
                out.push_str(open);
            }
            out.push_str(&escape_text(&self.text[a..b]));
            for (_, close) in tags.iter().rev() {
                out.push_str(close);
            }
        }
    }
}

/// Carries spans through a `[start, end) -> inserted` byte splice: spans
/// before the edit stay, spans after shift by the net byte delta, spans
/// overlapping the edited range are dropped.
fn remap_spans(spans: &[StyleSpan], start: usize, end: usize, inserted: usize) -> Vec<StyleSpan> {
    let removed = end - start;
    spans
        .iter()
        .filter_map(|span| {
            if span.end <= start {
                Some(*span)
            } else if span.start >= end {
                Some(StyleSpan {
                    start: span.start - removed + inserted,
                    end: span.end - removed + inserted,
                    style: span.style,
                })
            } else {
                None
            }
        })
        .collect()
}

/// Minimal diff between `old` and `new`: returns `(start, old_end, new_end)`
/// such that `old[start..old_end]` was replaced by `new[start..new_end]`,
/// with all cut points on char boundaries.
fn diff_bounds(old: &str, new: &str) -> (usize, usize, usize) {
    let old_bytes = old.as_bytes();
    let new_bytes = new.as_bytes();

    let mut prefix = old_bytes
        .iter()
        .zip(new_bytes)
        .take_while(|(a, b)| a == b)
        .count();
    while !(old.is_char_boundary(prefix) && new.is_char_boundary(prefix)) {
        prefix -= 1;
    }

    let max_suffix = old.len().min(new.len()) - prefix;
    let mut suffix = old_bytes
        .iter()
        .rev()
        .zip(new_bytes.iter().rev())
        .take_while(|(a, b)| a == b)
        .count()
        .min(max_suffix);
    while !(old.is_char_boundary(old.len() - suffix) && new.is_char_boundary(new.len() - suffix)) {
        suffix -= 1;
    }

    (prefix, old.len() - suffix, new.len() - suffix)
}

/// Largest char boundary at or below `pos`.
fn snap_to_char_boundary(text: &str, mut pos: usize) -> usize {
    pos = pos.min(text.len());
    while !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

/// Converts a DOM selection offset (UTF-16 code units) into a byte offset
/// of the same text, clamped to the text length.
pub fn utf16_to_byte_offset(text: &str, utf16_offset: usize) -> usize {
    if utf16_offset == 0 {
        return 0;
    }
    let mut units = 0;
    for (byte_idx, ch) in text.char_indices() {
        if units >= utf16_offset {
            return byte_idx;
        }
        units += ch.len_utf16();
    }
    text.len()
}

/// Inverse of [`utf16_to_byte_offset`], used to hand a byte cursor back to
/// the DOM.
pub fn byte_to_utf16_offset(text: &str, byte_offset: usize) -> usize {
    let byte_offset = snap_to_char_boundary(text, byte_offset);
    text[..byte_offset].chars().map(char::len_utf16).sum()
}

pub(crate) fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
    out
}

fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match tail.find(';').filter(|&i| i <= 8) {
            Some(semi) => {
                let entity = &tail[1..semi];
                match entity {
                    "amp" => out.push('&'),
                    "lt" => out.push('<'),
                    "gt" => out.push('>'),
                    "quot" => out.push('"'),
                    "apos" => out.push('\''),
                    "nbsp" => out.push('\u{a0}'),
                    _ => match entity
                        .strip_prefix('#')
                        .and_then(|num| num.parse::<u32>().ok())
                        .and_then(char::from_u32)
                    {
                        Some(ch) => out.push(ch),
                        None => {
                            out.push('&');
                            out.push_str(&tail[1..=semi]);
                        }
                    },
                }
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn tag_name(raw: &str) -> String {
    raw.trim_start_matches("</")
        .trim_start_matches('<')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}
