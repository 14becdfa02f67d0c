// ANSI-aware hard wrapping.
//
// Escape sequences are copied through atomically and take no columns:
// - CSI: `ESC [` ... final byte (0x40-0x7E)
// - OSC/DCS/PM/APC: `ESC ]`, `ESC P`, `ESC ^`, `ESC _` ... BEL or `ESC \`
// - two-character sequences: `ESC` + one byte
//
// Visible text is measured per grapheme cluster with `unicode-width`, so
// wide glyphs count as two columns and combining marks as none. A tab
// advances to the next multiple of `TAB_WIDTH`; a carriage return moves back
// to column zero without starting a new line.

use std::borrow::Cow;

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

const ESC: u8 = 0x1B;
const TAB_WIDTH: usize = 8;

/// Insert line breaks so that no line of `text` exceeds `width` visible
/// columns. Existing line breaks are kept. A width of zero disables wrapping.
///
/// A grapheme wider than `width` is placed alone on its line rather than
/// split.
pub fn wrap(text: &str, width: usize) -> String {
    if width == 0 {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len() + text.len() / width.max(1));
    let mut column = 0;

    for segment in segments(text) {
        match segment {
            Segment::Escape(seq) => out.push_str(seq),
            Segment::Text(run) => {
                for grapheme in run.graphemes(true) {
                    if matches!(grapheme, "\n" | "\r\n" | "\r") {
                        out.push_str(grapheme);
                        column = 0;
                        continue;
                    }
                    let mut cols = columns(grapheme, column);
                    if column > 0 && column + cols > width {
                        out.push('\n');
                        column = 0;
                        cols = columns(grapheme, column);
                    }
                    out.push_str(grapheme);
                    column += cols;
                }
            }
        }
    }

    out
}

/// Columns `grapheme` occupies when printed at `column`.
fn columns(grapheme: &str, column: usize) -> usize {
    if grapheme == "\t" {
        TAB_WIDTH - column % TAB_WIDTH
    } else {
        grapheme.width()
    }
}

/// Strip escape sequences, leaving only the visible text.
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    if !text.as_bytes().contains(&ESC) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    for segment in segments(text) {
        if let Segment::Text(run) = segment {
            out.push_str(run);
        }
    }
    Cow::Owned(out)
}

/// Visible column count of a single line.
pub fn visible_width(text: &str) -> usize {
    strip_ansi(text).width()
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Escape(&'a str),
    Text(&'a str),
}

/// Split text into escape sequences and plain runs. ESC is ASCII, so every
/// split point is a char boundary.
fn segments(text: &str) -> impl Iterator<Item = Segment<'_>> {
    let bytes = text.as_bytes();
    let mut pos = 0;
    std::iter::from_fn(move || {
        if pos >= bytes.len() {
            return None;
        }
        let start = pos;
        if bytes[pos] == ESC {
            pos = escape_end(bytes, pos);
            Some(Segment::Escape(&text[start..pos]))
        } else {
            while pos < bytes.len() && bytes[pos] != ESC {
                pos += 1;
            }
            Some(Segment::Text(&text[start..pos]))
        }
    })
}

/// Index just past the escape sequence starting at `pos`.
fn escape_end(bytes: &[u8], pos: usize) -> usize {
    let next = pos + 1;
    match bytes.get(next) {
        None => bytes.len(),
        Some(b'[') => csi_end(bytes, next + 1),
        Some(b']' | b'P' | b'^' | b'_') => string_end(bytes, next + 1),
        // A multi-byte char after ESC is left for the text run.
        Some(b) if b.is_ascii() => next + 1,
        Some(_) => next,
    }
}

fn csi_end(bytes: &[u8], pos: usize) -> usize {
    let mut i = pos;
    while i < bytes.len() {
        let b = bytes[i];
        if (0x40..=0x7E).contains(&b) {
            return i + 1;
        }
        if !(0x20..=0x3F).contains(&b) {
            // Malformed; stop before the offending byte.
            return i;
        }
        i += 1;
    }
    bytes.len()
}

fn string_end(bytes: &[u8], pos: usize) -> usize {
    let mut i = pos;
    while i < bytes.len() {
        match bytes[i] {
            0x07 => return i + 1,
            ESC if bytes.get(i + 1) == Some(&b'\\') => return i + 2,
            _ => i += 1,
        }
    }
    bytes.len()
}
