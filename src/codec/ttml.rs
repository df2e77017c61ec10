//! Timed Text Markup Language output and input.
//!
//! Output is one `<p xml:space="preserve">` per segment inside a single `<div>`, with clock-time
//! `begin`/`end` attributes. Input is parsed with `roxmltree` and also accepts offset times
//! (`12.5s`, `250ms`).

use std::io::Write;

use crate::codec::timestamp::{format_clock, parse_clock};
use crate::segment_encoder::{SegmentEncoder, closed_error};
use crate::segments::{Segment, Transcript, UNDETERMINED_LANGUAGE};
use crate::{Error, Result};

const TTML_NS: &str = "http://www.w3.org/ns/ttml";
const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

pub struct TtmlEncoder<W: Write> {
    w: W,

    /// Value of `xml:lang` on the root element.
    language: String,

    started: bool,
    closed: bool,
}

impl<W: Write> TtmlEncoder<W> {
    pub fn new(w: W, language: impl Into<String>) -> Self {
        Self {
            w,
            language: language.into(),
            started: false,
            closed: false,
        }
    }

    fn start_if_needed(&mut self) -> Result<()> {
        if !self.started {
            writeln!(&mut self.w, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
            writeln!(
                &mut self.w,
                r#"<tt xmlns="{TTML_NS}" xml:lang="{}">"#,
                escape_xml(&self.language)
            )?;
            writeln!(&mut self.w, "  <body>")?;
            writeln!(&mut self.w, "    <div>")?;
            self.started = true;
        }
        Ok(())
    }
}

impl<W: Write> SegmentEncoder for TtmlEncoder<W> {
    fn write_segment(&mut self, seg: &Segment) -> Result<()> {
        if self.closed {
            return Err(closed_error());
        }
        self.start_if_needed()?;

        // Text is written as is under `xml:space="preserve"`, so runs of spaces and blank lines
        // survive a round trip.
        let body = seg
            .text
            .split('\n')
            .map(|line| escape_xml(line.trim_end_matches('\r')))
            .collect::<Vec<_>>()
            .join("<br/>");
        writeln!(
            &mut self.w,
            r#"      <p begin="{}" end="{}" xml:space="preserve">{body}</p>"#,
            format_clock(seg.start_ms, '.'),
            format_clock(seg.end_ms, '.')
        )?;
        self.w.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.start_if_needed()?;
        writeln!(&mut self.w, "    </div>")?;
        writeln!(&mut self.w, "  </body>")?;
        writeln!(&mut self.w, "</tt>")?;
        self.w.flush()?;
        self.closed = true;
        Ok(())
    }
}

/// Parse a TTML document. Every `<p>` with a `begin` attribute becomes a segment, in document
/// order; `end` may be replaced by `dur`.
pub fn decode(content: &str) -> Result<Transcript> {
    let doc = roxmltree::Document::parse(content.trim_start_matches('\u{feff}'))
        .map_err(|e| Error::format(format!("TTML parse error: {e}")))?;

    let root = doc.root_element();
    if root.tag_name().name() != "tt" {
        return Err(Error::format("root element must be <tt>"));
    }

    let language = root
        .attribute((XML_NS, "lang"))
        .filter(|l| !l.trim().is_empty())
        .unwrap_or(UNDETERMINED_LANGUAGE)
        .to_owned();

    let mut segments = Vec::new();
    for p in root
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "p")
    {
        let line = doc.text_pos_at(p.range().start).row;
        let begin = p
            .attribute("begin")
            .ok_or_else(|| Error::format(format!("<p> without begin attribute at line {line}")))?;
        let start_ms = parse_time(begin, line)?;

        let end_ms = match (p.attribute("end"), p.attribute("dur")) {
            (Some(end), _) => parse_time(end, line)?,
            (None, Some(dur)) => start_ms + parse_time(dur, line)?,
            (None, None) => {
                return Err(Error::format(format!(
                    "<p> without end or dur attribute at line {line}"
                )));
            }
        };

        segments.push(Segment::new(start_ms, end_ms, paragraph_text(&p)));
    }

    Ok(Transcript::new(language, segments))
}

fn paragraph_text(p: &roxmltree::Node<'_, '_>) -> String {
    // `ancestors` starts at `p` itself, so the nearest `xml:space` wins.
    let preserve = p
        .ancestors()
        .find_map(|n| n.attribute((XML_NS, "space")))
        == Some("preserve");
    if preserve {
        return preserved_text(p);
    }

    let mut text = String::new();
    for node in p.descendants().skip(1) {
        if node.is_text() {
            // XML whitespace inside a paragraph is not significant; collapse it.
            let raw = node.text().unwrap_or_default();
            if raw.starts_with(char::is_whitespace) {
                push_space(&mut text);
            }
            for (i, word) in raw.split_whitespace().enumerate() {
                if i > 0 {
                    text.push(' ');
                }
                text.push_str(word);
            }
            if raw.ends_with(char::is_whitespace) {
                push_space(&mut text);
            }
        } else if node.is_element() && node.tag_name().name() == "br" {
            text.push('\n');
        }
    }

    text.lines().map(str::trim).collect::<Vec<_>>().join("\n")
}

fn preserved_text(p: &roxmltree::Node<'_, '_>) -> String {
    let mut text = String::new();
    for node in p.descendants().skip(1) {
        if node.is_text() {
            text.push_str(node.text().unwrap_or_default());
        } else if node.is_element() && node.tag_name().name() == "br" {
            text.push('\n');
        }
    }
    text
}

fn push_space(text: &mut String) {
    if !text.is_empty() && !text.ends_with([' ', '\n']) {
        text.push(' ');
    }
}

/// Clock time (`HH:MM:SS.fff`) or offset time (`12.5s`, `250ms`, `1.5m`, `0.5h`).
fn parse_time(raw: &str, line: u32) -> Result<u64> {
    let raw = raw.trim();
    let invalid = || Error::format(format!("invalid TTML time '{raw}' at line {line}"));

    let offset = |value: &str, scale: f64| -> Result<u64> {
        let v: f64 = value.parse().map_err(|_| invalid())?;
        if !v.is_finite() || v < 0.0 {
            return Err(invalid());
        }
        Ok((v * scale).round() as u64)
    };

    if let Some(v) = raw.strip_suffix("ms") {
        offset(v, 1.0)
    } else if let Some(v) = raw.strip_suffix('s') {
        offset(v, 1000.0)
    } else if let Some(v) = raw.strip_suffix('m') {
        offset(v, 60_000.0)
    } else if let Some(v) = raw.strip_suffix('h') {
        offset(v, 3_600_000.0)
    } else {
        parse_clock(raw).ok_or_else(invalid)
    }
}

fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}
