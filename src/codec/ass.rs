//! Advanced SubStation Alpha (`.ass`) output and input.
//!
//! Output always carries the three required sections with a single `Default` style. Input
//! honours the `[Events]` `Format:` line, so files with reordered or extra columns decode too.

use std::io::Write;

use crate::codec::cue::normalize;
use crate::codec::timestamp::{format_ass, parse_clock};
use crate::segment_encoder::{SegmentEncoder, closed_error};
use crate::segments::{Segment, Transcript, UNDETERMINED_LANGUAGE};
use crate::{Error, Result};

const SCRIPT_HEADER: &str = "\
[Script Info]
ScriptType: v4.00+
PlayResX: 384
PlayResY: 288
WrapStyle: 0
ScaledBorderAndShadow: yes

[V4+ Styles]
Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding
Style: Default,Arial,20,&H00FFFFFF,&H000000FF,&H00000000,&H00000000,0,0,0,0,100,100,0,0,1,2,2,2,10,10,10,1

[Events]
Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text
";

const DEFAULT_EVENT_FORMAT: [&str; 10] = [
    "layer", "start", "end", "style", "name", "marginl", "marginr", "marginv", "effect", "text",
];

pub struct AssEncoder<W: Write> {
    w: W,
    started: bool,
    closed: bool,
}

impl<W: Write> AssEncoder<W> {
    pub fn new(w: W) -> Self {
        Self {
            w,
            started: false,
            closed: false,
        }
    }

    fn start_if_needed(&mut self) -> Result<()> {
        if !self.started {
            self.w.write_all(SCRIPT_HEADER.as_bytes())?;
            self.started = true;
        }
        Ok(())
    }
}

impl<W: Write> SegmentEncoder for AssEncoder<W> {
    fn write_segment(&mut self, seg: &Segment) -> Result<()> {
        if self.closed {
            return Err(closed_error());
        }
        self.start_if_needed()?;

        // Hard line breaks are `\N` inside a Dialogue line; blank lines survive as `\N\N`.
        let text = seg
            .text
            .trim()
            .split('\n')
            .map(|line| escape_text(line.trim()))
            .collect::<Vec<_>>()
            .join("\\N");
        writeln!(
            &mut self.w,
            "Dialogue: 0,{},{},Default,,0,0,0,,{text}",
            format_ass(seg.start_ms),
            format_ass(seg.end_ms)
        )?;
        self.w.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.start_if_needed()?;
        self.w.flush()?;
        self.closed = true;
        Ok(())
    }
}

/// Parse ASS/SSA content. Only `Dialogue:` events are kept; `Comment:` events are skipped.
pub fn decode(content: &str) -> Result<Transcript> {
    let content = normalize(content);

    let mut in_events = false;
    let mut saw_events = false;
    let mut columns: Vec<String> = DEFAULT_EVENT_FORMAT.iter().map(|c| (*c).to_owned()).collect();
    let mut segments = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        let line_no = idx + 1;

        if line.starts_with('[') && line.ends_with(']') {
            in_events = line.eq_ignore_ascii_case("[events]");
            saw_events |= in_events;
            continue;
        }
        if !in_events {
            continue;
        }

        if let Some(format) = line.strip_prefix("Format:") {
            columns = format
                .split(',')
                .map(|c| c.trim().to_ascii_lowercase())
                .collect();
            continue;
        }

        if let Some(body) = line.strip_prefix("Dialogue:") {
            segments.push(parse_dialogue(body, &columns, line_no)?);
        }
    }

    if !saw_events {
        return Err(Error::format("missing [Events] section"));
    }

    Ok(Transcript::new(UNDETERMINED_LANGUAGE, segments))
}

fn parse_dialogue(body: &str, columns: &[String], line_no: usize) -> Result<Segment> {
    let column = |name: &str| {
        columns.iter().position(|c| c == name).ok_or_else(|| {
            Error::format(format!("[Events] format has no '{name}' column (line {line_no})"))
        })
    };
    let start_idx = column("start")?;
    let end_idx = column("end")?;
    let text_idx = column("text")?;

    // The text column may itself contain commas, so it absorbs the remainder.
    let fields: Vec<&str> = body.splitn(columns.len(), ',').collect();
    if fields.len() != columns.len() {
        return Err(Error::format(format!(
            "dialogue at line {line_no} has {} fields, expected {}",
            fields.len(),
            columns.len()
        )));
    }

    let time = |raw: &str| {
        parse_clock(raw).ok_or_else(|| {
            Error::format(format!("invalid dialogue time at line {line_no}: '{}'", raw.trim()))
        })
    };

    Ok(Segment::new(
        time(fields[start_idx])?,
        time(fields[end_idx])?,
        clean_text(fields[text_idx]),
    ))
}

/// Escape characters that would otherwise start an override block or an escape sequence.
fn escape_text(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for ch in line.chars() {
        if matches!(ch, '\\' | '{' | '}') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Strip `{...}` override blocks and translate ASS escapes into plain text.
///
/// `\{`, `\}` and `\\` are literal braces and backslashes; any other unknown escape is kept as
/// written.
fn clean_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut depth = 0usize;
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        if depth > 0 {
            match ch {
                '{' => depth += 1,
                '}' => depth -= 1,
                _ => {}
            }
            continue;
        }
        match ch {
            '{' => depth = 1,
            '\\' => match chars.peek().copied() {
                Some('N' | 'n') => {
                    chars.next();
                    out.push('\n');
                }
                Some('h') => {
                    chars.next();
                    out.push(' ');
                }
                Some(lit @ ('\\' | '{' | '}')) => {
                    chars.next();
                    out.push(lit);
                }
                _ => out.push('\\'),
            },
            _ => out.push(ch),
        }
    }

    out.lines().map(str::trim).collect::<Vec<_>>().join("\n")
}
