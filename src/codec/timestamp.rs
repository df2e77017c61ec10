//! Timestamp rendering and parsing shared by the subtitle formats.
//!
//! All timing is integer milliseconds. Formats with coarser precision (ASS, LRC) round to the
//! nearest centisecond on output, so a decode of their output is exact only for multiples of 10 ms.

const MS_PER_SECOND: u64 = 1000;
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;

/// Render `HH:MM:SS<sep>mmm` (SRT uses `,`, WebVTT and TTML use `.`).
pub(crate) fn format_clock(ms: u64, sep: char) -> String {
    let h = ms / MS_PER_HOUR;
    let m = (ms % MS_PER_HOUR) / MS_PER_MINUTE;
    let s = (ms % MS_PER_MINUTE) / MS_PER_SECOND;
    let millis = ms % MS_PER_SECOND;
    format!("{h:02}:{m:02}:{s:02}{sep}{millis:03}")
}

/// Round milliseconds to the nearest centisecond.
pub(crate) fn to_centiseconds(ms: u64) -> u64 {
    (ms + 5) / 10
}

/// Render ASS's `H:MM:SS.cc`.
pub(crate) fn format_ass(ms: u64) -> String {
    let cs = to_centiseconds(ms);
    let h = cs / 360_000;
    let m = (cs % 360_000) / 6000;
    let s = (cs % 6000) / 100;
    let frac = cs % 100;
    format!("{h}:{m:02}:{s:02}.{frac:02}")
}

/// Render LRC's `[mm:ss.xx]`. Minutes are not wrapped into hours.
pub(crate) fn format_lrc(ms: u64) -> String {
    let cs = to_centiseconds(ms);
    let m = cs / 6000;
    let s = (cs % 6000) / 100;
    let frac = cs % 100;
    format!("[{m:02}:{s:02}.{frac:02}]")
}

/// Parse a clock value: `H:MM:SS.fff`, `MM:SS.fff`, with `.` or `,` before the fraction.
///
/// The fraction may have any number of digits; it is scaled to milliseconds (`.5` is 500 ms,
/// `.05` is 50 ms) and digits beyond the third are truncated. With an hour field present,
/// minutes and seconds must be below 60. Without one, minutes may run past 59 (LRC does this).
pub(crate) fn parse_clock(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let parts: Vec<&str> = raw.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (parse_digits(h)?, parse_digits(m)?, *s),
        [m, s] => (0, parse_digits(m)?, *s),
        _ => return None,
    };

    let (whole, frac) = match seconds.find(['.', ',']) {
        Some(idx) => (&seconds[..idx], Some(&seconds[idx + 1..])),
        None => (seconds, None),
    };
    let secs = parse_digits(whole)?;
    if secs >= 60 || (parts.len() == 3 && minutes >= 60) {
        return None;
    }

    let millis = match frac {
        Some(f) => parse_fraction_ms(f)?,
        None => 0,
    };

    Some(hours * MS_PER_HOUR + minutes * MS_PER_MINUTE + secs * MS_PER_SECOND + millis)
}

fn parse_digits(raw: &str) -> Option<u64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

fn parse_fraction_ms(raw: &str) -> Option<u64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut ms = 0;
    let mut scale = 100;
    for digit in raw.bytes().take(3) {
        ms += u64::from(digit - b'0') * scale;
        scale /= 10;
    }
    Some(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_formats_with_separator() {
        assert_eq!(format_clock(65_250, ','), "00:01:05,250");
        assert_eq!(format_clock(67_000, '.'), "00:01:07.000");
        assert_eq!(format_clock(3_723_004, '.'), "01:02:03.004");
    }

    #[test]
    fn ass_rounds_to_centiseconds() {
        assert_eq!(format_ass(0), "0:00:00.00");
        assert_eq!(format_ass(65_254), "0:01:05.25");
        assert_eq!(format_ass(65_255), "0:01:05.26");
        assert_eq!(format_ass(3_600_000), "1:00:00.00");
    }

    #[test]
    fn lrc_keeps_minutes_past_an_hour() {
        assert_eq!(format_lrc(65_250), "[01:05.25]");
        assert_eq!(format_lrc(3_900_000), "[65:00.00]");
    }

    #[test]
    fn parse_clock_accepts_common_shapes() {
        assert_eq!(parse_clock("00:01:05,250"), Some(65_250));
        assert_eq!(parse_clock("00:01:05.250"), Some(65_250));
        assert_eq!(parse_clock("01:05.250"), Some(65_250));
        assert_eq!(parse_clock("0:01:05.25"), Some(65_250));
        assert_eq!(parse_clock("01:05.5"), Some(65_500));
        assert_eq!(parse_clock("00:00:01"), Some(1000));
        assert_eq!(parse_clock("00:00:01.123456"), Some(1123));
        assert_eq!(parse_clock("65:00.00"), Some(3_900_000));
    }

    #[test]
    fn parse_clock_rejects_garbage() {
        assert_eq!(parse_clock(""), None);
        assert_eq!(parse_clock("ar:Someone"), None);
        assert_eq!(parse_clock("00:61:00.000"), None);
        assert_eq!(parse_clock("00:00:75.000"), None);
        assert_eq!(parse_clock("1:2:3:4"), None);
        assert_eq!(parse_clock("00:00:01."), None);
    }
}
