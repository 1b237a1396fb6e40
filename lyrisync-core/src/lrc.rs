use crate::sync::active_index;
use std::ops::Deref;
use std::rc::Rc;

/// A single timestamped lyric line
#[derive(Debug, Clone, PartialEq)]
pub struct LyricEntry {
    /// Start time in seconds from the beginning of the track
    pub time: f64,
    /// Lyric text, possibly empty (instrumental gaps)
    pub text: String,
}

impl LyricEntry {
    #[must_use]
    pub fn new(time: f64, text: impl Into<String>) -> Self {
        Self {
            time,
            text: text.into(),
        }
    }
}

/// Parsed lyrics, sorted non-decreasing by start time.
///
/// Cloning is cheap: the entries are shared and never mutated after parsing,
/// so a sync session and the panel that renders it can hold the same set.
#[derive(Debug, Clone)]
pub struct Lyrics {
    entries: Rc<[LyricEntry]>,
}

impl Default for Lyrics {
    fn default() -> Self {
        Self {
            entries: Rc::from(Vec::new()),
        }
    }
}

impl Lyrics {
    /// Parse LRC text. Never fails; malformed lines are skipped.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        Self {
            entries: parse(input).into(),
        }
    }

    /// Build lyrics from arbitrary entries.
    ///
    /// Entries with a negative or non-finite time are dropped, the rest are
    /// stable-sorted so equal timestamps keep their given order.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = LyricEntry>) -> Self {
        let mut entries: Vec<_> = entries
            .into_iter()
            .filter(|e| e.time.is_finite() && e.time >= 0.0)
            .collect();
        entries.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self {
            entries: entries.into(),
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[LyricEntry] {
        &self.entries
    }

    /// Index of the line active at `time` seconds, if any
    #[must_use]
    pub fn active_index(&self, time: f64) -> Option<usize> {
        active_index(&self.entries, time)
    }

    /// Line active at `time` seconds, if any
    #[must_use]
    pub fn active_entry(&self, time: f64) -> Option<&LyricEntry> {
        self.active_index(time).map(|i| &self.entries[i])
    }
}

impl Deref for Lyrics {
    type Target = [LyricEntry];

    fn deref(&self) -> &Self::Target {
        &self.entries
    }
}

/// Parse LRC text into entries sorted by time.
///
/// Lines may use any line ending. Each leading `[mm:ss]` or `[mm:ss.f]`
/// (1-3 fractional digits) tag yields one entry carrying the line's trailing
/// text. Lines without a valid leading tag, including ID tags such as
/// `[ti:Title]`, are dropped.
#[must_use]
pub fn parse(input: &str) -> Vec<LyricEntry> {
    let mut entries = Vec::new();

    for line in input.split(|c: char| c == '\n' || c == '\r') {
        if let Some(parsed) = parse_lyric_line(line) {
            entries.extend(parsed);
        }
    }

    // Vec::sort_by is stable: duplicate timestamps keep encounter order
    entries.sort_by(|a, b| a.time.total_cmp(&b.time));
    entries
}

/// Parse a lyric line like [00:12.34]Hello world or [00:12.34][00:15.67]Same lyrics
fn parse_lyric_line(line: &str) -> Option<Vec<LyricEntry>> {
    let mut remaining = line.trim_start();
    let mut timestamps = Vec::new();

    while let Some((time, rest)) = parse_leading_tag(remaining) {
        timestamps.push(time);
        remaining = rest.trim_start();
    }

    if timestamps.is_empty() {
        return None;
    }

    let text = remaining.trim();
    Some(
        timestamps
            .into_iter()
            .map(|time| LyricEntry::new(time, text))
            .collect(),
    )
}

/// Split a leading `[...]` timestamp tag off `s`
fn parse_leading_tag(s: &str) -> Option<(f64, &str)> {
    let inner = s.strip_prefix('[')?;
    let end = inner.find(']')?;
    let time = parse_timestamp(&inner[..end])?;
    Some((time, &inner[end + 1..]))
}

/// Parse a timestamp string like "01:02", "01:02.5" or "01:02.345" into seconds
fn parse_timestamp(s: &str) -> Option<f64> {
    let (minutes, rest) = s.split_once(':')?;
    let (seconds, fraction) = match rest.split_once('.') {
        Some((seconds, fraction)) => (seconds, Some(fraction)),
        None => (rest, None),
    };

    if !(1..=2).contains(&minutes.len()) || seconds.len() != 2 {
        return None;
    }
    let minutes = parse_digits(minutes)?;
    let seconds = parse_digits(seconds)?;

    // Right-pad the fraction to millisecond precision: ".5" is 500ms
    let millis = match fraction {
        None => 0,
        Some(f) => {
            let value = parse_digits(f)?;
            match f.len() {
                1 => value * 100,
                2 => value * 10,
                3 => value,
                _ => return None,
            }
        }
    };

    Some(f64::from(minutes * 60 + seconds) + f64::from(millis) / 1000.0)
}

/// Parse a short run of ASCII digits. Rejects signs and empty input.
fn parse_digits(s: &str) -> Option<u32> {
    if s.is_empty() || s.len() > 3 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
