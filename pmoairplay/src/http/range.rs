/// Inclusive byte interval of a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Whether the interval lies within a resource of `total` bytes.
    pub fn is_satisfiable(&self, total: u64) -> bool {
        self.start <= self.end && self.end < total
    }

    /// Number of bytes covered. Only meaningful for a satisfiable range.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start).saturating_add(1)
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// Resolve a `Range` header value against a resource of `total` bytes.
///
/// Recognised forms are `bytes=a-b`, `bytes=a-` and `bytes=-n`. Anything else
/// yields `None`. The result is not bounds-checked: `bytes=5000-` against a
/// 1000-byte file resolves to `5000-999`, and callers decide what to do with
/// it through [`ByteRange::is_satisfiable`].
///
/// Forms that cannot be expressed at all return `None`: an open-ended or
/// suffix form against an empty resource, and a suffix longer than the
/// resource.
pub fn resolve(header: &str, total: u64) -> Option<ByteRange> {
    let value = header.trim();
    let unit = value.get(..6)?;
    if !unit.eq_ignore_ascii_case("bytes=") {
        return None;
    }
    let (first, last) = value[6..].trim().split_once('-')?;
    let (first, last) = (first.trim(), last.trim());

    match (first.is_empty(), last.is_empty()) {
        (true, true) => None,
        (true, false) => {
            let suffix = parse_offset(last)?;
            Some(ByteRange {
                start: total.checked_sub(suffix)?,
                end: total.checked_sub(1)?,
            })
        }
        (false, true) => Some(ByteRange {
            start: parse_offset(first)?,
            end: total.checked_sub(1)?,
        }),
        (false, false) => Some(ByteRange {
            start: parse_offset(first)?,
            end: parse_offset(last)?,
        }),
    }
}

fn parse_offset(s: &str) -> Option<u64> {
    if s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}
