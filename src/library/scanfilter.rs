//! Incremental scan filter (component J, §4.10).
//!
//! A pure decision function, deliberately decoupled from the filename hash
//! and playlist types it consults: the scanning loop ([`super::source`])
//! owns the destructive move of up-to-date entries from the old playlist
//! to the new one; this module only decides whether a given file needs to
//! be re-parsed.

/// The result of classifying one file encountered during a directory walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDecision {
    /// New or stale; should be (re)parsed.
    Include,
    /// Already up to date; the caller should move the existing entry over
    /// unchanged rather than re-reading the file.
    Skip,
}

/// Classify a file at `uri` with filesystem mtime `mtime`.
///
/// `known` is whether `uri` is present in the old index's filename hash at
/// all (§4.10 step 1: unknown files are always new). `scan_time` is the
/// persisted `:MEDIALIB_SCAN_TIME` for the matching entry/entries — the
/// minimum across all entries sharing that URI, since step 2 includes the
/// file if *any* entry lacks the timestamp or has one older than `mtime`.
pub fn classify(known: bool, mtime: u64, scan_time: Option<i64>) -> ScanDecision {
    if !known {
        return ScanDecision::Include;
    }
    match scan_time {
        None => ScanDecision::Include,
        Some(t) if t < 0 || (t as u64) < mtime => ScanDecision::Include,
        Some(_) => ScanDecision::Skip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_file_is_included() {
        assert_eq!(classify(false, 100, Some(200)), ScanDecision::Include);
    }

    #[test]
    fn missing_scan_time_is_included() {
        assert_eq!(classify(true, 100, None), ScanDecision::Include);
    }

    #[test]
    fn stale_scan_time_is_included() {
        assert_eq!(classify(true, 300, Some(100)), ScanDecision::Include);
    }

    #[test]
    fn fresh_scan_time_is_skipped() {
        assert_eq!(classify(true, 100, Some(300)), ScanDecision::Skip);
    }

    #[test]
    fn equal_scan_time_and_mtime_is_skipped() {
        assert_eq!(classify(true, 100, Some(100)), ScanDecision::Skip);
    }
}
