// Line classifier for yt-dlp output
//
// Stateless: every line from either stream is classified on its own.

use regex::Regex;

use super::models::ProgressEvent;
use super::utils::to_bytes;

lazy_static::lazy_static! {
    // [download]  12.5% of ~ 310.04MiB at  374.36KiB/s ETA 11:59 (frag 56/454)
    static ref PROGRESS_RE: Regex =
        Regex::new(r"\[download\]\s+([\d.]+)%\s+of\s+~?\s*([\d.]+)([\w]+)").unwrap();
    static ref MOVE_RE: Regex = Regex::new(r#"\[MoveFiles\] Moving file ".+" to "(.+)""#).unwrap();
    static ref MERGE_RE: Regex = Regex::new(r#"\[Merger\] Merging formats into "(.+)""#).unwrap();
    static ref DEST_RE: Regex = Regex::new(r"\[download\] Destination: (.+)").unwrap();
    static ref ALREADY_RE: Regex = Regex::new(r"\[download\] (.+) has already been downloaded").unwrap();
}

/// What a single output line tells us
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    Progress(ProgressEvent),
    /// A file path announced by a destination, merge, move or
    /// already-downloaded line
    FilePath(String),
}

/// Classify one line. Progress and path are both checked on every line, so
/// a line can yield one of each, progress first.
pub fn classify_line(line: &str) -> impl Iterator<Item = LineEvent> {
    let progress = parse_progress(line).map(LineEvent::Progress);
    let path = extract_file_path(line).map(LineEvent::FilePath);
    progress.into_iter().chain(path)
}

/// Parse a `[download] NN.N% of ~NNN.NUNIT` line.
///
/// `bytes_transferred` is `total * percent / 100`, truncated.
pub fn parse_progress(line: &str) -> Option<ProgressEvent> {
    let caps = PROGRESS_RE.captures(line)?;
    let percent: f64 = caps.get(1)?.as_str().parse().ok()?;
    let size: f64 = caps.get(2)?.as_str().parse().ok()?;
    let unit = caps.get(3)?.as_str();

    let total_bytes = to_bytes(size, unit);
    let bytes_transferred = (total_bytes as f64 * percent / 100.0) as u64;

    Some(ProgressEvent {
        bytes_transferred,
        total_bytes,
    })
}

/// Extract the file path a line announces, if any.
///
/// Patterns are tried move, merge, destination, already-downloaded. Which
/// path is final across lines is decided by the caller (last one wins).
/// The capture is kept verbatim, trailing whitespace included.
pub fn extract_file_path(line: &str) -> Option<String> {
    [&*MOVE_RE, &*MERGE_RE, &*DEST_RE, &*ALREADY_RE]
        .iter()
        .find_map(|re| re.captures(line))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_line() {
        let ev = parse_progress("[download]  50.0% of ~ 10.00MiB at 1.00MiB/s ETA 00:05").unwrap();
        assert_eq!(ev.total_bytes, 10 * 1024 * 1024);
        assert_eq!(ev.bytes_transferred, 5 * 1024 * 1024);
    }

    #[test]
    fn test_progress_line_without_tilde() {
        let ev = parse_progress("[download]  12.5% of 2.00GiB").unwrap();
        assert_eq!(ev.total_bytes, 2 * 1024 * 1024 * 1024);
        assert_eq!(ev.bytes_transferred, 268_435_456);
    }

    #[test]
    fn test_progress_truncates() {
        let ev = parse_progress("[download]   33.3% of ~1.00KiB").unwrap();
        assert_eq!(ev.total_bytes, 1024);
        assert_eq!(ev.bytes_transferred, 340);
    }

    #[test]
    fn test_non_progress_lines() {
        assert!(parse_progress("[download] Destination: /tmp/a.mp4").is_none());
        assert!(parse_progress("[youtube] abc: Downloading webpage").is_none());
        assert!(parse_progress("").is_none());
    }

    #[test]
    fn test_path_lines() {
        assert_eq!(
            extract_file_path("[download] Destination: /tmp/a.f137.mp4").as_deref(),
            Some("/tmp/a.f137.mp4")
        );
        assert_eq!(
            extract_file_path(r#"[Merger] Merging formats into "/tmp/a.mp4""#).as_deref(),
            Some("/tmp/a.mp4")
        );
        assert_eq!(
            extract_file_path(r#"[MoveFiles] Moving file "/tmp/x.mp4" to "/data/x.mp4""#).as_deref(),
            Some("/data/x.mp4")
        );
        assert_eq!(
            extract_file_path("[download] /tmp/b.mp4 has already been downloaded").as_deref(),
            Some("/tmp/b.mp4")
        );
        assert!(extract_file_path("[info] Downloading 1 format(s): 137+140").is_none());
    }

    #[test]
    fn test_classify_line() {
        let events: Vec<LineEvent> = classify_line("[download]  1.0% of ~ 1.00MiB").collect();
        assert!(matches!(events.as_slice(), [LineEvent::Progress(_)]));

        let events: Vec<LineEvent> = classify_line(r#"[Merger] Merging formats into "/tmp/a.mkv""#).collect();
        assert_eq!(events, vec![LineEvent::FilePath("/tmp/a.mkv".to_string())]);

        assert_eq!(classify_line("WARNING: something").count(), 0);
    }

    #[test]
    fn test_line_with_progress_and_path_yields_both() {
        let line = "[download] Destination: /tmp/[download]  50.0% of 2.00MiB.mp4";
        let events: Vec<LineEvent> = classify_line(line).collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            LineEvent::Progress(ProgressEvent { total_bytes: 2_097_152, .. })
        ));
        assert_eq!(
            events[1],
            LineEvent::FilePath("/tmp/[download]  50.0% of 2.00MiB.mp4".to_string())
        );
    }

    #[test]
    fn test_path_keeps_trailing_whitespace() {
        assert_eq!(
            extract_file_path("[download] Destination: /tmp/clip .mp4 ").as_deref(),
            Some("/tmp/clip .mp4 ")
        );
    }
}
