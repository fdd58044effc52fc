//! Last lines of a log file, for `procvisor logs`.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

const BLOCK: u64 = 8 * 1024;

/// Returns the last `lines` lines of `path` (lossy UTF-8).
///
/// Reads backwards block by block, so large logs cost only their tail.
pub fn tail(path: &Path, lines: usize) -> io::Result<Vec<String>> {
    if lines == 0 {
        return Ok(Vec::new());
    }
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();

    let mut start = len;
    let mut buf: Vec<u8> = Vec::new();
    while start > 0 {
        let step = BLOCK.min(start);
        start -= step;
        file.seek(SeekFrom::Start(start))?;
        let mut block = vec![0u8; step as usize];
        file.read_exact(&mut block)?;
        block.extend_from_slice(&buf);
        buf = block;

        // One extra newline: the trailing one terminates the last line.
        if buf.iter().filter(|&&b| b == b'\n').count() > lines {
            break;
        }
    }

    let text = String::from_utf8_lossy(&buf);
    let all: Vec<&str> = text.lines().collect();
    let skip = all.len().saturating_sub(lines);
    Ok(all[skip..].iter().map(|s| s.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_small_and_large() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.log");

        std::fs::write(&path, "a\nb\nc\n").unwrap();
        assert_eq!(tail(&path, 2).unwrap(), ["b", "c"]);
        assert_eq!(tail(&path, 10).unwrap(), ["a", "b", "c"]);
        assert!(tail(&path, 0).unwrap().is_empty());

        let big: String = (0..5000).map(|i| format!("line {i}\n")).collect();
        std::fs::write(&path, big).unwrap();
        assert_eq!(tail(&path, 3).unwrap(), ["line 4997", "line 4998", "line 4999"]);
    }

    #[test]
    fn test_missing_file() {
        assert!(tail(Path::new("/nonexistent/trace.log"), 5).is_err());
    }
}
