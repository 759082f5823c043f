//! Line-oriented readers over job logs.
//!
//! Logs may be large and are not guaranteed to be valid UTF-8, so lines are
//! read as bytes and decoded lossily one at a time.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Number of trailing lines inspected by the classifier.
pub const TAIL_WINDOW: usize = 10;

/// Returns true if any line of the file satisfies `pred`. Stops at the
/// first match.
pub fn any_line<F>(path: &Path, mut pred: F) -> std::io::Result<bool>
where
    F: FnMut(&str) -> bool,
{
    let mut reader = BufReader::new(File::open(path)?);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(false);
        }
        if pred(&String::from_utf8_lossy(&buf)) {
            return Ok(true);
        }
    }
}

/// Reads at most the last `n` lines, keeping only `n` lines in memory.
pub fn tail_lines(path: &Path, n: usize) -> std::io::Result<Vec<String>> {
    let mut reader = BufReader::new(File::open(path)?);
    if n == 0 {
        return Ok(Vec::new());
    }

    let mut window: VecDeque<String> = VecDeque::with_capacity(n);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        if window.len() == n {
            window.pop_front();
        }
        let line = String::from_utf8_lossy(&buf);
        window.push_back(line.trim_end_matches(['\n', '\r']).to_string());
    }

    Ok(window.into())
}
