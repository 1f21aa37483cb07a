use std::fmt;
use std::time::Duration;

/// Snapshot of how far a scan has come
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanProgress {
    pub lines: usize,
    pub elapsed: Duration,
    pub stopped: bool,
}

impl fmt::Display for ScanProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} lines / elapsed time: {} ms",
            group_thousands(self.lines as u128),
            group_thousands(self.elapsed.as_millis())
        )?;
        if self.stopped {
            f.write_str(" - STOPPED!")?;
        }
        Ok(())
    }
}

/// Format `n` with a comma between groups of three digits
fn group_thousands(n: u128) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
