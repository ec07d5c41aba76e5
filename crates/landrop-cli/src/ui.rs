//! UI utilities for LANDrop CLI.

use std::io::{self, Write};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};

use landrop_core::file::format_size;
use landrop_core::transfer::{Outcome, SessionEvent};

/// Print the banner shown at the start of long-running commands.
pub fn print_header() {
    println!();
    println!("LANDrop v{}", landrop_core::VERSION);
    println!("{}", "-".repeat(37));
    println!();
}

/// Console rendering of a running session.
///
/// Offers are not handled here; the receive command prompts for them.
#[derive(Debug, Default)]
pub struct SessionView {
    quiet: bool,
    current_file: String,
    progress_line: bool,
}

impl SessionView {
    /// Create a view; `quiet` only keeps the final result.
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            ..Self::default()
        }
    }

    /// Render one event.
    pub fn show(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Status(status) if !self.quiet => {
                self.end_progress_line();
                println!("  {}", status);
            }
            SessionEvent::Fingerprint(code) if !self.quiet => {
                self.end_progress_line();
                println!();
                println!("  Security code: {}", code);
                println!("  Make sure the other device shows the same code.");
                println!();
            }
            SessionEvent::FileStarted { filename, .. } => {
                self.current_file.clone_from(filename);
            }
            SessionEvent::Progress { transferred, total } if !self.quiet => {
                print!(
                    "\r  [{:>6.2}%] {} - {} / {}    ",
                    percentage(*transferred, *total),
                    self.current_file,
                    format_size(*transferred),
                    format_size(*total)
                );
                let _ = io::stdout().flush();
                self.progress_line = true;
            }
            SessionEvent::Ended(outcome) => {
                self.end_progress_line();
                println!();
                match outcome {
                    Outcome::Completed => println!("  Transfer complete."),
                    Outcome::Rejected => println!("  The receiving device rejected your file(s)."),
                    Outcome::Declined => println!("  Transfer declined."),
                    Outcome::Failed(reason) => println!("  Transfer failed: {}", reason),
                }
                println!();
            }
            _ => {}
        }
    }

    fn end_progress_line(&mut self) {
        if self.progress_line {
            println!();
            self.progress_line = false;
        }
    }
}

/// Percentage of `done` out of `total`; an empty total counts as complete.
#[allow(clippy::cast_precision_loss)]
pub fn percentage(done: u64, total: u64) -> f64 {
    if total == 0 {
        100.0
    } else {
        done as f64 / total as f64 * 100.0
    }
}

/// Ask a yes/no question on stdin; an empty answer means yes.
pub async fn confirm(question: &str) -> io::Result<bool> {
    print!("  {} [Y/n] ", question);
    io::stdout().flush()?;

    let mut input = String::new();
    let mut reader = BufReader::new(tokio::io::stdin());
    reader.read_line(&mut input).await?;
    let input = input.trim().to_lowercase();

    Ok(input.is_empty() || input == "y" || input == "yes")
}

/// Parse a duration string like "5m", "30s", or "1h".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(num_str) = s.strip_suffix('m') {
        let num: u64 = num_str.parse().ok()?;
        Some(Duration::from_secs(num * 60))
    } else if let Some(num_str) = s.strip_suffix('s') {
        let num: u64 = num_str.parse().ok()?;
        Some(Duration::from_secs(num))
    } else if let Some(num_str) = s.strip_suffix('h') {
        let num: u64 = num_str.parse().ok()?;
        Some(Duration::from_secs(num * 3600))
    } else {
        None
    }
}

/// Truncate a string to fit within a maximum width.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len - 1).collect();
        format!("{}…", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration(" 10s "), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("invalid"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn test_percentage() {
        assert!((percentage(50, 200) - 25.0).abs() < f64::EPSILON);
        assert!((percentage(0, 0) - 100.0).abs() < f64::EPSILON);
        assert!((percentage(10, 10) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("exactly10!", 10), "exactly10!");
        assert_eq!(truncate_string("this is too long", 10), "this is t…");
    }

    #[test]
    fn test_view_tracks_current_file() {
        let mut view = SessionView::new(true);
        view.show(&SessionEvent::FileStarted {
            filename: "a.txt".into(),
            size: 3,
        });
        assert_eq!(view.current_file, "a.txt");
        assert!(!view.progress_line);
    }
}
