//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use std::io::{self, Write};

use indicatif::{ProgressBar, ProgressStyle};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Progress bar for a long-running command
    ///
    /// Only drawn in human mode; `len` of `None` gives a spinner.
    pub fn progress(&self, len: Option<u64>) -> ProgressBar {
        if self.format != OutputFormat::Human {
            return ProgressBar::hidden();
        }

        match len {
            Some(len) => {
                let bar = ProgressBar::new(len);
                if let Ok(style) = ProgressStyle::default_bar()
                    .template("{bar:40} {pos}/{len} keys [{elapsed_precise}] {per_sec}")
                {
                    bar.set_style(style);
                }
                bar
            }
            None => {
                let spinner = ProgressBar::new_spinner();
                if let Ok(style) =
                    ProgressStyle::default_spinner().template("{spinner} {pos} keys [{elapsed_precise}]")
                {
                    spinner.set_style(style);
                }
                spinner
            }
        }
    }

    /// Print a list of keys
    pub fn print_keys(&self, keys: &[String]) {
        match self.format {
            OutputFormat::Human => {
                if keys.is_empty() {
                    println!("No keys found.");
                    return;
                }
                for key in keys {
                    println!("{}", key);
                }
                println!("\n{} key(s)", keys.len());
            }
            OutputFormat::Json => {
                println!("{}", serde_json::json!(keys));
            }
            OutputFormat::Quiet => {
                for key in keys {
                    println!("{}", key);
                }
            }
        }
    }

    /// Print a stored value
    ///
    /// Raw bytes go to stdout untouched unless JSON was requested.
    pub fn print_value(&self, key: &str, value: &[u8]) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                let text = String::from_utf8_lossy(value);
                println!(
                    "{}",
                    serde_json::json!({"key": key, "value": text, "size": value.len()})
                );
                Ok(())
            }
            OutputFormat::Human | OutputFormat::Quiet => {
                let stdout = io::stdout();
                let mut out = stdout.lock();
                out.write_all(value)?;
                out.flush()
            }
        }
    }

    /// Print a key count
    pub fn print_count(&self, count: usize) {
        match self.format {
            OutputFormat::Human => println!("{} key(s)", count),
            OutputFormat::Json => println!("{}", serde_json::json!({"count": count})),
            OutputFormat::Quiet => println!("{}", count),
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}
