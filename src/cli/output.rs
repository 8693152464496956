//! Console output for the vlanprobe CLI.

use std::io::{self, Write};

use colored::Colorize;
use serde::Serialize;

use vlanprobe::orchestrator::RunOutcome;

/// Output formatter for human and JSON modes.
///
/// In JSON mode only [`document`](Self::document) writes to stdout; messages
/// go to stderr as one JSON object per line.
#[derive(Debug, Clone)]
pub struct OutputFormatter {
    use_color: bool,
    json_mode: bool,
    verbosity: u8,
}

impl OutputFormatter {
    pub fn new(use_color: bool, json_mode: bool, verbosity: u8) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && std::env::var_os("NO_COLOR").is_none();
        if !use_color {
            colored::control::set_override(false);
        }

        Self {
            use_color,
            json_mode,
            verbosity,
        }
    }

    pub fn is_json(&self) -> bool {
        self.json_mode
    }

    fn message(&self, kind: &str, message: &str) {
        let obj = serde_json::json!({ "type": kind, "message": message });
        eprintln!("{obj}");
    }

    /// Print a banner/header
    pub fn banner(&self, title: &str) {
        if self.json_mode {
            return;
        }

        let line = "=".repeat(title.len() + 4);
        if self.use_color {
            println!("\n{}", line.bright_blue());
            println!("{}", format!("  {title}  ").bright_blue().bold());
            println!("{}\n", line.bright_blue());
        } else {
            println!("\n{line}");
            println!("  {title}  ");
            println!("{line}\n");
        }
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        if self.json_mode {
            return;
        }

        if self.use_color {
            println!("\n{}", title.cyan().bold());
            println!("{}", "-".repeat(title.len()).cyan());
        } else {
            println!("\n{title}");
            println!("{}", "-".repeat(title.len()));
        }
    }

    pub fn error(&self, message: &str) {
        if self.json_mode {
            self.message("error", message);
        } else if self.use_color {
            eprintln!("{} {}", "ERROR:".red().bold(), message);
        } else {
            eprintln!("ERROR: {message}");
        }
    }

    pub fn warning(&self, message: &str) {
        if self.json_mode {
            self.message("warning", message);
        } else if self.use_color {
            eprintln!("{} {}", "WARNING:".yellow().bold(), message);
        } else {
            eprintln!("WARNING: {message}");
        }
    }

    pub fn success(&self, message: &str) {
        if self.json_mode {
            self.message("success", message);
        } else if self.use_color {
            println!("{} {}", "OK:".green().bold(), message);
        } else {
            println!("OK: {message}");
        }
    }

    /// Print an info message (respects verbosity)
    pub fn info(&self, message: &str) {
        if self.verbosity < 1 {
            return;
        }
        if self.json_mode {
            self.message("info", message);
        } else if self.use_color {
            println!("{} {}", "INFO:".blue(), message);
        } else {
            println!("INFO: {message}");
        }
    }

    /// Print preformatted text as-is (human mode only)
    pub fn plain(&self, text: &str) {
        if !self.json_mode {
            print!("{text}");
            if !text.ends_with('\n') {
                println!();
            }
        }
    }

    /// Print a list of items
    pub fn list(&self, title: &str, items: &[String]) {
        if self.json_mode || items.is_empty() {
            return;
        }

        if self.use_color {
            println!("\n{}:", title.bright_white().bold());
        } else {
            println!("\n{title}:");
        }
        for item in items {
            if self.use_color {
                println!("  {} {}", "-".bright_black(), item);
            } else {
                println!("  - {item}");
            }
        }
    }

    /// Print a table
    pub fn table(&self, headers: &[&str], rows: &[Vec<String>]) {
        if self.json_mode {
            return;
        }

        // Calculate column widths
        let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
        for row in rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(cell.len());
                }
            }
        }

        let header_line = render_row(headers.iter().copied(), &widths);
        let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        if self.use_color {
            println!("{}", header_line.bright_white().bold());
            println!("{}", sep.join("-+-").bright_black());
        } else {
            println!("{header_line}");
            println!("{}", sep.join("-+-"));
        }

        for row in rows {
            println!("{}", render_row(row.iter().map(String::as_str), &widths));
        }
    }

    /// Final verdict line of a run
    pub fn outcome(&self, outcome: RunOutcome) {
        if self.json_mode {
            return;
        }
        let text = format!("Result: {outcome}");
        if !self.use_color {
            println!("{text}");
            return;
        }
        match outcome {
            RunOutcome::Passed => println!("{}", text.green().bold()),
            RunOutcome::PassedRollbackFailed => println!("{}", text.yellow().bold()),
            RunOutcome::Failed => println!("{}", text.red().bold()),
        }
    }

    /// Print a structured document to stdout as pretty JSON.
    pub fn document<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        self.flush();
        Ok(())
    }

    pub fn flush(&self) {
        let _ = io::stdout().flush();
    }
}

fn render_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| format!("{cell:width$}"))
        .collect::<Vec<_>>()
        .join(" | ")
}
