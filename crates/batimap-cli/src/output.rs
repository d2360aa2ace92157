use console::style;
use serde::Serialize;
use std::fmt::Display;
use tabled::{settings::Style, Table, Tabled};

/// Output format mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(json: bool) -> Self {
        Self {
            format: if json { OutputFormat::Json } else { OutputFormat::Human },
        }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Status line on stderr, so that stdout stays parseable
    fn message(&self, status: &str, symbol: console::StyledObject<&str>, message: impl Display) {
        match self.format {
            OutputFormat::Human => eprintln!("{} {}", symbol, message),
            OutputFormat::Json => eprintln!(
                "{}",
                serde_json::json!({ "status": status, "message": message.to_string() })
            ),
        }
    }

    pub fn success(&self, message: impl Display) {
        self.message("success", style("✓").green().bold(), message);
    }

    pub fn info(&self, message: impl Display) {
        self.message("info", style("ℹ").blue().bold(), message);
    }

    pub fn warning(&self, message: impl Display) {
        self.message("warning", style("⚠").yellow().bold(), message);
    }

    pub fn error(&self, message: impl Display) {
        self.message("error", style("✗").red().bold(), message);
    }

    /// Rows as a table, or as `data` in JSON mode
    pub fn table<T: Tabled + Serialize>(&self, rows: Vec<T>) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Human if rows.is_empty() => println!("{}", style("(no data)").dim()),
            OutputFormat::Human => {
                let mut table = Table::new(rows);
                table.with(Style::rounded());
                println!("{}", table);
            }
            OutputFormat::Json => self.result(rows)?,
        }
        Ok(())
    }

    pub fn result<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        let text = match self.format {
            OutputFormat::Human => serde_json::to_string_pretty(&data)?,
            OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                "status": "success",
                "data": data,
            }))?,
        };
        println!("{}", text);
        Ok(())
    }

    pub fn kv(&self, key: impl Display, value: impl Display) {
        if self.format == OutputFormat::Human {
            println!("{}: {}", style(key).bold(), value);
        }
    }

    pub fn section(&self, title: impl Display) {
        if self.format == OutputFormat::Human {
            println!("\n{}", style(title).bold().underlined());
        }
    }
}
