use crate::cli::args::OutputFormat;
use crate::core::exchange::{ExchangeEvent, SessionReport};
use crate::core::frame::{CommandFrame, FieldSpec, COMMAND_LAYOUT};
use crate::domain::error::FrameError;
use serde_json::json;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use tabled::{Table, Tabled};

/// Output writer trait for different formats
pub trait OutputWriter {
    fn write_event(&self, event: &ExchangeEvent) -> Result<(), OutputError>;
    fn write_report(&self, report: &SessionReport) -> Result<(), OutputError>;
    fn write_layout(&self, frame: &CommandFrame) -> Result<(), OutputError>;
    fn write_message(&self, message: &str) -> Result<(), OutputError>;
    fn write_error(&self, error: &str) -> Result<(), OutputError>;
}

/// Output formatting errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Frame error: {0}")]
    FrameError(#[from] FrameError),
}

impl From<OutputError> for crate::domain::error::PaiCoreError {
    fn from(err: OutputError) -> Self {
        Self::Output(err.to_string())
    }
}

/// Table row for one command field
#[derive(Tabled)]
struct LayoutRow {
    field: &'static str,
    bits: String,
    width: u32,
    value: String,
}

impl LayoutRow {
    fn new(field: &FieldSpec, frame: &CommandFrame) -> Result<Self, FrameError> {
        let value = field.unpack(frame.as_bytes())?;
        let bits = field
            .segments()
            .iter()
            .map(|segment| segment.to_string())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(Self {
            field: field.name,
            bits,
            width: field.width,
            value: if field.width > 16 {
                format!("0x{:X}", value)
            } else {
                value.to_string()
            },
        })
    }
}

fn layout_table(frame: &CommandFrame) -> Result<String, OutputError> {
    let rows = COMMAND_LAYOUT
        .fields
        .iter()
        .map(|field| LayoutRow::new(field, frame))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Table::new(rows).to_string())
}

fn layout_json(frame: &CommandFrame) -> Result<serde_json::Value, OutputError> {
    let mut fields = Vec::with_capacity(COMMAND_LAYOUT.fields.len());
    for field in COMMAND_LAYOUT.fields {
        fields.push(json!({
            "name": field.name,
            "offset": field.offset,
            "width": field.width,
            "value": field.unpack(frame.as_bytes())?,
        }));
    }

    Ok(json!({
        "frame": frame.to_hex(),
        "fields": fields,
    }))
}

fn report_lines(report: &SessionReport) -> Vec<String> {
    let mut lines = vec![
        format!("Session {}: {}", report.session_id, report.outcome),
        format!("  Command: {}", report.command),
        format!("  Rounds: {}/{}", report.rounds_completed, report.repeat_count),
        format!("  Mismatches: {}", report.mismatches),
    ];
    if report.aborted {
        lines.push("  Aborted: transport failure".to_string());
    }
    lines
}

/// Console output writer
pub struct ConsoleWriter {
    format: OutputFormat,
}

impl ConsoleWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl OutputWriter for ConsoleWriter {
    fn write_event(&self, event: &ExchangeEvent) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => println!("{}", event),
            // stdout carries a single JSON document
            OutputFormat::Json => eprintln!("{}", event),
        }
        Ok(())
    }

    fn write_report(&self, report: &SessionReport) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                for line in report_lines(report) {
                    println!("{}", line);
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(report)?);
            }
        }
        Ok(())
    }

    fn write_layout(&self, frame: &CommandFrame) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                println!("Frame: {}", frame);
                println!("{}", layout_table(frame)?);
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&layout_json(frame)?)?);
            }
        }
        Ok(())
    }

    fn write_message(&self, message: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => println!("{}", message),
            OutputFormat::Json => eprintln!("{}", message),
        }
        Ok(())
    }

    fn write_error(&self, error: &str) -> Result<(), OutputError> {
        eprintln!("Error: {}", error);
        Ok(())
    }
}

/// Appends plain text lines to a log file
pub struct FileWriter {
    path: PathBuf,
}

impl FileWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn append_lines<I, S>(&self, lines: I) -> Result<(), OutputError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        for line in lines {
            writeln!(file, "{}", line.as_ref())?;
        }
        Ok(())
    }
}

impl OutputWriter for FileWriter {
    fn write_event(&self, event: &ExchangeEvent) -> Result<(), OutputError> {
        self.append_lines([event.to_string()])
    }

    fn write_report(&self, report: &SessionReport) -> Result<(), OutputError> {
        self.append_lines(report_lines(report))
    }

    fn write_layout(&self, frame: &CommandFrame) -> Result<(), OutputError> {
        self.append_lines([format!("Frame: {}", frame), layout_table(frame)?])
    }

    fn write_message(&self, message: &str) -> Result<(), OutputError> {
        self.append_lines([message])
    }

    fn write_error(&self, error: &str) -> Result<(), OutputError> {
        self.append_lines([format!("Error: {}", error)])
    }
}

/// Forwards every call to each inner writer
pub struct TeeWriter {
    writers: Vec<Box<dyn OutputWriter>>,
}

impl TeeWriter {
    pub fn new(writers: Vec<Box<dyn OutputWriter>>) -> Self {
        Self { writers }
    }

    fn each<F>(&self, mut op: F) -> Result<(), OutputError>
    where
        F: FnMut(&dyn OutputWriter) -> Result<(), OutputError>,
    {
        let mut first_error = None;
        for writer in &self.writers {
            if let Err(e) = op(writer.as_ref()) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl OutputWriter for TeeWriter {
    fn write_event(&self, event: &ExchangeEvent) -> Result<(), OutputError> {
        self.each(|writer| writer.write_event(event))
    }

    fn write_report(&self, report: &SessionReport) -> Result<(), OutputError> {
        self.each(|writer| writer.write_report(report))
    }

    fn write_layout(&self, frame: &CommandFrame) -> Result<(), OutputError> {
        self.each(|writer| writer.write_layout(frame))
    }

    fn write_message(&self, message: &str) -> Result<(), OutputError> {
        self.each(|writer| writer.write_message(message))
    }

    fn write_error(&self, error: &str) -> Result<(), OutputError> {
        self.each(|writer| writer.write_error(error))
    }
}
