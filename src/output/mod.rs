use serde::Serialize;
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::probe::Verdict;
use crate::scanner::ScanReport;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn infer_format_from_path(path: &str) -> Option<OutputFormat> {
    let lower = path.trim().to_lowercase();
    if lower.ends_with(".json") {
        return Some(OutputFormat::Json);
    }
    if lower.ends_with(".txt") {
        return Some(OutputFormat::Text);
    }
    None
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to open output file: {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write output file: {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize results: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    target: &'a str,
    probed: usize,
    found: usize,
    possible: usize,
    results: &'a [String],
}

// one URL per line, no header or footer
pub fn render_text(results: &[String]) -> Vec<u8> {
    let mut out = String::new();
    for url in results {
        out.push_str(url);
        out.push('\n');
    }
    out.into_bytes()
}

pub fn render_json(report: &ScanReport) -> Result<Vec<u8>, OutputError> {
    let doc = JsonReport {
        target: &report.target,
        probed: report.probed(),
        found: report.count(Verdict::Found),
        possible: report.count(Verdict::Possible),
        results: &report.results,
    };
    let mut out =
        serde_json::to_vec_pretty(&doc).map_err(|e| OutputError::Serialize { source: e })?;
    out.push(b'\n');
    Ok(out)
}

pub fn render(report: &ScanReport, format: OutputFormat) -> Result<Vec<u8>, OutputError> {
    match format {
        OutputFormat::Text => Ok(render_text(&report.results)),
        OutputFormat::Json => render_json(report),
    }
}

/// Writes `rendered` to `path`, replacing any previous contents.
pub async fn write_results(path: &str, rendered: &[u8]) -> Result<(), OutputError> {
    let mut outfile = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .await
        .map_err(|e| OutputError::Open {
            path: path.to_string(),
            source: e,
        })?;
    outfile
        .write_all(rendered)
        .await
        .map_err(|e| OutputError::Write {
            path: path.to_string(),
            source: e,
        })?;
    outfile.flush().await.map_err(|e| OutputError::Write {
        path: path.to_string(),
        source: e,
    })
}
