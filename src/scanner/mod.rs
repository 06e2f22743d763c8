use std::future::Future;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::catalog::{Catalog, CatalogError};
use crate::probe::{self, HttpTransport, ProbeOutcome, Transport, TransportBuildError, Verdict};

pub const DEFAULT_CONCURRENCY: usize = 10;

#[derive(Clone, Debug)]
pub struct ScanOptions {
    /// Maximum number of probes in flight at once.
    pub concurrency: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    #[error("unsupported scheme '{scheme}' in {url}, expected http or https")]
    UnsupportedScheme { url: String, scheme: String },

    #[error("invalid concurrency {value}, expected positive integer")]
    InvalidConcurrency { value: usize },

    #[error("scan interrupted after {completed}/{total} paths ({found} results gathered)")]
    Interrupted {
        completed: usize,
        total: usize,
        found: usize,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Transport(#[from] TransportBuildError),
}

/// Emitted once per completed probe, in completion order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressEvent {
    pub verdict: Verdict,
    pub url: String,
    pub status: Option<u16>,
    pub completed: usize,
    pub total: usize,
}

#[derive(Clone, Debug)]
pub struct ScanReport {
    pub target: String,
    /// Reportable URLs in the order their probes finished.
    pub results: Vec<String>,
    pub outcomes: Vec<ProbeOutcome>,
    pub elapsed: Duration,
}

impl ScanReport {
    pub fn probed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn count(&self, verdict: Verdict) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.verdict() == verdict)
            .count()
    }
}

#[derive(Debug)]
pub struct Scanner<T> {
    transport: T,
    catalog: Catalog,
    options: ScanOptions,
}

impl Scanner<HttpTransport> {
    pub fn with_http(
        transport: &probe::TransportConfig,
        catalog: Catalog,
        options: ScanOptions,
    ) -> Result<Self, ScanError> {
        let transport = HttpTransport::new(transport)?;
        Self::new(transport, catalog, options)
    }
}

impl<T: Transport> Scanner<T> {
    pub fn new(transport: T, catalog: Catalog, options: ScanOptions) -> Result<Self, ScanError> {
        if options.concurrency == 0 {
            return Err(ScanError::InvalidConcurrency {
                value: options.concurrency,
            });
        }
        if catalog.is_empty() {
            return Err(ScanError::Catalog(CatalogError::Empty));
        }
        Ok(Self {
            transport,
            catalog,
            options,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Probes every catalog path against `base` and returns once all of them
    /// have completed.
    pub async fn scan(
        &self,
        base: &str,
        events: Option<mpsc::Sender<ProgressEvent>>,
    ) -> Result<ScanReport, ScanError> {
        self.scan_until(base, events, std::future::pending()).await
    }

    /// Like [`Scanner::scan`], but gives up as soon as `shutdown` resolves.
    /// Probes still in flight at that point are dropped and no report is
    /// produced.
    pub async fn scan_until<F>(
        &self,
        base: &str,
        events: Option<mpsc::Sender<ProgressEvent>>,
        shutdown: F,
    ) -> Result<ScanReport, ScanError>
    where
        F: Future<Output = ()>,
    {
        let target = validate_base(base)?;
        let started_at = Instant::now();
        let total = self.catalog.len();
        info!(
            url = %target,
            paths = total,
            concurrency = self.options.concurrency,
            "starting upload path scan"
        );

        tokio::pin!(shutdown);
        let mut events = events;
        let mut results: Vec<String> = Vec::new();
        let mut outcomes: Vec<ProbeOutcome> = Vec::with_capacity(total);

        // the stream borrows `target`, so it must be gone before the report takes it
        {
            let transport = &self.transport;
            let base_url = target.as_str();
            let pending = stream::iter(self.catalog.iter())
                .map(|path| probe::probe(transport, base_url, path))
                .buffer_unordered(self.options.concurrency);
            tokio::pin!(pending);

            loop {
                let outcome = tokio::select! {
                    biased;
                    _ = &mut shutdown => {
                        info!(
                            url = %target,
                            completed = outcomes.len(),
                            total,
                            "scan interrupted"
                        );
                        return Err(ScanError::Interrupted {
                            completed: outcomes.len(),
                            total,
                            found: results.len(),
                        });
                    }
                    next = pending.next() => match next {
                        Some(outcome) => outcome,
                        None => break,
                    },
                };

                let verdict = outcome.verdict();
                if verdict.is_reportable() {
                    results.push(outcome.url.clone());
                }
                let event = ProgressEvent {
                    verdict,
                    url: outcome.url.clone(),
                    status: outcome.status,
                    completed: outcomes.len() + 1,
                    total,
                };
                outcomes.push(outcome);

                if let Some(tx) = events.as_ref() {
                    if tx.send(event).await.is_err() {
                        debug!("progress receiver closed, no further events");
                        events = None;
                    }
                }
            }
        }

        let elapsed = started_at.elapsed();
        info!(
            url = %target,
            results = results.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "scan completed"
        );
        Ok(ScanReport {
            target,
            results,
            outcomes,
            elapsed,
        })
    }
}

fn validate_base(base: &str) -> Result<String, ScanError> {
    let parsed = reqwest::Url::parse(base).map_err(|_| ScanError::InvalidUrl {
        url: base.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ScanError::UnsupportedScheme {
                url: base.to_string(),
                scheme: other.to_string(),
            })
        }
    }
    if parsed.host_str().is_none() {
        return Err(ScanError::InvalidUrl {
            url: base.to_string(),
        });
    }
    Ok(base.to_string())
}
