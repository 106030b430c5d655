//! The `run` command: every selected source, one cycle each, in order.
//!
//! Sources are isolated: a failed cycle is recorded and the next source
//! still runs. The process exit status is non-zero iff any cycle failed.

use std::process::ExitCode;
use std::time::Instant;

use noticefeed_client::{Fetcher, Sleeper};
use noticefeed_core::{AppConfig, CacheStore, Clock, SourceConfig};

use crate::cycle::{Cycle, Outcome};

/// Per-source outcomes of one invocation.
#[derive(Debug, Default)]
pub struct RunReport {
    pub cycles: Vec<SourceReport>,
}

#[derive(Debug)]
pub struct SourceReport {
    pub source: String,
    pub outcome: Outcome,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn failed(&self) -> usize {
        self.cycles.iter().filter(|c| c.outcome.is_failed()).count()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE }
    }

    /// Log one line per source, then the totals, and print the table to stdout.
    pub fn summarize(&self) {
        for cycle in &self.cycles {
            if cycle.outcome.is_failed() {
                tracing::error!(source = %cycle.source, elapsed_ms = cycle.elapsed_ms, outcome = %cycle.outcome, "source summary");
            } else {
                tracing::info!(source = %cycle.source, elapsed_ms = cycle.elapsed_ms, outcome = %cycle.outcome, "source summary");
            }
            println!("{:<24} {}", cycle.source, cycle.outcome);
        }
        tracing::info!(sources = self.cycles.len(), failed = self.failed(), "run finished");
    }
}

/// Shared collaborators of a run.
pub struct Runner<'a> {
    pub config: &'a AppConfig,
    pub fetcher: &'a dyn Fetcher,
    pub sleeper: &'a dyn Sleeper,
    pub clock: &'a dyn Clock,
}

impl Runner<'_> {
    pub async fn run(&self, sources: &[&SourceConfig]) -> RunReport {
        let store = CacheStore::new(&self.config.cache_dir);
        let mut report = RunReport::default();

        for source in sources {
            tracing::info!(source = %source.id, url = %source.url, "cycle start");
            let started = Instant::now();

            let cycle = Cycle {
                source,
                feed_path: self.config.output_path(source),
                store: &store,
                fetcher: self.fetcher,
                sleeper: self.sleeper,
                clock: self.clock,
            };
            let outcome = cycle.run().await;

            report.cycles.push(SourceReport {
                source: source.id.clone(),
                outcome,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }

        report
    }
}
