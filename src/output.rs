use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ImportSummary, NormalizeResult, ProgressEvent, ProgressSink};
use crate::sources::SourceDefinition;

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_normalized(result: &NormalizeResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_summary(summary: &ImportSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_sources(sources: &[SourceDefinition]) -> io::Result<()> {
        Self::print_json(&sources)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

/// Reports progress as `debug` log lines on stderr.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => {
                tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message)
            }
            None => tracing::debug!("{}", event.message),
        }
    }
}
