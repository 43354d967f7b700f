use std::io::{self, Write};

use serde::Serialize;

use crate::app::{InspectResult, PrepareResult, ProgressEvent, ProgressSink};
use crate::export::ExportSummary;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_prepare(result: &PrepareResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_inspect(result: &InspectResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => tracing::info!("{}", event.message),
        }
    }
}

pub fn summary_line(summary: &ExportSummary) -> String {
    format!(
        "{} images skipped over {} initial images so {} images saved",
        summary.skipped, summary.total, summary.saved
    )
}

pub fn print_prepare_summary(result: &PrepareResult) {
    println!("{}", summary_line(&result.summary));
    for subset in &result.summary.subsets {
        println!(
            "  {:<10} saved={:<8} skipped={}",
            subset.subset, subset.saved, subset.skipped
        );
    }
    println!("Movies linked: {}", result.movies_linked);
    println!("Archive: {}", result.summary.archive);
    if let Some(key) = &result.uploaded_key {
        println!("Uploaded: {key}");
    }
}

pub fn print_inspect_summary(result: &InspectResult) {
    println!("Total datapoints in catalog: {}", result.records);
    println!("Movies in catalog: {}", result.movies);
    println!("Movies linked: {}", result.movies_linked);
    println!("Datapoints linked: {}", result.datapoints);
    for (class, count) in &result.classes {
        println!("  {:<7} {count}", class.as_str());
    }
}
