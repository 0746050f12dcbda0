use std::io::{self, Write};

use serde::Serialize;

use crate::app::{PlanResult, ProgressEvent, ProgressSink, ValidateResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Json,
    Summary,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_plan(result: &PlanResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_validate(result: &ValidateResult) -> io::Result<()> {
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

pub struct SummaryOutput;

impl SummaryOutput {
    pub fn print_plan(result: &PlanResult) -> io::Result<()> {
        let mut stdout = io::stdout();
        writeln!(stdout, "output: {}", result.output)?;
        if let Some(notice) = &result.fallback {
            writeln!(
                stdout,
                "fallback: {} stages run on {} samples ({})",
                notice.missing,
                notice.substitute,
                notice.samples.len()
            )?;
        }
        writeln!(stdout, "stages: {}", result.stages.join(", "))?;
        writeln!(
            stdout,
            "graph: {} nodes, {} edges",
            result.graph.nodes().len(),
            result.graph.edges().len()
        )?;
        for id in result.graph.topological_order() {
            writeln!(stdout, "  {id}")?;
        }
        if let Some(files) = &result.persisted {
            writeln!(stdout, "wrote {}", files.experiment_table)?;
            writeln!(stdout, "wrote {}", files.config_snapshot)?;
        }
        Ok(())
    }

    pub fn print_validate(result: &ValidateResult) -> io::Result<()> {
        let mut stdout = io::stdout();
        writeln!(
            stdout,
            "{} experiments in groups: {}",
            result.samples,
            result.groups.join(", ")
        )?;
        writeln!(stdout, "stages: {}", result.stages.join(", "))?;
        Ok(())
    }
}

/// Forwards progress events to `tracing`.
pub struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => tracing::info!("{}", event.message),
        }
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}
