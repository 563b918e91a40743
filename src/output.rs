use std::collections::BTreeMap;
use std::io::{self, Write};

use serde::Serialize;
use tracing::info;

use crate::batch::{AlignReport, ProgressEvent, ProgressSink, ResolveReport};
use crate::domain::ResourceKind;
use crate::resolver::Resolution;
use crate::scorer::StoredAlignment;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_resolve(report: &ResolveReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_align(report: &AlignReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_status(counts: &BTreeMap<ResourceKind, usize>) -> io::Result<()> {
        Self::print_json(counts)
    }

    pub fn print_record(record: &Option<Resolution>) -> io::Result<()> {
        Self::print_json(record)
    }

    pub fn print_alignment(record: &Option<StoredAlignment>) -> io::Result<()> {
        Self::print_json(record)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => info!("{}", event.message),
        }
    }
}
