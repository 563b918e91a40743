#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use homopair::align::GlobalAligner;
use homopair::domain::Identifier;
use homopair::error::HomopairError;
use homopair::fetch::SequenceFetcher;

pub fn id(value: &str) -> Identifier {
    value.parse().unwrap()
}

pub enum Answer {
    Found(&'static str),
    NotFound,
    Transient,
    PageDrift,
}

/// Fetcher answering from a fixed table and counting calls per identifier.
#[derive(Default)]
pub struct MockFetcher {
    answers: HashMap<String, Answer>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn with(mut self, id: &str, answer: Answer) -> Self {
        self.answers.insert(id.to_string(), answer);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl SequenceFetcher for MockFetcher {
    fn source(&self) -> &'static str {
        "mock"
    }

    fn fetch(&self, id: &Identifier) -> Result<Option<String>, HomopairError> {
        self.calls.lock().unwrap().push(id.to_string());
        match self.answers.get(id.as_str()) {
            Some(Answer::Found(value)) => Ok(Some(value.to_string())),
            Some(Answer::NotFound) | None => Ok(None),
            Some(Answer::Transient) => Err(HomopairError::NcbiHttp("timed out".to_string())),
            Some(Answer::PageDrift) => Err(HomopairError::PageStructure {
                source_name: "mock",
                message: "missing element".to_string(),
            }),
        }
    }
}

/// Aligner returning a fixed raw score, or exhaustion when `raw` is `None`.
pub struct FixedAligner {
    pub raw: Option<f64>,
    pub calls: Mutex<usize>,
}

impl FixedAligner {
    pub fn scoring(raw: f64) -> Self {
        Self {
            raw: Some(raw),
            calls: Mutex::new(0),
        }
    }

    pub fn exhausted() -> Self {
        Self {
            raw: None,
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl GlobalAligner for FixedAligner {
    fn score(&self, _a: &[u8], _b: &[u8]) -> Result<f64, HomopairError> {
        *self.calls.lock().unwrap() += 1;
        self.raw
            .ok_or_else(|| HomopairError::ResourceExhaustion("out of memory".to_string()))
    }
}
