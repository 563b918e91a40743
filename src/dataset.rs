use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};

use bio::io::fasta;
use camino::Utf8Path;
use flate2::read::MultiGzDecoder;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{Identifier, NamedSequence};
use crate::error::HomopairError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    #[default]
    FirstSeen,
    Lexicographic,
}

#[derive(Debug, Clone)]
pub struct LocalDataset {
    name: String,
    records: Vec<(String, Identifier)>,
    index: HashMap<Identifier, Vec<usize>>,
}

impl LocalDataset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn from_records<I, V>(name: impl Into<String>, records: I) -> Self
    where
        I: IntoIterator<Item = (V, Identifier)>,
        V: Into<String>,
    {
        let mut dataset = Self::new(name);
        for (value, id) in records {
            dataset.insert(value, id);
        }
        dataset
    }

    pub fn insert(&mut self, value: impl Into<String>, id: Identifier) {
        let position = self.records.len();
        self.index.entry(id.clone()).or_default().push(position);
        self.records.push((value.into(), id));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &Identifier) -> bool {
        self.index.contains_key(id)
    }

    pub fn candidates(&self, id: &Identifier) -> Vec<&str> {
        self.index
            .get(id)
            .map(|positions| {
                positions
                    .iter()
                    .map(|&pos| self.records[pos].0.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn lookup(&self, id: &Identifier, tie_break: TieBreak) -> Option<&str> {
        let candidates = self.candidates(id);
        if candidates.len() > 1 {
            warn!(
                dataset = %self.name,
                identifier = %id,
                candidates = candidates.len(),
                ?tie_break,
                "ambiguous dataset lookup"
            );
        }
        match tie_break {
            TieBreak::FirstSeen => candidates.first().copied(),
            TieBreak::Lexicographic => candidates.into_iter().min(),
        }
    }

    pub fn from_fasta(path: &Utf8Path, prefix: Option<&str>) -> Result<Self, HomopairError> {
        let mut dataset = Self::new(path.file_name().unwrap_or(path.as_str()));
        for (id, sequence) in read_fasta(path, prefix)? {
            dataset.insert(sequence, id);
        }
        debug!(dataset = %dataset.name, records = dataset.len(), "loaded FASTA dataset");
        Ok(dataset)
    }

    pub fn from_tsv(path: &Utf8Path) -> Result<Self, HomopairError> {
        let reader = open_maybe_gz(path)?;
        let mut dataset = Self::new(path.file_name().unwrap_or(path.as_str()));
        for (line_no, line) in reader.lines().enumerate() {
            let line = line.map_err(|err| HomopairError::Filesystem(err.to_string()))?;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((value, id)) = line.split_once('\t') else {
                return Err(HomopairError::Dataset {
                    path: path.to_string(),
                    message: format!("line {}: expected two tab-separated columns", line_no + 1),
                });
            };
            match id.parse() {
                Ok(id) => dataset.insert(value.trim(), id),
                Err(_) => warn!(path = %path, line = line_no + 1, "skipping record without identifier"),
            }
        }
        Ok(dataset)
    }

    pub fn load(path: &Utf8Path, prefix: Option<&str>) -> Result<Self, HomopairError> {
        let name = path.as_str().trim_end_matches(".gz");
        if name.ends_with(".tsv") || name.ends_with(".txt") {
            Self::from_tsv(path)
        } else {
            Self::from_fasta(path, prefix)
        }
    }
}

pub fn read_fasta_sequences(path: &Utf8Path) -> Result<Vec<NamedSequence>, HomopairError> {
    Ok(read_fasta(path, None)?
        .into_iter()
        .map(|(id, sequence)| NamedSequence::new(id, sequence))
        .collect())
}

fn read_fasta(
    path: &Utf8Path,
    prefix: Option<&str>,
) -> Result<Vec<(Identifier, String)>, HomopairError> {
    let invalid = |index: usize, message: String| HomopairError::Dataset {
        path: path.to_string(),
        message: format!("record {}: {message}", index + 1),
    };
    let reader = fasta::Reader::from_bufread(open_maybe_gz(path)?);
    let mut records = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|err| invalid(index, err.to_string()))?;
        if prefix.is_some_and(|prefix| !record.id().starts_with(prefix)) {
            continue;
        }
        let id: Identifier = record
            .id()
            .parse()
            .map_err(|_| invalid(index, "header without a name".to_string()))?;
        let sequence = String::from_utf8(record.seq().to_vec())
            .map_err(|err| invalid(index, err.to_string()))?;
        records.push((id, sequence));
    }
    Ok(records)
}

fn open_maybe_gz(path: &Utf8Path) -> Result<Box<dyn BufRead>, HomopairError> {
    let file = File::open(path.as_std_path())
        .map_err(|err| HomopairError::Filesystem(format!("open {path}: {err}")))?;
    let reader: Box<dyn Read> = if path.extension() == Some("gz") {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(Box::new(BufReader::new(reader)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: &str) -> Identifier {
        value.parse().unwrap()
    }

    #[test]
    fn tie_break_rules() {
        let dataset = LocalDataset::from_records(
            "mature",
            [
                ("UUGACAGAAGAUAGAGAGCAC", id("ath-miR156a-5p")),
                ("UGACAGAAGAGAGUGAGCAC", id("ath-miR156a-5p")),
            ],
        );
        assert_eq!(
            dataset.lookup(&id("ath-miR156a-5p"), TieBreak::FirstSeen),
            Some("UUGACAGAAGAUAGAGAGCAC")
        );
        assert_eq!(
            dataset.lookup(&id("ath-miR156a-5p"), TieBreak::Lexicographic),
            Some("UGACAGAAGAGAGUGAGCAC")
        );
        assert_eq!(dataset.lookup(&id("ath-miR999"), TieBreak::FirstSeen), None);
    }
}
