use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::HomopairError;

pub const SENTINEL: &str = "-";

pub const PLANT_LOCUS_PREFIX: &str = "AT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    MirnaSequence,
    TargetName,
    TargetSequence,
    Alignment,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::MirnaSequence,
        ResourceKind::TargetName,
        ResourceKind::TargetSequence,
        ResourceKind::Alignment,
    ];

    pub fn namespace(self) -> &'static str {
        match self {
            ResourceKind::MirnaSequence => "mirna_sequences",
            ResourceKind::TargetName => "target_names",
            ResourceKind::TargetSequence => "target_sequences",
            ResourceKind::Alignment => "alignments",
        }
    }

    pub fn record_suffix(self) -> Option<&'static str> {
        match self {
            ResourceKind::MirnaSequence | ResourceKind::TargetSequence => Some("sequence"),
            ResourceKind::TargetName => Some("name"),
            ResourceKind::Alignment => None,
        }
    }

    pub fn admits(self, id: &Identifier) -> bool {
        match self {
            ResourceKind::TargetName => id.as_str().starts_with(PLANT_LOCUS_PREFIX),
            _ => true,
        }
    }

    pub fn is_target(self) -> bool {
        matches!(self, ResourceKind::TargetName | ResourceKind::TargetSequence)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::MirnaSequence => write!(f, "mirna-sequence"),
            ResourceKind::TargetName => write!(f, "target-name"),
            ResourceKind::TargetSequence => write!(f, "target-sequence"),
            ResourceKind::Alignment => write!(f, "alignment"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identifier(String);

impl Identifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn without_variant(&self) -> Identifier {
        match self.0.split_once('.') {
            Some((locus, _)) if !locus.is_empty() => Identifier(locus.to_string()),
            _ => self.clone(),
        }
    }

    pub fn record_key(&self, suffix: &str) -> String {
        format!("{}_{suffix}", self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Identifier {
    type Err = HomopairError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(HomopairError::InvalidIdentifier(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey {
    reference: Identifier,
    comparison: Identifier,
}

impl PairKey {
    pub fn new(reference: Identifier, comparison: Identifier) -> Self {
        Self {
            reference,
            comparison,
        }
    }

    pub fn reference(&self) -> &Identifier {
        &self.reference
    }

    pub fn comparison(&self) -> &Identifier {
        &self.comparison
    }

    pub fn time_key(&self) -> String {
        format!("{self}_time")
    }

    pub fn score_key(&self) -> String {
        format!("{self}_score")
    }

    pub fn sequences_key(&self) -> String {
        format!("{self}_sequences")
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.reference, self.comparison)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedSequence {
    pub id: Identifier,
    pub sequence: String,
}

impl NamedSequence {
    pub fn new(id: Identifier, sequence: impl Into<String>) -> Self {
        Self {
            id,
            sequence: sequence.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn is_alignable(&self) -> bool {
        !self.sequence.is_empty() && self.sequence != SENTINEL
    }
}

pub fn is_sentinel(value: &str) -> bool {
    value == SENTINEL
}
