use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::HomopairError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringProfile {
    #[serde(rename = "match")]
    pub match_score: f64,
    pub mismatch: f64,
    pub gap_open: f64,
    pub gap_extend: f64,
}

impl ScoringProfile {
    pub const STANDARD: ScoringProfile = ScoringProfile {
        match_score: 1.0,
        mismatch: -1.0,
        gap_open: -0.3,
        gap_extend: -0.1,
    };

    pub const STRICT: ScoringProfile = ScoringProfile {
        match_score: 1.0,
        mismatch: -2.0,
        gap_open: -0.5,
        gap_extend: -0.2,
    };

    pub fn validate(&self) -> Result<(), HomopairError> {
        let values = [self.match_score, self.mismatch, self.gap_open, self.gap_extend];
        if values.iter().any(|value| !value.is_finite()) {
            return Err(HomopairError::InvalidConfig(
                "scoring values must be finite".to_string(),
            ));
        }
        if self.match_score <= 0.0 {
            return Err(HomopairError::InvalidConfig(
                "match score must be positive".to_string(),
            ));
        }
        if self.mismatch > 0.0 || self.gap_open > 0.0 || self.gap_extend > 0.0 {
            return Err(HomopairError::InvalidConfig(
                "mismatch and gap penalties must be zero or negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProfileName {
    Standard,
    Strict,
}

impl ProfileName {
    pub fn profile(self) -> ScoringProfile {
        match self {
            ProfileName::Standard => ScoringProfile::STANDARD,
            ProfileName::Strict => ScoringProfile::STRICT,
        }
    }

    pub fn default_threshold(self) -> f64 {
        match self {
            ProfileName::Standard => 0.65,
            ProfileName::Strict => 0.6,
        }
    }
}

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileName::Standard => write!(f, "standard"),
            ProfileName::Strict => write!(f, "strict"),
        }
    }
}

impl FromStr for ProfileName {
    type Err = HomopairError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(ProfileName::Standard),
            "strict" => Ok(ProfileName::Strict),
            _ => Err(HomopairError::UnknownProfile(value.to_string())),
        }
    }
}

pub trait GlobalAligner: Send + Sync {
    fn score(&self, a: &[u8], b: &[u8]) -> Result<f64, HomopairError>;
}

impl<A: GlobalAligner + ?Sized> GlobalAligner for Arc<A> {
    fn score(&self, a: &[u8], b: &[u8]) -> Result<f64, HomopairError> {
        (**self).score(a, b)
    }
}

#[derive(Debug, Clone)]
pub struct AffineAligner {
    profile: ScoringProfile,
    max_cells: Option<u64>,
}

impl AffineAligner {
    pub fn new(profile: ScoringProfile) -> Self {
        Self {
            profile,
            max_cells: None,
        }
    }

    pub fn with_max_cells(mut self, cells: u64) -> Self {
        self.max_cells = Some(cells);
        self
    }

    pub fn profile(&self) -> &ScoringProfile {
        &self.profile
    }

    fn gap(&self, len: usize) -> f64 {
        if len == 0 {
            0.0
        } else {
            self.profile.gap_open + (len - 1) as f64 * self.profile.gap_extend
        }
    }

    fn substitution(&self, x: u8, y: u8) -> f64 {
        if x.eq_ignore_ascii_case(&y) {
            self.profile.match_score
        } else {
            self.profile.mismatch
        }
    }
}

impl GlobalAligner for AffineAligner {
    fn score(&self, a: &[u8], b: &[u8]) -> Result<f64, HomopairError> {
        // Columns follow the shorter sequence; the score is symmetric.
        let (rows, cols) = if a.len() >= b.len() { (a, b) } else { (b, a) };
        if cols.is_empty() {
            return Ok(self.gap(rows.len()));
        }

        let cells = rows.len() as u64 * cols.len() as u64;
        if let Some(limit) = self.max_cells {
            if cells > limit {
                return Err(HomopairError::ResourceExhaustion(format!(
                    "{}x{} matrix exceeds the {limit} cell budget",
                    rows.len(),
                    cols.len()
                )));
            }
        }

        let width = cols.len() + 1;
        let mut buffers: [Vec<f64>; 6] = Default::default();
        for buffer in buffers.iter_mut() {
            buffer.try_reserve_exact(width).map_err(|err| {
                HomopairError::ResourceExhaustion(format!(
                    "{}x{} alignment: {err}",
                    rows.len(),
                    cols.len()
                ))
            })?;
            buffer.resize(width, f64::NEG_INFINITY);
        }
        let [mut m_prev, mut x_prev, mut y_prev, mut m_cur, mut x_cur, mut y_cur] = buffers;

        // Row 0: only horizontal gaps reach it.
        m_prev[0] = 0.0;
        for j in 1..width {
            y_prev[j] = self.gap(j);
        }

        let open = self.profile.gap_open;
        let extend = self.profile.gap_extend;
        for (i, &row_base) in rows.iter().enumerate() {
            m_cur[0] = f64::NEG_INFINITY;
            y_cur[0] = f64::NEG_INFINITY;
            x_cur[0] = self.gap(i + 1);
            for j in 1..width {
                let diagonal = m_prev[j - 1].max(x_prev[j - 1]).max(y_prev[j - 1]);
                m_cur[j] = diagonal + self.substitution(row_base, cols[j - 1]);
                x_cur[j] = (m_prev[j] + open)
                    .max(x_prev[j] + extend)
                    .max(y_prev[j] + open);
                y_cur[j] = (m_cur[j - 1] + open)
                    .max(y_cur[j - 1] + extend)
                    .max(x_cur[j - 1] + open);
            }
            std::mem::swap(&mut m_prev, &mut m_cur);
            std::mem::swap(&mut x_prev, &mut x_cur);
            std::mem::swap(&mut y_prev, &mut y_cur);
        }

        let last = width - 1;
        Ok(m_prev[last].max(x_prev[last]).max(y_prev[last]))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn identical_sequences_score_their_length() {
        let aligner = AffineAligner::new(ScoringProfile::STANDARD);
        let score = aligner.score(b"ACGTACGTAC", b"ACGTACGTAC").unwrap();
        assert!(close(score, 10.0));
    }

    #[test]
    fn two_gap_openings_beat_a_mismatch() {
        let aligner = AffineAligner::new(ScoringProfile::STANDARD);
        // ACG-TA / AC-CTA: four matches and two openings.
        let score = aligner.score(b"ACGTA", b"ACCTA").unwrap();
        assert!(close(score, 3.4));
    }

    #[test]
    fn affine_gap_cost() {
        let aligner = AffineAligner::new(ScoringProfile::STANDARD);
        // Four matches plus one gap of length two: 4 - 0.3 - 0.1.
        let score = aligner.score(b"ACGGTA", b"ACTA").unwrap();
        assert!(close(score, 3.6));
        let swapped = aligner.score(b"ACTA", b"ACGGTA").unwrap();
        assert!(close(score, swapped));
    }

    #[test]
    fn end_gaps_are_penalized() {
        let aligner = AffineAligner::new(ScoringProfile::STANDARD);
        let score = aligner.score(b"AAAACC", b"AAAA").unwrap();
        assert!(close(score, 4.0 - 0.3 - 0.1));
        assert!(close(aligner.score(b"ACG", b"").unwrap(), -0.5));
    }

    #[test]
    fn strict_profile_prefers_gaps_over_mismatches() {
        let aligner = AffineAligner::new(ScoringProfile::STRICT);
        // A mismatch costs -2; opening two gaps costs -1.0 total.
        let score = aligner.score(b"A", b"C").unwrap();
        assert!(close(score, -1.0));
    }

    #[test]
    fn comparison_ignores_case() {
        let aligner = AffineAligner::new(ScoringProfile::STANDARD);
        assert!(close(aligner.score(b"acgt", b"ACGT").unwrap(), 4.0));
    }

    #[test]
    fn cell_budget_reports_exhaustion() {
        let aligner = AffineAligner::new(ScoringProfile::STANDARD).with_max_cells(10);
        let err = aligner.score(b"ACGTACGT", b"ACGTACGT").unwrap_err();
        assert_matches!(err, HomopairError::ResourceExhaustion(_));
    }

    #[test]
    fn profile_names_parse() {
        assert_eq!("Strict".parse::<ProfileName>().unwrap(), ProfileName::Strict);
        assert_matches!(
            "local".parse::<ProfileName>(),
            Err(HomopairError::UnknownProfile(_))
        );
        assert!(ScoringProfile::STANDARD.validate().is_ok());
    }
}
