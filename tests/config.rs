use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;

use homopair::align::{ProfileName, ScoringProfile};
use homopair::config::{Config, ConfigLoader, ProfileEntry, ScoringEntry};
use homopair::dataset::TieBreak;
use homopair::error::HomopairError;

fn scoring(profile: Option<ProfileEntry>, threshold: Option<f64>) -> Config {
    Config {
        scoring: Some(ScoringEntry { profile, threshold }),
        ..Config::default()
    }
}

#[test]
fn strict_profile_brings_its_own_threshold() {
    let config = scoring(Some(ProfileEntry::Named("strict".to_string())), None);

    let resolved = ConfigLoader::resolve_config(config).unwrap();

    assert_eq!(resolved.scoring.name, Some(ProfileName::Strict));
    assert_eq!(resolved.scoring.profile, ScoringProfile::STRICT);
    assert_eq!(resolved.scoring.threshold, 0.6);
}

#[test]
fn explicit_threshold_overrides_profile_default() {
    let config = scoring(None, Some(0.8));

    let resolved = ConfigLoader::resolve_config(config).unwrap();

    assert_eq!(resolved.scoring.name, Some(ProfileName::Standard));
    assert_eq!(resolved.scoring.threshold, 0.8);
}

#[test]
fn threshold_outside_unit_interval_is_invalid() {
    for threshold in [0.0, -0.2, 1.01, f64::NAN] {
        let err = ConfigLoader::resolve_config(scoring(None, Some(threshold))).unwrap_err();
        assert_matches!(err, HomopairError::InvalidConfig(_));
    }
}

#[test]
fn zero_rate_limit_is_invalid() {
    let config = Config {
        rate_limit_secs: Some(0),
        ..Config::default()
    };
    let err = ConfigLoader::resolve_config(config).unwrap_err();
    assert_matches!(err, HomopairError::InvalidConfig(_));
}

#[test]
fn unknown_profile_name_is_reported() {
    let config = scoring(Some(ProfileEntry::Named("local".to_string())), None);
    let err = ConfigLoader::resolve_config(config).unwrap_err();
    assert_matches!(err, HomopairError::UnknownProfile(name) if name == "local");
}

#[test]
fn custom_profile_requires_threshold() {
    let custom = ScoringProfile {
        match_score: 2.0,
        mismatch: -1.0,
        gap_open: -1.0,
        gap_extend: -0.5,
    };
    let err = ConfigLoader::resolve_config(scoring(Some(ProfileEntry::Custom(custom)), None))
        .unwrap_err();
    assert_matches!(err, HomopairError::InvalidConfig(_));

    let resolved =
        ConfigLoader::resolve_config(scoring(Some(ProfileEntry::Custom(custom)), Some(0.7)))
            .unwrap();
    assert_eq!(resolved.scoring.name, None);
    assert_eq!(resolved.scoring.profile, custom);
    assert_eq!(resolved.scoring.threshold, 0.7);
}

#[test]
fn unsupported_schema_version_is_invalid() {
    let config = Config {
        schema_version: Some(2),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(config),
        Err(HomopairError::InvalidConfig(_))
    );
}

#[test]
fn parse_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("homopair.json");
    fs::write(
        &path,
        r#"{
            "schema_version": 1,
            "store_root": "/var/cache/homopair",
            "scoring": {
                "profile": {"match": 1.0, "mismatch": -3.0, "gap_open": -2.0, "gap_extend": -1.0},
                "threshold": 0.5
            },
            "rate_limit_secs": 2,
            "tie_break": "lexicographic",
            "workers": 8,
            "max_alignment_cells": 1000000
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();

    assert_eq!(resolved.store_root.as_deref().map(|p| p.as_str()), Some("/var/cache/homopair"));
    assert_eq!(resolved.scoring.profile.mismatch, -3.0);
    assert_eq!(resolved.scoring.threshold, 0.5);
    assert_eq!(resolved.rate_limit, Duration::from_secs(2));
    assert_eq!(resolved.fetch_timeout, Duration::from_secs(10));
    assert_eq!(resolved.tie_break, TieBreak::Lexicographic);
    assert_eq!(resolved.workers, 8);
    assert_eq!(resolved.max_alignment_cells, Some(1_000_000));
}

#[test]
fn named_profile_in_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("homopair.json");
    fs::write(&path, r#"{"scoring": {"profile": "strict"}}"#).unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();

    assert_eq!(resolved.scoring.name, Some(ProfileName::Strict));
    assert_eq!(resolved.scoring.threshold, 0.6);
}

#[test]
fn malformed_file_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("homopair.json");
    fs::write(&path, "{ scoring: ").unwrap();

    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(HomopairError::ConfigParse(_))
    );
}

#[test]
fn missing_explicit_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");

    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(HomopairError::ConfigRead(_))
    );
}
