use assert_matches::assert_matches;

use homopair::domain::{Identifier, NamedSequence, PairKey, ResourceKind, SENTINEL, is_sentinel};
use homopair::error::HomopairError;

#[test]
fn parse_identifier_valid() {
    let id: Identifier = " AT1G01010.1 ".parse().unwrap();
    assert_eq!(id.as_str(), "AT1G01010.1");
}

#[test]
fn parse_identifier_invalid() {
    let err = "ath miR156".parse::<Identifier>().unwrap_err();
    assert_matches!(err, HomopairError::InvalidIdentifier(_));
}

#[test]
fn record_keys_per_kind() {
    let id: Identifier = "AT2G33810".parse().unwrap();
    assert_eq!(
        id.record_key(ResourceKind::TargetName.record_suffix().unwrap()),
        "AT2G33810_name"
    );
    assert_eq!(
        id.record_key(ResourceKind::TargetSequence.record_suffix().unwrap()),
        "AT2G33810_sequence"
    );
    assert_eq!(ResourceKind::Alignment.record_suffix(), None);
}

#[test]
fn namespaces_are_distinct() {
    let mut names: Vec<&str> = ResourceKind::ALL.iter().map(|kind| kind.namespace()).collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), ResourceKind::ALL.len());
}

#[test]
fn only_target_names_filter_identifiers() {
    let locus: Identifier = "AT4G21070".parse().unwrap();
    let refseq: Identifier = "NM_007294".parse().unwrap();
    assert!(ResourceKind::TargetName.admits(&locus));
    assert!(!ResourceKind::TargetName.admits(&refseq));
    assert!(ResourceKind::TargetSequence.admits(&refseq));
    assert!(ResourceKind::MirnaSequence.admits(&refseq));
}

#[test]
fn pair_key_display() {
    let pair = PairKey::new("TP53".parse().unwrap(), "AT1G01010".parse().unwrap());
    assert_eq!(pair.to_string(), "TP53_AT1G01010");
    assert_eq!(pair.reference().as_str(), "TP53");
    assert_eq!(pair.comparison().as_str(), "AT1G01010");
}

#[test]
fn sentinel_sequences_are_not_alignable() {
    let id: Identifier = "AT9G99999".parse().unwrap();
    assert!(!NamedSequence::new(id.clone(), SENTINEL).is_alignable());
    assert!(!NamedSequence::new(id.clone(), "").is_alignable());
    assert!(NamedSequence::new(id, "ACGT").is_alignable());
    assert!(is_sentinel("-"));
    assert!(!is_sentinel("ACGT"));
}

#[test]
fn kind_display_is_kebab_case() {
    assert_eq!(ResourceKind::MirnaSequence.to_string(), "mirna-sequence");
    assert_eq!(ResourceKind::TargetName.to_string(), "target-name");
}
