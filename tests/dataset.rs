use std::fs::{self, File};
use std::io::Write;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use flate2::Compression;
use flate2::write::GzEncoder;

use homopair::dataset::{LocalDataset, TieBreak, read_fasta_sequences};
use homopair::domain::Identifier;
use homopair::error::HomopairError;

const MATURE_FA: &str = "\
>ath-miR156a-5p MIMAT0000166 Arabidopsis thaliana miR156a-5p
UGACAGAAGAGAGUGAGCAC
>hsa-let-7a-5p MIMAT0000062 Homo sapiens let-7a-5p
UGAGGUAGUAGGUUGUAUAGUU
>ath-miR172a MIMAT0000203 Arabidopsis thaliana miR172a
AGAAUCUUGAUGAUG
CUGCAU
";

fn id(value: &str) -> Identifier {
    value.parse().unwrap()
}

fn utf8(path: std::path::PathBuf) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path).unwrap()
}

#[test]
fn fasta_keeps_only_prefixed_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = utf8(dir.path().join("mature.fa"));
    fs::write(&path, MATURE_FA).unwrap();

    let dataset = LocalDataset::from_fasta(&path, Some("ath-")).unwrap();

    assert_eq!(dataset.name(), "mature.fa");
    assert_eq!(dataset.len(), 2);
    assert!(!dataset.contains(&id("hsa-let-7a-5p")));
    assert_eq!(
        dataset.lookup(&id("ath-miR172a"), TieBreak::FirstSeen),
        Some("AGAAUCUUGAUGAUGCUGCAU")
    );
}

#[test]
fn gzipped_fasta_is_decoded() {
    let dir = tempfile::tempdir().unwrap();
    let path = utf8(dir.path().join("mature.fa.gz"));
    let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
    encoder.write_all(MATURE_FA.as_bytes()).unwrap();
    encoder.finish().unwrap();

    let dataset = LocalDataset::load(&path, None).unwrap();

    assert_eq!(dataset.len(), 3);
    assert_eq!(
        dataset.lookup(&id("hsa-let-7a-5p"), TieBreak::FirstSeen),
        Some("UGAGGUAGUAGGUUGUAUAGUU")
    );
}

#[test]
fn tsv_maps_values_to_identifiers() {
    let dir = tempfile::tempdir().unwrap();
    let path = utf8(dir.path().join("pmiren.tsv"));
    fs::write(
        &path,
        "# sequence\tname\nUCGGACCAGGCUUCAUUCCCC\tath-miR166a\nUUCCACAGCUUUCUUGAACUG\tath-miR396a\nUCGGACCAGGCUUCAUUCCCU\tath-miR166a\n",
    )
    .unwrap();

    let dataset = LocalDataset::load(&path, None).unwrap();

    assert_eq!(dataset.len(), 3);
    assert_eq!(
        dataset.candidates(&id("ath-miR166a")),
        vec!["UCGGACCAGGCUUCAUUCCCC", "UCGGACCAGGCUUCAUUCCCU"]
    );
    assert_eq!(
        dataset.lookup(&id("ath-miR396a"), TieBreak::Lexicographic),
        Some("UUCCACAGCUUUCUUGAACUG")
    );
}

#[test]
fn tsv_without_tab_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = utf8(dir.path().join("broken.tsv"));
    fs::write(&path, "UCGGACCAGG ath-miR166a\n").unwrap();

    assert_matches!(
        LocalDataset::from_tsv(&path),
        Err(HomopairError::Dataset { .. })
    );
}

#[test]
fn missing_file_is_a_filesystem_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = utf8(dir.path().join("absent.fa"));

    assert_matches!(
        LocalDataset::from_fasta(&path, None),
        Err(HomopairError::Filesystem(_))
    );
}

#[test]
fn sequences_keep_file_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = utf8(dir.path().join("genes.fa"));
    fs::write(&path, ">TP53 human\nACGTACGT\n>BRCA1\nGGCC\nAATT\n").unwrap();

    let sequences = read_fasta_sequences(&path).unwrap();

    assert_eq!(sequences.len(), 2);
    assert_eq!(sequences[0].id.as_str(), "TP53");
    assert_eq!(sequences[0].sequence, "ACGTACGT");
    assert_eq!(sequences[1].id.as_str(), "BRCA1");
    assert_eq!(sequences[1].sequence, "GGCCAATT");
}

#[test]
fn text_before_first_header_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = utf8(dir.path().join("stray.fa"));
    fs::write(&path, "ACGT\n>TP53\nACGTACGT\n").unwrap();

    assert_matches!(
        read_fasta_sequences(&path),
        Err(HomopairError::Dataset { .. })
    );
}
