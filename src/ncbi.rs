use std::time::Duration;

use bio::io::fasta;
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::info;

use crate::domain::Identifier;
use crate::error::HomopairError;
use crate::fetch::{SequenceFetcher, http_client, send_with_retries, text_body};

const SOURCE: &str = "NCBI";

#[derive(Clone)]
pub struct NcbiHttpClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl NcbiHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, HomopairError> {
        let api_key = std::env::var("NCBI_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        Ok(Self {
            client: http_client(timeout, HomopairError::NcbiHttp)?,
            base_url: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string(),
            api_key,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<String, HomopairError> {
        let url = format!("{}/{endpoint}", self.base_url);
        let response = send_with_retries(
            || {
                let mut request = self.client.get(&url).query(params);
                if let Some(key) = &self.api_key {
                    request = request.query(&[("api_key", key.as_str())]);
                }
                request
            },
            HomopairError::NcbiHttp,
        )?;
        text_body(
            response,
            |status, message| HomopairError::NcbiStatus { status, message },
            HomopairError::NcbiHttp,
        )
    }
}

impl SequenceFetcher for NcbiHttpClient {
    fn source(&self) -> &'static str {
        SOURCE
    }

    fn fetch(&self, id: &Identifier) -> Result<Option<String>, HomopairError> {
        info!(target_id = %id, "fetching target sequence");
        let search = self.get(
            "esearch.fcgi",
            &[
                ("db", "nuccore"),
                ("term", id.as_str()),
                ("retmode", "json"),
                ("retmax", "1"),
            ],
        )?;
        // The first hit is the best match for the term.
        let Some(uid) = parse_first_uid(&search)? else {
            return Ok(None);
        };

        let body = self.get(
            "efetch.fcgi",
            &[
                ("db", "nuccore"),
                ("id", uid.as_str()),
                ("rettype", "fasta"),
                ("retmode", "text"),
            ],
        )?;
        parse_fasta_body(&body)
    }
}

pub fn parse_first_uid(json: &str) -> Result<Option<String>, HomopairError> {
    let value: Value = serde_json::from_str(json).map_err(|err| HomopairError::PageStructure {
        source_name: SOURCE,
        message: format!("esearch response is not JSON: {err}"),
    })?;
    let ids = value
        .get("esearchresult")
        .and_then(|v| v.get("idlist"))
        .and_then(|v| v.as_array())
        .ok_or_else(|| HomopairError::PageStructure {
            source_name: SOURCE,
            message: "esearch response without idlist".to_string(),
        })?;
    Ok(ids
        .first()
        .and_then(|v| v.as_str())
        .map(|v| v.to_string()))
}

pub fn parse_fasta_body(text: &str) -> Result<Option<String>, HomopairError> {
    let not_fasta = |message: String| HomopairError::PageStructure {
        source_name: SOURCE,
        message: format!("efetch response is not FASTA: {message}"),
    };
    let mut records = fasta::Reader::new(text.trim_start().as_bytes()).records();
    let Some(record) = records.next() else {
        return Ok(None);
    };
    let record = record.map_err(|err| not_fasta(err.to_string()))?;
    let sequence =
        String::from_utf8(record.seq().to_vec()).map_err(|err| not_fasta(err.to_string()))?;
    Ok((!sequence.is_empty()).then_some(sequence))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_uid_from_esearch() {
        let json = r#"{"header":{},"esearchresult":{"count":"2","idlist":["1519245064","42"]}}"#;
        assert_eq!(parse_first_uid(json).unwrap().as_deref(), Some("1519245064"));
        let empty = r#"{"esearchresult":{"count":"0","idlist":[]}}"#;
        assert_eq!(parse_first_uid(empty).unwrap(), None);
    }

    #[test]
    fn fasta_body_joins_lines() {
        let fasta = ">NM_007294.4 Homo sapiens BRCA1\nGCTGAGACTT\nCTGGACGGGG\n\n";
        assert_eq!(
            parse_fasta_body(fasta).unwrap().as_deref(),
            Some("GCTGAGACTTCTGGACGGGG")
        );
        assert!(parse_fasta_body("Error: bad id").is_err());
        assert_eq!(parse_fasta_body("").unwrap(), None);
    }

    #[test]
    fn only_first_record_is_read() {
        let fasta = ">NM_1\nACGT\n>NM_2\nTTTT\n";
        assert_eq!(parse_fasta_body(fasta).unwrap().as_deref(), Some("ACGT"));
    }
}
