use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::blocking::{Client, RequestBuilder};
use scraper::{Html, Selector};
use tracing::info;

use crate::domain::Identifier;
use crate::error::HomopairError;
use crate::fetch::{
    SequenceFetcher, element_text, http_client, labelled_row, send_with_retries, text_body,
};

const SOURCE: &str = "miRBase";

static MATURE_ACCESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bMIMAT\d{7}\b").expect("valid regex"));
static TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("valid selector"));
static ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

#[derive(Clone)]
pub struct MirbaseHttpClient {
    client: Client,
    base_url: String,
}

impl MirbaseHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, HomopairError> {
        Ok(Self {
            client: http_client(timeout, HomopairError::MirbaseHttp)?,
            base_url: "https://mirbase.org".to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn get<F>(&self, make_req: F) -> Result<String, HomopairError>
    where
        F: FnMut() -> RequestBuilder,
    {
        let response = send_with_retries(make_req, HomopairError::MirbaseHttp)?;
        text_body(
            response,
            |status, message| HomopairError::MirbaseStatus { status, message },
            HomopairError::MirbaseHttp,
        )
    }
}

impl SequenceFetcher for MirbaseHttpClient {
    fn source(&self) -> &'static str {
        SOURCE
    }

    fn fetch(&self, id: &Identifier) -> Result<Option<String>, HomopairError> {
        let search_url = format!("{}/results/", self.base_url);
        info!(url = %search_url, mirna = %id, "fetching miRNA");
        let results = self.get(|| self.client.get(&search_url).query(&[("query", id.as_str())]))?;
        let Some(accession) = parse_first_mature_accession(&results)? else {
            return Ok(None);
        };

        let entry_url = format!("{}/mature/{accession}", self.base_url);
        let entry = self.get(|| self.client.get(&entry_url))?;
        parse_mature_sequence(&entry)
    }
}

pub fn parse_first_mature_accession(html: &str) -> Result<Option<String>, HomopairError> {
    let document = Html::parse_document(html);
    let table = document
        .select(&TABLE)
        .next()
        .ok_or_else(|| HomopairError::PageStructure {
            source_name: SOURCE,
            message: "search results table not found".to_string(),
        })?;
    Ok(table.select(&ROW).find_map(|row| {
        let text = element_text(row);
        let from_links = row
            .select(&LINK)
            .filter_map(|link| link.value().attr("href"))
            .find_map(|href| MATURE_ACCESSION.find(href));
        from_links
            .or_else(|| MATURE_ACCESSION.find(&text))
            .map(|found| found.as_str().to_string())
    }))
}

pub fn parse_mature_sequence(html: &str) -> Result<Option<String>, HomopairError> {
    let document = Html::parse_document(html);
    let cells = labelled_row(&document, "Sequence").ok_or_else(|| {
        HomopairError::PageStructure {
            source_name: SOURCE,
            message: "sequence row not found".to_string(),
        }
    })?;
    let sequence: String = cells
        .first()
        .map(|cell| element_text(*cell))
        .unwrap_or_default()
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .collect();
    if sequence.is_empty() {
        return Ok(None);
    }
    if !sequence.chars().all(|ch| "ACGUTNacgutn".contains(ch)) {
        return Err(HomopairError::PageStructure {
            source_name: SOURCE,
            message: format!("sequence cell holds non-nucleotide text: {sequence}"),
        });
    }
    Ok(Some(sequence))
}
