use std::sync::LazyLock;
use std::time::Duration;

use reqwest::blocking::Client;
use scraper::{Html, Selector};
use tracing::info;

use crate::domain::Identifier;
use crate::error::HomopairError;
use crate::fetch::{
    SequenceFetcher, element_text, http_client, labelled_row, send_with_retries, text_body,
};

const SOURCE: &str = "TAIR";

static TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("valid selector"));

#[derive(Clone)]
pub struct TairHttpClient {
    client: Client,
    base_url: String,
}

impl TairHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, HomopairError> {
        Ok(Self {
            client: http_client(timeout, HomopairError::TairHttp)?,
            base_url: "https://www.arabidopsis.org".to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl SequenceFetcher for TairHttpClient {
    fn source(&self) -> &'static str {
        SOURCE
    }

    fn fetch(&self, id: &Identifier) -> Result<Option<String>, HomopairError> {
        let url = format!("{}/servlets/TairObject", self.base_url);
        info!(url = %url, target = %id, "fetching target name");
        let response = send_with_retries(
            || {
                self.client
                    .get(&url)
                    .query(&[("type", "locus"), ("name", id.as_str())])
            },
            HomopairError::TairHttp,
        )?;
        let page = text_body(
            response,
            |status, message| HomopairError::TairStatus { status, message },
            HomopairError::TairHttp,
        )?;
        parse_other_names(&page)
    }
}

pub fn parse_other_names(html: &str) -> Result<Option<String>, HomopairError> {
    let document = Html::parse_document(html);
    if document.select(&TABLE).next().is_none() {
        return Err(HomopairError::PageStructure {
            source_name: SOURCE,
            message: "locus detail table not found".to_string(),
        });
    }
    let Some(cells) = labelled_row(&document, "Other names") else {
        return Ok(None);
    };
    // The alias list sits in the last filled cell of the row.
    let aliases = cells
        .into_iter()
        .map(element_text)
        .rfind(|text| !text.is_empty());
    Ok(aliases.and_then(|list| shortest_alias(&list)))
}

pub fn shortest_alias(list: &str) -> Option<String> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .fold(None, |best: Option<&str>, name| match best {
            Some(current) if current.len() <= name.len() => Some(current),
            _ => Some(name),
        })
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn shortest_alias_keeps_first_on_tie() {
        assert_eq!(
            shortest_alias("SQUAMOSA PROMOTER BINDING PROTEIN-LIKE 3, SPL3, SPB3").as_deref(),
            Some("SPL3")
        );
        assert_eq!(shortest_alias(" , "), None);
    }

    #[test]
    fn reads_other_names_row() {
        let html = r#"<table><tbody>
            <tr><th>Name</th><td>AT2G33810</td></tr>
            <tr><th>Other names</th><td>&nbsp;</td><td><table><tbody><tr><td>SPL3, SQUAMOSA PROMOTER BINDING PROTEIN-LIKE 3</td></tr></tbody></table></td></tr>
        </tbody></table>"#;
        assert_eq!(parse_other_names(html).unwrap().as_deref(), Some("SPL3"));
    }

    #[test]
    fn single_cell_row_does_not_borrow_from_the_next_row() {
        let html = "<table>\
            <tr><th>Other names</th><td>SPL3, SPB3</td></tr>\
            <tr><th>Location</th><td>chr2</td><td>14300090</td></tr>\
            </table>";
        assert_eq!(parse_other_names(html).unwrap().as_deref(), Some("SPL3"));
    }

    #[test]
    fn entities_are_decoded() {
        let html = "<table><tr><th>Other names</th><td>AT&amp;T1</td></tr></table>";
        assert_eq!(parse_other_names(html).unwrap().as_deref(), Some("AT&T1"));
    }

    #[test]
    fn blank_alias_row_is_not_found() {
        let html = "<table><tr><th>Other names</th><td>&nbsp;</td></tr></table>";
        assert_eq!(parse_other_names(html).unwrap(), None);
    }

    #[test]
    fn locus_without_aliases() {
        let html = "<table><tr><th>Name</th><td>AT1G01010</td></tr></table>";
        assert_eq!(parse_other_names(html).unwrap(), None);
    }

    #[test]
    fn unexpected_page_fails_closed() {
        assert_matches!(
            parse_other_names("<p>Service unavailable</p>"),
            Err(HomopairError::PageStructure { .. })
        );
    }
}
