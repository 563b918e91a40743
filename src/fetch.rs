use std::sync::{Arc, LazyLock};
use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use scraper::{ElementRef, Html, Selector};

use crate::domain::Identifier;
use crate::error::HomopairError;

static ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("valid selector"));

pub trait SequenceFetcher: Send + Sync {
    fn source(&self) -> &'static str;

    fn fetch(&self, id: &Identifier) -> Result<Option<String>, HomopairError>;
}

impl<F: SequenceFetcher + ?Sized> SequenceFetcher for Box<F> {
    fn source(&self) -> &'static str {
        (**self).source()
    }

    fn fetch(&self, id: &Identifier) -> Result<Option<String>, HomopairError> {
        (**self).fetch(id)
    }
}

impl<F: SequenceFetcher + ?Sized> SequenceFetcher for Arc<F> {
    fn source(&self) -> &'static str {
        (**self).source()
    }

    fn fetch(&self, id: &Identifier) -> Result<Option<String>, HomopairError> {
        (**self).fetch(id)
    }
}

pub(crate) fn http_client(
    timeout: Duration,
    on_error: fn(String) -> HomopairError,
) -> Result<Client, HomopairError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("homopair/{}", env!("CARGO_PKG_VERSION")))
            .map_err(|err| on_error(err.to_string()))?,
    );
    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|err| on_error(err.to_string()))
}

pub(crate) fn send_with_retries<F>(
    mut make_req: F,
    on_error: fn(String) -> HomopairError,
) -> Result<Response, HomopairError>
where
    F: FnMut() -> RequestBuilder,
{
    const MAX_RETRIES: usize = 2;
    const BASE_DELAY_MS: u64 = 500;
    let mut attempt = 0usize;
    loop {
        match make_req().send() {
            Ok(resp) => {
                let status = resp.status().as_u16();
                if attempt < MAX_RETRIES && is_retryable_status(status) {
                    thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                    attempt += 1;
                    continue;
                }
                return Ok(resp);
            }
            Err(err) => {
                if attempt < MAX_RETRIES && is_retryable_error(&err) {
                    thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                    attempt += 1;
                    continue;
                }
                return Err(on_error(err.to_string()));
            }
        }
    }
}

pub(crate) fn text_body(
    response: Response,
    on_status: fn(u16, String) -> HomopairError,
    on_error: fn(String) -> HomopairError,
) -> Result<String, HomopairError> {
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let message = response
            .text()
            .map(|body| body.chars().take(200).collect())
            .unwrap_or_else(|_| "request failed".to_string());
        return Err(on_status(status, message));
    }
    response.text().map_err(|err| on_error(err.to_string()))
}

pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn row_cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|cell| matches!(cell.value().name(), "th" | "td"))
        .collect()
}

pub(crate) fn labelled_row<'a>(document: &'a Html, label: &str) -> Option<Vec<ElementRef<'a>>> {
    document.select(&ROW).find_map(|row| {
        let cells = row_cells(row);
        let (head, rest) = cells.split_first()?;
        let text = element_text(*head);
        text.trim_end_matches(':')
            .trim()
            .eq_ignore_ascii_case(label)
            .then(|| rest.to_vec())
    })
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
