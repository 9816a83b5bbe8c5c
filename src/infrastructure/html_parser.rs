//! HTML parsing for listing and detail pages
//!
//! All selectors come from [`SelectorConfig`] and are compiled once. The
//! parser is synchronous; `scraper::Html` never lives across an await.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::domain::entity::{EntityId, FetchedEntity};
use crate::domain::services::ListingPage;
use crate::infrastructure::config::SelectorConfig;
use crate::infrastructure::parsing_error::{ParsingError, ParsingResult};

pub struct SiteParser {
    listing_container: Selector,
    listing_container_source: String,
    listing_item: Selector,
    item_id_attribute: String,
    item_name: Selector,
    pagination_link: Selector,
    login_marker: Selector,
    classification: Selector,
    page_number: Regex,
    page_param: Regex,
}

fn compile(selector: &str) -> ParsingResult<Selector> {
    Selector::parse(selector).map_err(|e| ParsingError::invalid_selector(selector, e))
}

fn compile_regex(pattern: &str) -> ParsingResult<Regex> {
    Regex::new(pattern).map_err(|e| ParsingError::invalid_field(pattern, &e.to_string()))
}

/// Whitespace-collapsed text content
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

impl SiteParser {
    pub fn new(selectors: &SelectorConfig) -> ParsingResult<Self> {
        Ok(Self {
            listing_container: compile(&selectors.listing_container)?,
            listing_container_source: selectors.listing_container.clone(),
            listing_item: compile(&selectors.listing_item)?,
            item_id_attribute: selectors.item_id_attribute.clone(),
            item_name: compile(&selectors.item_name)?,
            pagination_link: compile(&selectors.pagination_link)?,
            login_marker: compile(&selectors.login_marker)?,
            classification: compile(&selectors.classification)?,
            page_number: compile_regex(r"^\d+$")?,
            page_param: compile_regex(r"[?&]page=(\d+)")?,
        })
    }

    /// Parse one listing page into records and, when pagination is present,
    /// the total page count.
    pub fn parse_listing(&self, html: &str, page: u32) -> ParsingResult<ListingPage> {
        let document = Html::parse_document(html);
        if self.is_login_page(&document) {
            return Err(ParsingError::LoginRequired);
        }
        if document.select(&self.listing_container).next().is_none() {
            return Err(ParsingError::structure_not_found(&self.listing_container_source));
        }

        let mut records = Vec::new();
        for item in document.select(&self.listing_item) {
            match self.parse_item(item) {
                Some(record) => records.push(record),
                None => warn!("Skipping listing item without a usable id on page {}", page),
            }
        }

        let total_pages = self.total_pages(&document);
        debug!(
            "Parsed page {}: {} records, total pages {:?}",
            page,
            records.len(),
            total_pages
        );
        Ok(ListingPage::new(records, total_pages))
    }

    fn parse_item(&self, item: ElementRef<'_>) -> Option<FetchedEntity> {
        let id: EntityId = item
            .value()
            .attr(&self.item_id_attribute)?
            .trim()
            .parse()
            .ok()?;
        let name = item
            .select(&self.item_name)
            .next()
            .map(element_text)
            .unwrap_or_else(|| element_text(item));
        Some(FetchedEntity::new(id, name))
    }

    /// Highest page number referenced by the pagination links
    fn total_pages(&self, document: &Html) -> Option<u32> {
        document
            .select(&self.pagination_link)
            .filter_map(|link| {
                let text = element_text(link);
                if self.page_number.is_match(&text) {
                    return text.parse::<u32>().ok();
                }
                let href = link.value().attr("href")?;
                self.page_param.captures(href)?.get(1)?.as_str().parse().ok()
            })
            .max()
    }

    fn is_login_page(&self, document: &Html) -> bool {
        document.select(&self.login_marker).next().is_some()
    }

    /// Trimmed classification text, `""` when the element is absent
    pub fn parse_classification(&self, html: &str) -> ParsingResult<String> {
        let document = Html::parse_document(html);
        if self.is_login_page(&document) {
            return Err(ParsingError::LoginRequired);
        }
        Ok(document
            .select(&self.classification)
            .next()
            .map(element_text)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body>
          <ul id="listing">
            <li class="item" data-id="17"><span class="name"> Solar   Lamp </span></li>
            <li class="item" data-id="4"><span class="name">Kettle</span></li>
            <li class="item" data-id="not-a-number"><span class="name">Broken</span></li>
          </ul>
          <nav class="pagination">
            <a href="/list?page=1">1</a>
            <a href="/list?page=2">2</a>
            <a href="/list?page=3">3</a>
            <a href="/list?page=12">Last</a>
          </nav>
        </body></html>"#;

    fn parser() -> SiteParser {
        SiteParser::new(&SelectorConfig::default()).unwrap()
    }

    #[test]
    fn parses_items_in_page_order() {
        let page = parser().parse_listing(LISTING, 1).unwrap();
        let records: Vec<_> = page.records.iter().map(|r| (r.id, r.name.as_str())).collect();
        assert_eq!(records, vec![(17, "Solar Lamp"), (4, "Kettle")]);
    }

    #[test]
    fn total_pages_uses_highest_link() {
        let page = parser().parse_listing(LISTING, 1).unwrap();
        assert_eq!(page.total_pages, Some(12));
    }

    #[test]
    fn missing_pagination_means_unknown_total() {
        let html = r#"<div id="listing"><div class="item" data-id="1"><b class="name">A</b></div></div>"#;
        let page = parser().parse_listing(html, 1).unwrap();
        assert_eq!(page.total_pages, None);
        assert_eq!(page.records.len(), 1);
    }

    #[test]
    fn empty_container_is_an_empty_page() {
        let page = parser().parse_listing(r#"<div id="listing"></div>"#, 2).unwrap();
        assert!(page.records.is_empty());
    }

    #[test]
    fn missing_container_is_structure_error() {
        let err = parser().parse_listing("<html><p>maintenance</p></html>", 1).unwrap_err();
        assert!(matches!(err, ParsingError::StructureNotFound { .. }));
    }

    #[test]
    fn login_form_is_detected() {
        let html = r#"<form id="login" action="/login"><input name="user"></form>"#;
        assert_eq!(parser().parse_listing(html, 1).unwrap_err(), ParsingError::LoginRequired);
        assert_eq!(parser().parse_classification(html).unwrap_err(), ParsingError::LoginRequired);
    }

    #[test]
    fn classification_is_trimmed_or_empty() {
        let p = parser();
        assert_eq!(
            p.parse_classification(r#"<p class="category">  Kitchen  </p>"#).unwrap(),
            "Kitchen"
        );
        assert_eq!(p.parse_classification("<p>nothing here</p>").unwrap(), "");
    }

    #[test]
    fn invalid_selector_is_reported() {
        let selectors = SelectorConfig {
            listing_item: "li[[".into(),
            ..SelectorConfig::default()
        };
        assert!(matches!(
            SiteParser::new(&selectors),
            Err(ParsingError::InvalidSelector { .. })
        ));
    }
}
