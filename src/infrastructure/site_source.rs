//! Listing and classification sources backed by the live site

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::domain::entity::EntityId;
use crate::domain::services::{
    ClassificationError, ClassificationSource, ListingPage, ListingSource, PageFailure,
};
use crate::infrastructure::config::{AppConfig, SiteConfig, utils};
use crate::infrastructure::html_parser::SiteParser;
use crate::infrastructure::http_client::{HttpClient, HttpClientConfig, HttpError};
use crate::infrastructure::parsing_error::ParsingError;

/// Fetches pages over [`HttpClient`] and reads them with [`SiteParser`]
pub struct SiteSource {
    http: HttpClient,
    parser: SiteParser,
    site: SiteConfig,
}

impl SiteSource {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let http = HttpClient::new(HttpClientConfig::from(&config.site))?;
        let parser = SiteParser::new(&config.selectors).context("Invalid selector configuration")?;
        Ok(Self {
            http,
            parser,
            site: config.site.clone(),
        })
    }
}

#[async_trait]
impl ListingSource for SiteSource {
    async fn fetch_listing_page(&self, page: u32) -> Result<ListingPage, PageFailure> {
        let url = utils::listing_page_url(&self.site, page);
        debug!("Fetching listing page {} from {}", page, url);

        let html = self.http.get_text(&url).await.map_err(|e| match e {
            HttpError::Unauthorized { .. } => PageFailure::NotAuthenticated,
            other => PageFailure::Unreachable {
                page,
                reason: other.to_string(),
            },
        })?;

        self.parser
            .parse_listing(&html, page)
            .map_err(|e| match e {
                ParsingError::LoginRequired => PageFailure::NotAuthenticated,
                other => PageFailure::UnparsablePage {
                    page,
                    reason: other.to_string(),
                },
            })
    }
}

#[async_trait]
impl ClassificationSource for SiteSource {
    async fn fetch_classification(&self, id: EntityId) -> Result<String, ClassificationError> {
        let url = utils::entity_url(&self.site, id);

        let html = self.http.get_text(&url).await.map_err(|e| match e {
            HttpError::Unauthorized { .. } => ClassificationError::NotAuthenticated,
            other => ClassificationError::Fetch {
                id,
                reason: other.to_string(),
            },
        })?;

        self.parser.parse_classification(&html).map_err(|e| match e {
            ParsingError::LoginRequired => ClassificationError::NotAuthenticated,
            other => ClassificationError::Parse {
                id,
                reason: other.to_string(),
            },
        })
    }
}
