use crate::config::FetchConfig;
use crate::error::ExtractError;
use crate::extractors::{
    Extractor, JsonLdExtractor, MetaTagExtractor, MicroDataExtractor, ParsingContext, SiteParsers,
};
use crate::fetchers::RequestFetcher;
use crate::model::Recipe;
use log::{debug, info};
use reqwest::Url;
use std::time::Duration;

/// Turns recipe web pages into [`Recipe`]s.
///
/// Strategies run in order and the first success wins:
/// 1. site-specific parsers registered for the page's host
/// 2. JSON-LD structured data
/// 3. microdata
/// 4. the `og:title` meta tag
pub struct RecipeExtractor {
    fetcher: RequestFetcher,
    sites: SiteParsers,
    extractors: Vec<Box<dyn Extractor>>,
}

/// Accept only absolute http(s) URLs with a host.
pub fn validate_url(page_url: &str) -> Result<Url, ExtractError> {
    let url = Url::parse(page_url.trim())
        .map_err(|e| ExtractError::InvalidUrl(format!("{page_url}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ExtractError::InvalidUrl(format!(
            "{page_url}: only http and https are supported"
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ExtractError::InvalidUrl(format!("{page_url}: missing host")));
    }

    Ok(url)
}

impl RecipeExtractor {
    pub fn new(config: &FetchConfig) -> Result<Self, ExtractError> {
        Self::with_sites(config, SiteParsers::default())
    }

    pub fn with_sites(config: &FetchConfig, sites: SiteParsers) -> Result<Self, ExtractError> {
        Ok(Self {
            fetcher: RequestFetcher::new(config)?,
            sites,
            extractors: vec![
                Box::new(JsonLdExtractor),
                Box::new(MicroDataExtractor),
                Box::new(MetaTagExtractor),
            ],
        })
    }

    /// Fetch `page_url` and extract a recipe from it.
    pub async fn extract(&self, page_url: &str) -> Result<Recipe, ExtractError> {
        let url = validate_url(page_url)?;
        let html = self.fetcher.fetch(&url).await?;
        let recipe = self.extract_from_html(&url, &html)?;
        info!("Extracted '{}' from {}", recipe.name, url);
        Ok(recipe)
    }

    /// Like [`extract`](Self::extract) but gives up after `timeout`.
    pub async fn extract_with_timeout(
        &self,
        page_url: &str,
        timeout: Duration,
    ) -> Result<Recipe, ExtractError> {
        tokio::time::timeout(timeout, self.extract(page_url))
            .await
            .map_err(|_| {
                ExtractError::InvalidData(format!("Timed out after {}s", timeout.as_secs()))
            })?
    }

    /// Run the strategy chain over already fetched HTML.
    pub fn extract_from_html(&self, url: &Url, html: &str) -> Result<Recipe, ExtractError> {
        let context = ParsingContext::new(url.clone(), html);

        if let Some(recipe) = self.sites.try_parse(&context) {
            debug!("Site parser produced '{}'", recipe.name);
            return Ok(recipe);
        }

        for extractor in &self.extractors {
            match extractor.parse(&context) {
                Ok(recipe) => {
                    debug!("Extractor '{}' produced '{}'", extractor.name(), recipe.name);
                    return Ok(recipe);
                }
                Err(e) => debug!("Extractor '{}' found nothing: {}", extractor.name(), e),
            }
        }

        Err(ExtractError::NoRecipeFound)
    }
}
