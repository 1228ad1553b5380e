use crate::error::ExtractError;
use crate::model::Recipe;
use reqwest::Url;
use scraper::Html;

mod json_ld;
mod meta_tags;
mod microdata;
mod sites;

pub use json_ld::JsonLdExtractor;
pub use meta_tags::MetaTagExtractor;
pub use microdata::MicroDataExtractor;
pub use sites::{DeferringParser, SiteParser, SiteParsers};

/// Title used when a page carries recipe data but no usable name
pub const DEFAULT_TITLE: &str = "Imported Recipe";

/// Everything an extractor may look at for one page
pub struct ParsingContext {
    pub url: Url,
    pub html: String,
    pub document: Html,
}

impl ParsingContext {
    pub fn new(url: Url, html: impl Into<String>) -> Self {
        let html = html.into();
        let document = Html::parse_document(&html);
        Self {
            url,
            html,
            document,
        }
    }

    /// Lowercase host of the page URL, empty when the URL has none
    pub fn host(&self) -> String {
        self.url.host_str().unwrap_or_default().to_lowercase()
    }
}

/// One generic extraction strategy.
///
/// A strategy that finds nothing returns [`ExtractError::NoRecipeFound`] so the
/// next one in the chain can try.
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;
    fn parse(&self, context: &ParsingContext) -> Result<Recipe, ExtractError>;
}
