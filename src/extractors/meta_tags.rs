use super::{Extractor, ParsingContext};
use crate::error::ExtractError;
use crate::model::Recipe;
use crate::text::clean_text;
use log::debug;
use regex::Regex;
use std::sync::LazyLock;

/// og:title meta tag, property before content
static OG_TITLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]*property\s*=\s*["']og:title["'][^>]*content\s*=\s*["']([^"']+)["'][^>]*>"#)
        .expect("Invalid og:title regex")
});

/// og:title meta tag, content before property
static OG_TITLE_REGEX_ALT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]*content\s*=\s*["']([^"']+)["'][^>]*property\s*=\s*["']og:title["'][^>]*>"#)
        .expect("Invalid og:title alt regex")
});

/// Last resort: a recipe that is only a title and a link back to the page.
pub struct MetaTagExtractor;

impl MetaTagExtractor {
    pub fn og_title(html: &str) -> Option<String> {
        OG_TITLE_REGEX
            .captures(html)
            .or_else(|| OG_TITLE_REGEX_ALT.captures(html))
            .and_then(|cap| cap.get(1))
            .and_then(|m| clean_text(m.as_str()))
    }
}

impl Extractor for MetaTagExtractor {
    fn name(&self) -> &'static str {
        "meta_tags"
    }

    fn parse(&self, context: &ParsingContext) -> Result<Recipe, ExtractError> {
        let title = Self::og_title(&context.html).ok_or(ExtractError::NoRecipeFound)?;
        debug!("MetaTagExtractor: falling back to og:title '{}'", title);

        Ok(Recipe {
            name: title,
            source_url: Some(context.url.to_string()),
            ..Recipe::default()
        })
    }
}
