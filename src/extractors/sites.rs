use super::ParsingContext;
use crate::model::Recipe;
use log::debug;

/// A parser for one or more specific recipe sites.
///
/// Site parsers run before the generic strategies. Returning `None` defers to
/// the generic chain.
pub trait SiteParser: Send + Sync {
    fn name(&self) -> &str;

    /// Host fragments this parser is responsible for
    fn hosts(&self) -> &[&str];

    fn matches(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        self.hosts()
            .iter()
            .any(|h| host.contains(h.to_lowercase().as_str()))
    }

    fn parse(&self, context: &ParsingContext) -> Option<Recipe>;
}

/// A registered site that currently has no special handling.
pub struct DeferringParser {
    name: &'static str,
    hosts: &'static [&'static str],
}

impl DeferringParser {
    pub const fn new(name: &'static str, hosts: &'static [&'static str]) -> Self {
        Self { name, hosts }
    }
}

impl SiteParser for DeferringParser {
    fn name(&self) -> &str {
        self.name
    }

    fn hosts(&self) -> &[&str] {
        self.hosts
    }

    fn parse(&self, _context: &ParsingContext) -> Option<Recipe> {
        None
    }
}

/// Ordered list of site parsers; the first one that matches the host and
/// returns a recipe wins.
pub struct SiteParsers {
    parsers: Vec<Box<dyn SiteParser>>,
}

impl SiteParsers {
    /// A registry with no parsers at all
    pub fn empty() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    pub fn register(&mut self, parser: impl SiteParser + 'static) {
        self.parsers.push(Box::new(parser));
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    pub fn try_parse(&self, context: &ParsingContext) -> Option<Recipe> {
        let host = context.host();
        for parser in self.parsers.iter().filter(|p| p.matches(&host)) {
            debug!("Trying site parser '{}' for {}", parser.name(), host);
            if let Some(mut recipe) = parser.parse(context) {
                if recipe.source_url.is_none() {
                    recipe.source_url = Some(context.url.to_string());
                }
                return Some(recipe);
            }
        }
        None
    }
}

impl Default for SiteParsers {
    fn default() -> Self {
        let mut parsers = Self::empty();
        parsers.register(DeferringParser::new("allrecipes", &["allrecipes.com"]));
        parsers.register(DeferringParser::new("bbc_good_food", &["bbcgoodfood.com"]));
        parsers.register(DeferringParser::new("food_network", &["foodnetwork.com"]));
        parsers.register(DeferringParser::new("serious_eats", &["seriouseats.com"]));
        parsers.register(DeferringParser::new("nyt_cooking", &["cooking.nytimes.com"]));
        parsers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;

    struct FixedParser;

    impl SiteParser for FixedParser {
        fn name(&self) -> &str {
            "fixed"
        }

        fn hosts(&self) -> &[&str] {
            &["Example.COM"]
        }

        fn parse(&self, _context: &ParsingContext) -> Option<Recipe> {
            Some(Recipe::new("Site Special"))
        }
    }

    fn context(url: &str) -> ParsingContext {
        ParsingContext::new(Url::parse(url).unwrap(), "<html></html>")
    }

    #[test]
    fn test_host_matching_is_case_insensitive_substring() {
        let parser = FixedParser;
        assert!(parser.matches("www.example.com"));
        assert!(parser.matches("RECIPES.EXAMPLE.COM"));
        assert!(!parser.matches("example.org"));
    }

    #[test]
    fn test_default_parsers_defer() {
        let parsers = SiteParsers::default();
        assert!(!parsers.is_empty());
        assert!(parsers
            .try_parse(&context("https://www.allrecipes.com/recipe/1/"))
            .is_none());
    }

    #[test]
    fn test_registered_parser_wins_and_gets_source_url() {
        let mut parsers = SiteParsers::default();
        parsers.register(FixedParser);

        let recipe = parsers
            .try_parse(&context("https://www.example.com/pie"))
            .unwrap();
        assert_eq!(recipe.name, "Site Special");
        assert_eq!(recipe.source_url.as_deref(), Some("https://www.example.com/pie"));

        assert!(parsers.try_parse(&context("https://other.org/pie")).is_none());
    }
}
