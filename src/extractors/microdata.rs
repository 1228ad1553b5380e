use super::{Extractor, ParsingContext, DEFAULT_TITLE};
use crate::error::ExtractError;
use crate::ingredient::parse_ingredient_line;
use crate::model::{Instructions, Recipe, Step};
use crate::text::{clean_text, duration_to_minutes};
use log::debug;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static RECIPE_SCOPE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[itemscope][itemtype]").expect("Invalid selector"));

static INGREDIENT_PROPS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("[itemprop~='recipeIngredient'], [itemprop~='ingredients']")
        .expect("Invalid selector")
});

static INSTRUCTION_PROPS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("[itemprop~='recipeInstructions']").expect("Invalid selector")
});

static LIST_ITEM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li").expect("Invalid selector"));

static DIGITS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("Invalid digits regex"));

/// Only pages mentioning this are worth a microdata scan
const RECIPE_MARKER: &str = "schema.org/Recipe";

pub struct MicroDataExtractor;

fn element_text(element: ElementRef) -> Option<String> {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

/// Properties whose value is a link rather than text
const URL_PROPS: [&str; 2] = ["image", "url"];

/// Value of a property element: machine-readable attribute first, then text.
/// `src` and `href` only count for URL-valued properties.
fn element_value(element: ElementRef, prop: &str) -> Option<String> {
    let attrs: &[&str] = if URL_PROPS.contains(&prop) {
        &["content", "src", "href"]
    } else {
        &["content", "datetime"]
    };
    attrs
        .iter()
        .find_map(|attr| element.value().attr(attr).and_then(clean_text))
        .or_else(|| element_text(element))
}

impl MicroDataExtractor {
    fn find_recipe_container(document: &Html) -> Option<ElementRef<'_>> {
        document.select(&RECIPE_SCOPE).find(|element| {
            element
                .value()
                .attr("itemtype")
                .is_some_and(|t| t.contains(RECIPE_MARKER))
        })
    }

    /// Whether `element` belongs to `root`'s item rather than to a nested item
    /// (an author or a review inside the recipe).
    fn belongs_to(element: ElementRef, root: ElementRef) -> bool {
        let root_id = (*root).id();
        for ancestor in element.ancestors() {
            if ancestor.id() == root_id {
                return true;
            }
            if let Some(el) = ElementRef::wrap(ancestor) {
                if el.value().attr("itemscope").is_some() {
                    return false;
                }
            }
        }
        true
    }

    fn own_props<'a>(root: ElementRef<'a>, prop: &str) -> Vec<ElementRef<'a>> {
        let Ok(selector) = Selector::parse(&format!("[itemprop~='{}']", prop)) else {
            return Vec::new();
        };
        root.select(&selector)
            .filter(|el| Self::belongs_to(*el, root))
            .collect()
    }

    fn get_itemprop(root: ElementRef, prop: &str) -> Option<String> {
        Self::own_props(root, prop)
            .into_iter()
            .find_map(|el| element_value(el, prop))
    }

    fn ingredients(root: ElementRef) -> Vec<String> {
        root.select(&INGREDIENT_PROPS).filter_map(element_text).collect()
    }

    fn instructions(root: ElementRef) -> Vec<Step> {
        let mut steps = Vec::new();
        for element in root.select(&INSTRUCTION_PROPS) {
            let items: Vec<String> = element.select(&LIST_ITEM).filter_map(element_text).collect();
            if items.is_empty() {
                steps.extend(element_text(element).map(Step::new));
            } else {
                steps.extend(items.into_iter().map(Step::new));
            }
        }
        steps
    }
}

impl Extractor for MicroDataExtractor {
    fn name(&self) -> &'static str {
        "microdata"
    }

    fn parse(&self, context: &ParsingContext) -> Result<Recipe, ExtractError> {
        if !context.html.contains(RECIPE_MARKER) {
            return Err(ExtractError::NoRecipeFound);
        }
        debug!("Attempting to extract recipe using MicroData extractor");

        let document = &context.document;
        let root = Self::find_recipe_container(document).unwrap_or_else(|| {
            debug!("No MicroData Recipe container found, scanning whole document");
            document.root_element()
        });

        let title = Self::get_itemprop(root, "name").filter(|t| t != DEFAULT_TITLE);
        let ingredients = Self::ingredients(root);
        let steps = Self::instructions(root);

        // a bare schema.org mention with nothing extractable is not a recipe
        if title.is_none() && ingredients.is_empty() && steps.is_empty() {
            return Err(ExtractError::NoRecipeFound);
        }

        let recipe_yield = Self::get_itemprop(root, "recipeYield");
        let servings = recipe_yield
            .as_deref()
            .and_then(|y| DIGITS_REGEX.find(y))
            .and_then(|m| m.as_str().parse::<u32>().ok());

        Ok(Recipe {
            name: title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            description: Self::get_itemprop(root, "description"),
            images: Self::get_itemprop(root, "image").into_iter().collect(),
            source_url: Some(context.url.to_string()),
            ingredients: ingredients
                .iter()
                .map(|line| parse_ingredient_line(line))
                .collect(),
            instructions: Instructions::Steps(steps),
            recipe_yield,
            servings,
            prep_time: Self::get_itemprop(root, "prepTime").and_then(|d| duration_to_minutes(&d)),
            cook_time: Self::get_itemprop(root, "cookTime").and_then(|d| duration_to_minutes(&d)),
            ..Recipe::default()
        })
    }
}
