use super::{Extractor, ParsingContext, DEFAULT_TITLE};
use crate::error::ExtractError;
use crate::ingredient::parse_ingredient_line;
use crate::model::{Author, Ingredient, Instructions, Recipe, Step};
use crate::text::{clean_diet_value, clean_text, decode_html_symbols, duration_to_minutes};
use log::debug;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;

/// JSON-LD script blocks, case-insensitive, dot matches newline
static JSONLD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("Invalid JSON-LD regex")
});

static HTML_COMMENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("Invalid comment regex"));

static DIGITS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("Invalid digits regex"));

pub struct JsonLdExtractor;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JsonLdRecipe {
    name: Option<Value>,
    headline: Option<Value>,
    description: Option<DescriptionType>,
    author: Option<AuthorType>,
    image: Option<ImageType>,
    #[serde(rename = "datePublished")]
    date_published: Option<Value>,
    keywords: Option<StringOrList>,
    #[serde(rename = "recipeIngredient")]
    recipe_ingredient: Option<RecipeIngredients>,
    ingredients: Option<RecipeIngredients>,
    #[serde(rename = "recipeInstructions")]
    recipe_instructions: Option<RecipeInstructions>,
    #[serde(rename = "recipeYield")]
    recipe_yield: Option<Value>,
    #[serde(rename = "prepTime")]
    prep_time: Option<Value>,
    #[serde(rename = "cookTime")]
    cook_time: Option<Value>,
    #[serde(rename = "recipeCategory")]
    recipe_category: Option<StringOrList>,
    #[serde(rename = "recipeCuisine")]
    recipe_cuisine: Option<StringOrList>,
    #[serde(rename = "cookingMethod")]
    cooking_method: Option<StringOrList>,
    #[serde(rename = "suitableForDiet")]
    suitable_for_diet: Option<StringOrList>,
    nutrition: Option<Value>,
    video: Option<Value>,
    #[serde(rename = "aggregateRating")]
    aggregate_rating: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct TextObject {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DescriptionType {
    String(String),
    Object(TextObject),
    Other(Value),
}

#[derive(Debug, Deserialize)]
struct AuthorObject {
    name: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AuthorType {
    String(String),
    Multiple(Vec<AuthorType>),
    Object(AuthorObject),
    Other(Value),
}

#[derive(Debug, Deserialize)]
struct ImageObject {
    url: Option<String>,
    #[serde(rename = "contentUrl")]
    content_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImageType {
    String(String),
    Multiple(Vec<ImageType>),
    Object(ImageObject),
    Other(Value),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrList {
    String(String),
    Multiple(Vec<Value>),
    Other(Value),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecipeIngredients {
    Strings(Vec<Value>),
    Single(String),
    Other(Value),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecipeInstructions {
    String(String),
    Multiple(Vec<InstructionItem>),
    Other(Value),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InstructionItem {
    String(String),
    // some sites nest step lists one level deeper
    Group(Vec<InstructionItem>),
    Object(HowToObject),
    Other(Value),
}

/// A `HowToStep`, or a `HowToSection` carrying its steps in `itemListElement`
#[derive(Debug, Deserialize)]
struct HowToObject {
    text: Option<Value>,
    name: Option<Value>,
    image: Option<ImageType>,
    url: Option<Value>,
    #[serde(rename = "itemListElement")]
    item_list_element: Option<Vec<InstructionItem>>,
}

impl StringOrList {
    fn values(&self) -> Vec<String> {
        match self {
            StringOrList::String(s) => vec![s.clone()],
            StringOrList::Multiple(items) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            StringOrList::Other(_) => Vec::new(),
        }
    }

    /// First non-empty cleaned value
    fn first(&self) -> Option<String> {
        self.values().iter().find_map(|v| clean_text(v))
    }
}

impl AuthorType {
    fn to_author(&self) -> Option<Author> {
        match self {
            AuthorType::String(name) => clean_text(name).map(|name| Author { name, url: None }),
            AuthorType::Object(obj) => obj.name.as_deref().and_then(clean_text).map(|name| Author {
                name,
                url: obj.url.clone(),
            }),
            AuthorType::Multiple(authors) => authors.iter().find_map(|a| a.to_author()),
            AuthorType::Other(_) => None,
        }
    }
}

impl ImageType {
    fn urls(&self) -> Vec<String> {
        let urls = match self {
            ImageType::String(url) => vec![decode_html_symbols(url.trim())],
            ImageType::Object(obj) => obj
                .url
                .as_ref()
                .or(obj.content_url.as_ref())
                .map(|url| vec![decode_html_symbols(url.trim())])
                .unwrap_or_default(),
            ImageType::Multiple(images) => images.iter().flat_map(|i| i.urls()).collect(),
            ImageType::Other(_) => Vec::new(),
        };
        urls.into_iter().filter(|url| !url.is_empty()).collect()
    }
}

fn value_text(value: &Option<Value>) -> Option<String> {
    value.as_ref().and_then(|v| v.as_str()).and_then(clean_text)
}

/// Join the texts of a list of steps into one string
fn join_steps(items: &[InstructionItem]) -> Option<String> {
    let parts: Vec<String> = items
        .iter()
        .filter_map(|item| item.to_step())
        .map(|step| step.text)
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

impl InstructionItem {
    /// Turn one instruction entry into a step. Sections collapse into a single
    /// step whose text joins the section's step texts.
    fn to_step(&self) -> Option<Step> {
        match self {
            InstructionItem::String(text) => clean_text(text).map(Step::new),
            InstructionItem::Group(items) => join_steps(items).map(Step::new),
            InstructionItem::Object(obj) => {
                let name = value_text(&obj.name);
                let text = value_text(&obj.text)
                    .or_else(|| obj.item_list_element.as_deref().and_then(join_steps))?;

                let mut step = Step::new(text);
                step.name = name.filter(|n| *n != step.text);
                step.image = obj.image.as_ref().and_then(|i| i.urls().into_iter().next());
                step.url = value_text(&obj.url);
                Some(step)
            }
            InstructionItem::Other(_) => None,
        }
    }
}

impl RecipeInstructions {
    fn to_steps(&self) -> Vec<Step> {
        match self {
            RecipeInstructions::String(text) => text
                .lines()
                .filter_map(clean_text)
                .map(Step::new)
                .collect(),
            RecipeInstructions::Multiple(items) => {
                items.iter().filter_map(|item| item.to_step()).collect()
            }
            RecipeInstructions::Other(_) => Vec::new(),
        }
    }
}

impl RecipeIngredients {
    fn lines(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            RecipeIngredients::Strings(items) => items.iter().filter_map(|v| v.as_str()).collect(),
            RecipeIngredients::Single(line) => line.lines().collect(),
            RecipeIngredients::Other(_) => Vec::new(),
        };
        raw.into_iter().filter_map(clean_text).collect()
    }
}

/// Servings from `recipeYield`: an integer, the first run of digits in a
/// string, or the first usable entry of an array.
fn servings_from_yield(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => DIGITS_REGEX
            .find(s)
            .and_then(|m| m.as_str().parse::<u32>().ok()),
        Value::Array(items) => items.iter().find_map(|item| match item {
            Value::Number(n) => n
                .as_u64()
                .filter(|n| *n > 0)
                .and_then(|n| u32::try_from(n).ok()),
            Value::String(_) => servings_from_yield(item),
            _ => None,
        }),
        _ => None,
    }
}

fn yield_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => clean_text(s),
        // prefer the descriptive entry, e.g. "4 servings" over "4"
        Value::Array(items) => items
            .iter()
            .filter_map(yield_text)
            .find(|s| s.contains(char::is_alphabetic))
            .or_else(|| items.iter().find_map(yield_text)),
        _ => None,
    }
}

fn keywords_from(keywords: &StringOrList) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in keywords.values() {
        for keyword in value.split(',').filter_map(clean_text) {
            if !out.contains(&keyword) {
                out.push(keyword);
            }
        }
    }
    out
}

impl JsonLdRecipe {
    fn into_recipe(self, url: &str) -> Recipe {
        let name = value_text(&self.name)
            .or_else(|| value_text(&self.headline))
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        let ingredient_lines = self
            .recipe_ingredient
            .as_ref()
            .or(self.ingredients.as_ref())
            .map(|i| i.lines())
            .unwrap_or_default();
        let ingredients: Vec<Ingredient> = ingredient_lines
            .iter()
            .map(|line| parse_ingredient_line(line))
            .collect();

        let steps = self
            .recipe_instructions
            .as_ref()
            .map(|i| i.to_steps())
            .unwrap_or_default();

        Recipe {
            name,
            description: self.description.and_then(|desc| match desc {
                DescriptionType::String(d) => clean_text(&d),
                DescriptionType::Object(d) => clean_text(&d.text),
                DescriptionType::Other(_) => None,
            }),
            author: self.author.as_ref().and_then(|a| a.to_author()),
            images: self.image.as_ref().map(|i| i.urls()).unwrap_or_default(),
            date_published: value_text(&self.date_published),
            keywords: self.keywords.as_ref().map(keywords_from).unwrap_or_default(),
            source_url: Some(url.to_string()),
            ingredients,
            instructions: Instructions::Steps(steps),
            category: self.recipe_category.as_ref().and_then(|c| c.first()),
            cuisine: self.recipe_cuisine.as_ref().and_then(|c| c.first()),
            cooking_method: self.cooking_method.as_ref().and_then(|c| c.first()),
            diets: self
                .suitable_for_diet
                .as_ref()
                .map(|d| {
                    d.values()
                        .iter()
                        .map(|v| clean_diet_value(v))
                        .filter(|v| !v.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            recipe_yield: self.recipe_yield.as_ref().and_then(yield_text),
            servings: self.recipe_yield.as_ref().and_then(servings_from_yield),
            prep_time: value_text(&self.prep_time).and_then(|d| duration_to_minutes(&d)),
            cook_time: value_text(&self.cook_time).and_then(|d| duration_to_minutes(&d)),
            nutrition: self.nutrition,
            video: self.video,
            rating: self.aggregate_rating,
            ..Recipe::default()
        }
    }
}

/// `@type` is "Recipe" (any case, as a string or inside an array of strings)
fn is_recipe_type(value: &Value) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => t.to_lowercase().contains("recipe"),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(|t| t.as_str())
            .any(|t| t.to_lowercase().contains("recipe")),
        _ => false,
    }
}

/// Search a parsed block: the object itself, then its `@graph`, then array items.
fn find_recipe(value: &Value) -> Option<&Value> {
    match value {
        Value::Object(obj) => {
            if is_recipe_type(value) {
                return Some(value);
            }
            obj.get("@graph")
                .and_then(|graph| graph.as_array())
                .and_then(|items| items.iter().find_map(find_recipe))
        }
        Value::Array(items) => items.iter().find_map(find_recipe),
        _ => None,
    }
}

/// Escape raw control characters that some sites leave inside JSON strings.
fn sanitize_json(json: &str) -> String {
    let mut result = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in json.chars() {
        if in_string {
            if escaped {
                escaped = false;
                result.push(c);
                continue;
            }
            match c {
                '\\' => {
                    escaped = true;
                    result.push(c);
                }
                '"' => {
                    in_string = false;
                    result.push(c);
                }
                '\n' => result.push_str("\\n"),
                '\r' => result.push_str("\\r"),
                '\t' => result.push_str("\\t"),
                c if c.is_control() => {}
                _ => result.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            result.push(c);
        }
    }

    result
}

fn parse_block(raw: &str) -> Option<Value> {
    let cleaned = HTML_COMMENT_REGEX.replace_all(raw, "").replace("\\/", "/");
    match serde_json::from_str::<Value>(cleaned.trim()) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("JsonLdExtractor: block did not parse ({}), retrying sanitized", e);
            serde_json::from_str::<Value>(sanitize_json(cleaned.trim()).as_str()).ok()
        }
    }
}

impl JsonLdExtractor {
    /// Find the first recipe object across all JSON-LD blocks of a page.
    pub fn find_recipe_json(html: &str) -> Option<Value> {
        for (index, cap) in JSONLD_REGEX.captures_iter(html).enumerate() {
            let Some(raw) = cap.get(1) else {
                continue;
            };

            let Some(json) = parse_block(raw.as_str()) else {
                debug!("JsonLdExtractor: skipping unparseable block {}", index);
                continue;
            };

            if let Some(recipe) = find_recipe(&json) {
                debug!("JsonLdExtractor: found recipe in block {}", index);
                return Some(recipe.clone());
            }
        }
        None
    }

    /// Map a schema.org Recipe object to a [`Recipe`].
    pub fn recipe_from_json(value: Value, url: &str) -> Recipe {
        match serde_json::from_value::<JsonLdRecipe>(value) {
            Ok(json_ld_recipe) => json_ld_recipe.into_recipe(url),
            Err(e) => {
                debug!("JsonLdExtractor: unexpected recipe shape: {}", e);
                JsonLdRecipe::default().into_recipe(url)
            }
        }
    }
}

impl Extractor for JsonLdExtractor {
    fn name(&self) -> &'static str {
        "json_ld"
    }

    fn parse(&self, context: &ParsingContext) -> Result<Recipe, ExtractError> {
        debug!("JsonLdExtractor: Starting parse for URL: {}", context.url);
        let recipe_json =
            Self::find_recipe_json(&context.html).ok_or(ExtractError::NoRecipeFound)?;
        Ok(Self::recipe_from_json(recipe_json, context.url.as_str()))
    }
}
