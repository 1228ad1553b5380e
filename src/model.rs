use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Canonical recipe record produced by the extractors and kept by the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub author: Option<Author>,
    #[serde(default)]
    pub images: Vec<String>,
    pub date_published: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(rename = "sourceURL")]
    pub source_url: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub instructions: Instructions,
    pub category: Option<String>,
    pub cuisine: Option<String>,
    pub cooking_method: Option<String>,
    #[serde(default)]
    pub diets: Vec<String>,
    pub recipe_yield: Option<String>,
    pub servings: Option<u32>,
    /// Minutes
    pub prep_time: Option<u32>,
    /// Minutes
    pub cook_time: Option<u32>,
    pub nutrition: Option<Value>,
    pub video: Option<Value>,
    pub rating: Option<Value>,
    pub notes: Option<String>,
}

impl Default for Recipe {
    fn default() -> Self {
        Recipe {
            id: Uuid::new_v4(),
            name: String::new(),
            description: None,
            author: None,
            images: Vec::new(),
            date_published: None,
            keywords: Vec::new(),
            source_url: None,
            ingredients: Vec::new(),
            instructions: Instructions::default(),
            category: None,
            cuisine: None,
            cooking_method: None,
            diets: Vec::new(),
            recipe_yield: None,
            servings: None,
            prep_time: None,
            cook_time: None,
            nutrition: None,
            video: None,
            rating: None,
            notes: None,
        }
    }
}

impl Recipe {
    /// Create an empty recipe with a fresh id
    pub fn new(name: impl Into<String>) -> Self {
        Recipe {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Total time in minutes, derived from the prep and cook parts.
    pub fn total_time(&self) -> Option<u32> {
        match (self.prep_time, self.cook_time) {
            (Some(prep), Some(cook)) => Some(prep + cook),
            (Some(prep), None) => Some(prep),
            (None, Some(cook)) => Some(cook),
            (None, None) => None,
        }
    }

    /// A recipe needs a non-blank name to be kept
    pub fn has_valid_name(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub url: Option<String>,
}

/// A structured ingredient line.
///
/// `quantity` of 0 means unspecified and an empty `units` means no unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub quantity: f64,
    pub units: String,
    pub raw: Option<String>,
}

impl Ingredient {
    pub fn new(name: impl Into<String>, quantity: f64, units: impl Into<String>) -> Self {
        Ingredient {
            id: Uuid::new_v4(),
            name: name.into(),
            quantity,
            units: units.into(),
            raw: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: Uuid,
    pub name: Option<String>,
    pub text: String,
    pub image: Option<String>,
    pub url: Option<String>,
}

impl Step {
    pub fn new(text: impl Into<String>) -> Self {
        Step {
            id: Uuid::new_v4(),
            name: None,
            text: text.into(),
            image: None,
            url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: Uuid,
    pub name: String,
    pub steps: Vec<Step>,
}

impl Section {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Section {
            id: Uuid::new_v4(),
            name: name.into(),
            steps,
        }
    }
}

/// Instructions are either a flat list of steps or a list of named sections,
/// never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "items", rename_all = "camelCase")]
pub enum Instructions {
    Steps(Vec<Step>),
    Sections(Vec<Section>),
}

impl Default for Instructions {
    fn default() -> Self {
        Instructions::Steps(Vec::new())
    }
}

impl Instructions {
    pub fn is_empty(&self) -> bool {
        match self {
            Instructions::Steps(steps) => steps.is_empty(),
            Instructions::Sections(sections) => sections.iter().all(|s| s.steps.is_empty()),
        }
    }

    /// All steps in reading order, across sections
    pub fn steps(&self) -> Vec<&Step> {
        match self {
            Instructions::Steps(steps) => steps.iter().collect(),
            Instructions::Sections(sections) => {
                sections.iter().flat_map(|s| s.steps.iter()).collect()
            }
        }
    }

    pub fn texts(&self) -> Vec<&str> {
        self.steps().into_iter().map(|s| s.text.as_str()).collect()
    }
}

/// Per-record sync state kept in the local cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncStatus {
    Synced,
    PendingUpload,
    PendingDelete,
}

/// Cached projection of a [`Recipe`] plus sync metadata.
///
/// Child rows refer back to their recipe (and steps to their section) by id;
/// [`CachedRecipe::to_recipe`] resolves them into the nested shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedRecipe {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub author_name: Option<String>,
    pub author_url: Option<String>,
    pub images: Vec<String>,
    pub date_published: Option<String>,
    pub keywords: Vec<String>,
    pub source_url: Option<String>,
    pub category: Option<String>,
    pub cuisine: Option<String>,
    pub cooking_method: Option<String>,
    pub diets: Vec<String>,
    pub recipe_yield: Option<String>,
    pub servings: Option<u32>,
    pub prep_time: Option<u32>,
    pub cook_time: Option<u32>,
    pub nutrition_json: Option<String>,
    pub video_json: Option<String>,
    pub rating_json: Option<String>,
    pub notes: Option<String>,
    pub ingredients: Vec<CachedIngredient>,
    pub sections: Vec<CachedSection>,
    pub steps: Vec<CachedStep>,
    pub last_modified: DateTime<Utc>,
    pub needs_sync: bool,
    pub sync_status: SyncStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedIngredient {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub position: u32,
    pub name: String,
    pub quantity: f64,
    pub units: String,
    pub raw: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedSection {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub position: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedStep {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub section_id: Option<Uuid>,
    pub position: u32,
    pub name: Option<String>,
    pub text: String,
    pub image: Option<String>,
    pub url: Option<String>,
}

impl CachedStep {
    fn from_step(step: &Step, recipe_id: Uuid, section_id: Option<Uuid>, position: u32) -> Self {
        CachedStep {
            id: step.id,
            recipe_id,
            section_id,
            position,
            name: step.name.clone(),
            text: step.text.clone(),
            image: step.image.clone(),
            url: step.url.clone(),
        }
    }

    fn to_step(&self) -> Step {
        Step {
            id: self.id,
            name: self.name.clone(),
            text: self.text.clone(),
            image: self.image.clone(),
            url: self.url.clone(),
        }
    }
}

fn encode_value(value: &Option<Value>) -> Option<String> {
    value.as_ref().map(|v| v.to_string())
}

fn decode_value(json: &Option<String>) -> Option<Value> {
    json.as_deref()
        .and_then(|s| serde_json::from_str(s).ok())
}

impl CachedRecipe {
    /// Project a recipe into its cache representation with the given sync status.
    pub fn from_recipe(recipe: &Recipe, status: SyncStatus) -> Self {
        let recipe_id = recipe.id;

        let ingredients = recipe
            .ingredients
            .iter()
            .enumerate()
            .map(|(position, ing)| CachedIngredient {
                id: ing.id,
                recipe_id,
                position: position as u32,
                name: ing.name.clone(),
                quantity: ing.quantity,
                units: ing.units.clone(),
                raw: ing.raw.clone(),
            })
            .collect();

        let mut sections = Vec::new();
        let mut steps = Vec::new();
        match &recipe.instructions {
            Instructions::Steps(list) => {
                for (position, step) in list.iter().enumerate() {
                    steps.push(CachedStep::from_step(step, recipe_id, None, position as u32));
                }
            }
            Instructions::Sections(list) => {
                for (section_pos, section) in list.iter().enumerate() {
                    sections.push(CachedSection {
                        id: section.id,
                        recipe_id,
                        position: section_pos as u32,
                        name: section.name.clone(),
                    });
                    for (position, step) in section.steps.iter().enumerate() {
                        steps.push(CachedStep::from_step(
                            step,
                            recipe_id,
                            Some(section.id),
                            position as u32,
                        ));
                    }
                }
            }
        }

        CachedRecipe {
            id: recipe_id,
            name: recipe.name.clone(),
            description: recipe.description.clone(),
            author_name: recipe.author.as_ref().map(|a| a.name.clone()),
            author_url: recipe.author.as_ref().and_then(|a| a.url.clone()),
            images: recipe.images.clone(),
            date_published: recipe.date_published.clone(),
            keywords: recipe.keywords.clone(),
            source_url: recipe.source_url.clone(),
            category: recipe.category.clone(),
            cuisine: recipe.cuisine.clone(),
            cooking_method: recipe.cooking_method.clone(),
            diets: recipe.diets.clone(),
            recipe_yield: recipe.recipe_yield.clone(),
            servings: recipe.servings,
            prep_time: recipe.prep_time,
            cook_time: recipe.cook_time,
            nutrition_json: encode_value(&recipe.nutrition),
            video_json: encode_value(&recipe.video),
            rating_json: encode_value(&recipe.rating),
            notes: recipe.notes.clone(),
            ingredients,
            sections,
            steps,
            last_modified: Utc::now(),
            needs_sync: status != SyncStatus::Synced,
            sync_status: status,
        }
    }

    /// Rebuild the nested recipe from the cached rows.
    pub fn to_recipe(&self) -> Recipe {
        let mut ingredients: Vec<&CachedIngredient> = self
            .ingredients
            .iter()
            .filter(|i| i.recipe_id == self.id)
            .collect();
        ingredients.sort_by_key(|i| i.position);

        let mut steps: Vec<&CachedStep> =
            self.steps.iter().filter(|s| s.recipe_id == self.id).collect();
        steps.sort_by_key(|s| s.position);

        let instructions = if self.sections.is_empty() {
            Instructions::Steps(
                steps
                    .iter()
                    .filter(|s| s.section_id.is_none())
                    .map(|s| s.to_step())
                    .collect(),
            )
        } else {
            let mut sections: Vec<&CachedSection> = self
                .sections
                .iter()
                .filter(|s| s.recipe_id == self.id)
                .collect();
            sections.sort_by_key(|s| s.position);
            Instructions::Sections(
                sections
                    .into_iter()
                    .map(|section| Section {
                        id: section.id,
                        name: section.name.clone(),
                        steps: steps
                            .iter()
                            .filter(|s| s.section_id == Some(section.id))
                            .map(|s| s.to_step())
                            .collect(),
                    })
                    .collect(),
            )
        };

        Recipe {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            author: self.author_name.clone().map(|name| Author {
                name,
                url: self.author_url.clone(),
            }),
            images: self.images.clone(),
            date_published: self.date_published.clone(),
            keywords: self.keywords.clone(),
            source_url: self.source_url.clone(),
            ingredients: ingredients
                .into_iter()
                .map(|i| Ingredient {
                    id: i.id,
                    name: i.name.clone(),
                    quantity: i.quantity,
                    units: i.units.clone(),
                    raw: i.raw.clone(),
                })
                .collect(),
            instructions,
            category: self.category.clone(),
            cuisine: self.cuisine.clone(),
            cooking_method: self.cooking_method.clone(),
            diets: self.diets.clone(),
            recipe_yield: self.recipe_yield.clone(),
            servings: self.servings,
            prep_time: self.prep_time,
            cook_time: self.cook_time,
            nutrition: decode_value(&self.nutrition_json),
            video: decode_value(&self.video_json),
            rating: decode_value(&self.rating_json),
            notes: self.notes.clone(),
        }
    }

    /// Replace the content with `recipe`, keeping the id and sync metadata.
    pub fn apply(&mut self, recipe: &Recipe) {
        let status = self.sync_status;
        let needs_sync = self.needs_sync;
        let last_modified = self.last_modified;
        *self = CachedRecipe::from_recipe(recipe, status);
        self.needs_sync = needs_sync;
        self.last_modified = last_modified;
    }
}
