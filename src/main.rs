use log::debug;
use recipe_keeper::{open_engine, parse_ingredient_line, AppConfig, Recipe, RecipeExtractor};
use std::env;
use std::error::Error;
use uuid::Uuid;

const USAGE: &str = "Usage: recipe-keeper <command>

Commands:
  import <url>     Import a recipe from a web page
  list             List cached recipes
  show <id>        Print a cached recipe as JSON
  delete <id>      Delete a recipe
  sync             Sync with the remote store
  parse <line>     Parse an ingredient line";

fn arg<'a>(args: &'a [String], index: usize, what: &str) -> Result<&'a str, Box<dyn Error>> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| format!("Please provide {}\n\n{}", what, USAGE).into())
}

fn print_recipe_line(recipe: &Recipe) {
    let total = recipe
        .total_time()
        .map(|m| format!(" ({} min)", m))
        .unwrap_or_default();
    println!("{}  {}{}", recipe.id, recipe.name, total);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let command = arg(&args, 1, "a command")?;

    // parsing needs neither config nor cache
    if command == "parse" {
        let line = args[2..].join(" ");
        let ingredient = parse_ingredient_line(&line);
        println!("quantity: {}", ingredient.quantity);
        println!("units:    {}", ingredient.units);
        println!("name:     {}", ingredient.name);
        return Ok(());
    }

    let config = AppConfig::load()?;
    debug!("{:#?}", config);
    let engine = open_engine(&config).await?;

    match command {
        "import" => {
            let url = arg(&args, 2, "a recipe URL")?;
            let extractor = RecipeExtractor::new(&config.fetch)?;
            let recipe = engine.import_url(&extractor, url).await?;
            print_recipe_line(&recipe);
            engine.sync_with_remote().await;
        }
        "list" => {
            for recipe in engine.recipes().await {
                print_recipe_line(&recipe);
            }
            return Ok(());
        }
        "show" => {
            let id = Uuid::parse_str(arg(&args, 2, "a recipe id")?)?;
            let record = engine
                .record(id)
                .await
                .ok_or_else(|| format!("No recipe with id {}", id))?;
            println!("{}", serde_json::to_string_pretty(&record.to_recipe())?);
            return Ok(());
        }
        "delete" => {
            let id = Uuid::parse_str(arg(&args, 2, "a recipe id")?)?;
            engine.delete_recipe(id).await?;
            engine.sync_with_remote().await;
        }
        "sync" => engine.sync_with_remote().await,
        other => return Err(format!("Unknown command '{}'\n\n{}", other, USAGE).into()),
    }

    println!("sync: {}", engine.status().await);
    Ok(())
}
