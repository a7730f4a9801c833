//! Framebind CLI - bind a set of frames to a recipe's declared inputs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::fs;

use framebind::{
    parse_manifest, BindError, BindingReport, FixSuggestion, Recipe, TraitRegistry,
};

#[derive(Parser)]
#[command(name = "framebind")]
#[command(about = "Framebind - frame classification and input binding for data-reduction recipes")]
#[command(version)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bind a set-of-frames manifest to a recipe's inputs
    Bind {
        /// Path to the recipe definition (.yaml)
        recipe: String,

        /// Path to the manifest (`<path> <tag> [group]` per line)
        manifest: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Compile and self-test a recipe definition
    Check {
        /// Path to the recipe definition (.yaml)
        recipe: String,
    },

    /// List the registered trait families
    Traits,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let registry = TraitRegistry::builtin();

    let result = match cli.command {
        Commands::Bind {
            recipe,
            manifest,
            format,
        } => bind(&registry, &recipe, &manifest, format),
        Commands::Check { recipe } => check(&registry, &recipe),
        Commands::Traits => {
            list_traits(&registry);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.downcast_ref::<BindError>().and_then(|b| b.fix_suggestion()) {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn load_recipe(registry: &TraitRegistry, path: &str) -> Result<Recipe> {
    let yaml = fs::read_to_string(path)
        .with_context(|| format!("Failed to read recipe from {:?}", path))?;
    Ok(Recipe::from_yaml(&yaml, registry)?)
}

fn bind(registry: &TraitRegistry, recipe_path: &str, manifest_path: &str, format: Format) -> Result<()> {
    let recipe = load_recipe(registry, recipe_path)?;

    let text = fs::read_to_string(manifest_path)
        .with_context(|| format!("Failed to read manifest from {:?}", manifest_path))?;
    let frames = parse_manifest(&text)?;

    let set = recipe.bind(&frames)?;
    let report = BindingReport::build(&recipe, &set)?;

    match format {
        Format::Json => println!("{}", report.to_json()?),
        Format::Text => print_report(&report),
    }
    Ok(())
}

fn print_report(report: &BindingReport) {
    println!("{} Recipe: {}", "→".cyan(), report.recipe.cyan().bold());

    for input in &report.inputs {
        let necessity = if input.required { "required" } else { "optional" };
        println!(
            "  {} ({}, {}, {}): {}",
            input.name.bold(),
            input.kind,
            input.group,
            necessity,
            input.title
        );
        if input.frames.is_empty() {
            println!("    {}", "(no frames)".dimmed());
        }
        for path in &input.frames {
            println!("    {}", path);
        }
        if !input.params.is_empty() {
            println!("    params: {}", format_params(input));
        }
    }

    if !report.products.is_empty() {
        println!("{}", "Products:".cyan().bold());
        for product in &report.products {
            println!("  {} → {} ({})", product.name, product.tag, product.filename);
        }
    }

    for warning in &report.warnings {
        println!(
            "{} {}: discarded {}, kept {}",
            "⚠".yellow(),
            warning.input,
            warning.discarded,
            warning.kept
        );
    }
    for path in &report.unclaimed {
        println!("{} unclaimed frame: {}", "⚠".yellow(), path);
    }

    println!("{} Input set verified ({} inputs)", "✓".green(), report.inputs.len());
}

fn format_params(input: &framebind::report::InputReport) -> String {
    input
        .params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

fn check(registry: &TraitRegistry, recipe_path: &str) -> Result<()> {
    let recipe = load_recipe(registry, recipe_path)?;

    println!("{} Recipe '{}' is valid", "✓".green(), recipe.name);
    println!("  Inputs: {}", recipe.inputs.inputs.len());
    for def in &recipe.inputs.inputs {
        println!("    {} ({}): {}", def.name, def.kind, def.pattern);
    }
    println!("  Products: {}", recipe.products.len());
    Ok(())
}

fn list_traits(registry: &TraitRegistry) {
    for family in registry.families() {
        println!("{}: {}", family.key.bold(), family.values.join(", "));
    }
}
