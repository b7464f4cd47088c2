//! Command-line interface for xmlschema-compositor

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use std::sync::Arc;

#[cfg(feature = "cli")]
use compositor::compositor::{Group, Guard, GuardOptions, Occurrence, Particle};
#[cfg(feature = "cli")]
use compositor::definitions::SchemaDefinitions;
#[cfg(feature = "cli")]
use compositor::documents::{Element, InstanceDocument};
#[cfg(feature = "cli")]
use compositor::namespaces::QName;
#[cfg(feature = "cli")]
use compositor::Resolver;

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "compositor")]
#[command(author, version, about = "XML Schema content-model matching tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(clap::Args, Debug)]
struct Target {
    /// Path to the JSON schema definitions
    #[arg(short, long, value_name = "DEFINITIONS")]
    definitions: PathBuf,

    /// Path to the XML instance document
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Named type whose content model applies (defaults to the model of
    /// the global element at the path)
    #[arg(short = 't', long = "type")]
    type_name: Option<String>,

    /// Element whose children are matched
    #[arg(short, long, default_value = "/")]
    path: String,

    /// Let each choice alternative be chosen at most once
    #[arg(long)]
    exclusive: bool,

    /// Output as JSON
    #[arg(short, long)]
    json: bool,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Check the children of an element against its content model
    Check {
        #[command(flatten)]
        target: Target,
    },

    /// Tell whether a child could be inserted into an element
    Accepts {
        #[command(flatten)]
        target: Target,

        /// Name of the new child (prefixed, or `{uri}local`)
        #[arg(short, long)]
        name: String,

        /// Insertion position among the children (defaults to the end)
        #[arg(long)]
        position: Option<usize>,
    },

    /// List the content models of a definitions file
    Inspect {
        /// Path to the JSON schema definitions
        #[arg(short, long, value_name = "DEFINITIONS")]
        definitions: PathBuf,

        /// Show only this type
        #[arg(short = 't', long = "type")]
        type_name: Option<String>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

#[cfg(feature = "cli")]
type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { target } => cmd_check(target),
        Commands::Accepts {
            target,
            name,
            position,
        } => cmd_accepts(target, name, position),
        Commands::Inspect {
            definitions,
            type_name,
            json,
        } => cmd_inspect(definitions, type_name, json),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

/// Definitions, instance and the selected element with its content model
#[cfg(feature = "cli")]
struct Loaded {
    defs: SchemaDefinitions,
    element: Element,
    model: Arc<Group>,
    children: Vec<QName>,
}

#[cfg(feature = "cli")]
fn load(target: &Target) -> CliResult<Loaded> {
    let defs = SchemaDefinitions::from_file(&target.definitions)?;
    defs.check()?;
    let document = InstanceDocument::from_file(&target.file)?;
    let element = document.find(&target.path)?.clone();

    let model = match &target.type_name {
        Some(type_name) => defs
            .type_model(type_name)
            .ok_or_else(|| format!("Type '{}' not found", type_name))?,
        None => defs
            .element_model(&element.name)
            .ok_or_else(|| format!("No content model for element '{}'", element.name))?,
    }
    .clone();

    let children = element.child_names();
    Ok(Loaded {
        defs,
        element,
        model,
        children,
    })
}

#[cfg(feature = "cli")]
fn options(target: &Target) -> GuardOptions {
    GuardOptions::new().mutually_exclusive(target.exclusive)
}

#[cfg(feature = "cli")]
fn occurrence_json(occurrence: &Occurrence) -> serde_json::Value {
    serde_json::json!({
        "start": occurrence.span().start,
        "end": occurrence.span().end,
        "counts": occurrence.counts(),
    })
}

#[cfg(feature = "cli")]
fn cmd_check(target: Target) -> CliResult<bool> {
    let loaded = load(&target)?;
    let guard = Guard::with_options(&loaded.model, &loaded.defs, &loaded.children, options(&target));
    let verdict = guard.check_valid();

    if target.json {
        let json = serde_json::json!({
            "element": loaded.element.name.to_string(),
            "compositor": guard.kind().to_string(),
            "valid": verdict.is_ok(),
            "reason": verdict.as_ref().err().map(|e| e.to_string()),
            "occurrences": guard.occurrences().iter().map(occurrence_json).collect::<Vec<_>>(),
            "acceptable": guard.acceptable_members().map(|names| {
                names.iter().map(|n| n.to_string()).collect::<Vec<_>>()
            }),
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        match &verdict {
            Ok(()) => println!("✓ {} is valid", loaded.element.name),
            Err(e) => println!("✗ {} is invalid: {}", loaded.element.name, e),
        }
        println!("{}", guard.describe());
    }
    Ok(verdict.is_ok())
}

#[cfg(feature = "cli")]
fn parse_name(defs: &SchemaDefinitions, name: &str) -> CliResult<QName> {
    if name.starts_with('{') {
        Ok(QName::from_clark(name)?)
    } else {
        Ok(defs.resolve_instance_name(name)?)
    }
}

#[cfg(feature = "cli")]
fn cmd_accepts(target: Target, name: String, position: Option<usize>) -> CliResult<bool> {
    let loaded = load(&target)?;
    let new_name = parse_name(&loaded.defs, &name)?;
    let at = position.unwrap_or(loaded.children.len());
    let guard = Guard::with_options(&loaded.model, &loaded.defs, &loaded.children, options(&target));
    let accepted = guard.accepts_new_member_at(&new_name, at);

    if target.json {
        let json = serde_json::json!({
            "element": loaded.element.name.to_string(),
            "name": new_name.to_string(),
            "position": at,
            "accepted": accepted,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else if accepted {
        println!("✓ {} may be inserted at position {}", new_name, at);
    } else {
        println!("✗ {} may not be inserted at position {}", new_name, at);
    }
    Ok(true)
}

#[cfg(feature = "cli")]
fn cmd_inspect(definitions: PathBuf, type_name: Option<String>, json_output: bool) -> CliResult<bool> {
    let defs = SchemaDefinitions::from_file(&definitions)?;

    let mut types: Vec<(QName, Arc<Group>)> = Vec::new();
    match &type_name {
        Some(name) => {
            let model = defs
                .type_model(name)
                .ok_or_else(|| format!("Type '{}' not found", name))?;
            types.push((defs.qualify(name)?, model.clone()));
        }
        None => {
            for name in defs.type_names() {
                if let Some(model) = defs.type_model(&name.local_name) {
                    types.push((name.clone(), model.clone()));
                }
            }
        }
    }

    let mut report = Vec::new();
    for (name, model) in &types {
        let leaves = model.leaf_member_names(&defs)?;
        report.push(serde_json::json!({
            "name": name.to_string(),
            "compositor": model.model().to_string(),
            "occurs": model.occurs().occurs_info(),
            "leafNames": leaves.iter().map(|n| n.to_string()).collect::<Vec<_>>(),
            "wildcard": leaves.has_wildcard(),
        }));
    }

    if json_output {
        let json = serde_json::json!({
            "targetNamespace": defs.target_namespace(),
            "elements": defs.elements().map(|e| e.info.name.to_string()).collect::<Vec<_>>(),
            "groups": defs.group_names().map(|n| n.to_string()).collect::<Vec<_>>(),
            "types": report,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(true);
    }

    println!("xmlschema-compositor v{}", compositor::VERSION);
    println!();
    println!("Target Namespace: {}", defs.target_namespace().unwrap_or("(none)"));
    println!("Global Elements: {}", defs.elements().count());
    println!("Model Groups: {}", defs.group_names().count());
    println!("Types: {}", types.len());
    for (name, model) in &types {
        let leaves = model.leaf_member_names(&defs)?;
        println!();
        println!("{} ({}, {})", name, model.model(), model.occurs().occurs_info());
        for leaf in leaves.iter() {
            println!("  {}", leaf);
        }
        for constraint in leaves.wildcards() {
            println!("  any ({})", constraint);
        }
    }
    Ok(true)
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Build with --features cli");
    std::process::exit(1);
}
