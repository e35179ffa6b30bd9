//! Object Liquefier CLI
//!
//! Usage:
//!   liquefier [OPTIONS] [INPUT]
//!
//! Options:
//!   -t, --type <NAME>        Type of the root object (default: its "$type" member)
//!   -r, --types <FILE>       Type registry (TOML format)
//!   -c, --config <FILE>      Settings file (TOML format)
//!   -d, --templates <DIR>    Template folder, overrides the settings
//!   -T, --template <FILE>    Ad-hoc template instead of the type's template
//!       --names              Print candidate template names for --type and exit
//!       --strict             Fail when no template is found
//!   -v, --verbose            Debug logging to stderr
//!   -h, --help               Print help

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::debug;

use object_liquefier::{
    LiquefyError, Liquefiable, Liquefier, ResolvedTemplate, Settings, TypeIdentity, TypeRegistry,
    Value,
};

#[derive(Parser)]
#[command(name = "liquefier")]
#[command(about = "Render JSON objects with templates chosen by their type")]
struct Cli {
    /// Input JSON file (reads from stdin if not provided)
    input: Option<PathBuf>,

    /// Type of the root object
    #[arg(short = 't', long = "type")]
    type_name: Option<String>,

    /// Type registry file (TOML format)
    #[arg(short = 'r', long)]
    types: Option<PathBuf>,

    /// Settings file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Template folder
    #[arg(short = 'd', long)]
    templates: Option<PathBuf>,

    /// Ad-hoc template file
    #[arg(short = 'T', long)]
    template: Option<PathBuf>,

    /// Print candidate template names for --type and exit
    #[arg(long)]
    names: bool,

    /// Fail when no template is found
    #[arg(long)]
    strict: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let registry = match &cli.types {
        Some(path) => TypeRegistry::from_file(path)
            .unwrap_or_else(|e| fail(&format!("Error loading types '{}': {}", path.display(), e))),
        None => TypeRegistry::new(),
    };
    debug!(types = ?registry.names().collect::<Vec<_>>(), "type registry loaded");

    let mut settings = match &cli.config {
        Some(path) => Settings::from_file(path)
            .unwrap_or_else(|e| fail(&format!("Error loading settings '{}': {}", path.display(), e))),
        None => Settings::default(),
    };
    if let Some(folder) = &cli.templates {
        settings.template_folder = folder.clone();
    }
    let liquefier = Liquefier::from_settings(settings);

    let root_type = cli.type_name.as_deref().map(|name| {
        registry
            .get(name)
            .unwrap_or_else(|| TypeIdentity::class(name, None))
    });

    if cli.names {
        let Some(ty) = &root_type else {
            fail("--names requires --type");
        };
        match liquefier.template_names(ty) {
            Ok(names) => {
                for name in names.possible_names() {
                    println!("{}", liquefier.settings().template_folder.join(name).display());
                }
            }
            Err(e) => fail(&format!("Error: {}", e)),
        }
        return;
    }

    let input = read_input(cli.input.as_deref());
    let json: serde_json::Value = serde_json::from_str(&input)
        .unwrap_or_else(|e| fail(&format!("Error parsing input JSON: {}", e)));
    let mut object = match Value::from_json_typed(json, &registry) {
        Ok(value) => value,
        Err(e) => fail(&format!("Error: {}", e)),
    };
    if let Some(ty) = root_type {
        match &mut object {
            Value::Object(root) => root.set_identity(ty),
            other => fail(&format!("--type needs an object, input is a {}", other.type_name())),
        }
    }
    debug!(ty = %object.type_identity(), "rendering input");

    let ad_hoc = cli.template.as_ref().map(|path| {
        fs::read_to_string(path)
            .unwrap_or_else(|e| fail(&format!("Error reading template '{}': {}", path.display(), e)))
    });

    let result = if cli.strict {
        liquefier.render_strict(&object, ad_hoc.as_deref()).map(Some)
    } else {
        liquefier.try_render(&object, ad_hoc.as_deref())
    };

    match result {
        Ok(Some(text)) => print!("{}", text),
        Ok(None) => debug!("no template found, nothing rendered"),
        Err(LiquefyError::Syntax(errors)) => {
            let (source, filename) = match (&ad_hoc, &cli.template) {
                (Some(text), Some(path)) => (Some(text.clone()), path.display().to_string()),
                _ => template_source(&liquefier, &object.type_identity()),
            };
            for error in &errors {
                match &source {
                    Some(source) => eprint!("{}", error.format(source, &filename)),
                    None => eprintln!("Error: {}", error),
                }
            }
            std::process::exit(1);
        }
        Err(LiquefyError::Template(e)) => {
            eprintln!("Error: {}", e);
            if let Some(name) = e.attempted() {
                for candidate in name.possible_names() {
                    eprintln!("  tried {}", liquefier.resolver().folder().join(candidate).display());
                }
            }
            std::process::exit(1);
        }
        Err(e) => fail(&format!("Error: {}", e)),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn read_input(path: Option<&Path>) -> String {
    match path {
        Some(path) => fs::read_to_string(path)
            .unwrap_or_else(|e| fail(&format!("Error reading file '{}': {}", path.display(), e))),
        None => {
            let mut buffer = String::new();
            match io::stdin().read_to_string(&mut buffer) {
                Ok(_) => buffer,
                Err(e) => fail(&format!("Error reading from stdin: {}", e)),
            }
        }
    }
}

/// Source and file name of the template chosen for `ty`, for error reports
fn template_source(liquefier: &Liquefier, ty: &TypeIdentity) -> (Option<String>, String) {
    let resolved = liquefier
        .template_names(ty)
        .map(|names| liquefier.resolver().resolve(&names));
    match resolved {
        Ok(ResolvedTemplate::Found(path)) => {
            let source = liquefier.resolver().read(&path).ok();
            (source, path.display().to_string())
        }
        _ => (None, ty.qualified_name().to_string()),
    }
}

fn fail(message: &str) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}
