//! Record Validator CLI
//!
//! Validates record files and template definition files without a server.

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gif_cms::{logging, CmsConfig, TemplateDefinition, TemplateRegistry, Validator};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gif-cms-validate")]
#[command(about = "Validate records and template definitions")]
struct Cli {
    /// Config file to load (optional)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available templates
    Templates,

    /// Validate records against a template
    Records {
        /// Template id
        #[arg(short, long)]
        template: String,
        /// JSON file holding one record object or an array of records
        file: PathBuf,
    },

    /// Check template definition files
    Definitions {
        /// JSON files, each one template definition
        files: Vec<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_registry(config: &CmsConfig) -> Result<TemplateRegistry, Box<dyn std::error::Error>> {
    let mut registry = if config.registry.include_builtin {
        TemplateRegistry::with_builtins()?
    } else {
        TemplateRegistry::new()
    };
    if let Some(dir) = &config.registry.templates_dir {
        registry.load_dir(dir)?;
    }
    Ok(registry)
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = CmsConfig::load_from(cli.config.as_deref())?;
    logging::init(&config.logging);
    let registry = load_registry(&config)?;

    match cli.command {
        Commands::Templates => {
            for template in registry.list() {
                let mandatory = template.mandatory_fields().count();
                println!(
                    "{:<24} {:>2} fields ({} mandatory)  {}",
                    template.id,
                    template.fields.len(),
                    mandatory,
                    template.label
                );
            }
            Ok(())
        }

        Commands::Records { template, file } => {
            let content = fs::read_to_string(&file)?;
            let records = match serde_json::from_str::<Value>(&content)? {
                Value::Array(items) => items,
                single => vec![single],
            };

            let validator = Validator::new(config.validator_options());
            let mut failed = 0;
            for (i, item) in records.iter().enumerate() {
                let Some(record) = item.as_object() else {
                    println!("❌ #{} - not a JSON object", i + 1);
                    failed += 1;
                    continue;
                };
                match validator.validate(&registry, &template, record) {
                    Ok(validated) => println!("✅ #{} - valid ({} values)", i + 1, validated.values.len()),
                    Err(failure) => {
                        failed += 1;
                        println!("❌ #{} - {}", i + 1, failure);
                        for message in failure.messages() {
                            println!("   └─ {}", message);
                        }
                    }
                }
            }

            println!();
            if failed > 0 {
                println!("❌ {} of {} record(s) failed validation", failed, records.len());
                std::process::exit(1);
            }
            println!("✅ All {} record(s) valid against {}", records.len(), template);
            Ok(())
        }

        Commands::Definitions { files } => {
            let mut scratch = registry;
            let mut all_valid = true;
            for path in &files {
                let outcome = fs::read_to_string(path)
                    .map_err(gif_cms::RegistryError::from)
                    .and_then(|content| Ok(serde_json::from_str::<TemplateDefinition>(&content)?))
                    .and_then(|definition| scratch.add(definition).map(|t| t.id.clone()));
                match outcome {
                    Ok(id) => println!("✅ {} - {}", path.display(), id),
                    Err(e) => {
                        all_valid = false;
                        println!("❌ {} - {}", path.display(), e);
                    }
                }
            }
            if !all_valid {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
