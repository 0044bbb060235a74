//! CMS Config CLI
//!
//! View and manage service configuration.

use clap::{Parser, Subcommand};
use gif_cms::CmsConfig;

#[derive(Parser)]
#[command(name = "gif-cms-config")]
#[command(about = "View and manage gif-cms configuration")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current configuration
    Show {
        /// Config file to load (optional)
        #[arg(short, long)]
        config: Option<String>,

        /// Output as TOML
        #[arg(long)]
        toml: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Initialize a new config file
    Init {
        /// Output path (default: gif-cms.toml)
        #[arg(short, long, default_value = "gif-cms.toml")]
        output: String,
    },

    /// Validate configuration
    Validate {
        /// Config file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Show { config, toml, json } => {
            let cfg = CmsConfig::load_from(config.as_deref())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&cfg)?);
            } else if toml {
                println!("{}", ::toml::to_string_pretty(&cfg)?);
            } else {
                println!("📋 gif-cms Configuration\n");
                println!("Server:");
                println!("  Bind: {}", cfg.server.bind);

                println!("\nRegistry:");
                println!("  Built-in templates: {}", cfg.registry.include_builtin);
                println!("  Templates dir: {:?}", cfg.registry.templates_dir);

                println!("\nValidation:");
                println!("  Reject unknown fields: {}", cfg.validation.reject_unknown_fields);
                println!("  Coerce strings: {}", cfg.validation.coerce_strings);

                println!("\nLogging:");
                println!("  Filter: {}", cfg.logging.filter);

                println!("\nExport:");
                println!("  CKAN owner org: {:?}", cfg.export.ckan_owner_org);
                println!("  CKAN license: {}", cfg.export.ckan_license_id);
                println!("  NGSI-LD context: {}", cfg.export.ngsi_ld_context);
            }
        }

        Commands::Init { output } => {
            let cfg = CmsConfig::default();
            cfg.save(&output)?;
            println!("✅ Created config file: {}", output);
        }

        Commands::Validate { config } => match CmsConfig::load_from(config.as_deref()) {
            Ok(cfg) => {
                println!("✅ Configuration is valid");
                println!("   Bind: {}", cfg.server.bind);
                if let Some(dir) = &cfg.registry.templates_dir {
                    if !dir.is_dir() {
                        eprintln!("❌ templates_dir {:?} is not a directory", dir);
                        std::process::exit(1);
                    }
                }
            }
            Err(e) => {
                eprintln!("❌ Configuration error: {}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}
