use std::path::PathBuf;

use clap::{Parser, Subcommand};

use config_mirror::config::load_settings;
use config_mirror::gray::Subject;
use config_mirror::lifecycle;
use config_mirror::observability::logging;

#[derive(Parser)]
#[command(name = "mirror-cli")]
#[command(about = "Inspect and publish mirrored configuration", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "mirror.toml")]
    settings: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print one config value
    Get { section: String, key: String },
    /// Evaluate a gray rule (`section.key`) for a subject
    Gray { name: String, subject: String },
    /// Dump the cache as JSON, optionally one section only
    Dump { section: Option<String> },
    /// Overwrite a section node with the contents of a file
    Publish { section: String, file: PathBuf },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = load_settings(&cli.settings)?;
    logging::init_logging(&settings.observability);

    let mirror = lifecycle::start(&settings)?;

    match cli.command {
        Commands::Get { section, key } => match mirror.get(&section, &key) {
            Some(value) => println!("{}", value),
            None => {
                eprintln!("Error: {}.{} is not set", section, key);
                std::process::exit(1);
            }
        },
        Commands::Gray { name, subject } => {
            let subject = if let Ok(id) = subject.parse::<i64>() {
                Subject::Id(id)
            } else if let Ok(id) = subject.parse::<u64>() {
                Subject::Unsigned(id)
            } else {
                Subject::Text(&subject)
            };
            let allowed = mirror.is_allowed(&name, subject);
            println!("{}", if allowed { "allowed" } else { "denied" });
        }
        Commands::Dump { section } => {
            let snapshot = mirror.cache().snapshot();
            let json = match section {
                Some(name) => match snapshot.get(&name) {
                    Some(entries) => serde_json::to_string_pretty(entries)?,
                    None => {
                        eprintln!("Error: section {} is not cached", name);
                        std::process::exit(1);
                    }
                },
                None => serde_json::to_string_pretty(&snapshot)?,
            };
            println!("{}", json);
        }
        Commands::Publish { section, file } => {
            let blob = std::fs::read_to_string(&file)?;
            mirror.sync().publish(&section, &blob)?;
            println!("published {} ({} bytes)", section, blob.len());
        }
    }

    mirror.shutdown();
    Ok(())
}
