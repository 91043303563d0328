//! Sideload CLI - command-line host for the sideload bootstrapper
//!
//! Commands:
//! - sideload run <module> --entry <type> - Load, attach and start a module
//! - sideload inspect <module> - List the types a module declares

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sideload::{
    BootstrapOptions, Bootstrapper, HostEnvironment, HostProfile, ModuleLoader, ModuleReference,
    RuntimeLimits, TypeDescriptor, Visibility,
};


#[derive(Parser)]
#[command(name = "sideload")]
#[command(about = "Load and start WebAssembly components out of band", long_about = None)]
struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a module, attach it to the host and call its entry method
    Run {
        /// Path to the .wasm module
        module: PathBuf,

        /// Fully qualified entry type name
        #[arg(short, long)]
        entry: String,

        /// Host profile TOML
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Also call on_start() and on_resume()
        #[arg(long)]
        full_lifecycle: bool,

        /// Skip the storage directory listing
        #[arg(long)]
        no_storage_report: bool,

        /// Print the cycle report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the types, methods and fields a module declares
    Inspect {
        /// Path to the .wasm module
        module: PathBuf,

        /// Print the symbol table as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    match cli.command {
        Commands::Run {
            module,
            entry,
            profile,
            full_lifecycle,
            no_storage_report,
            json,
        } => {
            let (env, limits) = match profile {
                Some(path) => {
                    let profile = HostProfile::load(&path)
                        .map_err(|e| anyhow::anyhow!("Failed to load host profile: {}", e))?;
                    let limits = profile.limits().clone();
                    (profile.into_environment(), limits)
                }
                None => (HostEnvironment::default(), RuntimeLimits::default()),
            };

            let options = BootstrapOptions {
                follow_up_lifecycle: full_lifecycle,
                storage_report: !no_storage_report,
            };
            let bootstrapper = Bootstrapper::new(limits, options)?;
            let report = bootstrapper.run(&ModuleReference::new(module, entry), &env);

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.trace.render());
                println!("{}", report.verdict.indicator());
            }

            if report.verdict.is_failure() {
                std::process::exit(1);
            }
        }

        Commands::Inspect { module, json } => {
            let loader = ModuleLoader::new(RuntimeLimits::default())?;
            let symbols = loader.inspect(&module)?;
            let types: Vec<&TypeDescriptor> = symbols.types().collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&types)?);
            } else if types.is_empty() {
                println!("No types declared in {}", module.display());
            } else {
                for ty in types {
                    print!("{}", describe_type(ty));
                }
            }
        }
    }

    Ok(())
}

fn describe_type(ty: &TypeDescriptor) -> String {
    let mut out = match &ty.base {
        Some(base) => format!("{} extends {}\n", ty.name, base),
        None => format!("{}\n", ty.name),
    };
    for field in &ty.fields {
        out.push_str(&format!(
            "  {}field {}: {}\n",
            marker(field.visibility),
            field.name,
            field.ty
        ));
    }
    for method in &ty.methods {
        out.push_str(&format!(
            "  {}fn {}\n",
            marker(method.visibility),
            method.signature()
        ));
    }
    out
}

fn marker(visibility: Visibility) -> &'static str {
    match visibility {
        Visibility::Public => "",
        Visibility::Private => "(hidden) ",
    }
}
