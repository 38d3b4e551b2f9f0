//! SN-008: CLI subcommands (init, validate, list, synth, schema, completions).

use crate::constructs::network;
use crate::core::env::EnvSettings;
use crate::core::{assembly, parser, synth, types};
use crate::provenance::eventlog;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const CONFIG_FILE: &str = "snackstack.yaml";
pub const CONTEXT_FILE: &str = "snackstack.context.json";
pub const OUT_DIR: &str = "snackstack.out";

#[derive(Parser, Debug)]
#[command(
    name = "snackstack",
    version,
    about = "Typed AWS infrastructure declarations synthesized to CloudFormation"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new snackstack project
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate snackstack.yaml without synthesizing
    Validate {
        /// Path to snackstack.yaml
        #[arg(short, long, default_value = CONFIG_FILE)]
        file: PathBuf,
    },

    /// List the stacks a config produces
    List {
        /// Path to snackstack.yaml
        #[arg(short, long, default_value = CONFIG_FILE)]
        file: PathBuf,
    },

    /// Synthesize CloudFormation templates into a cloud assembly
    Synth {
        /// Path to snackstack.yaml
        #[arg(short, long, default_value = CONFIG_FILE)]
        file: PathBuf,

        /// Lookup context file (default: next to the config)
        #[arg(short, long)]
        context: Option<PathBuf>,

        /// Cloud assembly output directory
        #[arg(short, long, default_value = OUT_DIR)]
        out: PathBuf,

        /// Synthesize only this stack
        #[arg(long)]
        stack: Option<String>,

        /// Override the database variant (serverless | instance)
        #[arg(long)]
        database: Option<String>,

        /// Also print each template to stdout
        #[arg(long)]
        print: bool,
    },

    /// Print the JSON Schema of snackstack.yaml
    Schema,

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Options for `synth`.
#[derive(Debug, Clone, Default)]
pub struct SynthOptions {
    pub context: Option<PathBuf>,
    pub out: PathBuf,
    pub stack: Option<String>,
    pub database: Option<String>,
    pub print: bool,
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Init { path } => cmd_init(&path, &EnvSettings::from_process()),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::List { file } => cmd_list(&file),
        Commands::Synth {
            file,
            context,
            out,
            stack,
            database,
            print,
        } => cmd_synth(
            &file,
            &SynthOptions {
                context,
                out,
                stack,
                database,
                print,
            },
            &EnvSettings::from_process(),
        ),
        Commands::Schema => cmd_schema(),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "snackstack", &mut std::io::stdout());
            Ok(())
        }
    }
}

const CONFIG_TEMPLATE: &str = r#"version: "1.0"
name: StartupSnack-WebService

network:
  is_default: true
  subnet_type: private
  one_per_az: true

database:
  kind: serverless        # or: instance
  engine_version: "10.12"
  min_capacity: 2
  max_capacity: 2
  backup_retention_days: 1
  enable_data_api: true

service:
  cpu: 512
  memory_mib: 1024
  container_port: 3000
  image:
    source: asset
    directory: assets/ecs/rails
  deployment:
    desired_count: 1
    min_healthy_percent: 100
    max_healthy_percent: 200
  log:
    retention_days: 1
    removal_policy: destroy

site:
  stack_name: StartupSnack-WebService-SinglePageApp
"#;

fn cmd_init(path: &Path, env: &EnvSettings) -> Result<(), String> {
    let config_path = path.join(CONFIG_FILE);
    if config_path.exists() {
        return Err(format!("{} already exists", config_path.display()));
    }
    let context_path = path.join(CONTEXT_FILE);
    if context_path.exists() {
        return Err(format!("{} already exists", context_path.display()));
    }
    std::fs::create_dir_all(path)
        .map_err(|e| format!("cannot create dir {}: {}", path.display(), e))?;

    std::fs::write(&config_path, CONFIG_TEMPLATE)
        .map_err(|e| format!("cannot write {}: {}", config_path.display(), e))?;

    // Example lookup entry; replace with the account's real default VPC
    let account = env.account.as_deref().unwrap_or("123456789012");
    let key = network::vpc_lookup_key(account, &env.region, &types::NetworkConfig::default());
    let zones = [format!("{}a", env.region), format!("{}b", env.region)];
    let zone_refs: Vec<&str> = zones.iter().map(String::as_str).collect();
    let mut context = network::LookupContext::new();
    let vpc = serde_json::to_value(network::example_vpc(&zone_refs))
        .map_err(|e| format!("serialize error: {}", e))?;
    context.insert(key, vpc);
    let json = serde_json::to_string_pretty(&context)
        .map_err(|e| format!("serialize error: {}", e))?;
    std::fs::write(&context_path, json)
        .map_err(|e| format!("cannot write {}: {}", context_path.display(), e))?;

    println!("Initialized snackstack project at {}", path.display());
    println!("  Created: {}", config_path.display());
    println!("  Created: {} (example VPC, edit before deploying)", context_path.display());
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let config = parser::parse_config_file(file)?;
    let errors = parser::validate_config(&config);

    if errors.is_empty() {
        println!(
            "OK: {} ({} database, {} stack(s))",
            config.name,
            config.database.kind(),
            synth::stack_names(&config).len()
        );
        Ok(())
    } else {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        Err(format!("{} validation error(s)", errors.len()))
    }
}

fn cmd_list(file: &Path) -> Result<(), String> {
    let config = parse_and_validate(file)?;
    println!(
        "{}  (network, {} database, fargate service)",
        config.name,
        config.database.kind()
    );
    if let Some(site) = &config.site {
        println!("{}  (amplify site)", site.stack_name);
    }
    Ok(())
}

/// Parse and validate a snackstack config file, returning errors if invalid.
fn parse_and_validate(file: &Path) -> Result<types::InfraConfig, String> {
    let config = parser::parse_config_file(file)?;
    check(config)
}

fn check(config: types::InfraConfig) -> Result<types::InfraConfig, String> {
    let errors = parser::validate_config(&config);
    if errors.is_empty() {
        return Ok(config);
    }
    for e in &errors {
        eprintln!("  ERROR: {}", e);
    }
    Err("validation failed".to_string())
}

fn cmd_synth(file: &Path, opts: &SynthOptions, env: &EnvSettings) -> Result<(), String> {
    let started = Instant::now();
    let mut config = parser::parse_config_file(file)?;
    if let Some(kind) = &opts.database {
        config = synth::override_database(config, kind)?;
    }
    let config = check(config)?;

    let base_dir = file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let context_path = opts
        .context
        .clone()
        .unwrap_or_else(|| base_dir.join(CONTEXT_FILE));
    let context = network::load_context(&context_path)?;

    let run_id = eventlog::generate_run_id();
    eventlog::append_event(
        &opts.out,
        types::ProvenanceEvent::SynthStarted {
            app: config.name.clone(),
            run_id: run_id.clone(),
            snackstack_version: env!("CARGO_PKG_VERSION").to_string(),
        },
    )?;

    println!("Synthesizing: {} ({})", config.name, env.environment_uri());

    let input = synth::SynthInput {
        config: &config,
        env,
        context: &context,
        base_dir,
    };
    let app = match synth::synth_app(input, opts.stack.as_deref()) {
        Ok(app) => app,
        Err(e) => {
            eventlog::append_event(
                &opts.out,
                types::ProvenanceEvent::SynthFailed {
                    stack: opts.stack.clone().unwrap_or_else(|| config.name.clone()),
                    error: e.clone(),
                },
            )?;
            return Err(e);
        }
    };

    for asset in &app.assets {
        eventlog::append_event(
            &opts.out,
            types::ProvenanceEvent::AssetFingerprinted {
                asset: asset.id.clone(),
                directory: asset.directory.clone(),
                hash: format!("blake3:{}", asset.tag),
            },
        )?;
        println!(
            "  asset {} → {}:{}",
            asset.directory,
            asset.repository,
            &asset.tag[..12.min(asset.tag.len())]
        );
    }

    let writes = assembly::write_assembly(&opts.out, &app, opts.stack.as_deref())?;
    for w in &writes {
        let status = if w.changed { "written" } else { "unchanged" };
        println!(
            "  {}: {} ({} resources, {})",
            w.stack, status, w.resources, w.hash
        );
        eventlog::append_event(
            &opts.out,
            types::ProvenanceEvent::StackSynthesized {
                stack: w.stack.clone(),
                resources: w.resources,
                hash: w.hash.clone(),
                changed: w.changed,
            },
        )?;
    }

    if opts.print {
        for stack in app.stacks.values() {
            println!("{}", stack.template.to_json_pretty()?);
        }
    }

    let elapsed = started.elapsed().as_secs_f64();
    eventlog::append_event(
        &opts.out,
        types::ProvenanceEvent::SynthCompleted {
            run_id,
            stacks: u32::try_from(writes.len()).unwrap_or(u32::MAX),
            total_seconds: elapsed,
        },
    )?;
    println!();
    println!(
        "Synthesized {} stack(s) into {} in {:.2}s",
        writes.len(),
        opts.out.display(),
        elapsed
    );
    Ok(())
}

fn cmd_schema() -> Result<(), String> {
    let schema = schemars::schema_for!(types::InfraConfig);
    let json = serde_json::to_string_pretty(&schema)
        .map_err(|e| format!("serialize error: {}", e))?;
    println!("{}", json);
    Ok(())
}
