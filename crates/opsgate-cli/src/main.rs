//! opsgate - operator console for plant HMI tools
//!
//! # Configuration
//!
//! Configuration is loaded from multiple sources with priority:
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`OPSGATE_*`)
//! 3. Project config (`.opsgate/config.toml` in the project root)
//! 4. Global config (`~/.opsgate/config.toml`)
//! 5. Default values (lowest priority)
//!
//! The identity provider URL, realm and client id are required. A missing
//! one is reported as `Configuration error: ...` before any network call.
//!
//! # Modes
//!
//! Without trailing arguments the interactive console starts. With them,
//! the arguments are run as one console command (`opsgate status`) and the
//! exit code reports whether it succeeded.

mod tracing_writer;

use anyhow::Result;
use clap::Parser;
use opsgate_app::{
    expand_tilde, AppError, CliOverrides, ConfigError, ConfigLoader, ConfigResolver, Console,
    OpsConfig, SharedPrinterSlot,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Terminal filter for `--debug`. HTTP and TLS internals stay at warn.
const DEBUG_DIRECTIVE: &str = "debug,hyper=warn,hyper_util=warn,h2=warn,reqwest=warn,rustls=warn,rustyline=warn";

/// opsgate - operator console for plant HMI tools
#[derive(Parser, Debug)]
#[command(name = "opsgate")]
#[command(version, about, long_about = None)]
struct Args {
    /// Debug-level terminal logging
    #[arg(short, long)]
    debug: bool,

    /// Info-level terminal logging
    #[arg(short, long)]
    verbose: bool,

    /// Project root holding `.opsgate/config.toml` (default: current directory)
    #[arg(short = 'C', long, value_name = "DIR")]
    project: Option<PathBuf>,

    /// Identity provider base URL
    #[arg(long, value_name = "URL")]
    idp_url: Option<String>,

    /// Identity provider realm
    #[arg(long)]
    realm: Option<String>,

    /// OpenID Connect client id
    #[arg(long)]
    client_id: Option<String>,

    /// Append logs to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Filter for the log file (e.g. `debug`, `opsgate_runtime=trace`)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Run one console command and exit
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

/// Loads file/env configuration and applies CLI flags on top.
struct CliConfigResolver {
    project_root: PathBuf,
    overrides: CliOverrides,
    skip_global_config: bool,
}

impl CliConfigResolver {
    fn from_args(args: &Args) -> Self {
        let project_root = args.project.clone().unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to get current directory, using '.'");
                PathBuf::from(".")
            })
        });

        // Unset flags must not clear values from files or the environment.
        let mut overrides = CliOverrides::new()
            .identity_opt(
                args.idp_url.clone(),
                args.realm.clone(),
                args.client_id.clone(),
            )
            .logging_opt(args.log_file.clone(), args.log_level.clone());
        if args.debug {
            overrides = overrides.debug(true);
        }
        if args.verbose {
            overrides = overrides.verbose(true);
        }

        Self {
            project_root,
            overrides,
            skip_global_config: false,
        }
    }

    fn resolve(&self) -> Result<OpsConfig, ConfigError> {
        let mut loader = ConfigLoader::new().with_project_root(&self.project_root);
        if self.skip_global_config {
            loader = loader.skip_global_config();
        }
        let mut config = loader.load()?;
        self.overrides.apply(&mut config);
        config.validate()?;
        Ok(config)
    }
}

/// Terminal filter: `--debug` > `--verbose` > `RUST_LOG` > `logging.level` > `warn`.
fn terminal_filter(config: &OpsConfig) -> EnvFilter {
    if config.debug {
        EnvFilter::new(DEBUG_DIRECTIVE)
    } else if config.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(config.logging.level.as_deref().unwrap_or("warn"))
        })
    }
}

fn init_tracing(config: &OpsConfig, printer_slot: &SharedPrinterSlot) {
    let terminal_writer = tracing_writer::TerminalMakeWriter::new(printer_slot);
    let terminal_layer = fmt::layer()
        .with_target(false)
        .with_writer(terminal_writer)
        .with_filter(terminal_filter(config));

    let log_file = config
        .logging
        .file
        .as_deref()
        .map(expand_tilde)
        .and_then(|path| tracing_writer::open_log_file(&path));

    if let Some(file) = log_file {
        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(tracing_writer::FileMakeWriter::new(file))
            .with_filter(EnvFilter::new(&config.logging.file_level));
        tracing_subscriber::registry()
            .with(terminal_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry().with(terminal_layer).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Shared with the console so log lines do not break the prompt.
    let printer_slot = SharedPrinterSlot::new();

    let resolver = CliConfigResolver::from_args(&args);
    let config = resolver.resolve().map_err(AppError::from)?;

    init_tracing(&config, &printer_slot);

    info!(path = %resolver.project_root.display(), "project root");
    if let Some(path) = &config.logging.file {
        info!(
            path = %expand_tilde(path).display(),
            level = %config.logging.file_level,
            "file logging enabled"
        );
    }

    let console = Console::builder(config)
        .with_printer_slot(printer_slot)
        .build()?;

    if args.command.is_empty() {
        console.run_interactive().await?;
    } else {
        let cmd = args.command.join(" ");
        info!("command mode: {cmd}");
        let exit_code = console.run_command(&cmd).await?;
        if exit_code != 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn args(argv: &[&str]) -> Args {
        let mut full = vec!["opsgate"];
        full.extend_from_slice(argv);
        Args::try_parse_from(full).unwrap()
    }

    /// Resolver over an isolated project directory, without the global file.
    fn resolver(project: &TempDir, argv: &[&str]) -> CliConfigResolver {
        let mut resolver = CliConfigResolver::from_args(&args(argv));
        resolver.project_root = project.path().to_path_buf();
        resolver.skip_global_config = true;
        resolver
    }

    fn write_project_config(project: &TempDir, toml: &str) {
        let dir = project.path().join(".opsgate");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.toml"), toml).unwrap();
    }

    const IDENTITY_FLAGS: &[&str] = &[
        "--idp-url",
        "https://idp.plant",
        "--realm",
        "plant",
        "--client-id",
        "operator-console",
    ];

    #[test]
    fn from_args_defaults() {
        let a = args(&[]);
        assert!(!a.debug);
        assert!(!a.verbose);
        assert!(a.project.is_none());
        assert!(a.command.is_empty());
    }

    #[test]
    fn from_args_with_all_flags() {
        let a = args(&[
            "-d",
            "-v",
            "-C",
            "/srv/plant",
            "--idp-url",
            "https://idp",
            "--realm",
            "r",
            "--client-id",
            "c",
            "--log-file",
            "/tmp/opsgate.log",
            "--log-level",
            "trace",
            "elevate",
            "edit_configuration",
            "recipe",
        ]);
        assert!(a.debug && a.verbose);
        assert_eq!(a.project, Some(PathBuf::from("/srv/plant")));
        assert_eq!(a.idp_url.as_deref(), Some("https://idp"));
        assert_eq!(a.log_level.as_deref(), Some("trace"));
        assert_eq!(a.command, vec!["elevate", "edit_configuration", "recipe"]);
    }

    #[test]
    fn resolve_fails_without_identity() {
        let project = TempDir::new().unwrap();
        let err = resolver(&project, &[]).resolve().unwrap_err();
        assert!(matches!(err, ConfigError::MissingSetting { .. }));
        let app: AppError = err.into();
        assert!(app.to_string().starts_with("Configuration error: "));
    }

    #[test]
    fn resolve_with_identity_flags() {
        let project = TempDir::new().unwrap();
        let config = resolver(&project, IDENTITY_FLAGS).resolve().unwrap();
        assert_eq!(config.identity.url.as_deref(), Some("https://idp.plant"));
        assert_eq!(config.identity.realm.as_deref(), Some("plant"));
        assert_eq!(
            config.identity.client_id.as_deref(),
            Some("operator-console")
        );
    }

    #[test]
    fn cli_overrides_project_file() {
        let project = TempDir::new().unwrap();
        write_project_config(
            &project,
            r#"
[identity]
url = "https://idp.file"
realm = "file-realm"
client_id = "file-client"
"#,
        );

        let config = resolver(&project, &["--realm", "cli-realm"])
            .resolve()
            .unwrap();
        assert_eq!(config.identity.url.as_deref(), Some("https://idp.file"));
        assert_eq!(config.identity.realm.as_deref(), Some("cli-realm"));
    }

    #[test]
    fn false_flags_preserve_loader_values() {
        let project = TempDir::new().unwrap();
        write_project_config(
            &project,
            r#"
debug = true

[identity]
url = "https://idp.file"
realm = "plant"
client_id = "console"
"#,
        );

        let config = resolver(&project, &[]).resolve().unwrap();
        assert!(config.debug);
    }

    #[test]
    fn terminal_filter_precedence() {
        let mut config = OpsConfig::default();
        config.debug = true;
        config.verbose = true;
        assert!(terminal_filter(&config).to_string().contains("hyper=warn"));

        config.debug = false;
        assert_eq!(terminal_filter(&config).to_string(), "info");
    }
}
