use anyhow::Context;
use clap::Parser;
use goomod_lib::PackageManifest;
use serde::Serialize;
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

mod process;

/// Tool settings, layered env < manifest < CLI. Printed during a dry run.
#[derive(Debug, Serialize, Clone, Default)]
pub struct Config {
    manifest: Option<String>,
    base_dir: Option<String>,
    output: Option<String>,
    work_dir: Option<String>,
    dry: Option<bool>,
    store: Option<bool>,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Goomod package generator", long_about = None)]
pub struct Cli {
    /// Package manifest (YAML or JSON)
    #[arg()]
    pub manifest: Option<String>,

    /// Directory all manifest paths are resolved against (defaults to the manifest's directory)
    #[arg(short, long)]
    pub base_dir: Option<String>,

    /// Archive base name, without the .goomod extension
    #[arg(short, long)]
    pub output: Option<String>,

    /// Scratch folder name used to stage the package
    #[arg(short, long)]
    pub work_dir: Option<String>,

    /// Store files without compression
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub store: bool,

    /// Dry run (print the resolved package and paths, write nothing)
    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    pub dry: bool,

    /// Print the resolved manifest as YAML and exit
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub print_manifest: bool,

    /// Enable debug logging
    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    pub verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let env_config = read_env();
    let cli_config = cli_to_config(&cli);

    let Some(manifest_path) = cli_config
        .manifest
        .clone()
        .or_else(|| env_config.manifest.clone())
    else {
        eprintln!("Error: a manifest must be provided (CLI argument or GOOMOD_MANIFEST)");
        std::process::exit(2);
    };

    let mut manifest = read_manifest_file(&manifest_path)?;

    // Merge configs: env < manifest < CLI
    let merged = merge_configs(env_config, manifest_to_config(&manifest), cli_config);
    manifest.output = merged.output.clone();
    manifest.work_dir = merged.work_dir.clone();

    if cli.print_manifest {
        let yaml = serde_yaml::to_string(&manifest)?;
        println!("{yaml}");
        return Ok(());
    }

    let base_dir = match &merged.base_dir {
        Some(dir) => PathBuf::from(dir),
        None => Path::new(&manifest_path)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };

    if merged.dry.unwrap_or(false) {
        println!("--- DRY RUN ---");
        println!("{}", serde_yaml::to_string(&merged)?);
        return process::dry_run(&base_dir, &manifest);
    }

    process::generate_within_tokio(&base_dir, &manifest, merged.store.unwrap_or(false))
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

/// Reads environment variables prefixed with GOOMOD_
fn read_env() -> Config {
    let vars: HashMap<String, String> = env::vars().collect();
    config_from_vars(&vars)
}

fn config_from_vars(vars: &HashMap<String, String>) -> Config {
    macro_rules! get_env {
        ($key:expr) => {
            vars.get(&format!("GOOMOD_{}", $key)).cloned()
        };
    }

    let flag = |v: String| v == "true" || v == "1" || v.eq_ignore_ascii_case("yes");

    Config {
        manifest: get_env!("MANIFEST"),
        base_dir: get_env!("BASE_DIR"),
        output: get_env!("OUTPUT"),
        work_dir: get_env!("WORK_DIR"),
        dry: get_env!("DRY").map(flag),
        store: get_env!("STORE").map(flag),
    }
}

/// Reads a YAML or JSON manifest from file
fn read_manifest_file(path: &str) -> anyhow::Result<PackageManifest> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading manifest {path}"))?;
    let lower = path.to_lowercase();
    let manifest = if lower.ends_with(".json") {
        serde_json::from_str(&content).with_context(|| format!("parsing {path}"))?
    } else {
        serde_yaml::from_str(&content).with_context(|| format!("parsing {path}"))?
    };
    Ok(manifest)
}

/// The manifest only contributes output naming.
fn manifest_to_config(manifest: &PackageManifest) -> Config {
    Config {
        output: manifest.output.clone(),
        work_dir: manifest.work_dir.clone(),
        ..Default::default()
    }
}

/// Converts CLI struct into Config. Switches left unset do not override env.
fn cli_to_config(cli: &Cli) -> Config {
    Config {
        manifest: cli.manifest.clone(),
        base_dir: cli.base_dir.clone(),
        output: cli.output.clone(),
        work_dir: cli.work_dir.clone(),
        dry: cli.dry.then_some(true),
        store: cli.store.then_some(true),
    }
}

/// Merge configs by priority: env < file < cli
fn merge_configs(env: Config, file: Config, cli: Config) -> Config {
    fn pick<T>(env: Option<T>, file: Option<T>, cli: Option<T>) -> Option<T> {
        cli.or(file).or(env)
    }

    Config {
        manifest: pick(env.manifest, file.manifest, cli.manifest),
        base_dir: pick(env.base_dir, file.base_dir, cli.base_dir),
        output: pick(env.output, file.output, cli.output),
        work_dir: pick(env.work_dir, file.work_dir, cli.work_dir),
        dry: pick(env.dry, file.dry, cli.dry),
        store: pick(env.store, file.store, cli.store),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_env() {
        let vars = HashMap::from([
            ("GOOMOD_OUTPUT".to_string(), "from-env".to_string()),
            ("GOOMOD_DRY".to_string(), "yes".to_string()),
            ("GOOMOD_MANIFEST".to_string(), "env.yaml".to_string()),
        ]);
        let cli = Cli::parse_from(["goomod", "--output", "from-cli", "mod.yaml"]);

        let merged = merge_configs(
            config_from_vars(&vars),
            Config::default(),
            cli_to_config(&cli),
        );
        assert_eq!(merged.output.as_deref(), Some("from-cli"));
        assert_eq!(merged.manifest.as_deref(), Some("mod.yaml"));
        assert_eq!(merged.dry, Some(true));
        assert_eq!(merged.store, None);
    }

    #[test]
    fn manifest_overrides_env_but_not_cli() {
        let vars = HashMap::from([
            ("GOOMOD_OUTPUT".to_string(), "from-env".to_string()),
            ("GOOMOD_WORK_DIR".to_string(), "env_stage".to_string()),
        ]);
        let manifest = PackageManifest {
            id: "mymod".to_string(),
            output: Some("from-manifest".to_string()),
            ..Default::default()
        };

        let cli = Cli::parse_from(["goomod", "mod.yaml"]);
        let merged = merge_configs(
            config_from_vars(&vars),
            manifest_to_config(&manifest),
            cli_to_config(&cli),
        );
        assert_eq!(merged.output.as_deref(), Some("from-manifest"));
        assert_eq!(merged.work_dir.as_deref(), Some("env_stage"));

        let cli = Cli::parse_from(["goomod", "--output", "from-cli", "mod.yaml"]);
        let merged = merge_configs(
            config_from_vars(&vars),
            manifest_to_config(&manifest),
            cli_to_config(&cli),
        );
        assert_eq!(merged.output.as_deref(), Some("from-cli"));
    }

    #[test]
    fn manifest_format_follows_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("mod.json");
        fs::write(&json, r#"{"id": "j", "description": "", "author": "a"}"#).unwrap();
        let yaml = dir.path().join("mod.yaml");
        fs::write(&yaml, "id: y\ndescription: ''\nauthor: a\n").unwrap();

        assert_eq!(read_manifest_file(json.to_str().unwrap()).unwrap().id, "j");
        assert_eq!(read_manifest_file(yaml.to_str().unwrap()).unwrap().id, "y");
    }

    #[test]
    fn missing_manifest_reports_path() {
        let err = read_manifest_file("/definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.yaml"));
    }
}
