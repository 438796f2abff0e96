//! systest-provisioner CLI
//!
//! Provisions a system-test environment at build time and launches its
//! runner script at run time.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use systest_provisioner::config::Validate;
use systest_provisioner::{
    dockerfile, launch, ImageManifest, Provisioner, Recipe, DEFAULT_BASE_IMAGE,
};

/// Provision a system-test environment and hand off to its runner script.
#[derive(Parser, Debug)]
#[command(name = "systest-provisioner", version, about, long_about = None)]
struct Cli {
    /// Recipe file (.yaml, .yml or .toml). Defaults apply when omitted.
    #[arg(long, global = true, env = "SYSTEST_RECIPE")]
    recipe: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the source, install the package, bind the environment and place the entrypoint.
    Provision(RecipeOverrides),
    /// Run the provisioned entrypoint as this process.
    Launch(LaunchArgs),
    /// Print or write the equivalent Dockerfile.
    Dockerfile(DockerfileArgs),
    /// Check the recipe and report problems.
    Validate(RecipeOverrides),
}

/// Command-line overrides for recipe fields.
#[derive(Args, Debug, Default)]
struct RecipeOverrides {
    /// Filesystem root to provision into.
    #[arg(long)]
    root: Option<PathBuf>,

    /// Repository to fetch.
    #[arg(long)]
    source_url: Option<String>,

    /// Package to install.
    #[arg(long)]
    package: Option<String>,

    /// Installer program.
    #[arg(long)]
    installer: Option<String>,

    /// Path bound to GOOGLE_APPLICATION_CREDENTIALS.
    #[arg(long)]
    credentials: Option<PathBuf>,

    /// Literal project bound to GOOGLE_CLOUD_PROJECT.
    #[arg(long)]
    project: Option<String>,

    /// Variable the project is read from when --project is not given.
    #[arg(long)]
    project_var: Option<String>,

    /// Local runner script to place as the entrypoint.
    #[arg(long)]
    entrypoint: Option<PathBuf>,
}

impl RecipeOverrides {
    fn apply(self, mut recipe: Recipe) -> Recipe {
        if let Some(root) = self.root {
            recipe.root = root;
        }
        if let Some(url) = self.source_url {
            recipe.source_url = url;
        }
        if let Some(package) = self.package {
            recipe.package = package;
        }
        if let Some(installer) = self.installer {
            recipe.installer = installer;
        }
        if let Some(credentials) = self.credentials {
            recipe.credentials_path = credentials;
        }
        if let Some(project) = self.project {
            recipe.project = Some(project);
        }
        if let Some(var) = self.project_var {
            recipe.project_var = Some(var);
        }
        if let Some(entrypoint) = self.entrypoint {
            recipe.entrypoint_source = entrypoint;
        }
        recipe
    }
}

#[derive(Args, Debug)]
struct LaunchArgs {
    /// Image manifest written by `provision`.
    #[arg(long, env = "SYSTEST_MANIFEST", default_value = "/.systest-image.json")]
    manifest: PathBuf,

    /// Run the entrypoint as a child instead of replacing this process.
    #[arg(long)]
    no_exec: bool,
}

#[derive(Args, Debug)]
struct DockerfileArgs {
    #[command(flatten)]
    overrides: RecipeOverrides,

    /// Base image the Dockerfile builds from.
    #[arg(long, default_value = DEFAULT_BASE_IMAGE)]
    base_image: String,

    /// Directory to write Dockerfile and .dockerignore into. Prints to stdout when omitted.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Logs go to stderr; stdout belongs to the entrypoint and rendered output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn load_recipe(path: Option<&PathBuf>, overrides: RecipeOverrides) -> anyhow::Result<Recipe> {
    let recipe = match path {
        Some(path) => Recipe::load(path)
            .with_context(|| format!("failed to load recipe {}", path.display()))?,
        None => Recipe::default(),
    };
    Ok(overrides.apply(recipe))
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Command::Provision(overrides) => {
            let recipe = load_recipe(cli.recipe.as_ref(), overrides)?;
            let image = Provisioner::for_recipe(&recipe)
                .provision(&recipe)
                .await
                .context("provisioning failed")?;

            println!("Build: {}", image.manifest.build_id);
            println!("Workdir: {}", image.manifest.workdir.display());
            println!("Entrypoint: {}", image.manifest.entrypoint.display());
            println!("Manifest: {}", image.manifest_path.display());
            Ok(0)
        }
        Command::Launch(args) => {
            let manifest = ImageManifest::load(&args.manifest)?;
            if args.no_exec {
                return match launch::run(&manifest) {
                    Ok(status) => Ok(launch::exit_code(status)),
                    Err(e) => {
                        tracing::error!(error = %e, "entrypoint failed to start");
                        Ok(launch::exit_code_for_error(&e))
                    }
                };
            }
            let err = launch::exec(&manifest);
            tracing::error!(error = %err, "entrypoint failed to start");
            Ok(launch::exit_code_for_error(&err))
        }
        Command::Dockerfile(args) => {
            let recipe = load_recipe(cli.recipe.as_ref(), args.overrides)?;
            match args.output {
                Some(dir) => {
                    for path in dockerfile::write_build_files(&dir, &recipe, &args.base_image)? {
                        println!("{}", path.display());
                    }
                }
                None => print!("{}", dockerfile::render_dockerfile(&recipe, &args.base_image)?),
            }
            Ok(0)
        }
        Command::Validate(overrides) => {
            let recipe = load_recipe(cli.recipe.as_ref(), overrides)?;
            let result = recipe.validate();
            for warning in &result.warnings {
                println!("warning: {}", warning);
            }
            for error in &result.errors {
                println!("error: {}", error);
            }
            Ok(if result.is_valid() { 0 } else { 1 })
        }
    }
}
