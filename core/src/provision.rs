//! Provisioning: the ordered build-time steps.
//!
//! Steps run strictly in order and stop at the first failure:
//! validate, fetch, install, bind environment, place entrypoint, write
//! the image manifest.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::config::Validate;
use crate::entrypoint::place_entrypoint;
use crate::env::Environment;
use crate::error::Result;
use crate::fetch::{GitFetcher, SourceTree};
use crate::install::{PackageInstaller, PipInstaller};
use crate::manifest::ImageManifest;
use crate::recipe::Recipe;

/// Result of a provisioning run.
#[derive(Debug, Clone)]
pub struct ProvisionedImage {
    /// The manifest the launcher will read.
    pub manifest: ImageManifest,
    /// Where the manifest was written.
    pub manifest_path: PathBuf,
    /// The fetched source snapshot.
    pub source: SourceTree,
    /// Non-fatal validation findings.
    pub warnings: Vec<String>,
    /// Wall-clock time spent provisioning.
    pub duration: Duration,
}

/// Runs the provisioning steps of a recipe.
pub struct Provisioner {
    fetcher: GitFetcher,
    installer: Box<dyn PackageInstaller>,
}

impl Provisioner {
    /// Creates a provisioner with the given fetcher and installer.
    pub fn new(fetcher: GitFetcher, installer: Box<dyn PackageInstaller>) -> Self {
        Self { fetcher, installer }
    }

    /// Creates a provisioner using git and the recipe's installer program.
    pub fn for_recipe(recipe: &Recipe) -> Self {
        Self::new(
            GitFetcher::new(),
            Box::new(PipInstaller::with_cli_path(&recipe.installer)),
        )
    }

    /// Provisions the environment described by `recipe`.
    pub async fn provision(&self, recipe: &Recipe) -> Result<ProvisionedImage> {
        let start_time = Instant::now();
        let build_id = uuid::Uuid::new_v4().to_string();

        let warnings = recipe.validate().into_result()?;
        for warning in &warnings {
            tracing::warn!(build_id = %build_id, "{}", warning);
        }

        let checkout = recipe.checkout_path()?;
        let fetched = self
            .fetcher
            .fetch(&recipe.source_url, recipe.depth, &checkout)
            .await?;
        let source = SourceTree {
            path: fetched.path.canonicalize()?,
            ..fetched
        };
        tracing::info!(build_id = %build_id, workdir = ?source.path, "working directory set");

        self.installer.install(&recipe.package, &source.path).await?;

        let env = Environment::from_bindings(&recipe.bindings())?;
        tracing::info!(build_id = %build_id, vars = ?env.names(), "bound environment");

        let entrypoint = recipe.entrypoint_path();
        place_entrypoint(&recipe.entrypoint_source, &entrypoint)?;

        let manifest = ImageManifest {
            build_id,
            source_url: recipe.source_url.clone(),
            package: recipe.package.clone(),
            workdir: source.path.clone(),
            env,
            entrypoint: entrypoint.canonicalize()?,
        };
        let manifest_path = recipe.manifest_file();
        manifest.save(&manifest_path)?;

        let duration = start_time.elapsed();
        tracing::info!(
            build_id = %manifest.build_id,
            manifest = ?manifest_path,
            installer = %self.installer.name(),
            duration = ?duration,
            "provisioning complete"
        );

        Ok(ProvisionedImage {
            manifest,
            manifest_path,
            source,
            warnings,
            duration,
        })
    }
}
