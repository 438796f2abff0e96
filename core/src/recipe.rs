//! Provisioning recipe: the configuration record every step reads from.
//!
//! A recipe is loaded once (from a YAML or TOML file, or from defaults),
//! optionally overridden from the command line, and then passed read-only
//! to the provisioner, the Dockerfile renderer, and the validator.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::env::EnvSource;
use crate::error::{Error, Result};

/// Environment variable holding the path to the service-account credentials.
pub const CREDENTIALS_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Environment variable holding the project the system tests run against.
pub const PROJECT_VAR: &str = "GOOGLE_CLOUD_PROJECT";

/// Build argument the project identifier is substituted from.
pub const PROJECT_BUILD_ARG: &str = "GOOGLE_CLOUD_PROJECT_FOR_TESTS";

/// Declarative description of a system-test environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Recipe {
    /// Filesystem root the environment is provisioned into.
    pub root: PathBuf,

    /// Remote repository to fetch.
    pub source_url: String,

    /// Clone depth. Only the latest snapshot is needed.
    pub depth: u32,

    /// Directory name for the checkout, relative to `root`.
    ///
    /// Derived from `source_url` when unset, the same way `git clone` does.
    pub checkout_dir: Option<String>,

    /// Automation package installed into the environment.
    pub package: String,

    /// Installer program invoked as `<installer> install <package>`.
    pub installer: String,

    /// Credentials path bound to `GOOGLE_APPLICATION_CREDENTIALS`.
    ///
    /// The file is expected to be mounted at run time and is never created.
    pub credentials_path: PathBuf,

    /// Literal project identifier. Takes precedence over `project_var`.
    pub project: Option<String>,

    /// Variable the project identifier is read from when `project` is unset.
    pub project_var: Option<String>,

    /// Local script copied into the environment as its entrypoint.
    pub entrypoint_source: PathBuf,

    /// Where the entrypoint lands, relative to `root`.
    pub entrypoint_target: PathBuf,

    /// Where the image manifest is written, relative to `root`.
    pub manifest_path: PathBuf,
}

impl Default for Recipe {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
            source_url: "https://github.com/GoogleCloudPlatform/google-cloud-python.git"
                .to_string(),
            depth: 1,
            checkout_dir: None,
            package: "nox-automation".to_string(),
            installer: "pip".to_string(),
            credentials_path: PathBuf::from(
                "/workspace/tests/google-cloud-python-system/credentials.json",
            ),
            project: None,
            project_var: Some(PROJECT_BUILD_ARG.to_string()),
            entrypoint_source: PathBuf::from("run_system_tests.sh"),
            entrypoint_target: PathBuf::from("run_system_tests.sh"),
            manifest_path: PathBuf::from(DEFAULT_MANIFEST_NAME),
        }
    }
}

/// File name of the image manifest inside the provisioned root.
pub const DEFAULT_MANIFEST_NAME: &str = ".systest-image.json";

impl Recipe {
    /// Loads a recipe from a YAML or TOML file, chosen by extension.
    ///
    /// Fields missing from the file keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(Error::Io)?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content)
                .map_err(|e| Error::Config(format!("failed to parse recipe: {}", e))),
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .map_err(|e| Error::Config(format!("failed to parse recipe: {}", e))),
            _ => Err(Error::Config(format!(
                "unsupported recipe format: {} (expected .yaml, .yml or .toml)",
                path.display()
            ))),
        }
    }

    /// Sets the provisioning root.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Sets the source repository URL.
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    /// Sets the package to install.
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }

    /// Sets the installer program.
    pub fn with_installer(mut self, installer: impl Into<String>) -> Self {
        self.installer = installer.into();
        self
    }

    /// Sets the credentials path.
    pub fn with_credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = path.into();
        self
    }

    /// Sets a literal project identifier.
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Sets the variable the project is read from.
    pub fn with_project_var(mut self, var: Option<String>) -> Self {
        self.project_var = var;
        self
    }

    /// Sets the local entrypoint script.
    pub fn with_entrypoint_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.entrypoint_source = path.into();
        self
    }

    /// Returns the checkout directory name.
    pub fn checkout_dir(&self) -> Result<String> {
        match &self.checkout_dir {
            Some(dir) => Ok(dir.clone()),
            None => checkout_dir_from_url(&self.source_url),
        }
    }

    /// Returns the absolute path of the checkout (the working directory).
    pub fn checkout_path(&self) -> Result<PathBuf> {
        Ok(self.root.join(self.checkout_dir()?))
    }

    /// Returns the absolute path the entrypoint is placed at.
    pub fn entrypoint_path(&self) -> PathBuf {
        rooted(&self.root, &self.entrypoint_target)
    }

    /// Returns the absolute path of the image manifest.
    pub fn manifest_file(&self) -> PathBuf {
        rooted(&self.root, &self.manifest_path)
    }

    /// Returns where the project identifier comes from.
    pub fn project_source(&self) -> EnvSource {
        match (&self.project, &self.project_var) {
            (Some(project), _) => EnvSource::Literal(project.clone()),
            (None, Some(var)) => EnvSource::FromVar(var.clone()),
            (None, None) => EnvSource::Unset,
        }
    }

    /// Returns the two bindings every environment carries, in declaration order.
    pub fn bindings(&self) -> Vec<(String, EnvSource)> {
        vec![
            (
                CREDENTIALS_VAR.to_string(),
                EnvSource::Literal(self.credentials_path.to_string_lossy().into_owned()),
            ),
            (PROJECT_VAR.to_string(), self.project_source()),
        ]
    }
}

/// Derives the directory `git clone` would create for `url`.
pub fn checkout_dir_from_url(url: &str) -> Result<String> {
    let trimmed = url.trim_end_matches('/');
    let last = trimmed
        .rsplit(|c: char| c == '/' || c == ':')
        .next()
        .unwrap_or_default();
    let name = last.strip_suffix(".git").unwrap_or(last);

    if name.is_empty() || name == "." || name == ".." {
        return Err(Error::Config(format!(
            "cannot derive checkout directory from '{}'",
            url
        )));
    }

    Ok(name.to_string())
}

/// Joins `path` under `root`, treating absolute paths as root-relative.
pub fn rooted(root: &Path, path: &Path) -> PathBuf {
    let relative: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect();
    root.join(relative)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipe_defaults_match_system_test_image() {
        let recipe = Recipe::default();

        assert_eq!(recipe.root, PathBuf::from("/"));
        assert_eq!(recipe.depth, 1);
        assert_eq!(recipe.package, "nox-automation");
        assert_eq!(recipe.installer, "pip");
        assert_eq!(
            recipe.credentials_path,
            PathBuf::from("/workspace/tests/google-cloud-python-system/credentials.json")
        );
        assert_eq!(recipe.project, None);
        assert_eq!(recipe.project_var.as_deref(), Some(PROJECT_BUILD_ARG));
        assert_eq!(recipe.entrypoint_path(), PathBuf::from("/run_system_tests.sh"));
        assert_eq!(recipe.checkout_dir().unwrap(), "google-cloud-python");
    }

    #[test]
    fn checkout_dir_strips_git_suffix_and_slashes() {
        assert_eq!(
            checkout_dir_from_url("https://example.com/org/repo.git").unwrap(),
            "repo"
        );
        assert_eq!(
            checkout_dir_from_url("https://example.com/org/repo/").unwrap(),
            "repo"
        );
        assert_eq!(checkout_dir_from_url("git@github.com:repo.git").unwrap(), "repo");
        assert_eq!(checkout_dir_from_url("/tmp/local/source").unwrap(), "source");
    }

    #[test]
    fn checkout_dir_rejects_underivable_urls() {
        assert!(checkout_dir_from_url("").is_err());
        assert!(checkout_dir_from_url("https://example.com/.git").is_err());
        assert!(checkout_dir_from_url("..").is_err());
    }

    #[test]
    fn explicit_checkout_dir_wins() {
        let recipe = Recipe {
            checkout_dir: Some("src".to_string()),
            ..Default::default()
        }
        .with_root("/build");

        assert_eq!(recipe.checkout_path().unwrap(), PathBuf::from("/build/src"));
    }

    #[test]
    fn rooted_paths_stay_under_root() {
        let root = Path::new("/tmp/image");
        assert_eq!(
            rooted(root, Path::new("/run_system_tests.sh")),
            PathBuf::from("/tmp/image/run_system_tests.sh")
        );
        assert_eq!(
            rooted(root, Path::new("bin/run.sh")),
            PathBuf::from("/tmp/image/bin/run.sh")
        );
    }

    #[test]
    fn project_source_prefers_literal() {
        let recipe = Recipe::default().with_project("demo-proj");
        assert_eq!(
            recipe.project_source(),
            EnvSource::Literal("demo-proj".to_string())
        );

        let recipe = Recipe::default();
        assert_eq!(
            recipe.project_source(),
            EnvSource::FromVar(PROJECT_BUILD_ARG.to_string())
        );

        let recipe = Recipe::default().with_project_var(None);
        assert_eq!(recipe.project_source(), EnvSource::Unset);
    }

    #[test]
    fn bindings_declare_both_variables_in_order() {
        let names: Vec<String> = Recipe::default()
            .bindings()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec![CREDENTIALS_VAR, PROJECT_VAR]);
    }

    #[test]
    fn recipe_parses_partial_yaml() {
        let yaml = r#"
package: nox
project: demo-proj
"#;
        let recipe: Recipe = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(recipe.package, "nox");
        assert_eq!(recipe.project.as_deref(), Some("demo-proj"));
        assert_eq!(recipe.depth, 1);
        assert_eq!(recipe.installer, "pip");
    }

    #[test]
    fn recipe_loads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recipe.toml");
        std::fs::write(
            &path,
            "source_url = \"https://example.com/org/tests.git\"\ndepth = 1\n",
        )
        .unwrap();

        let recipe = Recipe::load(&path).expect("should load recipe");
        assert_eq!(recipe.source_url, "https://example.com/org/tests.git");
        assert_eq!(recipe.checkout_dir().unwrap(), "tests");
    }

    #[test]
    fn bundled_recipe_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("recipes")
            .join("google-cloud-python.yaml");

        let recipe = Recipe::load(&path).expect("bundled recipe should load");
        assert_eq!(recipe.entrypoint_path(), Recipe::default().entrypoint_path());
        assert_eq!(
            Recipe {
                entrypoint_target: PathBuf::from("run_system_tests.sh"),
                ..recipe
            },
            Recipe::default()
        );
    }

    #[test]
    fn recipe_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recipe.ini");
        std::fs::write(&path, "package = nox\n").unwrap();

        let err = Recipe::load(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
