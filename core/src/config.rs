//! Recipe validation.
//!
//! Validates a recipe before provisioning to catch errors early.

use std::path::{Component, Path};

use crate::error::{Error, Result};
use crate::recipe::Recipe;

/// URL schemes git can fetch from.
pub const KNOWN_SCHEMES: &[&str] = &["https://", "http://", "git://", "ssh://", "file://"];

/// Validation result containing all found issues.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// List of validation errors (fatal).
    pub errors: Vec<String>,
    /// List of validation warnings (non-fatal).
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Adds an error to the result.
    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    /// Adds a warning to the result.
    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    /// Merges another validation result into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Converts to a Result, failing if there are errors.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.is_valid() {
            Ok(self.warnings)
        } else {
            Err(Error::Config(self.errors.join("; ")))
        }
    }
}

/// Trait for validatable configuration types.
pub trait Validate {
    /// Validates the configuration and returns any issues found.
    fn validate(&self) -> ValidationResult;
}

impl Validate for Recipe {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        let required = [
            ("source_url", self.source_url.as_str()),
            ("package", self.package.as_str()),
            ("installer", self.installer.as_str()),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                result.add_error(format!("{} cannot be empty", field));
            }
        }

        let text_fields = [
            ("source_url", Some(self.source_url.as_str())),
            ("package", Some(self.package.as_str())),
            ("installer", Some(self.installer.as_str())),
            ("checkout_dir", self.checkout_dir.as_deref()),
            ("project", self.project.as_deref()),
            ("project_var", self.project_var.as_deref()),
        ];
        for (field, value) in text_fields {
            if value.is_some_and(has_control_chars) {
                result.add_error(format!("invalid character in {}", field));
            }
        }

        let path_fields = [
            ("credentials_path", &self.credentials_path),
            ("entrypoint_source", &self.entrypoint_source),
            ("entrypoint_target", &self.entrypoint_target),
        ];
        for (field, path) in path_fields {
            if has_control_chars(&path.to_string_lossy()) {
                result.add_error(format!("invalid character in {}", field));
            }
        }

        if self.depth == 0 {
            result.add_error("depth must be at least 1");
        }

        match &self.checkout_dir {
            Some(dir) if dir.contains('/') || dir == "." || dir == ".." || dir.is_empty() => {
                result.add_error(format!("checkout_dir '{}' must be a plain directory name", dir));
            }
            Some(_) => {}
            None => {
                if let Err(e) = self.checkout_dir() {
                    result.add_error(e.to_string());
                }
            }
        }

        for (field, path) in [
            ("entrypoint_target", &self.entrypoint_target),
            ("manifest_path", &self.manifest_path),
        ] {
            if escapes_root(path) {
                result.add_error(format!("{} '{}' escapes the root", field, path.display()));
            }
        }

        if self.credentials_path.is_relative() {
            result.add_warning(format!(
                "credentials_path '{}' is relative and resolves against the working directory",
                self.credentials_path.display()
            ));
        }

        if self.project.is_none() {
            match &self.project_var {
                Some(var) => {
                    if std::env::var_os(var).is_none() {
                        result.add_warning(format!(
                            "{} is not set; project will be bound as an empty string",
                            var
                        ));
                    }
                }
                None => result.add_warning("no project configured; binding an empty string"),
            }
        }

        if !self.source_url.is_empty() && !has_known_scheme(&self.source_url) {
            result.add_warning(format!(
                "source_url '{}' has no recognized scheme",
                self.source_url
            ));
        }

        result
    }
}

fn has_control_chars(value: &str) -> bool {
    value.chars().any(|c| (c as u32) < 0x20)
}

fn escapes_root(path: &Path) -> bool {
    path.components().any(|c| matches!(c, Component::ParentDir))
}

fn has_known_scheme(url: &str) -> bool {
    KNOWN_SCHEMES.iter().any(|scheme| url.starts_with(scheme))
        || url.starts_with("git@")
        || url.starts_with('/')
        || url.starts_with('.')
}
