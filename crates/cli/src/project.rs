// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Project expansion.
//!
//! A project file lists assemblies plus shared settings. During setup every
//! leaf package whose path a loader accepts is expanded, once, into one
//! sub-package per assembly.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;

use crate::error::{EngineError, Result};
use crate::package::{PackageIds, Settings, TestPackage};

/// Extension of project files read by [`TomlProjectLoader`].
pub const PROJECT_EXTENSION: &str = "corralproj";

/// A loaded project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Project {
    /// Assembly paths, in project order.
    pub assemblies: Vec<String>,
    pub settings: Settings,
}

/// Reads one kind of project file.
pub trait ProjectLoader: Send + Sync {
    fn can_load(&self, path: &str) -> bool;

    fn load(&self, path: &str) -> anyhow::Result<Project>;
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProjectFile {
    assemblies: Vec<String>,
    #[serde(default)]
    settings: Settings,
}

/// Loads `*.corralproj` TOML files.
///
/// ```toml
/// assemblies = ["bin/core.tests.dll", "bin/io.tests.dll"]
///
/// [settings]
/// ProcessModel = "Separate"
/// ```
///
/// Relative assembly paths are resolved against the project's directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct TomlProjectLoader;

impl ProjectLoader for TomlProjectLoader {
    fn can_load(&self, path: &str) -> bool {
        Path::new(path).extension().is_some_and(|ext| ext == PROJECT_EXTENSION)
    }

    fn load(&self, path: &str) -> anyhow::Result<Project> {
        let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?;
        let file: ProjectFile = toml::from_str(&text).with_context(|| format!("invalid project file {}", path))?;

        let base = Path::new(path).parent().unwrap_or_else(|| Path::new(""));
        let assemblies = file
            .assemblies
            .into_iter()
            .map(|assembly| {
                if Path::new(&assembly).is_absolute() {
                    assembly
                } else {
                    base.join(&assembly).to_string_lossy().into_owned()
                }
            })
            .collect();
        Ok(Project { assemblies, settings: file.settings })
    }
}

/// Holds the available project loaders.
#[derive(Default, Clone)]
pub struct ProjectService {
    loaders: Vec<Arc<dyn ProjectLoader>>,
}

impl ProjectService {
    /// A service with no loaders; nothing is treated as a project.
    pub fn new() -> Self {
        Self::default()
    }

    /// A service with the built-in TOML loader.
    pub fn with_defaults() -> Self {
        let mut service = Self::new();
        service.add_loader(Arc::new(TomlProjectLoader));
        service
    }

    pub fn add_loader(&mut self, loader: Arc<dyn ProjectLoader>) {
        self.loaders.push(loader);
    }

    fn loader_for(&self, path: &str) -> Option<&dyn ProjectLoader> {
        self.loaders.iter().find(|l| l.can_load(path)).map(|l| l.as_ref())
    }

    pub fn is_project(&self, path: &str) -> bool {
        self.loader_for(path).is_some()
    }

    /// Expand a single project package.
    pub fn expand_project(&self, package: &mut TestPackage, ids: &PackageIds) -> Result<()> {
        let path = package
            .full_name()
            .ok_or_else(|| EngineError::invalid_argument("package", "project package has no path"))?
            .to_string();
        let loader = self.loader_for(&path).ok_or_else(|| {
            EngineError::invalid_argument("package", format!("{} is not a recognised project", path))
        })?;
        if package.is_expanded() {
            return Err(EngineError::invalid_argument(
                "package",
                format!("package {} has already been expanded", path),
            ));
        }

        let project = loader
            .load(&path)
            .map_err(|e| EngineError::wrap(format!("Unable to load project {}", path), e))?;
        let sub_packages = project
            .assemblies
            .into_iter()
            .map(|assembly| TestPackage::new(ids, assembly))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!("expanded project {} into {} assemblies", path, sub_packages.len());
        package.expand(sub_packages, project.settings)
    }

    /// Expand every unexpanded project leaf under `package`.
    ///
    /// Assemblies contributed by a project are not searched for further
    /// projects.
    pub fn expand_projects(&self, package: &mut TestPackage, ids: &PackageIds) -> Result<()> {
        if package.is_expanded() {
            return Ok(());
        }
        if package.has_sub_packages() {
            for sub in package.sub_packages_mut() {
                self.expand_projects(sub, ids)?;
            }
            return Ok(());
        }
        if package.full_name().is_some_and(|path| self.is_project(path)) {
            self.expand_project(package, ids)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "project_tests.rs"]
mod tests;
