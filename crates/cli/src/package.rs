// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Test packages.
//!
//! A package names one loadable unit (an assembly), or an aggregate of them
//! (a project or a multi-file run), together with the settings that govern
//! how it is loaded and run. Leaf packages map to exactly one assembly.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Well-known package setting names.
pub mod keys {
    /// How agents are used: see [`super::ProcessModel`].
    pub const PROCESS_MODEL: &str = "ProcessModel";
    /// How in-process isolation is used: see [`super::DomainUsage`].
    pub const DOMAIN_USAGE: &str = "DomainUsage";
    /// Upper bound on agents running at once.
    pub const MAX_AGENTS: &str = "MaxAgents";
    /// Dispose each child runner as soon as it finishes running.
    pub const DISPOSE_RUNNERS: &str = "DisposeRunners";
    /// Let drivers skip assemblies that reference no test framework.
    pub const SKIP_NON_TEST_ASSEMBLIES: &str = "SkipNonTestAssemblies";
    /// Extend the agent launch timeout so a debugger can attach.
    pub const DEBUG_AGENT: &str = "DebugAgent";
    /// Framework hint recorded by assembly inspection.
    pub const IMAGE_TARGET_FRAMEWORK_NAME: &str = "ImageTargetFrameworkName";
    /// Set by assembly inspection when the image is not managed code.
    pub const IMAGE_IS_UNMANAGED: &str = "ImageIsUnmanaged";
}

/// A setting value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<String>),
}

impl SettingValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<usize> for SettingValue {
    fn from(value: usize) -> Self {
        Self::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for SettingValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

pub type Settings = BTreeMap<String, SettingValue>;

/// Where tests execute relative to the engine process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessModel {
    /// One agent per assembly when there are several, otherwise one agent.
    #[default]
    Default,
    /// Run inside the engine process.
    InProcess,
    /// Run everything in a single agent process.
    Separate,
    /// One agent process per assembly.
    Multiple,
}

impl ProcessModel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::InProcess => "InProcess",
            Self::Separate => "Separate",
            Self::Multiple => "Multiple",
        }
    }
}

impl FromStr for ProcessModel {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "inprocess" => Ok(Self::InProcess),
            "separate" | "single" => Ok(Self::Separate),
            "multiple" => Ok(Self::Multiple),
            _ => Err(EngineError::invalid_argument(
                "process_model",
                format!("unknown process model '{}'", s),
            )),
        }
    }
}

/// How in-process runs are isolated from the engine and from each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainUsage {
    /// One isolated context per assembly when there are several.
    #[default]
    Default,
    /// No isolation: drivers run directly in the engine.
    None,
    /// One isolated context for all assemblies.
    Single,
    /// One isolated context per assembly.
    Multiple,
}

impl DomainUsage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::None => "None",
            Self::Single => "Single",
            Self::Multiple => "Multiple",
        }
    }
}

impl FromStr for DomainUsage {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "none" => Ok(Self::None),
            "single" => Ok(Self::Single),
            "multiple" => Ok(Self::Multiple),
            _ => Err(EngineError::invalid_argument(
                "domain_usage",
                format!("unknown domain usage '{}'", s),
            )),
        }
    }
}

/// Identifier of a package, unique within one [`PackageIds`] source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(u64);

impl PackageId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Allocates package ids. Owned by the engine; ids are never reused.
#[derive(Debug)]
pub struct PackageIds {
    next: AtomicU64,
}

impl PackageIds {
    pub fn new() -> Self {
        Self { next: AtomicU64::new(1) }
    }

    pub fn next_id(&self) -> PackageId {
        PackageId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for PackageIds {
    fn default() -> Self {
        Self::new()
    }
}

/// A node in the package tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPackage {
    id: PackageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Settings::is_empty")]
    settings: Settings,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    sub_packages: Vec<TestPackage>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    expanded: bool,
}

impl TestPackage {
    /// A package for one file (an assembly or a project).
    pub fn new(ids: &PackageIds, path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        if path.trim().is_empty() {
            return Err(EngineError::invalid_argument("path", "package path must not be empty"));
        }
        Ok(Self {
            id: ids.next_id(),
            full_name: Some(path),
            settings: Settings::new(),
            sub_packages: Vec::new(),
            expanded: false,
        })
    }

    /// An unnamed root holding one sub-package per file.
    pub fn from_files<I, S>(ids: &PackageIds, files: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut root = Self::anonymous(ids);
        for file in files {
            root.add_sub_package(Self::new(ids, file)?);
        }
        Ok(root)
    }

    /// An unnamed aggregate with no sub-packages yet.
    pub fn anonymous(ids: &PackageIds) -> Self {
        Self {
            id: ids.next_id(),
            full_name: None,
            settings: Settings::new(),
            sub_packages: Vec::new(),
            expanded: false,
        }
    }

    pub fn id(&self) -> PackageId {
        self.id
    }

    /// File name portion of the full name.
    pub fn name(&self) -> Option<&str> {
        let full = self.full_name.as_deref()?;
        Path::new(full).file_name().and_then(|n| n.to_str()).or(Some(full))
    }

    pub fn full_name(&self) -> Option<&str> {
        self.full_name.as_deref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn sub_packages(&self) -> &[TestPackage] {
        &self.sub_packages
    }

    pub fn has_sub_packages(&self) -> bool {
        !self.sub_packages.is_empty()
    }

    /// True when any direct sub-package is itself an aggregate, i.e. an
    /// expanded project.
    pub fn has_nested_packages(&self) -> bool {
        self.sub_packages.iter().any(TestPackage::has_sub_packages)
    }

    /// Add a child. The child inherits every setting currently on `self`.
    pub fn add_sub_package(&mut self, mut child: TestPackage) {
        for (key, value) in &self.settings {
            child.add_setting(key.clone(), value.clone());
        }
        self.sub_packages.push(child);
    }

    /// Add or override a setting here and in every sub-package.
    pub fn add_setting(&mut self, key: impl Into<String>, value: impl Into<SettingValue>) {
        let key = key.into();
        let value = value.into();
        for child in &mut self.sub_packages {
            child.add_setting(key.clone(), value.clone());
        }
        self.settings.insert(key, value);
    }

    pub fn setting(&self, key: &str) -> Option<&SettingValue> {
        self.settings.get(key)
    }

    pub fn has_setting(&self, key: &str) -> bool {
        self.settings.contains_key(key)
    }

    pub fn bool_setting(&self, key: &str, default: bool) -> bool {
        self.setting(key).and_then(SettingValue::as_bool).unwrap_or(default)
    }

    pub fn int_setting(&self, key: &str) -> Option<i64> {
        self.setting(key).and_then(SettingValue::as_int)
    }

    pub fn str_setting(&self, key: &str) -> Option<&str> {
        self.setting(key).and_then(SettingValue::as_str)
    }

    pub fn process_model(&self) -> ProcessModel {
        self.enum_setting(keys::PROCESS_MODEL)
    }

    pub fn domain_usage(&self) -> DomainUsage {
        self.enum_setting(keys::DOMAIN_USAGE)
    }

    /// Configured agent limit, ignoring non-positive values.
    pub fn max_agents(&self) -> Option<usize> {
        self.int_setting(keys::MAX_AGENTS)
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| *n > 0)
    }

    pub fn is_unmanaged(&self) -> bool {
        self.bool_setting(keys::IMAGE_IS_UNMANAGED, false)
    }

    fn enum_setting<T>(&self, key: &str) -> T
    where
        T: FromStr<Err = EngineError> + Default,
    {
        match self.str_setting(key).map(str::parse::<T>) {
            Some(Ok(value)) => value,
            Some(Err(err)) => {
                tracing::warn!("ignoring setting {}: {}", key, err);
                T::default()
            }
            None => T::default(),
        }
    }

    /// Leaf packages in depth-first order. A package without sub-packages is
    /// its own single leaf.
    pub fn leaves(&self) -> Vec<&TestPackage> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a TestPackage>) {
        if self.sub_packages.is_empty() {
            out.push(self);
        } else {
            for child in &self.sub_packages {
                child.collect_leaves(out);
            }
        }
    }

    pub fn leaf_count(&self) -> usize {
        if self.sub_packages.is_empty() {
            1
        } else {
            self.sub_packages.iter().map(TestPackage::leaf_count).sum()
        }
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    /// Populate a project package with its assemblies, exactly once.
    ///
    /// `settings` are added only where this package has no value yet.
    pub fn expand(&mut self, sub_packages: Vec<TestPackage>, settings: Settings) -> Result<()> {
        if self.expanded {
            return Err(EngineError::invalid_argument(
                "package",
                format!(
                    "package {} has already been expanded",
                    self.full_name.as_deref().unwrap_or("<anonymous>")
                ),
            ));
        }
        self.expanded = true;
        for child in sub_packages {
            self.add_sub_package(child);
        }
        for (key, value) in settings {
            if !self.has_setting(&key) {
                self.add_setting(key, value);
            }
        }
        Ok(())
    }

    /// Mutable access to direct children, for the setup phase only.
    pub(crate) fn sub_packages_mut(&mut self) -> &mut [TestPackage] {
        &mut self.sub_packages
    }

    /// Serialize the package tree.
    pub fn to_text(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::wrap("failed to serialize package", e.into()))
    }

    /// Deserialize a package tree produced by [`TestPackage::to_text`].
    pub fn from_text(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| EngineError::wrap("failed to deserialize package", e.into()))
    }
}

#[cfg(test)]
#[path = "package_tests.rs"]
mod tests;
