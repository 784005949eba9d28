// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Selectable LoRA names: where they come from and the process-wide read-only cache holding them.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use log::{debug, error, info};
use thiserror::Error;
use walkdir::WalkDir;

use crate::models::stack::NONE_NAME;

#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("LoRA directory {} could not be read: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Something that can list selectable LoRA names.
pub trait CandidateSource: Send {
    fn list(&self) -> Result<Vec<String>, CandidateError>;
}

/// Recursive scan of a model directory.
///
/// Names are `/`-separated paths relative to the root, filtered by
/// extension (case-insensitive) and sorted.
#[derive(Clone, Debug)]
pub struct DirectorySource {
    root: PathBuf,
    extensions: Vec<String>,
}

impl DirectorySource {
    pub fn new(root: PathBuf, extensions: Vec<String>) -> Self {
        Self { root, extensions }
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
    }
}

impl CandidateSource for DirectorySource {
    fn list(&self) -> Result<Vec<String>, CandidateError> {
        fs::read_dir(&self.root).map_err(|source| CandidateError::Unreadable {
            path: self.root.clone(),
            source,
        })?;

        let mut names = Vec::new();
        let walk = WalkDir::new(&self.root).min_depth(1).follow_links(true);
        for entry in walk {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!("Skipping unreadable entry under {}: {err}", self.root.display());
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.accepts(entry.path()) {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                names.push(name);
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }
}

/// Fixed list, handy for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct FixedSource(pub Vec<String>);

impl CandidateSource for FixedSource {
    fn list(&self) -> Result<Vec<String>, CandidateError> {
        Ok(self.0.clone())
    }
}

/// Initialise-once list of selectable names shared by every stacker node.
///
/// Until initialised (or after a failed fetch) it yields just `["none"]`.
#[derive(Debug)]
pub struct CandidateCatalog {
    names: OnceLock<Vec<String>>,
    fallback: Vec<String>,
}

impl Default for CandidateCatalog {
    fn default() -> Self {
        Self {
            names: OnceLock::new(),
            fallback: vec![NONE_NAME.to_string()],
        }
    }
}

impl CandidateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog that is already initialised with `names`.
    pub fn with_names(names: Vec<String>) -> Self {
        let catalog = Self::default();
        catalog.initialize(names);
        catalog
    }

    /// Store the fetched names behind `"none"`. Only the first call has an effect.
    pub fn initialize(&self, names: Vec<String>) -> bool {
        let mut list = Vec::with_capacity(names.len() + 1);
        list.push(NONE_NAME.to_string());
        list.extend(names.into_iter().filter(|n| n != NONE_NAME));
        let count = list.len() - 1;
        match self.names.set(list) {
            Ok(()) => {
                info!("Loaded {count} LoRA name(s)");
                true
            }
            Err(_) => {
                debug!("LoRA name list already initialised; ignoring refresh");
                false
            }
        }
    }

    /// Adopt a fetch result, logging a failure and keeping the default list.
    pub fn initialize_from(&self, fetched: Result<Vec<String>, String>) -> bool {
        match fetched {
            Ok(names) => self.initialize(names),
            Err(err) => {
                error!("Failed to fetch LoRA names: {err}");
                false
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.names.get().is_some()
    }

    pub fn names(&self) -> &[String] {
        self.names.get().unwrap_or(&self.fallback)
    }
}
