use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::io::write_output;
use crate::pipeline::RunPaths;

/// Companion outputs of a run, written after the raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    Log,
    Manifest,
    /// FeatureCollection of unrecoverable features; only produced when there are any.
    Errors,
}

/// Destination for companion outputs.
pub trait OutputSink: Send + Sync {
    fn put(&mut self, artifact: Artifact, contents: &str) -> Result<()>;
}

/// Companion files beside the raster.
pub struct FileSink {
    log: PathBuf,
    manifest: PathBuf,
    errors: PathBuf,
    atomic: bool,
}

impl FileSink {
    pub fn new(log: impl Into<PathBuf>, manifest: impl Into<PathBuf>, errors: impl Into<PathBuf>, atomic: bool) -> Self {
        Self { log: log.into(), manifest: manifest.into(), errors: errors.into(), atomic }
    }

    pub fn for_run(paths: &RunPaths, atomic: bool) -> Self {
        Self::new(paths.log(), paths.manifest(), paths.errors(), atomic)
    }

    fn path(&self, artifact: Artifact) -> &PathBuf {
        match artifact {
            Artifact::Log => &self.log,
            Artifact::Manifest => &self.manifest,
            Artifact::Errors => &self.errors,
        }
    }
}

impl OutputSink for FileSink {
    fn put(&mut self, artifact: Artifact, contents: &str) -> Result<()> {
        let path = self.path(artifact);
        write_output(path, contents.as_bytes(), self.atomic)
            .with_context(|| format!("Failed to write {artifact:?} to {}", path.display()))
    }
}

/// Log and manifest to stdout. The error collection is only ever written as a file.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn put(&mut self, artifact: Artifact, contents: &str) -> Result<()> {
        if artifact == Artifact::Errors {
            return Ok(());
        }
        let mut out = std::io::stdout().lock();
        writeln!(out, "{contents}")?;
        Ok(())
    }
}

/// Keeps outputs in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub(crate) files: HashMap<Artifact, String>,
}

impl MemorySink {
    pub fn new() -> Self { Self::default() }

    #[inline] pub fn get(&self, artifact: Artifact) -> Option<&str> { self.files.get(&artifact).map(String::as_str) }
}

impl OutputSink for MemorySink {
    fn put(&mut self, artifact: Artifact, contents: &str) -> Result<()> {
        self.files.insert(artifact, contents.to_string());
        Ok(())
    }
}
