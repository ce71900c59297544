use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::mode::Fetcher;

/// Reads a JSON snapshot written by an external collector
pub struct JsonFileFetcher<T> {
    path: PathBuf,
    _data: PhantomData<fn() -> T>,
}

impl<T> JsonFileFetcher<T> {
    pub fn new(path: impl AsRef<Path>) -> Self {
        JsonFileFetcher { path: path.as_ref().to_path_buf(), _data: PhantomData }
    }
}

impl<T: DeserializeOwned> Fetcher<T> for JsonFileFetcher<T> {
    fn fetch(&mut self) -> Result<T> {
        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }
}
