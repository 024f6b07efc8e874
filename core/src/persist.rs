use crate::memory::MemoryIndex;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub created_at: String,
    pub version: u32,
}

pub const INDEX_VERSION: u32 = 1;

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn index(&self) -> PathBuf {
        self.root.join("index.bin")
    }

    fn meta(&self) -> PathBuf {
        self.root.join("meta.json")
    }
}

pub fn save_index(paths: &IndexPaths, index: &MemoryIndex, created_at: &str) -> Result<()> {
    create_dir_all(&paths.root)?;
    let bytes = bincode::serialize(index)?;
    let mut f = File::create(paths.index())?;
    f.write_all(&bytes)?;

    let meta = MetaFile {
        num_docs: crate::index::IndexStore::num_docs(index),
        created_at: created_at.to_string(),
        version: INDEX_VERSION,
    };
    let mut f = File::create(paths.meta())?;
    f.write_all(serde_json::to_string_pretty(&meta)?.as_bytes())?;
    Ok(())
}

pub fn load_index(paths: &IndexPaths) -> Result<MemoryIndex> {
    let mut f = File::open(paths.index())
        .with_context(|| format!("opening index at {}", paths.index().display()))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let index = bincode::deserialize(&buf)?;
    Ok(index)
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())
        .with_context(|| format!("opening index meta at {}", paths.meta().display()))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}
