// src/history/store.rs

use anyhow::{anyhow, Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing::debug;

/// Named JSON documents with load/save semantics.
///
/// A missing document loads as `None`; saving replaces it wholesale.
pub trait Store: Send + Sync {
    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>>;
    fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<()>;
}

/// One pretty-printed `<name>.json` per document under a directory.
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating state directory {:?}", &dir))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }
}

impl Store for JsonStore {
    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).with_context(|| format!("reading `{}`", path.display()))?;
        let value = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing `{}`", path.display()))?;
        Ok(Some(value))
    }

    /// Write to `<name>.json.tmp`, then rename over the final file.
    fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let final_path = self.path_for(name);
        let tmp_path = self.dir.join(format!("{}.json.tmp", name));

        let json = serde_json::to_vec_pretty(value)
            .with_context(|| format!("serializing `{}`", name))?;
        fs::write(&tmp_path, json)
            .with_context(|| format!("could not write temporary file `{}`", tmp_path.display()))?;
        fs::rename(&tmp_path, &final_path).with_context(|| {
            format!(
                "failed to rename `{}` to `{}`",
                tmp_path.display(),
                final_path.display()
            )
        })?;

        debug!(path = %final_path.display(), "saved state");
        Ok(())
    }
}

/// In-process store, mainly for tests.
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let docs = self.docs.lock().map_err(|_| anyhow!("memory store lock poisoned"))?;
        docs.get(name)
            .map(|v| serde_json::from_value(v.clone()).with_context(|| format!("decoding `{}`", name)))
            .transpose()
    }

    fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value).with_context(|| format!("encoding `{}`", name))?;
        self.docs
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?
            .insert(name.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[test]
    fn json_store_round_trips_and_leaves_no_tmp() {
        let tmp = tempdir().unwrap();
        let store = JsonStore::new(tmp.path().join("state")).unwrap();

        let missing: Option<BTreeMap<String, String>> = store.load("pdf_hashes").unwrap();
        assert!(missing.is_none());

        let mut hashes = BTreeMap::new();
        hashes.insert("https://x/a.pdf".to_string(), "abc".to_string());
        store.save("pdf_hashes", &hashes).unwrap();

        let back: BTreeMap<String, String> = store.load("pdf_hashes").unwrap().unwrap();
        assert_eq!(back, hashes);
        assert!(store.path_for("pdf_hashes").exists());
        assert!(!store.dir().join("pdf_hashes.json.tmp").exists());
    }

    #[test]
    fn persistence_across_instances() {
        let tmp = tempdir().unwrap();
        {
            let store = JsonStore::new(tmp.path()).unwrap();
            store.save("page_meta", &vec![1, 2, 3]).unwrap();
        }
        let store = JsonStore::new(tmp.path()).unwrap();
        let v: Vec<i32> = store.load("page_meta").unwrap().unwrap();
        assert_eq!(v, vec![1, 2, 3]);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let tmp = tempdir().unwrap();
        let store = JsonStore::new(tmp.path()).unwrap();
        fs::write(store.path_for("tariffs"), b"{ no es json").unwrap();
        let res: Result<Option<Vec<i32>>> = store.load("tariffs");
        assert!(res.is_err());
    }

    #[test]
    fn memory_store_overwrites() {
        let store = MemoryStore::new();
        store.save("k", &"uno").unwrap();
        store.save("k", &"dos").unwrap();
        let v: String = store.load("k").unwrap().unwrap();
        assert_eq!(v, "dos");
        let none: Option<String> = store.load("otra").unwrap();
        assert!(none.is_none());
    }
}
