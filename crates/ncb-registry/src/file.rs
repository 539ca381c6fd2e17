//! Registry backed by a newline-separated text file.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use ncb_core::{domain::Identifier, registry::Registry, Result};
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};

#[derive(Debug)]
pub struct FileRegistry {
    path: PathBuf,
    // Serializes writers; readers go straight to the file.
    write_lock: Mutex<()>,
}

impl FileRegistry {
    /// Opens `path`, creating an empty registry file when it does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if fs::metadata(&path).await.is_err() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&path, b"").await?;
            tracing::info!(path = %path.display(), "created empty registry file");
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_ids(&self) -> Result<Vec<String>> {
        let contents = fs::read_to_string(&self.path).await?;
        Ok(parse_lines(&contents))
    }
}

fn parse_lines(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl Registry for FileRegistry {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn fetch_all_identifiers(&self) -> Result<HashSet<String>> {
        Ok(self.read_ids().await?.into_iter().collect())
    }

    async fn insert(&self, id: &Identifier) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        if self.read_ids().await?.iter().any(|l| l == id.as_str()) {
            return Ok(false);
        }

        let mut f = fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await?;
        f.write_all(format!("{id}\n").as_bytes()).await?;
        f.flush().await?;
        Ok(true)
    }

    async fn remove(&self, id: &Identifier) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let ids = self.read_ids().await?;
        let kept: Vec<&String> = ids.iter().filter(|l| *l != id.as_str()).collect();
        if kept.len() == ids.len() {
            return Ok(false);
        }

        let mut out = String::with_capacity(kept.iter().map(|l| l.len() + 1).sum());
        for line in kept {
            out.push_str(line);
            out.push('\n');
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, out).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(true)
    }
}
