use std::collections::HashSet;

use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

// well-known upload locations, probed in this order
pub const UPLOAD_PATHS: &[&str] = &[
    "/upload/",
    "/uploads/",
    "/fileupload/",
    "/file-upload/",
    "/uploadfiles/",
    "/upload-file/",
    "/uploader/",
    "/file/",
    "/files/",
    "/media/upload/",
    "/admin/upload/",
    "/admin/uploads/",
    "/wp-content/uploads/",
    "/images/uploads/",
    "/img/upload/",
    "/media/uploads/",
    "/assets/uploads/",
    "/upload/image/",
    "/upload/files/",
    "/upload/media/",
    "/upload/documents/",
    "/api/upload/",
    "/api/v1/upload/",
    "/api/files/upload/",
    "/public/uploads/",
    "/storage/uploads/",
    "/user/uploads/",
    "/users/uploads/",
    "/profile/upload/",
    "/avatar/upload/",
    "/temp/uploads/",
    "/tmp/uploads/",
    "/data/uploads/",
    "/content/uploads/",
    "/resources/uploads/",
    "/static/uploads/",
    "/attachments/",
    "/images/",
    "/img/",
    "/documents/",
    "/docs/",
    "/files/upload/",
    "/dashboard/upload/",
    "/panel/upload/",
    "/cp/upload/",
    "/administrator/uploads/",
    "/manager/uploads/",
    "/members/uploads/",
    "/customer/uploads/",
];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("path catalog is empty")]
    Empty,

    #[error("failed to open paths file: {path}: {source}")]
    FileOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read paths file: {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Ordered, duplicate-free list of candidate paths for one scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Catalog {
    paths: Vec<String>,
}

impl Catalog {
    pub fn builtin() -> Self {
        Self {
            paths: UPLOAD_PATHS.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Builds a catalog from arbitrary entries. Entries are trimmed, blanks
    /// are dropped and only the first occurrence of a path is kept.
    pub fn from_paths<I, S>(paths: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut catalog = Self { paths: Vec::new() };
        catalog.merge(paths);
        if catalog.paths.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(catalog)
    }

    /// Appends the paths listed in `path` (one per line) after the current
    /// entries, skipping any that are already present.
    pub async fn extend_from_file(&mut self, path: &str) -> Result<usize, CatalogError> {
        let path = crate::config::expand_tilde_string(path);
        let handle = File::open(&path)
            .await
            .map_err(|e| CatalogError::FileOpen {
                path: path.clone(),
                source: e,
            })?;

        let mut extra = Vec::new();
        let mut lines = BufReader::new(handle).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => extra.push(line),
                Ok(None) => break,
                Err(e) => return Err(CatalogError::FileRead { path, source: e }),
            }
        }

        let before = self.paths.len();
        self.merge(extra);
        Ok(self.paths.len() - before)
    }

    fn merge<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen: HashSet<String> = self.paths.iter().cloned().collect();
        for p in paths {
            let p = p.as_ref().trim();
            if p.is_empty() {
                continue;
            }
            if seen.insert(p.to_string()) {
                self.paths.push(p.to_string());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(|p| p.as_str())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
