use serde::{Deserialize, Serialize};

/// An entry in a user's file space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsItem {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
}

impl FsItem {
    pub fn file(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or(&path).to_string();
        Self {
            name,
            path,
            is_dir: false,
        }
    }

    /// `path` is the directory prefix including its trailing `/`.
    pub fn dir(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            name,
            path,
            is_dir: true,
        }
    }
}
