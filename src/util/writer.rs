use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::fs;
use uuid::Uuid;

use crate::{
    errors::Result,
    util::{format_local, local_rfc3339, now_local},
};

const META_FILE: &str = "run.meta.json";

/// Per-run artifact folder: `{root}/{timestamp}_{theme-slug}_{id}`.
pub struct RunFolder {
    path: PathBuf,
    created_at: DateTime<Local>,
}

#[derive(Debug, Serialize)]
pub struct RunMetadata {
    pub theme: String,
    pub style: String,
    pub model: String,
    pub custom_mode: bool,
    pub instrumental: bool,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lyrics: Option<String>,
    pub task_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_image_url: Option<String>,
    pub audio: Option<String>,
    pub images: Vec<String>,
}

impl RunFolder {
    pub async fn create(root: &Path, theme: &str) -> Result<Self> {
        let now = now_local();
        let id = Uuid::new_v4().simple().to_string();
        let name = format!(
            "{}_{}_{}",
            format_local(&now, "%Y%m%d_%H%M%S"),
            slugify(theme),
            &id[..8]
        );

        let path = root.join(name);
        fs::create_dir_all(&path).await?;

        Ok(Self {
            path,
            created_at: now,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }

    pub async fn write_metadata(&self, meta: &RunMetadata) -> Result<PathBuf> {
        let mut value = serde_json::to_value(meta)?;
        if let serde_json::Value::Object(map) = &mut value {
            map.insert(
                "created_at".to_string(),
                serde_json::Value::String(local_rfc3339(&self.created_at)),
            );
        }

        let meta_path = self.path.join(META_FILE);
        fs::write(&meta_path, serde_json::to_vec_pretty(&value)?).await?;
        Ok(meta_path)
    }
}

fn slugify(theme: &str) -> String {
    let mut slug = String::new();
    for c in theme.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }

    let slug: String = slug.trim_end_matches('-').chars().take(40).collect();
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() { "song".to_string() } else { slug }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_keeps_words() {
        assert_eq!(slugify("  Mystical Forest!! at dawn "), "mystical-forest-at-dawn");
        assert_eq!(slugify("???"), "song");
    }

    #[tokio::test]
    async fn creates_folder_and_metadata() {
        let root = tempfile::tempdir().unwrap();
        let folder = RunFolder::create(root.path(), "mystical forest").await.unwrap();

        assert!(folder.path().is_dir());
        let name = folder.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.contains("_mystical-forest_"), "{name}");

        let meta_path = folder
            .write_metadata(&RunMetadata {
                theme: "mystical forest".to_string(),
                style: "cinematic".to_string(),
                model: "V4".to_string(),
                custom_mode: true,
                instrumental: false,
                title: "Where the Old Oaks Dream".to_string(),
                lyrics: None,
                task_id: "abc-123".to_string(),
                track_id: Some("t1".to_string()),
                track_image_url: None,
                audio: Some("output.mp3".to_string()),
                images: vec!["cover_1.png".to_string()],
            })
            .await
            .unwrap();

        let meta: serde_json::Value =
            serde_json::from_slice(&std::fs::read(meta_path).unwrap()).unwrap();
        assert_eq!(meta["task_id"], "abc-123");
        assert!(meta.get("lyrics").is_none());
        assert!(meta["created_at"].is_string());
    }
}
