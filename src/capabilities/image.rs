use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use reqwest::Client as HttpClient;
use rig::{
    client::ImageGenerationClient, image_generation::ImageGenerationModel, providers::openai,
};
use tracing::{debug, info, warn};

use crate::{
    config::ImageConfig,
    download::Downloader,
    errors::{Result, SongError},
    models::GenerationRequest,
};

const DEFAULT_SIDE: u32 = 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Cover art through an OpenAI-compatible image model, one request per cover.
pub struct ImageGenerator {
    model: openai::image_generation::ImageGenerationModel,
    model_name: String,
    width: u32,
    height: u32,
    count: u32,
}

impl ImageGenerator {
    pub fn new(config: &ImageConfig) -> Result<Self> {
        let http_client = HttpClient::builder()
            .user_agent("songsmith/0.1")
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| SongError::other(format!("failed to build HTTP client: {err}")))?;

        let client = openai::Client::builder(&config.api_key)
            .base_url(&config.base_url)
            .custom_client(http_client)
            .build()
            .map_err(|err| SongError::other(format!("failed to build image client: {err}")))?;

        let (width, height) = parse_size(&config.size);
        Ok(Self {
            model: client.image_generation_model(&config.model),
            model_name: config.model.clone(),
            width,
            height,
            count: config.count,
        })
    }

    pub fn prompt_for(request: &GenerationRequest) -> String {
        let style = request.style.trim();
        if style.is_empty() {
            format!("Album cover artwork for a song about {}", request.theme.trim())
        } else {
            format!(
                "Album cover artwork for a {style} song about {}",
                request.theme.trim()
            )
        }
    }

    /// Generates cover images into `folder`, returning the written paths.
    pub async fn generate_into(
        &self,
        request: &GenerationRequest,
        folder: &Path,
        downloader: &Downloader,
    ) -> Result<Vec<PathBuf>> {
        let prompt = Self::prompt_for(request);
        info!(
            target: "image",
            model = %self.model_name,
            count = self.count,
            size = %format!("{}x{}", self.width, self.height),
            "requesting cover art"
        );
        debug!(target: "image", %prompt, "image prompt");

        let mut written = Vec::new();
        for index in 1..=self.count {
            let dest = folder.join(format!("cover_{index}.png"));
            let saved = match self.render(&prompt).await {
                Ok(bytes) => downloader.write_bytes(&bytes, &dest).await,
                Err(err) => Err(err),
            };

            match saved {
                Ok(_) => written.push(dest),
                Err(err) => warn!(target: "image", index, error = %err, "skipping image"),
            }
        }

        if written.is_empty() {
            return Err(SongError::upstream("no image could be saved"));
        }
        Ok(written)
    }

    async fn render(&self, prompt: &str) -> Result<Vec<u8>> {
        let response = self
            .model
            .image_generation_request()
            .prompt(prompt)
            .width(self.width)
            .height(self.height)
            .send()
            .await?;

        if response.image.is_empty() {
            return Err(SongError::upstream("image service returned an empty image"));
        }
        Ok(response.image)
    }
}

/// Reads `"{width}x{height}"`, falling back to a square cover.
fn parse_size(size: &str) -> (u32, u32) {
    size.split_once(['x', 'X'])
        .and_then(|(w, h)| Some((w.trim().parse().ok()?, h.trim().parse().ok()?)))
        .filter(|&(w, h): &(u32, u32)| w > 0 && h > 0)
        .unwrap_or((DEFAULT_SIDE, DEFAULT_SIDE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::ModelVersion, test_support::spawn_server};
    use axum::{Json, Router, http::StatusCode, routing::post};
    use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
    use serde_json::{Value, json};
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    fn request() -> GenerationRequest {
        GenerationRequest {
            theme: "mystical forest".to_string(),
            style: "cinematic".to_string(),
            verse_count: 2,
            include_chorus: true,
            instrumental: false,
            model_version: ModelVersion::V4,
            custom_mode: true,
        }
    }

    fn generator(base_url: String, count: u32) -> ImageGenerator {
        ImageGenerator::new(&ImageConfig {
            api_key: "img-key".to_string(),
            base_url,
            model: "dall-e-3".to_string(),
            size: "1792x1024".to_string(),
            count,
        })
        .unwrap()
    }

    #[test]
    fn prompt_mentions_theme_and_style() {
        assert_eq!(
            ImageGenerator::prompt_for(&request()),
            "Album cover artwork for a cinematic song about mystical forest"
        );
    }

    #[test]
    fn size_parsing_falls_back_to_square() {
        assert_eq!(parse_size("1792x1024"), (1792, 1024));
        assert_eq!(parse_size("wide"), (1024, 1024));
        assert_eq!(parse_size("0x512"), (1024, 1024));
    }

    #[tokio::test]
    async fn saves_one_cover_per_request() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let app = Router::new().route(
            "/images/generations",
            post(move |Json(body): Json<Value>| {
                let counter = counter.clone();
                async move {
                    let call = counter.fetch_add(1, Ordering::SeqCst) as u8 + 1;
                    assert_eq!(body["model"], json!("dall-e-3"));
                    assert_eq!(body["size"], json!("1792x1024"));
                    Json(json!({
                        "created": 1,
                        "data": [{ "b64_json": BASE64_STANDARD.encode([call, call, call]) }]
                    }))
                }
            }),
        );
        let base = spawn_server(app).await;
        let dir = tempfile::tempdir().unwrap();

        let written = generator(base, 2)
            .generate_into(&request(), dir.path(), &Downloader::new().unwrap())
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            written,
            vec![dir.path().join("cover_1.png"), dir.path().join("cover_2.png")]
        );
        assert_eq!(std::fs::read(dir.path().join("cover_1.png")).unwrap(), vec![1, 1, 1]);
        assert_eq!(std::fs::read(dir.path().join("cover_2.png")).unwrap(), vec![2, 2, 2]);
    }

    #[tokio::test]
    async fn service_error_is_reported() {
        let app = Router::new().route(
            "/images/generations",
            post(|| async { (StatusCode::UNAUTHORIZED, "bad key") }),
        );
        let base = spawn_server(app).await;
        let dir = tempfile::tempdir().unwrap();

        let err = generator(base, 1)
            .generate_into(&request(), dir.path(), &Downloader::new().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, SongError::Upstream(_)));
        assert!(!dir.path().join("cover_1.png").exists());
    }
}
