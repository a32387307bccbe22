use std::future::Future;

use rig::{
    agent::Agent,
    client::CompletionClient,
    completion::Prompt,
    providers::anthropic,
};
use tracing::{debug, info};

use crate::{
    config::AnthropicConfig,
    errors::{Result, SongError},
    models::{GenerationRequest, Lyrics},
};

type AnthropicCompletionModel = <anthropic::Client as CompletionClient>::CompletionModel;

/// Text model able to answer a single songwriting prompt.
pub trait LyricsWriter {
    fn write(&self, prompt: &str) -> impl Future<Output = Result<String>>;
}

/// Claude-backed writer; the songwriter preamble is baked into the agent.
pub struct AnthropicWriter {
    agent: Agent<AnthropicCompletionModel>,
}

impl AnthropicWriter {
    pub fn new(config: &AnthropicConfig) -> Self {
        let client = anthropic::Client::new(&config.api_key);
        let agent = client
            .agent(&config.model)
            .name("songsmith-lyricist")
            .preamble(&config.preamble)
            .max_tokens(config.max_tokens)
            .build();
        Self { agent }
    }
}

impl LyricsWriter for AnthropicWriter {
    async fn write(&self, prompt: &str) -> Result<String> {
        self.agent
            .prompt(prompt)
            .await
            .map_err(|err| SongError::upstream(format!("lyrics request failed: {err}")))
    }
}

pub struct LyricsGenerator<W> {
    writer: W,
}

impl<W: LyricsWriter> LyricsGenerator<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn generate(&self, request: &GenerationRequest) -> Result<Lyrics> {
        let prompt = build_prompt(request);
        info!(
            target: "lyrics",
            theme = %request.theme,
            style = %request.style,
            verses = request.verse_count,
            chorus = request.include_chorus,
            "generating lyrics"
        );
        debug!(target: "lyrics", %prompt, "lyrics prompt");

        let text = self.writer.write(&prompt).await?;
        if text.trim().is_empty() {
            return Err(SongError::upstream("lyrics model returned empty content"));
        }

        let lyrics = Lyrics::parse(&text);
        let sections = lyrics.sections();
        debug!(
            target: "lyrics",
            title = %lyrics.title,
            verses = sections.verses,
            choruses = sections.choruses,
            "lyrics received"
        );
        Ok(lyrics)
    }
}

fn build_prompt(request: &GenerationRequest) -> String {
    let style = request.style.trim();
    let style_instruction = if style.is_empty() {
        String::new()
    } else {
        format!("Write in {style} style. ")
    };

    let mut structure = format!("Include {} verses", request.verse_count);
    if request.include_chorus {
        structure.push_str(" and a chorus that repeats.");
    } else {
        structure.push('.');
    }

    format!(
        "{style_instruction}Write lyrics for a song about: {}. {structure} \
Include a title at the top. Format the output so verses and chorus are clearly separated, \
labelling each section like [Verse 1] or [Chorus].",
        request.theme.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LyricSections, ModelVersion};
    use std::sync::Mutex;

    struct CannedWriter {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedWriter {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl LyricsWriter for CannedWriter {
        async fn write(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    fn forest_request() -> GenerationRequest {
        GenerationRequest {
            theme: "mystical forest".to_string(),
            style: "cinematic".to_string(),
            verse_count: 2,
            include_chorus: true,
            instrumental: false,
            model_version: ModelVersion::V3_5,
            custom_mode: true,
        }
    }

    #[test]
    fn prompt_describes_structure() {
        let prompt = build_prompt(&forest_request());
        assert!(prompt.starts_with("Write in cinematic style. "));
        assert!(prompt.contains("a song about: mystical forest."));
        assert!(prompt.contains("Include 2 verses and a chorus that repeats."));

        let mut no_chorus = forest_request();
        no_chorus.include_chorus = false;
        no_chorus.style = String::new();
        let prompt = build_prompt(&no_chorus);
        assert!(prompt.starts_with("Write lyrics"));
        assert!(prompt.contains("Include 2 verses. "));
    }

    #[tokio::test]
    async fn mystical_forest_lyrics_have_expected_sections() {
        let writer = CannedWriter::new(
            "## Where the Old Oaks Dream\n\n[Verse 1]\nMist on the fern\n\n[Chorus]\nHold the light\n\n[Verse 2]\nOwls keep time\n",
        );
        let generator = LyricsGenerator::new(writer);

        let lyrics = generator.generate(&forest_request()).await.unwrap();

        assert_eq!(lyrics.title, "Where the Old Oaks Dream");
        assert_eq!(
            lyrics.sections(),
            LyricSections {
                verses: 2,
                choruses: 1
            }
        );
        let prompts = generator.writer.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
    }

    #[tokio::test]
    async fn untitled_reply_keeps_first_verse() {
        let generator =
            LyricsGenerator::new(CannedWriter::new("[Verse 1]\nMist\n[Chorus]\nLight\n[Verse 2]\nOwls"));

        let lyrics = generator.generate(&forest_request()).await.unwrap();

        assert!(lyrics.title.is_empty());
        assert_eq!(
            lyrics.sections(),
            LyricSections {
                verses: 2,
                choruses: 1
            }
        );
    }

    #[tokio::test]
    async fn blank_reply_is_upstream_error() {
        let generator = LyricsGenerator::new(CannedWriter::new("  \n"));
        let err = generator.generate(&forest_request()).await.unwrap_err();
        assert!(matches!(err, SongError::Upstream(_)));
    }
}
