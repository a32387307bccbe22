use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Suno model generation to render with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
pub enum ModelVersion {
    #[default]
    #[serde(rename = "V3_5")]
    #[value(name = "V3_5")]
    V3_5,
    #[serde(rename = "V4")]
    #[value(name = "V4")]
    V4,
}

impl ModelVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVersion::V3_5 => "V3_5",
            ModelVersion::V4 => "V4",
        }
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub theme: String,
    pub style: String,
    pub verse_count: u32,
    pub include_chorus: bool,
    pub instrumental: bool,
    pub model_version: ModelVersion,
    pub custom_mode: bool,
}

impl GenerationRequest {
    /// Lyrics are only sent in custom mode, and never for instrumentals.
    pub fn needs_lyrics(&self) -> bool {
        self.custom_mode && !self.instrumental
    }

    /// Title used when no lyrics (and therefore no written title) exist.
    pub fn fallback_title(&self) -> String {
        let theme = self.theme.trim();
        let mut chars = theme.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lyrics {
    /// Empty when the reply carried no title line.
    pub title: String,
    pub body: String,
}

impl Lyrics {
    /// Splits model output into a title (first line, markdown markers removed) and the body.
    ///
    /// A first line that is a section heading, or a reply with nothing after its first line,
    /// is kept in the body and leaves the title empty.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        let (first, rest) = trimmed.split_once('\n').unwrap_or((trimmed, ""));
        let rest = rest.trim();

        if rest.is_empty() || SectionKind::from_heading(first).is_some() {
            return Self {
                title: String::new(),
                body: trimmed.to_string(),
            };
        }

        let title = first
            .replace('#', "")
            .replace("**", "")
            .trim()
            .trim_start_matches("Title:")
            .trim()
            .to_string();

        Self {
            title,
            body: rest.to_string(),
        }
    }

    pub fn sections(&self) -> LyricSections {
        let mut sections = LyricSections::default();
        for line in self.body.lines() {
            match SectionKind::from_heading(line) {
                Some(SectionKind::Verse) => sections.verses += 1,
                Some(SectionKind::Chorus) => sections.choruses += 1,
                None => {}
            }
        }
        sections
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LyricSections {
    pub verses: usize,
    pub choruses: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Verse,
    Chorus,
}

impl SectionKind {
    // Headings look like "[Verse 1]", "Verse 2:", "**Chorus**" or "## Chorus".
    fn from_heading(line: &str) -> Option<Self> {
        let cleaned = line
            .trim()
            .trim_matches(|c: char| matches!(c, '[' | ']' | '(' | ')' | '*' | '#' | ':'))
            .trim()
            .to_lowercase();

        let mut words = cleaned.split_whitespace();
        let kind = match words.next()? {
            "verse" => SectionKind::Verse,
            "chorus" => SectionKind::Chorus,
            _ => return None,
        };

        match words.next() {
            None => Some(kind),
            Some(word) if word.trim_end_matches(':').chars().all(|c| c.is_ascii_digit()) => {
                if words.next().is_none() {
                    Some(kind)
                } else {
                    None
                }
            }
            Some(_) => None,
        }
    }
}

/// Identifier of a remote generation task. Never rewritten once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// One rendered variant of a finished task.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Track {
    pub id: String,
    pub title: Option<String>,
    pub audio_url: Option<String>,
    pub stream_audio_url: Option<String>,
    pub image_url: Option<String>,
}

/// Local mirror of a remote task, rebuilt from every status response.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub task_id: TaskId,
    pub status: JobStatus,
    /// Raw status string as reported by the service.
    pub remote_status: String,
    pub result_url: Option<String>,
    pub message: Option<String>,
    pub tracks: Vec<Track>,
}

impl Job {
    pub fn submitted(task_id: TaskId) -> Self {
        Self {
            task_id,
            status: JobStatus::Pending,
            remote_status: "PENDING".to_string(),
            result_url: None,
            message: None,
            tracks: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_title_and_body() {
        let lyrics = Lyrics::parse("# Whispering Pines\n\n[Verse 1]\nMoss on the stones\n");
        assert_eq!(lyrics.title, "Whispering Pines");
        assert_eq!(lyrics.body, "[Verse 1]\nMoss on the stones");
    }

    #[test]
    fn heading_on_first_line_is_not_a_title() {
        let lyrics = Lyrics::parse("[Verse 1]\nMist\n[Chorus]\nLight\n[Verse 2]\nOwls");
        assert_eq!(lyrics.title, "");
        assert!(lyrics.body.starts_with("[Verse 1]\nMist"));
        assert_eq!(
            lyrics.sections(),
            LyricSections {
                verses: 2,
                choruses: 1
            }
        );
    }

    #[test]
    fn single_line_reply_stays_in_body() {
        let lyrics = Lyrics::parse("  la la la under the pines  \n");
        assert_eq!(lyrics.title, "");
        assert_eq!(lyrics.body, "la la la under the pines");
    }

    #[test]
    fn counts_sections() {
        let lyrics = Lyrics::parse(
            "Title: Lanterns\n\nVerse 1:\na\n\n**Chorus**\nb\n\n[Verse 2]\nc\n\nthe chorus fades\n",
        );
        assert_eq!(lyrics.title, "Lanterns");
        assert_eq!(
            lyrics.sections(),
            LyricSections {
                verses: 2,
                choruses: 1
            }
        );
    }

    #[test]
    fn task_id_rejects_blank() {
        assert!(TaskId::new("  ").is_none());
        assert_eq!(TaskId::new(" abc-123\n").unwrap().as_str(), "abc-123");
    }

    #[test]
    fn fallback_title_capitalizes_theme() {
        let request = GenerationRequest {
            theme: "rainy harbor".to_string(),
            style: "lofi".to_string(),
            verse_count: 2,
            include_chorus: false,
            instrumental: true,
            model_version: ModelVersion::V4,
            custom_mode: true,
        };
        assert_eq!(request.fallback_title(), "Rainy harbor");
        assert!(!request.needs_lyrics());
    }

    #[test]
    fn model_version_serializes_as_api_name() {
        assert_eq!(serde_json::to_string(&ModelVersion::V3_5).unwrap(), "\"V3_5\"");
    }
}
