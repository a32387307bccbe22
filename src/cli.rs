use std::{path::PathBuf, time::Duration};

use clap::{ArgAction, Parser};

use crate::{
    models::{GenerationRequest, ModelVersion, TaskId},
    poller::{DEFAULT_CHECKS, DEFAULT_INTERVAL_SECONDS, PollSettings},
};

/// Generate a song with Claude-written lyrics and the Suno music API.
#[derive(Parser, Debug)]
#[command(name = "songsmith", version, about)]
pub struct Cli {
    /// What the song is about
    #[arg(long, required_unless_present_any = ["check_task", "credits"])]
    pub theme: Option<String>,

    /// Musical style sent to Suno and used in the lyrics prompt
    #[arg(long, default_value = "pop")]
    pub style: String,

    /// Number of verses to ask for
    #[arg(long, default_value_t = 2)]
    pub verses: u32,

    /// Ask for a repeating chorus
    #[arg(long)]
    pub chorus: bool,

    /// Custom mode sends written lyrics, style and title; `false` sends the theme only
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub custom: bool,

    /// Generate music without vocals
    #[arg(long)]
    pub instrumental: bool,

    /// Suno model version
    #[arg(long, value_enum, default_value_t = ModelVersion::V3_5)]
    pub model: ModelVersion,

    /// Where the finished audio is written
    #[arg(long, default_value = "output.mp3")]
    pub output: PathBuf,

    /// Verbose logging, including raw API responses
    #[arg(long)]
    pub debug: bool,

    /// Check an existing task instead of starting a new one; without an id, the last submitted task is used
    #[arg(long, value_name = "TASK_ID", num_args = 0..=1, default_missing_value = "")]
    pub check_task: Option<String>,

    /// Seconds between status checks
    #[arg(long, default_value_t = DEFAULT_INTERVAL_SECONDS, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    /// Maximum number of status checks before giving up
    #[arg(long, default_value_t = DEFAULT_CHECKS, value_parser = clap::value_parser!(u32).range(1..))]
    pub checks: u32,

    /// Do not generate cover art even when an image key is configured
    #[arg(long)]
    pub skip_images: bool,

    /// Print the remaining Suno credits and exit
    #[arg(long)]
    pub credits: bool,
}

/// What a single invocation should do.
#[derive(Debug, PartialEq)]
pub enum Command {
    Credits,
    /// `None` resumes the id stored in the resume marker.
    CheckTask(Option<TaskId>),
    Generate(GenerationRequest),
}

impl Cli {
    pub fn command(&self) -> Command {
        if self.credits {
            return Command::Credits;
        }
        if let Some(raw) = &self.check_task {
            return Command::CheckTask(TaskId::new(raw.as_str()));
        }

        Command::Generate(GenerationRequest {
            theme: self.theme.clone().unwrap_or_default().trim().to_string(),
            style: self.style.trim().to_string(),
            verse_count: self.verses,
            include_chorus: self.chorus,
            instrumental: self.instrumental,
            model_version: self.model,
            custom_mode: self.custom,
        })
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(self.interval),
            checks: self.checks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("songsmith").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_for_new_song() {
        let cli = parse(&["--theme", "mystical forest"]).unwrap();
        let Command::Generate(request) = cli.command() else {
            panic!("expected a generation command");
        };

        assert_eq!(request.theme, "mystical forest");
        assert_eq!(request.style, "pop");
        assert_eq!(request.verse_count, 2);
        assert!(!request.include_chorus);
        assert!(request.custom_mode);
        assert!(!request.instrumental);
        assert_eq!(request.model_version, ModelVersion::V3_5);
        assert_eq!(cli.output, PathBuf::from("output.mp3"));

        let poll = cli.poll_settings();
        assert_eq!(poll.interval, Duration::from_secs(10));
        assert_eq!(poll.checks, 30);
    }

    #[test]
    fn theme_required_for_generation() {
        assert!(parse(&["--style", "jazz"]).is_err());
    }

    #[test]
    fn check_task_with_and_without_id() {
        let cli = parse(&["--check-task", "abc-123"]).unwrap();
        assert_eq!(cli.command(), Command::CheckTask(TaskId::new("abc-123")));

        let cli = parse(&["--check-task"]).unwrap();
        assert_eq!(cli.command(), Command::CheckTask(None));
    }

    #[test]
    fn custom_mode_can_be_disabled() {
        let cli = parse(&["--theme", "rain", "--custom", "false", "--model", "V4"]).unwrap();
        let Command::Generate(request) = cli.command() else {
            panic!("expected a generation command");
        };
        assert!(!request.custom_mode);
        assert_eq!(request.model_version, ModelVersion::V4);
    }

    #[test]
    fn zero_checks_rejected() {
        assert!(parse(&["--theme", "rain", "--checks", "0"]).is_err());
        assert!(parse(&["--theme", "rain", "--interval", "0"]).is_err());
    }
}
