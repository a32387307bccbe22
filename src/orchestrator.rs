use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use tracing::{info, warn};

use crate::{
    capabilities::{AnthropicWriter, ImageGenerator, LyricsGenerator, LyricsWriter},
    config::AppConfig,
    download::Downloader,
    errors::{Result, SongError},
    models::{GenerationRequest, Job, Lyrics, TaskId},
    poller::{JobPoller, PollSettings},
    providers::suno::SunoClient,
    resume::{FileResumeStore, ResumeStore},
    util::{Cancellation, RunFolder, RunMetadata},
};

const DEFAULT_AUDIO_NAME: &str = "output.mp3";

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output: PathBuf,
    pub skip_images: bool,
    pub poll: PollSettings,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub task_id: TaskId,
    pub audio: PathBuf,
    pub images: Vec<PathBuf>,
    pub run_folder: Option<PathBuf>,
}

/// Wires lyrics, submission, polling, download and cover art into one sequential run.
pub struct SongController<W = AnthropicWriter, R = FileResumeStore> {
    suno: SunoClient,
    lyrics: Option<LyricsGenerator<W>>,
    image: Option<ImageGenerator>,
    downloader: Downloader,
    store: R,
    artifacts_dir: PathBuf,
    cancel: Cancellation,
}

impl SongController {
    pub fn new(config: AppConfig, cancel: Cancellation) -> Result<Self> {
        let AppConfig {
            suno,
            anthropic,
            image,
            artifacts_dir,
            resume_marker,
        } = config;

        let suno = suno.ok_or(SongError::MissingConfig("SUNO_API_KEY"))?;
        let suno = SunoClient::from_config(&suno)?;
        let lyrics = anthropic
            .as_ref()
            .map(|cfg| LyricsGenerator::new(AnthropicWriter::new(cfg)));
        let image = image.as_ref().map(ImageGenerator::new).transpose()?;

        Ok(Self {
            suno,
            lyrics,
            image,
            downloader: Downloader::new()?,
            store: FileResumeStore::new(resume_marker),
            artifacts_dir,
            cancel,
        })
    }
}

impl<W: LyricsWriter, R: ResumeStore> SongController<W, R> {
    pub fn with_parts(
        suno: SunoClient,
        lyrics: Option<LyricsGenerator<W>>,
        image: Option<ImageGenerator>,
        store: R,
        artifacts_dir: PathBuf,
        cancel: Cancellation,
    ) -> Result<Self> {
        Ok(Self {
            suno,
            lyrics,
            image,
            downloader: Downloader::new()?,
            store,
            artifacts_dir,
            cancel,
        })
    }

    pub fn images_enabled(&self, options: &RunOptions) -> bool {
        self.image.is_some() && !options.skip_images
    }

    pub async fn credits(&self) -> Result<i64> {
        self.suno.remaining_credits().await
    }

    pub async fn generate(
        &self,
        request: &GenerationRequest,
        options: &RunOptions,
    ) -> Result<RunOutcome> {
        let lyrics = if request.needs_lyrics() {
            let generator = self
                .lyrics
                .as_ref()
                .ok_or(SongError::MissingConfig("ANTHROPIC_API_KEY"))?;
            let lyrics = generator.generate(request).await?;
            info!(target: "songsmith", title = %lyrics.title, "lyrics ready\n{}", lyrics.body);
            Some(lyrics)
        } else {
            info!(
                target: "songsmith",
                theme = %request.theme,
                instrumental = request.instrumental,
                custom_mode = request.custom_mode,
                "skipping lyrics, theme is sent as the description"
            );
            None
        };

        let folder = if self.images_enabled(options) {
            let folder = RunFolder::create(&self.artifacts_dir, &request.theme).await?;
            info!(target: "songsmith", folder = %folder.path().display(), "artifacts go to run folder");
            Some(folder)
        } else {
            None
        };

        let audio_dest = match &folder {
            Some(folder) => folder.join(
                options
                    .output
                    .file_name()
                    .unwrap_or(OsStr::new(DEFAULT_AUDIO_NAME)),
            ),
            None => options.output.clone(),
        };

        if self.cancel.is_cancelled() {
            return Err(SongError::Interrupted);
        }

        let submitted = self.suno.submit(request, lyrics.as_ref()).await?;
        let task_id = submitted.task_id;
        let poller = JobPoller::new(&self.suno, &self.store, options.poll, self.cancel.clone());
        poller.persist(&task_id)?;

        // Cover art runs while the song renders; its failures never stop the audio.
        let images = match (&folder, &self.image) {
            (Some(folder), Some(generator)) => {
                match generator
                    .generate_into(request, folder.path(), &self.downloader)
                    .await
                {
                    Ok(paths) => paths,
                    Err(err) => {
                        warn!(target: "songsmith", error = %err, "cover art generation failed, continuing");
                        Vec::new()
                    }
                }
            }
            _ => Vec::new(),
        };

        let job = poller.follow(task_id).await?;
        self.save_audio(&job, &audio_dest).await?;

        if let Some(folder) = &folder {
            let meta = run_metadata(request, lyrics.as_ref(), &job, &audio_dest, &images);
            let meta_path = folder.write_metadata(&meta).await?;
            info!(target: "songsmith", path = %meta_path.display(), "run metadata written");
        }

        Ok(RunOutcome {
            task_id: job.task_id,
            audio: audio_dest,
            images,
            run_folder: folder.map(|folder| folder.path().to_path_buf()),
        })
    }

    /// Resumes an explicit task or the last persisted one, then downloads its audio.
    pub async fn check_task(
        &self,
        task_id: Option<TaskId>,
        output: &Path,
        poll: PollSettings,
    ) -> Result<RunOutcome> {
        if let Some(task_id) = &task_id {
            info!(target: "songsmith", %task_id, "checking existing task");
        }

        let poller = JobPoller::new(&self.suno, &self.store, poll, self.cancel.clone());
        let job = poller.resume(task_id).await?;
        self.save_audio(&job, output).await?;

        Ok(RunOutcome {
            task_id: job.task_id,
            audio: output.to_path_buf(),
            images: Vec::new(),
            run_folder: None,
        })
    }

    async fn save_audio(&self, job: &Job, dest: &Path) -> Result<()> {
        let url = job
            .result_url
            .as_deref()
            .ok_or_else(|| SongError::upstream(format!("task {} finished without audio", job.task_id)))?;
        info!(target: "songsmith", task_id = %job.task_id, %url, "audio ready (link valid for 15 days)");
        self.downloader.download(url, dest).await?;
        Ok(())
    }
}

fn run_metadata(
    request: &GenerationRequest,
    lyrics: Option<&Lyrics>,
    job: &Job,
    audio: &Path,
    images: &[PathBuf],
) -> RunMetadata {
    let file_name = |path: &Path| {
        path.file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    };

    let track = job
        .tracks
        .iter()
        .find(|track| {
            track.audio_url.as_deref() == job.result_url.as_deref()
                || track.stream_audio_url.as_deref() == job.result_url.as_deref()
        });

    RunMetadata {
        theme: request.theme.clone(),
        style: request.style.clone(),
        model: request.model_version.to_string(),
        custom_mode: request.custom_mode,
        instrumental: request.instrumental,
        title: lyrics
            .map(|lyrics| lyrics.title.clone())
            .filter(|title| !title.is_empty())
            .or_else(|| track.and_then(|track| track.title.clone()))
            .unwrap_or_else(|| request.fallback_title()),
        lyrics: lyrics.map(|lyrics| lyrics.body.clone()),
        task_id: job.task_id.to_string(),
        track_id: track.map(|track| track.id.clone()).filter(|id| !id.is_empty()),
        track_image_url: track.and_then(|track| track.image_url.clone()),
        audio: Some(file_name(audio)),
        images: images.iter().map(|path| file_name(path)).collect(),
    }
}
