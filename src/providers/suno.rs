use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    config::SunoConfig,
    errors::{Result, SongError},
    models::{GenerationRequest, Job, JobStatus, Lyrics, ModelVersion, TaskId, Track},
    poller::TaskSource,
};

/// Client for the Suno generation API (apibox compatible).
///
/// Every endpoint answers with an envelope `{ "code": 200, "msg": "...", "data": ... }`;
/// the envelope code is checked separately from the HTTP status.
#[derive(Clone)]
pub struct SunoClient {
    http_client: HttpClient,
    api_key: String,
    base_url: String,
    callback_url: String,
}

impl SunoClient {
    pub fn from_config(config: &SunoConfig) -> Result<Self> {
        let http_client = HttpClient::builder()
            .user_agent("songsmith/0.1")
            .timeout(config.timeout)
            .build()
            .map_err(|err| SongError::other(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            http_client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            callback_url: config.callback_url.clone(),
        })
    }

    pub async fn submit(&self, request: &GenerationRequest, lyrics: Option<&Lyrics>) -> Result<Job> {
        let payload = GeneratePayload::build(request, lyrics, &self.callback_url);
        let endpoint = format!("{}/generate", self.base_url);

        info!(
            target: "suno",
            model = %payload.model,
            custom_mode = payload.custom_mode,
            instrumental = payload.instrumental,
            "submitting generation request"
        );
        debug!(
            target: "suno",
            %endpoint,
            payload = %serde_json::to_string_pretty(&payload)?,
            "generation payload"
        );

        let response = self
            .http_client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| SongError::upstream(format!("could not reach Suno API: {err}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| SongError::upstream(format!("failed to read Suno response: {err}")))?;

        if !status.is_success() {
            return Err(SongError::upstream(format!(
                "Suno generate returned HTTP {status}{}",
                describe_error_body(&body)
            )));
        }

        let envelope: Envelope<GenerateData> = parse_envelope(&body)?;
        let data = envelope.into_data("generate")?;
        let task_id = data
            .task_id
            .and_then(TaskId::new)
            .ok_or_else(|| SongError::upstream("Suno response did not contain a task id"))?;

        info!(target: "suno", %task_id, "generation task created");
        Ok(Job::submitted(task_id))
    }

    pub async fn record_info(&self, task_id: &TaskId) -> Result<Job> {
        let endpoint = format!("{}/generate/record-info", self.base_url);

        let response = self
            .http_client
            .get(&endpoint)
            .query(&[("taskId", task_id.as_str())])
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|err| SongError::StatusUnavailable(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| SongError::StatusUnavailable(err.to_string()))?;

        if !status.is_success() {
            return Err(SongError::StatusUnavailable(format!(
                "HTTP {status}{}",
                describe_error_body(&body)
            )));
        }

        let envelope: Envelope<RecordInfo> = parse_envelope(&body)?;
        if envelope.code == 404 {
            // Freshly created tasks can briefly be unknown to the record endpoint.
            debug!(target: "suno", %task_id, "task not visible yet");
            return Ok(Job::submitted(task_id.clone()));
        }

        let record = envelope.into_data("record-info")?;
        Ok(record.into_job(task_id))
    }

    pub async fn remaining_credits(&self) -> Result<i64> {
        let endpoint = format!("{}/generate/credit", self.base_url);

        let response = self
            .http_client
            .get(&endpoint)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|err| SongError::upstream(format!("could not reach Suno API: {err}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| SongError::upstream(format!("failed to read Suno response: {err}")))?;

        if !status.is_success() {
            return Err(SongError::upstream(format!(
                "Suno credit query returned HTTP {status}{}",
                describe_error_body(&body)
            )));
        }

        let envelope: Envelope<i64> = parse_envelope(&body)?;
        envelope.into_data("credit")
    }
}

impl TaskSource for SunoClient {
    async fn fetch_task(&self, task_id: &TaskId) -> Result<Job> {
        self.record_info(task_id).await
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeneratePayload<'a> {
    pub prompt: &'a str,
    pub style: &'a str,
    pub title: String,
    pub custom_mode: bool,
    pub instrumental: bool,
    pub model: ModelVersion,
    pub call_back_url: &'a str,
}

impl<'a> GeneratePayload<'a> {
    pub fn build(
        request: &'a GenerationRequest,
        lyrics: Option<&'a Lyrics>,
        callback_url: &'a str,
    ) -> Self {
        let lyrics = lyrics.filter(|_| request.needs_lyrics());

        if !request.custom_mode {
            return Self {
                prompt: &request.theme,
                style: "",
                title: String::new(),
                custom_mode: false,
                instrumental: request.instrumental,
                model: request.model_version,
                call_back_url: callback_url,
            };
        }

        let lyrics = lyrics.filter(|lyrics| !lyrics.body.trim().is_empty());
        let prompt = lyrics.map_or(request.theme.as_str(), |lyrics| lyrics.body.as_str());
        let title = lyrics
            .map(|lyrics| lyrics.title.trim())
            .filter(|title| !title.is_empty())
            .map_or_else(|| request.fallback_title(), str::to_string);

        Self {
            prompt,
            style: &request.style,
            title,
            custom_mode: true,
            instrumental: request.instrumental,
            model: request.model_version,
            call_back_url: callback_url,
        }
    }
}

#[derive(Deserialize, Debug)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn into_data(self, endpoint: &str) -> Result<T> {
        if self.code != 200 {
            let message = self.msg.unwrap_or_else(|| "no message".to_string());
            let hint = api_hint(self.code)
                .map(|hint| format!(" ({hint})"))
                .unwrap_or_default();
            return Err(SongError::upstream(format!(
                "Suno {endpoint} error {}: {message}{hint}",
                self.code
            )));
        }

        self.data
            .ok_or_else(|| SongError::upstream(format!("Suno {endpoint} response has no data")))
    }
}

fn parse_envelope<T: DeserializeOwned>(body: &str) -> Result<Envelope<T>> {
    let value: Value = serde_json::from_str(body)
        .map_err(|err| SongError::upstream(format!("Suno returned invalid JSON: {err}")))?;
    debug!(
        target: "suno",
        response = %serde_json::to_string_pretty(&value).unwrap_or_default(),
        "Suno API response"
    );
    serde_json::from_value(value)
        .map_err(|err| SongError::upstream(format!("unexpected Suno response shape: {err}")))
}

fn describe_error_body(body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<Envelope<Value>>(body) {
        let message = envelope.msg.unwrap_or_default();
        let hint = api_hint(envelope.code)
            .map(|hint| format!(" ({hint})"))
            .unwrap_or_default();
        return format!(": {} {message}{hint}", envelope.code);
    }

    let snippet: String = body.chars().take(200).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}

fn api_hint(code: i64) -> Option<&'static str> {
    match code {
        401 => Some("authentication failed, check SUNO_API_KEY"),
        413 => Some("theme or lyrics too long"),
        429 => Some("insufficient credits"),
        455 => Some("service under maintenance, try again later"),
        _ => None,
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateData {
    #[serde(default)]
    task_id: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RecordInfo {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    response: Option<RecordResponse>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct RecordResponse {
    #[serde(default)]
    suno_data: Option<Vec<SunoTrack>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SunoTrack {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    audio_url: Option<String>,
    #[serde(default)]
    stream_audio_url: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
}

impl From<SunoTrack> for Track {
    fn from(track: SunoTrack) -> Self {
        Track {
            id: track.id.unwrap_or_default(),
            title: track.title,
            audio_url: non_empty(track.audio_url),
            stream_audio_url: non_empty(track.stream_audio_url),
            image_url: non_empty(track.image_url),
        }
    }
}

impl RecordInfo {
    fn into_job(self, task_id: &TaskId) -> Job {
        let remote_status = self.status.unwrap_or_default();
        let tracks: Vec<Track> = self
            .response
            .unwrap_or_default()
            .suno_data
            .unwrap_or_default()
            .into_iter()
            .map(Track::from)
            .collect();
        let result_url = select_result_url(&tracks);

        let mut status = map_status(&remote_status);
        if status == JobStatus::Succeeded && result_url.is_none() {
            warn!(
                target: "suno",
                %task_id,
                remote_status = %remote_status,
                "task reports success but no audio URL yet"
            );
            status = JobStatus::Running;
        }

        Job {
            task_id: task_id.clone(),
            status,
            result_url,
            message: self.error_message.filter(|msg| !msg.is_empty()),
            remote_status,
            tracks,
        }
    }
}

/// First track with a final audio URL wins; stream URLs are only a fallback.
fn select_result_url(tracks: &[Track]) -> Option<String> {
    tracks
        .iter()
        .find_map(|track| track.audio_url.clone())
        .or_else(|| tracks.iter().find_map(|track| track.stream_audio_url.clone()))
}

fn map_status(remote: &str) -> JobStatus {
    match remote {
        "PENDING" => JobStatus::Pending,
        "TEXT_SUCCESS" => JobStatus::Running,
        "FIRST_SUCCESS" | "SUCCESS" => JobStatus::Succeeded,
        "CREATE_TASK_FAILED" | "GENERATE_AUDIO_FAILED" | "CALLBACK_EXCEPTION"
        | "SENSITIVE_WORD_ERROR" => JobStatus::Failed,
        other => {
            warn!(target: "suno", status = other, "unknown task status, treating as running");
            JobStatus::Running
        }
    }
}

pub fn status_description(remote: &str) -> &'static str {
    match remote {
        "PENDING" => "Pending execution",
        "TEXT_SUCCESS" => "Text generation successful",
        "FIRST_SUCCESS" => "First song generation successful",
        "SUCCESS" => "Generation successful",
        "CREATE_TASK_FAILED" => "Task creation failed",
        "GENERATE_AUDIO_FAILED" => "Song generation failed",
        "CALLBACK_EXCEPTION" => "Callback exception",
        "SENSITIVE_WORD_ERROR" => "Sensitive word error",
        _ => "Unknown status",
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
