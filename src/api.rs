//! HTTP client for the cover-generation backend.
//!
//! The controller only sees the [`GenerationApi`] trait; [`ApiClient`] is the
//! reqwest implementation used by the binary.

use std::future::Future;
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::format::format_file_size;
use crate::settings::GenerationSettings;
use crate::task::StatusReport;
use crate::validator::AudioFile;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// The three remote operations the generation lifecycle needs.
pub trait GenerationApi: Send + Sync + 'static {
    /// Upload the file with its prompt and settings; the service answers with a task id.
    fn start_generation(
        &self,
        file: &AudioFile,
        prompt: &str,
        settings: &GenerationSettings,
    ) -> impl Future<Output = Result<StartedTask, ApiError>> + Send;

    fn poll_status(&self, task_id: &str) -> impl Future<Output = Result<StatusReport, ApiError>> + Send;

    fn fetch_details(&self, task_id: &str) -> impl Future<Output = Result<RawDetails, ApiError>> + Send;
}

/// Upload response. The id may be missing even on a 2xx.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StartedTask {
    #[serde(rename = "taskId", default)]
    pub task_id: Option<String>,
}

/// Details payload, left as raw JSON for [`crate::tracks::extract_tracks`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetails(pub Value);

#[derive(Deserialize)]
struct StatusBody {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(rename = "errorMessage", default)]
    error_message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

impl From<StatusBody> for StatusReport {
    fn from(body: StatusBody) -> Self {
        let code = body
            .status
            .or_else(|| {
                body.data
                    .as_ref()
                    .and_then(|d| d.get("status"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_default();
        StatusReport::new(code, body.error_message.or(body.msg))
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET /health`. Ok on any 2xx.
    pub async fn health_check(&self) -> Result<(), ApiError> {
        let url = self.endpoint(&["health"])?;
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        check_status(resp).await?;
        Ok(())
    }

    /// Base URL with `segments` appended as escaped path segments.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let resp = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let resp = check_status(resp).await?;
        Ok(resp.json::<T>().await?)
    }
}

impl GenerationApi for ApiClient {
    async fn start_generation(
        &self,
        file: &AudioFile,
        prompt: &str,
        settings: &GenerationSettings,
    ) -> Result<StartedTask, ApiError> {
        let url = self.endpoint(&["api", "upload-cover"])?;
        let bytes = file.read_bytes().await.map_err(|e| ApiError::Io(e.to_string()))?;

        let mime = upload_mime(&file.mime_type);
        let part = Part::bytes(bytes)
            .file_name(file.name.clone())
            .mime_str(mime)
            .map_err(|e| ApiError::Io(format!("invalid MIME type {mime}: {e}")))?;

        let mut form = Form::new().part("file", part).text("prompt", prompt.to_string());
        for (name, value) in settings.form_fields() {
            form = form.text(name, value);
        }

        log::info!(
            "Uploading {} ({}) to {url}",
            file.name,
            format_file_size(file.size)
        );

        let resp = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let resp = check_status(resp).await?;
        Ok(resp.json::<StartedTask>().await?)
    }

    async fn poll_status(&self, task_id: &str) -> Result<StatusReport, ApiError> {
        let url = self.endpoint(&["api", "generation-status", task_id])?;
        let body: StatusBody = self.get_json(url).await?;
        Ok(body.into())
    }

    async fn fetch_details(&self, task_id: &str) -> Result<RawDetails, ApiError> {
        let url = self.endpoint(&["api", "generation-details", task_id])?;
        Ok(RawDetails(self.get_json(url).await?))
    }
}

fn upload_mime(mime_type: &str) -> &str {
    let mime = mime_type.trim();
    if mime.contains('/') && !mime.contains(char::is_whitespace) {
        mime
    } else {
        "application/octet-stream"
    }
}

/// Pass 2xx responses through; turn anything else into `ApiError::Http`.
async fn check_status(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = server_message(&body)
        .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
    log::debug!("Request failed with {status}: {body}");
    Err(ApiError::Http {
        status: status.as_u16(),
        message,
    })
}

fn server_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["msg", "detail", "errorMessage"]
        .iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Status;
    use serde_json::json;

    #[test]
    fn endpoint_keeps_base_path_and_escapes_ids() {
        let client = ApiClient::new("https://host.example/proxy/").unwrap();
        let url = client.endpoint(&["api", "generation-status", "a b/c"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://host.example/proxy/api/generation-status/a%20b%2Fc"
        );
    }

    #[test]
    fn rejects_unusable_base_url() {
        assert!(matches!(ApiClient::new("not a url"), Err(ApiError::InvalidUrl(_))));
        assert!(matches!(ApiClient::new("mailto:me@example.com"), Err(ApiError::InvalidUrl(_))));
    }

    #[test]
    fn status_falls_back_to_nested_data() {
        let body: StatusBody = serde_json::from_value(json!({
            "data": { "status": "SUCCESS" },
            "errorMessage": null
        }))
        .unwrap();
        let report = StatusReport::from(body);
        assert_eq!(report.code, "SUCCESS");
        assert_eq!(report.status, Status::Succeeded);
    }

    #[test]
    fn status_error_message_falls_back_to_msg() {
        let body: StatusBody = serde_json::from_value(json!({
            "status": "FAILED",
            "data": null,
            "msg": "credits exhausted"
        }))
        .unwrap();
        let report = StatusReport::from(body);
        assert_eq!(report.error_message.as_deref(), Some("credits exhausted"));
    }

    #[test]
    fn server_message_priority() {
        assert_eq!(server_message(r#"{"msg":"bad","detail":"worse"}"#).as_deref(), Some("bad"));
        assert_eq!(
            server_message(r#"{"detail":"Suno API error: quota"}"#).as_deref(),
            Some("Suno API error: quota")
        );
        assert_eq!(server_message(r#"{"detail":[{"loc":["body"]}]}"#), None);
        assert_eq!(server_message("<html>502</html>"), None);
    }

    #[test]
    fn mime_fallback() {
        assert_eq!(upload_mime("audio/mpeg"), "audio/mpeg");
        assert_eq!(upload_mime(""), "application/octet-stream");
        assert_eq!(upload_mime("not a mime"), "application/octet-stream");
    }
}
