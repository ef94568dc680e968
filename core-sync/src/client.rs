//! # Submission Client
//!
//! Remote API boundary for off-site task reports.
//!
//! Every upload resolves to `Result<UploadReceipt, UploadError>`, where
//! [`UploadError`] is a closed union. Callers classify with a total `match`:
//!
//! | Response                        | Result                        |
//! |---------------------------------|-------------------------------|
//! | 2xx, `success = true`           | `Ok(UploadReceipt)`           |
//! | 2xx, `success = false`          | `ServerTerminal`              |
//! | 400                             | `ServerTerminal`              |
//! | 401                             | `ServerTransient` + `Unauthorized` event |
//! | any other status                | `ServerTransient`             |
//! | no response                     | `Network`                     |

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, MultipartForm};
use bytes::Bytes;
use core_runtime::config::ApiConfig;
use core_runtime::events::{CoreEvent, EventBus, SessionEvent};
use core_runtime::logging::strip_path;
use core_media::PreparedImage;
use core_reports::ReportFields;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Multipart part name of the photo.
pub const IMAGE_PART_NAME: &str = "image";

const MAX_ERROR_BODY_CHARS: usize = 200;

/// Photo bytes attached to an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl ImagePayload {
    pub fn jpeg(file_name: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: "image/jpeg".to_string(),
            bytes,
        }
    }

    pub fn from_prepared(image: &PreparedImage) -> Self {
        Self::jpeg(image.file_name(), image.bytes.clone())
    }

    /// Read a queued photo back from disk.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::jpeg(
            strip_path(&path.to_string_lossy()).to_string(),
            Bytes::from(bytes),
        ))
    }
}

/// Server acknowledgement of a delivered report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReceipt {
    pub message: Option<String>,
    pub file_url: Option<String>,
}

/// Why an upload did not deliver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// No response reached us.
    #[error("Network error: {0}")]
    Network(String),

    /// The server refused the report; resubmitting cannot succeed.
    #[error("Rejected by server ({code}): {message}")]
    ServerTerminal { code: u16, message: String },

    /// The server failed in a way that may clear up later.
    #[error("Server error ({code}): {message}")]
    ServerTransient { code: u16, message: String },
}

impl UploadError {
    pub fn is_retryable(&self) -> bool {
        match self {
            UploadError::Network(_) | UploadError::ServerTransient { .. } => true,
            UploadError::ServerTerminal { .. } => false,
        }
    }

    /// User-facing reason.
    pub fn message(&self) -> &str {
        match self {
            UploadError::Network(message)
            | UploadError::ServerTerminal { message, .. }
            | UploadError::ServerTransient { message, .. } => message,
        }
    }
}

/// A report as listed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedReport {
    #[serde(default)]
    pub id: Option<i64>,
    pub destination: String,
    pub description: String,
    pub address: String,
    #[serde(default)]
    pub latitude: Option<String>,
    #[serde(default)]
    pub longitude: Option<String>,
    #[serde(default, rename = "fileUrl", alias = "file_url")]
    pub file_url: Option<String>,
    #[serde(default, rename = "createdAt", alias = "created_at")]
    pub created_at: Option<String>,
}

/// Remote boundary for report delivery.
#[async_trait]
pub trait SubmissionClient: Send + Sync {
    /// Upload one report with its photo
    async fn upload(
        &self,
        fields: &ReportFields,
        image: ImagePayload,
    ) -> std::result::Result<UploadReceipt, UploadError>;

    /// Reports the officer has already submitted
    async fn list_submitted(&self) -> std::result::Result<Vec<SubmittedReport>, UploadError>;
}

/// Supplies the current session token, if any.
pub type TokenProvider = Arc<dyn Fn() -> Option<String> + Send + Sync>;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "fileUrl", alias = "file_url")]
    file_url: Option<String>,
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Wrapped {
        #[serde(default)]
        data: Vec<SubmittedReport>,
    },
    Bare(Vec<SubmittedReport>),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// [`SubmissionClient`] over the host [`HttpClient`].
pub struct HttpSubmissionClient {
    http: Arc<dyn HttpClient>,
    api: ApiConfig,
    events: EventBus,
    token: Option<TokenProvider>,
}

impl HttpSubmissionClient {
    pub fn new(http: Arc<dyn HttpClient>, api: ApiConfig, events: EventBus) -> Self {
        Self {
            http,
            api,
            events,
            token: None,
        }
    }

    pub fn with_token_provider(mut self, token: TokenProvider) -> Self {
        self.token = Some(token);
        self
    }

    fn request(&self, method: HttpMethod, url: String) -> HttpRequest {
        let request = HttpRequest::new(method, url)
            .header("Accept", "application/json")
            .timeout(self.api.request_timeout);
        match self.token.as_ref().and_then(|token| token()) {
            Some(token) => request.bearer_token(token),
            None => request,
        }
    }

    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, UploadError> {
        self.http.execute(request).await.map_err(|e| {
            debug!(error = %e, "Request did not reach the server");
            UploadError::Network(e.to_string())
        })
    }

    /// Maps a non-2xx response to its error class.
    fn classify_failure(&self, response: &HttpResponse) -> UploadError {
        let code = response.status;
        let message = error_message(response);

        match code {
            400 => UploadError::ServerTerminal { code, message },
            401 => {
                warn!("Server rejected the session token");
                self.events
                    .emit(CoreEvent::Session(SessionEvent::Unauthorized { status: code }))
                    .ok();
                UploadError::ServerTransient { code, message }
            }
            _ => UploadError::ServerTransient { code, message },
        }
    }
}

fn error_message(response: &HttpResponse) -> String {
    if let Ok(ErrorBody {
        message: Some(message),
    }) = response.json::<ErrorBody>()
    {
        return message;
    }

    match response.text() {
        Ok(text) if !text.trim().is_empty() => text.trim().chars().take(MAX_ERROR_BODY_CHARS).collect(),
        _ => format!("HTTP {}", response.status),
    }
}

#[async_trait]
impl SubmissionClient for HttpSubmissionClient {
    async fn upload(
        &self,
        fields: &ReportFields,
        image: ImagePayload,
    ) -> std::result::Result<UploadReceipt, UploadError> {
        let form = MultipartForm::new()
            .text("destination", &fields.destination)
            .text("description", &fields.description)
            .text("address", &fields.address)
            .text("latitude", &fields.latitude)
            .text("longitude", &fields.longitude)
            .file(IMAGE_PART_NAME, image.file_name, image.mime_type, image.bytes);

        let request = self
            .request(HttpMethod::Post, self.api.upload_url())
            .multipart(form);
        let response = self.send(request).await?;

        if !response.is_success() {
            let error = self.classify_failure(&response);
            info!(status = response.status, retryable = error.is_retryable(), "Upload failed");
            return Err(error);
        }

        match response.json::<UploadResponse>() {
            Ok(UploadResponse {
                success: true,
                message,
                file_url,
            }) => Ok(UploadReceipt { message, file_url }),
            Ok(UploadResponse {
                success: false,
                message,
                ..
            }) => Err(UploadError::ServerTerminal {
                code: response.status,
                message: message.unwrap_or_else(|| "Report rejected".to_string()),
            }),
            Err(e) => {
                warn!(status = response.status, error = %e, "Unreadable upload response; treating as delivered");
                Ok(UploadReceipt::default())
            }
        }
    }

    async fn list_submitted(&self) -> std::result::Result<Vec<SubmittedReport>, UploadError> {
        let request = self.request(HttpMethod::Get, self.api.list_url());
        let response = self.send(request).await?;

        if !response.is_success() {
            return Err(self.classify_failure(&response));
        }

        match response.json::<ListResponse>() {
            Ok(ListResponse::Wrapped { data }) | Ok(ListResponse::Bare(data)) => Ok(data),
            Err(e) => Err(UploadError::ServerTransient {
                code: response.status,
                message: format!("Malformed report list: {}", e),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct ScriptedHttp {
        response: BridgeResult<HttpResponse>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedHttp {
        fn status(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(HttpResponse {
                    status,
                    headers: HashMap::new(),
                    body: Bytes::from(body.to_string()),
                }),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn offline() -> Arc<Self> {
            Arc::new(Self {
                response: Err(BridgeError::Network("connection refused".to_string())),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl HttpClient for ScriptedHttp {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            self.seen.lock().unwrap().push(request);
            match &self.response {
                Ok(response) => Ok(response.clone()),
                Err(e) => Err(BridgeError::Network(e.to_string())),
            }
        }
    }

    fn fields() -> ReportFields {
        ReportFields::new(
            "Rapat Koordinasi",
            "Diskusi anggaran",
            "Kantor Bupati",
            "-6.48",
            "106.85",
        )
    }

    fn client(http: Arc<ScriptedHttp>, events: EventBus) -> HttpSubmissionClient {
        HttpSubmissionClient::new(http, ApiConfig::new("https://api.example.go.id"), events)
    }

    fn payload() -> ImagePayload {
        ImagePayload::jpeg("tugas_1.jpg", Bytes::from_static(b"jpeg"))
    }

    #[tokio::test]
    async fn test_success_returns_receipt_and_sends_form() {
        let http = ScriptedHttp::status(200, r#"{"success":true,"message":"ok","fileUrl":"https://cdn/x.jpg"}"#);
        let client = client(http.clone(), EventBus::default())
            .with_token_provider(Arc::new(|| Some("abc".to_string())));

        let receipt = client.upload(&fields(), payload()).await.unwrap();
        assert_eq!(receipt.file_url.as_deref(), Some("https://cdn/x.jpg"));

        let seen = http.seen.lock().unwrap();
        let request = &seen[0];
        assert_eq!(request.url, "https://api.example.go.id/api/tugas-luar");
        assert_eq!(
            request.headers.get("Authorization").map(String::as_str),
            Some("Bearer abc")
        );
        let form = request.multipart.as_ref().unwrap();
        assert_eq!(form.field("destination"), Some("Rapat Koordinasi"));
        assert_eq!(form.field("longitude"), Some("106.85"));
        assert_eq!(form.files[0].name, IMAGE_PART_NAME);
        assert_eq!(form.files[0].mime_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_success_false_is_terminal() {
        let http = ScriptedHttp::status(200, r#"{"success":false,"message":"Data sudah ada"}"#);
        let err = client(http, EventBus::default())
            .upload(&fields(), payload())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            UploadError::ServerTerminal {
                code: 200,
                message: "Data sudah ada".to_string()
            }
        );
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_bad_request_is_terminal() {
        let http = ScriptedHttp::status(400, r#"{"message":"alamat wajib diisi"}"#);
        let err = client(http, EventBus::default())
            .upload(&fields(), payload())
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::ServerTerminal { code: 400, ref message } if message == "alamat wajib diisi"));
    }

    #[tokio::test]
    async fn test_server_errors_are_transient() {
        for status in [404, 409, 422, 500, 502, 503] {
            let http = ScriptedHttp::status(status, "Bad Gateway");
            let err = client(http, EventBus::default())
                .upload(&fields(), payload())
                .await
                .unwrap_err();

            assert!(matches!(err, UploadError::ServerTransient { code, .. } if code == status));
            assert!(err.is_retryable());
        }
    }

    #[tokio::test]
    async fn test_transport_failure_is_network() {
        let err = client(ScriptedHttp::offline(), EventBus::default())
            .upload(&fields(), payload())
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Network(_)));
    }

    #[tokio::test]
    async fn test_unauthorized_emits_session_event() {
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let http = ScriptedHttp::status(401, "");

        let err = client(http, events.clone())
            .upload(&fields(), payload())
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::ServerTransient { code: 401, ref message } if message == "HTTP 401"));
        assert_eq!(
            rx.try_recv().unwrap(),
            CoreEvent::Session(SessionEvent::Unauthorized { status: 401 })
        );
    }

    #[tokio::test]
    async fn test_list_submitted_accepts_wrapped_and_bare() {
        let wrapped = ScriptedHttp::status(
            200,
            r#"{"success":true,"data":[{"id":1,"destination":"A","description":"B","address":"C","fileUrl":"u"}]}"#,
        );
        let reports = client(wrapped, EventBus::default()).list_submitted().await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].file_url.as_deref(), Some("u"));

        let bare = ScriptedHttp::status(200, r#"[{"destination":"A","description":"B","address":"C"}]"#);
        let reports = client(bare, EventBus::default()).list_submitted().await.unwrap();
        assert_eq!(reports[0].id, None);
    }
}
