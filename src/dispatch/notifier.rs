// src/dispatch/notifier.rs
//
// Notification collaborator: announces lot arrivals, departures, and (in
// continuous mode) per-frame presence status to a remote REST API.

use crate::error::CollaboratorError;
use crate::types::{Point, TransitionKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NotificationKind {
    Enter,
    Exit,
    Status,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enter => "ENTER",
            Self::Exit => "EXIT",
            Self::Status => "STATUS",
        }
    }

    /// Value of the `status` field expected by the lot API.
    pub fn api_status(&self) -> &'static str {
        match self {
            Self::Enter => "entered",
            Self::Exit => "exited",
            Self::Status => "em_patio",
        }
    }
}

impl From<TransitionKind> for NotificationKind {
    fn from(kind: TransitionKind) -> Self {
        match kind {
            TransitionKind::Enter => Self::Enter,
            TransitionKind::Exit => Self::Exit,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Stable across in-frame retries so the receiver can deduplicate
    pub event_id: Uuid,
    pub kind: NotificationKind,
    pub track_id: String,
    pub label: Option<String>,
    pub center: Option<Point>,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, notification: &Notification) -> Result<(), CollaboratorError>;
}

// ============================================================================
// HTTP
// ============================================================================

/// Body of `POST {base_url}/detections`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DetectionPayload<'a> {
    event_id: String,
    #[serde(rename = "motoId")]
    track_id: &'a str,
    #[serde(rename = "modelo")]
    label: Option<&'a str>,
    center_x: Option<f32>,
    center_y: Option<f32>,
    timestamp: String,
    status: &'static str,
}

impl<'a> DetectionPayload<'a> {
    fn from_notification(n: &'a Notification) -> Self {
        Self {
            event_id: n.event_id.to_string(),
            track_id: &n.track_id,
            label: n.label.as_deref(),
            center_x: n.center.map(|c| c.x),
            center_y: n.center.map(|c| c.y),
            timestamp: n.timestamp.to_rfc3339(),
            status: n.kind.api_status(),
        }
    }
}

pub struct HttpNotifier {
    http_client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpNotifier {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            endpoint: format!("{}/detections", base_url.trim_end_matches('/')),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    fn name(&self) -> &str {
        "http"
    }

    async fn notify(&self, notification: &Notification) -> Result<(), CollaboratorError> {
        let payload = DetectionPayload::from_notification(notification);
        debug!(
            "🌐 {} {} for {} → {}",
            notification.kind.as_str(),
            payload.event_id,
            payload.track_id,
            self.endpoint
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CollaboratorError::Timeout(self.timeout)
                } else {
                    e.into()
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::Status(status.as_u16()));
        }
        if status != reqwest::StatusCode::CREATED {
            debug!("🌐 Lot API answered {} instead of 201", status);
        }
        Ok(())
    }
}

// ============================================================================
// LOGGING
// ============================================================================

/// Used when no remote endpoint is configured: notifications only go to the log.
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, notification: &Notification) -> Result<(), CollaboratorError> {
        match notification.kind {
            NotificationKind::Status => debug!(
                "📍 {} present{}",
                notification.track_id,
                notification
                    .label
                    .as_deref()
                    .map(|l| format!(" [{}]", l))
                    .unwrap_or_default()
            ),
            kind => info!(
                "📣 {} {}{}",
                kind.as_str(),
                notification.track_id,
                notification
                    .label
                    .as_deref()
                    .map(|l| format!(" [{}]", l))
                    .unwrap_or_default()
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notification(kind: NotificationKind) -> Notification {
        Notification {
            event_id: Uuid::new_v4(),
            kind,
            track_id: "moto_7".to_string(),
            label: Some("4412".to_string()),
            center: Some(Point::new(120.0, 240.0)),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_payload_uses_lot_api_field_names() {
        let n = notification(NotificationKind::Status);
        let value = serde_json::to_value(DetectionPayload::from_notification(&n)).unwrap();

        assert_eq!(value["eventId"], n.event_id.to_string());
        assert_eq!(value["motoId"], "moto_7");
        assert_eq!(value["modelo"], "4412");
        assert_eq!(value["centerX"], 120.0);
        assert_eq!(value["centerY"], 240.0);
        assert_eq!(value["status"], "em_patio");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_payload_for_unlabelled_exit() {
        let mut n = notification(NotificationKind::Exit);
        n.label = None;
        let value = serde_json::to_value(DetectionPayload::from_notification(&n)).unwrap();
        assert!(value["modelo"].is_null());
        assert_eq!(value["status"], "exited");
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let notifier = HttpNotifier::new("http://lot.local/api/v1/", Duration::from_secs(1)).unwrap();
        assert_eq!(notifier.endpoint(), "http://lot.local/api/v1/detections");
    }

    #[tokio::test]
    async fn test_http_notifier_posts_detection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/detections"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let notifier =
            HttpNotifier::new(&format!("{}/api", server.uri()), Duration::from_secs(2)).unwrap();
        notifier
            .notify(&notification(NotificationKind::Enter))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_http_notifier_reports_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/detections"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let notifier = HttpNotifier::new(&server.uri(), Duration::from_secs(2)).unwrap();
        let err = notifier
            .notify(&notification(NotificationKind::Exit))
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Status(500)));
    }

    #[tokio::test]
    async fn test_http_client_timeout_is_classified_as_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/detections"))
            .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_millis(800)))
            .mount(&server)
            .await;

        let notifier = HttpNotifier::new(&server.uri(), Duration::from_millis(50)).unwrap();
        let err = notifier
            .notify(&notification(NotificationKind::Enter))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(matches!(err, CollaboratorError::Timeout(d) if d == Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn test_http_notifier_unreachable_is_transport_error() {
        let notifier = HttpNotifier::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let err = notifier
            .notify(&notification(NotificationKind::Enter))
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Transport(_)));
    }
}
