//! Outbound webhook notifications.
//!
//! A [`WebhookEvent`] is built from a committed ticket or follow-up snapshot
//! and POSTed as JSON to every endpoint the registry resolves for its kind.
//! Deliveries run concurrently, each bounded by its own timeout. Failures are
//! logged and reported per endpoint and never reach the caller that created
//! the entity.

use crate::{
    config::Config,
    error::{AppError, Result},
    models::{
        document::{FollowUpDocument, TicketDocument},
        followup::FollowUpDetail,
        ticket::TicketDetail,
        webhook::{DeliveryAttempt, DeliveryOutcome, DispatchReport, EventKind, WebhookEvent},
    },
    services::endpoint_registry::EndpointRegistry,
};
use futures::future::join_all;
use hmac::{Hmac, Mac};
use reqwest::{header::CONTENT_TYPE, Client};
use serde_json::json;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

pub const EVENT_HEADER: &str = "X-Helpdesk-Event";
pub const DELIVERY_HEADER: &str = "X-Helpdesk-Delivery";
pub const SIGNATURE_HEADER: &str = "X-Helpdesk-Signature";

/// `{"ticket": ...}`
pub fn new_ticket_event(ticket: &TicketDetail) -> WebhookEvent {
    WebhookEvent::new(
        EventKind::NewTicket,
        json!({ "ticket": TicketDocument::from(ticket) }),
    )
}

/// `{"followup": ..., "ticket": ...}`; the ticket embeds its full follow-up
/// list, the new follow-up included.
pub fn followup_event(followup: &FollowUpDetail, ticket: &TicketDetail) -> WebhookEvent {
    WebhookEvent::new(
        EventKind::FollowUp,
        json!({
            "followup": FollowUpDocument::from(followup),
            "ticket": TicketDocument::from(ticket),
        }),
    )
}

/// `sha256=<hex>` HMAC of the request body.
pub fn sign_payload(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

#[derive(Clone)]
pub struct WebhookDispatcher {
    http_client: Client,
    registry: Arc<dyn EndpointRegistry>,
    timeout: Duration,
    signing_secret: Option<String>,
}

impl WebhookDispatcher {
    pub fn new(registry: Arc<dyn EndpointRegistry>, config: &Config) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent(concat!("helpdesk-webhooks/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            registry,
            timeout: config.webhook_timeout(),
            signing_secret: config.webhook_secret.clone(),
        })
    }

    pub async fn notify_new_ticket(&self, ticket: &TicketDetail) -> DispatchReport {
        self.dispatch(&new_ticket_event(ticket)).await
    }

    pub async fn notify_followup(&self, followup: &FollowUpDetail, ticket: &TicketDetail) -> DispatchReport {
        self.dispatch(&followup_event(followup, ticket)).await
    }

    /// 投递事件到该类型的全部地址；返回时所有投递都已完成或超时
    pub async fn dispatch(&self, event: &WebhookEvent) -> DispatchReport {
        let endpoints = self.registry.resolve(event.kind);

        if endpoints.is_empty() {
            debug!("No webhook endpoints configured for {}", event.kind);
            return DispatchReport {
                event_id: event.id,
                kind: event.kind,
                attempts: Vec::new(),
            };
        }

        let attempts = match serde_json::to_vec(&event.payload) {
            Ok(body) => {
                let signature = self
                    .signing_secret
                    .as_deref()
                    .and_then(|secret| sign_payload(secret, &body));

                let deliveries = endpoints
                    .into_iter()
                    .map(|endpoint| self.deliver(endpoint, event, body.clone(), signature.clone()));

                join_all(deliveries).await
            }
            Err(e) => endpoints
                .into_iter()
                .map(|endpoint| DeliveryAttempt {
                    endpoint: endpoint.to_string(),
                    outcome: DeliveryOutcome::Failed {
                        error: format!("Failed to encode payload: {}", e),
                    },
                    elapsed_ms: 0,
                })
                .collect(),
        };

        let report = DispatchReport {
            event_id: event.id,
            kind: event.kind,
            attempts,
        };

        info!(
            "Dispatched {} event {}: {} delivered, {} failed",
            event.kind,
            event.id,
            report.delivered(),
            report.failed()
        );

        report
    }

    async fn deliver(
        &self,
        endpoint: Url,
        event: &WebhookEvent,
        body: Vec<u8>,
        signature: Option<String>,
    ) -> DeliveryAttempt {
        let started = Instant::now();

        let mut request = self
            .http_client
            .post(endpoint.clone())
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "application/json")
            .header(EVENT_HEADER, event.kind.as_str())
            .header(DELIVERY_HEADER, event.id.to_string())
            .body(body);

        if let Some(signature) = signature {
            request = request.header(SIGNATURE_HEADER, signature);
        }

        let outcome = match request.send().await {
            Ok(response) if response.status().is_success() => {
                debug!("Webhook delivered to {} ({})", endpoint, response.status());
                DeliveryOutcome::Delivered {
                    status: response.status().as_u16(),
                }
            }
            Ok(response) => {
                warn!(
                    "Webhook endpoint {} rejected {} event {}: HTTP {}",
                    endpoint,
                    event.kind,
                    event.id,
                    response.status()
                );
                DeliveryOutcome::Rejected {
                    status: response.status().as_u16(),
                }
            }
            Err(e) => {
                let error = if e.is_timeout() {
                    format!("timed out after {}ms", self.timeout.as_millis())
                } else {
                    e.to_string()
                };
                warn!(
                    "Webhook delivery of {} event {} to {} failed: {}",
                    event.kind, event.id, endpoint, error
                );
                DeliveryOutcome::Failed { error }
            }
        };

        DeliveryAttempt {
            endpoint: endpoint.to_string(),
            outcome,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::endpoint_registry::MockEndpointRegistry;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dispatcher(registry: MockEndpointRegistry, secret: Option<&str>) -> WebhookDispatcher {
        let config = Config {
            webhook_timeout_secs: 1,
            webhook_secret: secret.map(str::to_string),
            ..Config::default()
        };
        WebhookDispatcher::new(Arc::new(registry), &config).unwrap()
    }

    fn registry_for(kind: EventKind, urls: Vec<String>) -> MockEndpointRegistry {
        let mut registry = MockEndpointRegistry::new();
        registry
            .expect_resolve()
            .withf(move |k| *k == kind)
            .times(1)
            .returning(move |_| urls.iter().map(|u| Url::parse(u).unwrap()).collect());
        registry
    }

    #[tokio::test]
    async fn test_no_endpoints_means_no_requests() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let dispatcher = dispatcher(registry_for(EventKind::NewTicket, vec![]), None);
        let report = dispatcher
            .dispatch(&WebhookEvent::new(EventKind::NewTicket, json!({"ticket": {"id": 1}})))
            .await;

        assert!(report.attempts.is_empty());
    }

    #[tokio::test]
    async fn test_every_endpoint_gets_identical_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header(EVENT_HEADER, "followup"))
            .and(header_exists(DELIVERY_HEADER))
            .respond_with(ResponseTemplate::new(200))
            .expect(3)
            .mount(&server)
            .await;

        let urls = vec![
            format!("{}/a", server.uri()),
            format!("{}/b", server.uri()),
            format!("{}/c", server.uri()),
        ];
        let dispatcher = dispatcher(registry_for(EventKind::FollowUp, urls), None);
        let event = WebhookEvent::new(EventKind::FollowUp, json!({"ticket": {"id": 9}}));

        let report = dispatcher.dispatch(&event).await;
        assert_eq!(report.delivered(), 3);
        assert_eq!(report.event_id, event.id);

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 3);
        for request in &received {
            let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
            assert_eq!(body, event.payload);
        }
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let urls = vec![
            "http://127.0.0.1:9/unreachable".to_string(),
            format!("{}/broken", server.uri()),
            format!("{}/slow", server.uri()),
            format!("{}/ok", server.uri()),
        ];
        let dispatcher = dispatcher(registry_for(EventKind::NewTicket, urls), None);

        let started = Instant::now();
        let report = dispatcher
            .dispatch(&WebhookEvent::new(EventKind::NewTicket, json!({"ticket": {"id": 1}})))
            .await;

        // deliveries run concurrently, so the slow endpoint bounds the total
        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(report.attempts.len(), 4);
        assert!(matches!(report.attempts[0].outcome, DeliveryOutcome::Failed { .. }));
        assert_eq!(report.attempts[1].outcome, DeliveryOutcome::Rejected { status: 500 });
        assert!(matches!(report.attempts[2].outcome, DeliveryOutcome::Failed { .. }));
        assert_eq!(report.attempts[3].outcome, DeliveryOutcome::Delivered { status: 204 });
        assert_eq!(report.delivered(), 1);
        assert_eq!(report.failed(), 3);
    }

    #[tokio::test]
    async fn test_signature_header() {
        let event = WebhookEvent::new(EventKind::NewTicket, json!({"ticket": {"id": 1}}));
        let body = serde_json::to_vec(&event.payload).unwrap();
        let expected = sign_payload("s3cret", &body).unwrap();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header(SIGNATURE_HEADER, expected.as_str()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dispatcher = dispatcher(
            registry_for(EventKind::NewTicket, vec![format!("{}/hook", server.uri())]),
            Some("s3cret"),
        );
        let report = dispatcher.dispatch(&event).await;
        assert_eq!(report.delivered(), 1);
    }

    #[test]
    fn test_sign_payload_format() {
        let signature = sign_payload("key", b"{}").unwrap();
        assert!(signature.starts_with("sha256="));
        assert_eq!(signature.len(), "sha256=".len() + 64);
    }
}
