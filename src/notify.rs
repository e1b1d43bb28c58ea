//! Outbound announcements to election stakeholders.

use aws_sdk_sns::Client as SnsClient;

/// Sends announcements to whoever is subscribed.
///
/// Delivery is best-effort and must never fail the request that triggered
/// it; implementations log failures instead of returning them.
#[rocket::async_trait]
pub trait Notifier: Send + Sync {
    async fn broadcast(&self, subject: &str, body: &str);
}

/// Broadcasts via an SNS topic.
pub struct SnsNotifier {
    client: SnsClient,
    topic_arn: String,
}

impl SnsNotifier {
    pub fn new(client: SnsClient, topic_arn: String) -> Self {
        Self { client, topic_arn }
    }
}

#[rocket::async_trait]
impl Notifier for SnsNotifier {
    async fn broadcast(&self, subject: &str, body: &str) {
        let result = self
            .client
            .publish()
            .topic_arn(&self.topic_arn)
            .subject(subject)
            .message(body)
            .send()
            .await;
        match result {
            Ok(_) => info!("Broadcast announcement '{}'", subject),
            Err(err) => error!("Failed to broadcast announcement '{}': {}", subject, err),
        }
    }
}

/// Swallows announcements; used in tests and when SNS is not configured.
pub struct NullNotifier;

#[rocket::async_trait]
impl Notifier for NullNotifier {
    async fn broadcast(&self, subject: &str, _body: &str) {
        debug!("Announcement '{}' dropped: no notifier configured", subject);
    }
}
