use std::sync::Arc;
use std::time::Duration;

use aws_config::SdkConfig;
use aws_credential_types::{provider::SharedCredentialsProvider, Credentials};
use aws_sdk_sns::{Client as SnsClient, Region};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::identity::{EligibilityProvider, VoterRegistry};
use crate::notify::{Notifier, NullNotifier, SnsNotifier};
use crate::store::{LedgerStore, MemoryStore, MongoStore};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // secrets
    receipt_secret: String,
}

impl Config {
    /// Secret key from which ballot receipts are derived.
    pub fn receipt_secret(&self) -> &str {
        &self.receipt_secret
    }

    #[cfg(test)]
    pub fn for_testing() -> Self {
        Self {
            receipt_secret: "test-receipt-secret".to_string(),
        }
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the ledger store.
#[derive(Deserialize)]
struct DbConfig {
    /// MongoDB connection URI, or the literal `memory` for the in-memory
    /// store used in local development.
    db_uri: String,
    /// Bound on store I/O, in seconds. Callers treat a timeout as a
    /// retryable failure, never as success.
    db_timeout: u64,
}

/// A fairing that connects the ledger store, performs any setup necessary,
/// and places it (plus an eligibility provider backed by the same place) into
/// managed state as trait objects.
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Ledger Store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        if config.db_uri == "memory" {
            warn!("Using the in-memory store; all data is lost on shutdown");
            let store = Arc::new(MemoryStore::new());
            rocket = rocket
                .manage(store.clone() as Arc<dyn LedgerStore>)
                .manage(store as Arc<dyn EligibilityProvider>);
            return Ok(rocket);
        }

        info!("Loaded database config, connecting...");
        let timeout = Duration::from_secs(config.db_timeout);
        let store = match MongoStore::connect(&config.db_uri, timeout).await {
            Ok(store) => store,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let registry = VoterRegistry::new(store.database());
        info!("...database connection online!");

        rocket = rocket
            .manage(Arc::new(store) as Arc<dyn LedgerStore>)
            .manage(Arc::new(registry) as Arc<dyn EligibilityProvider>);
        Ok(rocket)
    }
}

/// Configuration for the AWS connection. Optional: without it, announcements
/// are dropped instead of broadcast.
#[derive(Deserialize)]
struct AwsConfig {
    // non-secrets
    aws_region: String,
    aws_access_key_id: String,
    sns_topic_arn: String,
    // secrets
    aws_secret_access_key: String,
}

/// A fairing that loads the AWS config and places a `Notifier` into managed
/// state, falling back to the null notifier when AWS is not configured.
pub struct NotifierFairing;

#[rocket::async_trait]
impl Fairing for NotifierFairing {
    fn info(&self) -> Info {
        Info {
            name: "Announcements",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<AwsConfig>() {
            Ok(config) => config,
            Err(_) => {
                warn!("AWS config missing or incomplete; announcements will not be sent");
                rocket = rocket.manage(Arc::new(NullNotifier) as Arc<dyn Notifier>);
                return Ok(rocket);
            }
        };

        let aws_config = SdkConfig::builder()
            .region(Region::new(config.aws_region))
            .credentials_provider(SharedCredentialsProvider::new(Credentials::new(
                config.aws_access_key_id,
                config.aws_secret_access_key,
                None,
                None,
                "rocket config",
            )))
            .build();
        let client = SnsClient::new(&aws_config);
        let notifier = SnsNotifier::new(client, config.sns_topic_arn);
        info!("Loaded Amazon SNS config");

        rocket = rocket.manage(Arc::new(notifier) as Arc<dyn Notifier>);
        Ok(rocket)
    }
}
