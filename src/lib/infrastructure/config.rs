//! Mail API configuration

use std::{collections::BTreeSet, sync::Arc};

use clap::{builder::BoolishValueParser, ArgAction, Parser, ValueEnum};
use reqwest::Url;
use thiserror::Error;

use crate::domain::{
    delivery::{DeliveryClient, DeliveryTransport, QueueService, QueueTarget, DEFAULT_QUEUE},
    mail::{
        DevForceConfig, DevRecipientPolicy, EmailAddress, EmailAddressError, PayloadBuilder,
        PayloadStrategy,
    },
};

use super::http::DirectHttpTransport;

/// Configuration errors, reported at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No API key was configured
    #[error("MAILAPI_KEY must be set")]
    MissingApiKey,

    /// The endpoint is not an absolute http(s) URL
    #[error("invalid endpoint \"{0}\"")]
    InvalidEndpoint(String),

    /// A dev-force address is malformed
    #[error("invalid {field} address: {source}")]
    InvalidDevAddress {
        /// Which setting held the address
        field: &'static str,
        /// The validation failure
        source: EmailAddressError,
    },
}

/// How messages reach the provider
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum TransportMode {
    /// Build, then deliver from a queued job
    #[default]
    Queued,

    /// Post synchronously from the caller
    Direct,
}

/// Mail API configuration
#[derive(Clone, Debug, PartialEq, Eq, Parser)]
pub struct MailApiConfig {
    /// The provider API key
    #[arg(long, env = "MAILAPI_KEY", hide_env_values = true)]
    pub api_key: String,

    /// The provider endpoint URL
    #[arg(long, env = "MAILAPI_ENDPOINT")]
    pub endpoint: String,

    /// Queue connection for delivery jobs
    #[arg(long, env = "MAILAPI_CONNECTION")]
    pub connection: Option<String>,

    /// The application's default queue connection
    #[arg(long, env = "QUEUE_CONNECTION")]
    pub default_connection: Option<String>,

    /// Queue name for delivery jobs
    #[arg(long, env = "MAILAPI_QUEUE", default_value = DEFAULT_QUEUE)]
    pub queue: String,

    /// How messages are delivered
    #[arg(long, env = "MAILAPI_MODE", value_enum, default_value_t = TransportMode::Queued)]
    pub mode: TransportMode,

    /// The current environment
    #[arg(long, env = "APP_ENV", default_value = "production")]
    pub environment: String,

    /// Environments where dev-force applies
    #[arg(
        long,
        env = "MAILAPI_DEV_ENVIRONMENTS",
        value_delimiter = ',',
        default_value = "dev,local"
    )]
    pub dev_environments: Vec<String>,

    /// Redirect all recipients in dev environments
    #[arg(
        long,
        env = "MAILAPI_DEV_FORCE_ENABLED",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        default_value_t = false
    )]
    pub dev_force_enabled: bool,

    /// Forced `to` address
    #[arg(long, env = "MAILAPI_DEV_FORCE_TO")]
    pub dev_force_to: Option<String>,

    /// Forced `cc` address
    #[arg(long, env = "MAILAPI_DEV_FORCE_CC")]
    pub dev_force_cc: Option<String>,

    /// Forced `bcc` address
    #[arg(long, env = "MAILAPI_DEV_FORCE_BCC")]
    pub dev_force_bcc: Option<String>,
}

impl MailApiConfig {
    /// Check the settings that would otherwise only fail at send time
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        match Url::parse(&self.endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => return Err(ConfigError::InvalidEndpoint(self.endpoint.clone())),
        }

        self.dev_force()?;

        Ok(())
    }

    /// Connection and queue for delivery jobs.
    ///
    /// Falls back to the default connection when none is set for mail.
    pub fn target(&self) -> QueueTarget {
        let queue = match self.queue.trim() {
            "" => DEFAULT_QUEUE,
            queue => queue,
        };

        QueueTarget {
            connection: non_empty(&self.connection)
                .or_else(|| non_empty(&self.default_connection))
                .map(str::to_string),
            queue: queue.to_string(),
        }
    }

    /// Dev-force settings with validated addresses
    pub fn dev_force(&self) -> Result<DevForceConfig, ConfigError> {
        Ok(DevForceConfig {
            enabled: self.dev_force_enabled,
            environments: self
                .dev_environments
                .iter()
                .map(|env| env.trim().to_string())
                .filter(|env| !env.is_empty())
                .collect::<BTreeSet<_>>(),
            to: dev_address("dev_force_to", &self.dev_force_to)?,
            cc: dev_address("dev_force_cc", &self.dev_force_cc)?,
            bcc: dev_address("dev_force_bcc", &self.dev_force_bcc)?,
        })
    }

    /// The payload strategy implied by the mode and dev-force switch
    pub fn strategy(&self) -> PayloadStrategy {
        match (self.mode, self.dev_force_enabled) {
            (TransportMode::Direct, _) => PayloadStrategy::DirectHttp,
            (TransportMode::Queued, true) => PayloadStrategy::DevAware,
            (TransportMode::Queued, false) => PayloadStrategy::Queued,
        }
    }

    /// A payload builder for the configured strategy
    pub fn payload_builder(&self) -> Result<PayloadBuilder, ConfigError> {
        let policy = DevRecipientPolicy::new(self.dev_force()?, self.environment.trim());

        Ok(PayloadBuilder::new(self.api_key.trim(), self.strategy()).with_dev_policy(policy))
    }

    /// A queued transport submitting to `queue`
    pub fn delivery_transport<Q>(&self, queue: Arc<Q>) -> Result<DeliveryTransport<Q>, ConfigError>
    where
        Q: QueueService,
    {
        self.validate()?;

        Ok(DeliveryTransport::new(
            self.payload_builder()?,
            &self.endpoint,
            self.target(),
            queue,
        ))
    }

    /// A synchronous transport posting through `client`
    pub fn direct_transport<C>(&self, client: Arc<C>) -> Result<DirectHttpTransport<C>, ConfigError>
    where
        C: DeliveryClient,
    {
        self.validate()?;

        Ok(DirectHttpTransport::new(
            PayloadBuilder::new(self.api_key.trim(), PayloadStrategy::DirectHttp),
            &self.endpoint,
            client,
        ))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn dev_address(
    field: &'static str,
    value: &Option<String>,
) -> Result<Option<EmailAddress>, ConfigError> {
    non_empty(value)
        .map(EmailAddress::new)
        .transpose()
        .map_err(|source| ConfigError::InvalidDevAddress { field, source })
}
