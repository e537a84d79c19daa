//! Recipient redirection for development environments

use std::collections::BTreeSet;

use tracing::debug;

use super::{EmailAddress, Recipients};

/// Environments where forced recipients apply unless configured otherwise
pub const DEFAULT_DEV_ENVIRONMENTS: [&str; 2] = ["dev", "local"];

/// Dev-force settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DevForceConfig {
    /// Global switch
    pub enabled: bool,

    /// Environment names considered development
    pub environments: BTreeSet<String>,

    /// Forced `to` address; redirection only happens when this is set
    pub to: Option<EmailAddress>,

    /// Forced `cc` address
    pub cc: Option<EmailAddress>,

    /// Forced `bcc` address
    pub bcc: Option<EmailAddress>,
}

impl Default for DevForceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            environments: DEFAULT_DEV_ENVIRONMENTS
                .iter()
                .map(|env| env.to_string())
                .collect(),
            to: None,
            cc: None,
            bcc: None,
        }
    }
}

/// Result of applying the policy to a message's recipients
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedRecipients {
    /// Recipients the payload is delivered to
    pub recipients: Recipients,

    /// Whether the real recipients were replaced
    pub redirected: bool,

    /// First real recipient list, kept for the subject prefix
    pub redirect_target: Option<String>,
}

impl ResolvedRecipients {
    /// `DEV (<target>) ` when redirected
    pub fn subject_prefix(&self) -> Option<String> {
        if !self.redirected {
            return None;
        }

        Some(match &self.redirect_target {
            Some(target) => format!("DEV ({target}) "),
            None => "DEV ".to_string(),
        })
    }
}

/// Decides whether outgoing mail is redirected to fixed test addresses
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DevRecipientPolicy {
    config: DevForceConfig,
    environment: String,
}

impl DevRecipientPolicy {
    /// Create a policy for the current environment
    pub fn new(config: DevForceConfig, environment: impl Into<String>) -> Self {
        Self {
            config,
            environment: environment.into(),
        }
    }

    /// True when forcing is enabled and the environment is a dev one
    pub fn is_active(&self) -> bool {
        self.config.enabled && self.config.environments.contains(self.environment.trim())
    }

    /// Apply the policy to the real recipients
    pub fn resolve(&self, real: Recipients) -> ResolvedRecipients {
        let forced_to = match (&self.config.to, self.is_active()) {
            (Some(to), true) => to,
            _ => {
                return ResolvedRecipients {
                    recipients: real,
                    redirected: false,
                    redirect_target: None,
                }
            }
        };

        let redirect_target = real.first().map(str::to_string);

        debug!(
            environment = %self.environment,
            original = ?redirect_target,
            to = %forced_to,
            "redirecting recipients"
        );

        ResolvedRecipients {
            recipients: Recipients {
                to: Some(forced_to.to_string()),
                cc: self.config.cc.as_ref().map(ToString::to_string),
                bcc: self.config.bcc.as_ref().map(ToString::to_string),
            },
            redirected: true,
            redirect_target,
        }
    }
}
