//! Server endpoint configuration. Loaded once, immutable afterwards; there
//! is no global mutable configuration anywhere in the stack.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::error;

use uasc_crypto::SecurityPolicy;
use uasc_types::{DecodingOptions, MessageSecurityMode};

/// TCP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Seconds a fresh connection may take to reach an open channel.
    pub hello_timeout: u32,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4840,
            hello_timeout: 10,
        }
    }
}

/// Size and count bounds, the server's side of hello negotiation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerLimits {
    /// Concurrent connections accepted before new ones are refused.
    pub max_connections: usize,
    /// Largest chunk the server receives.
    pub receive_buffer_size: u32,
    /// Largest chunk the server sends.
    pub send_buffer_size: u32,
    /// Largest reassembled message, 0 for no limit.
    pub max_message_size: u32,
    /// Largest chunk count per message, 0 for no limit.
    pub max_chunk_count: u32,
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            max_connections: 100,
            receive_buffer_size: 65_535,
            send_buffer_size: 65_535,
            max_message_size: 2 * 1024 * 1024,
            max_chunk_count: 64,
        }
    }
}

/// One allowed security policy with its allowed modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityPolicyConfig {
    /// Policy name or URI, e.g. `Basic256Sha256`.
    pub policy: String,
    /// Allowed modes, e.g. `["Sign", "SignAndEncrypt"]`.
    pub modes: Vec<String>,
}

/// The immutable server endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Application URI advertised in reverse hello messages.
    pub application_uri: String,
    /// TCP settings.
    pub tcp_config: TcpConfig,
    /// Negotiation limits.
    pub limits: ServerLimits,
    /// The policies clients may open channels with.
    pub security_policies: Vec<SecurityPolicyConfig>,
    /// DER certificate path; required for any policy but `None`.
    pub certificate_path: Option<PathBuf>,
    /// PEM private key path.
    pub private_key_path: Option<PathBuf>,
    /// Accept any time-valid client certificate. Commissioning only.
    pub trust_unknown_certs: bool,
    /// Floor for the revised token lifetime in milliseconds.
    pub min_token_lifetime_ms: u32,
    /// Ceiling for the revised token lifetime in milliseconds.
    pub max_token_lifetime_ms: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            application_uri: "urn:uasc:server".to_string(),
            tcp_config: TcpConfig::default(),
            limits: ServerLimits::default(),
            security_policies: vec![SecurityPolicyConfig {
                policy: "None".to_string(),
                modes: vec!["None".to_string()],
            }],
            certificate_path: None,
            private_key_path: None,
            trust_unknown_certs: false,
            min_token_lifetime_ms: 10_000,
            max_token_lifetime_ms: 3_600_000,
        }
    }
}

impl ServerConfig {
    /// Load a config from a YAML file.
    pub fn load(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read config {}: {e}", path.display()))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| format!("cannot parse config {}: {e}", path.display()))
    }

    /// `true` when the endpoint allows the given policy and mode pairing.
    pub fn is_policy_allowed(&self, policy: SecurityPolicy, mode: MessageSecurityMode) -> bool {
        if mode == MessageSecurityMode::Invalid {
            return false;
        }
        self.security_policies.iter().any(|entry| {
            let allowed_policy = SecurityPolicy::from_str(&entry.policy)
                .unwrap_or(SecurityPolicy::Unknown);
            allowed_policy == policy
                && entry
                    .modes
                    .iter()
                    .any(|m| mode_from_str(m) == Some(mode))
        })
    }

    /// Clamp a client's requested token lifetime into the configured range.
    pub fn revise_lifetime(&self, requested_ms: u32) -> u32 {
        if requested_ms == 0 {
            return self.max_token_lifetime_ms;
        }
        requested_ms
            .max(self.min_token_lifetime_ms)
            .min(self.max_token_lifetime_ms)
    }

    /// The decoding limits the server starts every channel with.
    pub fn decoding_options(&self) -> DecodingOptions {
        DecodingOptions {
            max_message_size: self.limits.max_message_size as usize,
            max_chunk_count: self.limits.max_chunk_count as usize,
            ..Default::default()
        }
    }

    /// Basic sanity checks, run once at startup.
    pub fn validate(&self) -> Result<(), String> {
        if self.security_policies.is_empty() {
            return Err("no security policies configured".to_string());
        }
        for entry in &self.security_policies {
            let policy = SecurityPolicy::from_str(&entry.policy)
                .unwrap_or(SecurityPolicy::Unknown);
            if policy == SecurityPolicy::Unknown {
                error!("Unknown security policy {} in config", entry.policy);
                return Err(format!("unknown security policy {}", entry.policy));
            }
            if policy != SecurityPolicy::None && self.certificate_path.is_none() {
                return Err(format!(
                    "policy {} requires a certificate and private key",
                    entry.policy
                ));
            }
        }
        if self.min_token_lifetime_ms > self.max_token_lifetime_ms {
            return Err("min token lifetime exceeds the maximum".to_string());
        }
        Ok(())
    }
}

fn mode_from_str(s: &str) -> Option<MessageSecurityMode> {
    match s {
        "None" => Some(MessageSecurityMode::None),
        "Sign" => Some(MessageSecurityMode::Sign),
        "SignAndEncrypt" => Some(MessageSecurityMode::SignAndEncrypt),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        ServerConfig::default().validate().unwrap();
    }

    #[test]
    fn policy_allowance() {
        let mut config = ServerConfig::default();
        config.security_policies.push(SecurityPolicyConfig {
            policy: "Basic256Sha256".to_string(),
            modes: vec!["SignAndEncrypt".to_string()],
        });
        assert!(config.is_policy_allowed(SecurityPolicy::None, MessageSecurityMode::None));
        assert!(config.is_policy_allowed(
            SecurityPolicy::Basic256Sha256,
            MessageSecurityMode::SignAndEncrypt
        ));
        assert!(!config.is_policy_allowed(
            SecurityPolicy::Basic256Sha256,
            MessageSecurityMode::Sign
        ));
        assert!(!config.is_policy_allowed(
            SecurityPolicy::Basic128Rsa15,
            MessageSecurityMode::SignAndEncrypt
        ));
    }

    #[test]
    fn lifetime_clamping() {
        let config = ServerConfig::default();
        assert_eq!(config.revise_lifetime(0), 3_600_000);
        assert_eq!(config.revise_lifetime(5), 10_000);
        assert_eq!(config.revise_lifetime(600_000), 600_000);
        assert_eq!(config.revise_lifetime(u32::MAX), 3_600_000);
    }

    #[test]
    fn secured_policy_needs_certificate() {
        let mut config = ServerConfig::default();
        config.security_policies.push(SecurityPolicyConfig {
            policy: "Basic256Sha256".to_string(),
            modes: vec!["SignAndEncrypt".to_string()],
        });
        assert!(config.validate().is_err());
        config.certificate_path = Some(PathBuf::from("own_cert.der"));
        config.private_key_path = Some(PathBuf::from("own_key.pem"));
        config.validate().unwrap();
    }
}
