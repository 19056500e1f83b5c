use std::fmt;
use std::str::FromStr;

use relaycall_contracts::IceServer;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::error::NegotiationError;
use crate::signaling::Signaling;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceTransportPolicy {
    /// Only TURN-relayed candidates.
    #[default]
    Relay,
    All,
}

impl fmt::Display for IceTransportPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IceTransportPolicy::Relay => f.write_str("relay"),
            IceTransportPolicy::All => f.write_str("all"),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown ice transport policy {0:?}, expected `relay` or `all`")]
pub struct ParsePolicyError(String);

impl FromStr for IceTransportPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relay" => Ok(IceTransportPolicy::Relay),
            "all" => Ok(IceTransportPolicy::All),
            _ => Err(ParsePolicyError(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundlePolicy {
    #[default]
    MaxBundle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RtcpMuxPolicy {
    #[default]
    Require,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SdpSemantics {
    #[default]
    UnifiedPlan,
}

/// Configuration a peer connection is built with. Resolved anew for every
/// negotiation attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IceConfiguration {
    pub ice_servers: Vec<IceServer>,
    pub ice_transport_policy: IceTransportPolicy,
    pub bundle_policy: BundlePolicy,
    pub rtcp_mux_policy: RtcpMuxPolicy,
    pub sdp_semantics: SdpSemantics,
}

impl IceConfiguration {
    pub fn relay(ice_servers: Vec<IceServer>) -> Self {
        Self::with_policy(ice_servers, IceTransportPolicy::Relay)
    }

    /// Direct candidates only, no relay servers.
    pub fn open() -> Self {
        Self::with_policy(Vec::new(), IceTransportPolicy::All)
    }

    fn with_policy(ice_servers: Vec<IceServer>, ice_transport_policy: IceTransportPolicy) -> Self {
        Self {
            ice_servers,
            ice_transport_policy,
            bundle_policy: BundlePolicy::default(),
            rtcp_mux_policy: RtcpMuxPolicy::default(),
            sdp_semantics: SdpSemantics::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IceConfigResolver {
    policy: IceTransportPolicy,
}

impl IceConfigResolver {
    /// Relay servers are only used when `policy` is [`IceTransportPolicy::Relay`].
    pub fn new(policy: IceTransportPolicy) -> Self {
        Self { policy }
    }

    /// Fetches TURN credentials and builds the configuration for one
    /// negotiation attempt. Fails only when the `turn` call itself fails.
    pub async fn resolve(&self, signaling: &Signaling) -> Result<IceConfiguration, NegotiationError> {
        let servers = signaling
            .turn()
            .await
            .map_err(NegotiationError::ConfigResolutionFailed)?;

        let configuration = if self.policy == IceTransportPolicy::Relay && !servers.is_empty() {
            IceConfiguration::relay(servers)
        } else {
            IceConfiguration::open()
        };

        info!(
            policy = %configuration.ice_transport_policy,
            servers = configuration.ice_servers.len(),
            "resolved ice configuration"
        );
        Ok(configuration)
    }
}
