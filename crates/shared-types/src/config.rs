//! Protocol configuration.
//!
//! All parameters are static per deployment and none are secrets. Defaults
//! mirror the reference network; deployments override what they need.

use primitive_types::U256;

/// Static protocol parameters shared by custodian, watchers and clients.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Length of the challenge window, in seconds.
    pub challenge_period_secs: u64,
    /// Minimum (and selected) quorum size for a snapshot.
    pub min_quorum: usize,
    /// Stake a node must lock to register.
    pub stake_amount: U256,
    /// Cooldown between unregistering and stake withdrawal, in seconds.
    pub cooldown_period_secs: u64,
    /// Where the network manifest is published.
    pub manifest_url: String,
    /// Expected checksum of the manifest document.
    pub manifest_checksum: [u8; 32],
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            challenge_period_secs: 600,
            min_quorum: 3,
            stake_amount: U256::from(250_000u64),
            cooldown_period_secs: 86_400,
            manifest_url: "https://vaultnet.example/manifest.yaml".to_string(),
            manifest_checksum: [0u8; 32],
        }
    }
}
