use std::{path::PathBuf, time::Duration};

use fedpeg_common::rpc::RpcServer;
use fedpeg_types::network::Network;
use serde::Deserialize;

use crate::federation::FederationAddresses;

/// Whole seconds, as written in config files
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Seconds(u32);

impl Seconds {
    pub const fn new(value: u32) -> Self {
        Seconds(value)
    }

    pub fn duration(self) -> Duration {
        Duration::from_secs(self.0.into())
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub network: Network,
    pub work_dir: PathBuf,

    pub sidechain_rpc: RpcServer,
    pub parent_rpc: RpcServer,

    /// First sidechain block to index on an empty database
    #[serde(default)]
    pub sidechain_start_height: u32,
    /// Defaults to the network preset
    pub federation_change_addresses: Option<Vec<String>>,

    #[serde(default = "default_ledger_interval")]
    pub ledger_interval: Seconds,
    #[serde(default = "default_audit_interval")]
    pub audit_interval: Seconds,
    #[serde(default = "default_db_busy_timeout")]
    pub db_busy_timeout: Seconds,
}

fn default_ledger_interval() -> Seconds {
    Seconds::new(10)
}

fn default_audit_interval() -> Seconds {
    Seconds::new(30)
}

fn default_db_busy_timeout() -> Seconds {
    Seconds::new(60)
}

impl Settings {
    /// Reads the config file, `APP_` environment variables take precedence
    pub fn load(path: &str) -> Result<Settings, config::ConfigError> {
        let mut conf = config::Config::new();
        conf.merge(config::File::with_name(path))?;
        conf.merge(config::Environment::with_prefix("app").separator("_"))?;
        conf.try_into()
    }

    /// Change addresses checked against the parent network
    pub fn change_addresses(&self) -> Result<FederationAddresses, anyhow::Error> {
        let network = self.network.d();
        match &self.federation_change_addresses {
            Some(addresses) => FederationAddresses::parse(
                addresses.iter().map(String::as_str),
                network.bitcoin_network,
            ),
            None => FederationAddresses::parse(
                network.federation_change_addresses.iter().copied(),
                network.bitcoin_network,
            ),
        }
    }
}
