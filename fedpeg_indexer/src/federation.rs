use std::{collections::BTreeSet, str::FromStr};

use bitcoin::address::NetworkUnchecked;

/// Parent-chain addresses that receive federation change outputs.
/// Fixed at startup, an address rotation not listed here goes unnoticed by the audit.
#[derive(Debug, Clone, Default)]
pub struct FederationAddresses {
    addresses: BTreeSet<String>,
}

impl FederationAddresses {
    /// Validates every address against `network`
    pub fn parse<'a>(
        addresses: impl IntoIterator<Item = &'a str>,
        network: bitcoin::Network,
    ) -> Result<Self, anyhow::Error> {
        let addresses = addresses
            .into_iter()
            .map(|address| {
                let address = bitcoin::Address::<NetworkUnchecked>::from_str(address)
                    .map_err(|err| anyhow::anyhow!("invalid address {address}: {err}"))?
                    .require_network(network)
                    .map_err(|err| anyhow::anyhow!("wrong network for {address}: {err}"))?;
                Ok(address.to_string())
            })
            .collect::<Result<BTreeSet<_>, anyhow::Error>>()?;
        Ok(FederationAddresses { addresses })
    }

    pub fn contains(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}
