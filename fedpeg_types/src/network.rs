/// Parses a hex asset id at compile time, panics on invalid input.
/// Asset ids are displayed byte-reversed, like txids.
pub const fn asset_id(hex: &str) -> elements::AssetId {
    let data = hex_literal::decode::<32>(&[hex.as_bytes()]);
    let mut reversed = [0u8; 32];
    let mut i = 0;
    while i < 32 {
        reversed[i] = data[31 - i];
        i += 1;
    }
    elements::AssetId::from_inner(bitcoin::hashes::sha256::Midstate(reversed))
}

#[derive(Debug, Eq, PartialEq, Copy, Clone, serde::Serialize, serde::Deserialize)]
pub enum Network {
    Liquid,
    LiquidTestnet,
    Regtest,
}

impl Network {
    pub fn to_bitcoin_network(self) -> bitcoin::Network {
        self.d().bitcoin_network
    }
}

pub struct NetworkData {
    pub name: &'static str,
    pub bitcoin_network: bitcoin::Network,
    /// Native sidechain asset (L-BTC)
    pub policy_asset: elements::AssetId,
    /// Parent-chain addresses the federation sends change to.
    /// Hand-curated, a federation key rotation needs a new entry here.
    pub federation_change_addresses: &'static [&'static str],
}

pub const NETWORK_LIQUID: NetworkData = NetworkData {
    name: "Liquid",
    bitcoin_network: bitcoin::Network::Bitcoin,
    policy_asset: asset_id(
        "6f0279e9ed041c3d710a9f57d0c02928416460c4b722ae3457a11eec381c526d",
    ),
    federation_change_addresses: &[
        "bc1qxvay4an52gcghxq5lavact7r6qe9l4laedsazz8fj2ee2cy47tlqff4aj4",
        "3EiAcrzq1cELXScc98KeCswGWZaPGceT1d",
    ],
};

pub const NETWORK_LIQUID_TESTNET: NetworkData = NetworkData {
    name: "LiquidTestnet",
    bitcoin_network: bitcoin::Network::Testnet,
    policy_asset: asset_id(
        "144c654344aa716d6f3abcc1ca90e5641e4e2a7f633bc09fe3baf64585819a49",
    ),
    federation_change_addresses: &[],
};

pub const NETWORK_LIQUID_REGTEST: NetworkData = NetworkData {
    name: "LiquidRegtest",
    bitcoin_network: bitcoin::Network::Regtest,
    policy_asset: asset_id(
        "2184a905372defaf7b0f506c01a54f734f7c0d0d60bbd1c2d90896a9438c1b76",
    ),
    federation_change_addresses: &[],
};

impl Network {
    pub fn d(&self) -> &'static NetworkData {
        match *self {
            Network::Liquid => &NETWORK_LIQUID,
            Network::LiquidTestnet => &NETWORK_LIQUID_TESTNET,
            Network::Regtest => &NETWORK_LIQUID_REGTEST,
        }
    }
}
