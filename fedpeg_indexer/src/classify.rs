use fedpeg_common::rpc::get_block::{SidechainVin, SidechainVout};

/// What a sidechain input or output means for the peg
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PegClass {
    PegIn {
        parent_txid: bitcoin::Txid,
        parent_vout: u32,
    },
    /// Output carrying `pegout_chain` metadata
    ExplicitPegOut {
        amount: bitcoin::Amount,
        destination: String,
    },
    /// L-BTC burnt in an OP_RETURN output without peg-out metadata
    InferredPegOut {
        amount: bitcoin::Amount,
        destination: String,
    },
    Ordinary,
}

pub fn classify_input(vin: &SidechainVin) -> PegClass {
    match (vin.is_pegin, vin.txid) {
        (true, Some(parent_txid)) => PegClass::PegIn {
            parent_txid,
            parent_vout: vin.vout.unwrap_or_default(),
        },
        _ => PegClass::Ordinary,
    }
}

/// Peg-outs always have explicit values, blinded outputs are never peg-outs
pub fn classify_output(vout: &SidechainVout, policy_asset: &elements::AssetId) -> PegClass {
    let script = &vout.script_pub_key;
    let Some(amount) = vout.value else {
        return PegClass::Ordinary;
    };
    let destination = script.pegout_destination().unwrap_or_default().to_owned();

    if script.pegout_chain.is_some() {
        PegClass::ExplicitPegOut {
            amount,
            destination,
        }
    } else if script.is_null_data()
        && amount > bitcoin::Amount::ZERO
        && vout.asset.as_ref() == Some(policy_asset)
    {
        PegClass::InferredPegOut {
            amount,
            destination,
        }
    } else {
        PegClass::Ordinary
    }
}
