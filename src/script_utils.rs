use bitcoin::network::constants::Network;
use bitcoin::util::address::Address;
use bitcoin::util::key::PublicKey;
use bitcoin::Script;

/// Script utilities: classify a raw scriptPubKey into a type tag plus the
/// destination addresses it pays to. Classification is template-based
/// (P2PKH / P2SH / P2PK / bare multisig / OP_RETURN); address rendering
/// uses the `bitcoin` crate's textual encoding for the configured network.
/// Bare pubkeys are rendered as their P2PKH address.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    PubKey,
    PubKeyHash,
    ScriptHash,
    Multisig,
    OpReturn,
    NonStandard,
}

#[derive(Debug, Clone)]
pub struct ScriptClass {
    pub kind: ScriptKind,
    pub destinations: Vec<String>,
}

impl ScriptClass {
    fn none(kind: ScriptKind) -> Self {
        ScriptClass {
            kind,
            destinations: Vec::new(),
        }
    }

    /// Only single-key-hash, single-key and single-script-hash outputs
    /// qualify for balance attribution.
    pub fn attributable(&self) -> bool {
        matches!(
            self.kind,
            ScriptKind::PubKey | ScriptKind::PubKeyHash | ScriptKind::ScriptHash
        )
    }
}

/// Classify a raw output script.
pub fn classify_script(script_bytes: &[u8], network: Network) -> ScriptClass {
    if script_bytes.is_empty() {
        return ScriptClass::none(ScriptKind::NonStandard);
    }

    let script = Script::from(script_bytes.to_vec());

    if script.is_op_return() {
        return ScriptClass::none(ScriptKind::OpReturn);
    }

    if script.is_p2pkh() {
        return match Address::from_script(&script, network) {
            Some(addr) => ScriptClass {
                kind: ScriptKind::PubKeyHash,
                destinations: vec![addr.to_string()],
            },
            None => ScriptClass::none(ScriptKind::NonStandard),
        };
    }

    if script.is_p2sh() {
        return match Address::from_script(&script, network) {
            Some(addr) => ScriptClass {
                kind: ScriptKind::ScriptHash,
                destinations: vec![addr.to_string()],
            },
            None => ScriptClass::none(ScriptKind::NonStandard),
        };
    }

    if let Some(pubkey) = p2pk_pubkey(script_bytes) {
        return ScriptClass {
            kind: ScriptKind::PubKey,
            destinations: vec![Address::p2pkh(&pubkey, network).to_string()],
        };
    }

    if let Some(pubkeys) = multisig_pubkeys(script_bytes) {
        return ScriptClass {
            kind: ScriptKind::Multisig,
            destinations: pubkeys
                .iter()
                .map(|pk| Address::p2pkh(pk, network).to_string())
                .collect(),
        };
    }

    ScriptClass::none(ScriptKind::NonStandard)
}

/// P2PK template: <33 or 65 byte pubkey push> OP_CHECKSIG.
fn p2pk_pubkey(b: &[u8]) -> Option<PublicKey> {
    let key_bytes = match b.len() {
        35 if b[0] == 33 && b[34] == 0xAC => &b[1..34],
        67 if b[0] == 65 && b[66] == 0xAC => &b[1..66],
        _ => return None,
    };
    PublicKey::from_slice(key_bytes).ok()
}

/// Bare multisig template: OP_m <pubkey>... OP_n OP_CHECKMULTISIG.
/// Returns the pushed pubkeys when the template holds, one destination per
/// key; the aggregation engine treats multi-destination outputs as
/// ambiguous and never attributes them.
fn multisig_pubkeys(b: &[u8]) -> Option<Vec<PublicKey>> {
    // Smallest form: OP_1 <33-byte key push> OP_1 OP_CHECKMULTISIG
    if b.len() < 37 || b[b.len() - 1] != 0xAE {
        return None;
    }
    let m = b[0];
    if !(0x51..=0x60).contains(&m) {
        return None;
    }

    let mut keys = Vec::new();
    let mut i = 1;
    while i < b.len() - 2 {
        let push = b[i] as usize;
        if push != 33 && push != 65 {
            return None;
        }
        if i + 1 + push > b.len() - 2 {
            return None;
        }
        keys.push(PublicKey::from_slice(&b[i + 1..i + 1 + push]).ok()?);
        i += 1 + push;
    }

    let n = b[b.len() - 2];
    if !(0x51..=0x60).contains(&n) || (n - 0x50) as usize != keys.len() {
        return None;
    }
    if (m - 0x50) > (n - 0x50) {
        return None;
    }
    Some(keys)
}
