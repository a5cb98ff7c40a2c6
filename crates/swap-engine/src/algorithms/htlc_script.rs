//! # Script-Based HTLC Builder
//!
//! Redeem script, P2SH address and spend construction for UTXO ledgers.
//!
//! ```text
//! OP_IF
//!   OP_SHA256 <hashlock> OP_EQUALVERIFY <recipient_pubkey> OP_CHECKSIG
//! OP_ELSE
//!   <locktime> OP_CHECKLOCKTIMEVERIFY OP_DROP <sender_pubkey> OP_CHECKSIG
//! OP_ENDIF
//! ```
//!
//! Spends are legacy P2SH:
//! - withdrawal scriptSig: `<sig> <secret> OP_1 <script>`
//! - refund scriptSig: `<sig> OP_0 <script>`, with `nLockTime = locktime`

use crate::domain::SwapError;
use bitcoin::hashes::Hash;
use bitcoin::locktime::absolute::LockTime;
use bitcoin::opcodes::all::{
    OP_CHECKSIG, OP_CLTV, OP_DROP, OP_ELSE, OP_ENDIF, OP_EQUALVERIFY, OP_IF, OP_PUSHBYTES_0,
    OP_PUSHNUM_1, OP_PUSHNUM_16, OP_SHA256,
};
use bitcoin::opcodes::Opcode;
use bitcoin::script::{Builder, Instruction, PushBytesBuf, Script, ScriptBuf};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{Address, Amount, Network, OutPoint, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use swap_crypto::{verify_secret, Hashlock, Secp256k1PublicKey, Secret};

/// Number of instructions in a well-formed HTLC script.
pub const HTLC_SCRIPT_INSTRUCTIONS: usize = 13;

/// Parameters encoded in an HTLC redeem script.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HtlcScriptParams {
    /// SHA-256 of the secret.
    pub hashlock: Hashlock,
    /// Key that redeems with the secret.
    pub recipient: Secp256k1PublicKey,
    /// Key that refunds after the locktime.
    pub sender: Secp256k1PublicKey,
    /// Absolute locktime (unix time, or height below 500 000 000).
    pub locktime: u32,
}

impl HtlcScriptParams {
    /// Redeem script for these parameters.
    pub fn redeem_script(&self) -> ScriptBuf {
        generate_htlc_script(&self.hashlock, &self.recipient, &self.sender, self.locktime)
    }
}

/// Build the HTLC redeem script.
pub fn generate_htlc_script(
    hashlock: &Hashlock,
    recipient: &Secp256k1PublicKey,
    sender: &Secp256k1PublicKey,
    locktime: u32,
) -> ScriptBuf {
    Builder::new()
        .push_opcode(OP_IF)
        .push_opcode(OP_SHA256)
        .push_slice(hashlock)
        .push_opcode(OP_EQUALVERIFY)
        .push_slice(recipient.as_bytes())
        .push_opcode(OP_CHECKSIG)
        .push_opcode(OP_ELSE)
        .push_lock_time(LockTime::from_consensus(locktime))
        .push_opcode(OP_CLTV)
        .push_opcode(OP_DROP)
        .push_slice(sender.as_bytes())
        .push_opcode(OP_CHECKSIG)
        .push_opcode(OP_ENDIF)
        .into_script()
}

/// P2SH address of the HTLC script on `network`.
pub fn generate_htlc_address(
    params: &HtlcScriptParams,
    network: Network,
) -> Result<Address, SwapError> {
    Address::p2sh(&params.redeem_script(), network)
        .map_err(|e| SwapError::validation(format!("script cannot be wrapped in P2SH: {}", e)))
}

/// P2PKH address paying `pubkey` on `network`.
pub fn p2pkh_address(pubkey: &Secp256k1PublicKey, network: Network) -> Result<Address, SwapError> {
    let key = bitcoin::PublicKey::from_slice(pubkey.as_bytes())
        .map_err(|e| SwapError::validation(format!("invalid public key: {}", e)))?;
    Ok(Address::p2pkh(key.pubkey_hash(), network))
}

/// Structural check: branch markers and opcode count/order.
pub fn verify_htlc_script(script: &Script) -> bool {
    parse_htlc_script(script).is_ok()
}

/// Recover the parameters of a well-formed HTLC script.
pub fn parse_htlc_script(script: &Script) -> Result<HtlcScriptParams, SwapError> {
    let ins = collect_instructions(script)?;
    if ins.len() != HTLC_SCRIPT_INSTRUCTIONS {
        return Err(SwapError::validation(format!(
            "HTLC script has {} instructions, expected {}",
            ins.len(),
            HTLC_SCRIPT_INSTRUCTIONS
        )));
    }

    expect_op(&ins[0], OP_IF)?;
    expect_op(&ins[1], OP_SHA256)?;
    let hashlock = push_array::<32>(&ins[2])?;
    expect_op(&ins[3], OP_EQUALVERIFY)?;
    let recipient = Secp256k1PublicKey::from_slice(push_bytes(&ins[4])?)?;
    expect_op(&ins[5], OP_CHECKSIG)?;
    expect_op(&ins[6], OP_ELSE)?;
    let locktime = script_number(&ins[7])?;
    expect_op(&ins[8], OP_CLTV)?;
    expect_op(&ins[9], OP_DROP)?;
    let sender = Secp256k1PublicKey::from_slice(push_bytes(&ins[10])?)?;
    expect_op(&ins[11], OP_CHECKSIG)?;
    expect_op(&ins[12], OP_ENDIF)?;

    Ok(HtlcScriptParams {
        hashlock,
        recipient,
        sender,
        locktime,
    })
}

fn collect_instructions(script: &Script) -> Result<Vec<Instruction<'_>>, SwapError> {
    script
        .instructions()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| SwapError::validation(format!("malformed script: {}", e)))
}

fn expect_op(ins: &Instruction<'_>, expected: Opcode) -> Result<(), SwapError> {
    match ins {
        Instruction::Op(op) if *op == expected => Ok(()),
        other => Err(SwapError::validation(format!(
            "expected {:?}, found {:?}",
            expected, other
        ))),
    }
}

fn push_bytes<'a>(ins: &Instruction<'a>) -> Result<&'a [u8], SwapError> {
    match ins {
        Instruction::PushBytes(bytes) => Ok(bytes.as_bytes()),
        other => Err(SwapError::validation(format!(
            "expected data push, found {:?}",
            other
        ))),
    }
}

fn push_array<const N: usize>(ins: &Instruction<'_>) -> Result<[u8; N], SwapError> {
    let bytes = push_bytes(ins)?;
    bytes.try_into().map_err(|_| {
        SwapError::validation(format!("expected {}-byte push, found {}", N, bytes.len()))
    })
}

/// Decode a non-negative, minimally encoded script number that fits in u32.
fn script_number(ins: &Instruction<'_>) -> Result<u32, SwapError> {
    let bytes = match ins {
        Instruction::Op(op) => {
            let code = op.to_u8();
            if (OP_PUSHNUM_1.to_u8()..=OP_PUSHNUM_16.to_u8()).contains(&code) {
                return Ok(u32::from(code - OP_PUSHNUM_1.to_u8() + 1));
            }
            return Err(SwapError::validation(format!(
                "expected locktime, found {:?}",
                op
            )));
        }
        Instruction::PushBytes(bytes) => bytes.as_bytes(),
    };

    if bytes.len() > 5 {
        return Err(SwapError::validation("locktime push too long"));
    }
    let Some(&last) = bytes.last() else {
        return Ok(0);
    };
    if last & 0x80 != 0 {
        return Err(SwapError::validation("negative locktime"));
    }
    if last == 0 && (bytes.len() == 1 || bytes[bytes.len() - 2] & 0x80 == 0) {
        return Err(SwapError::validation("non-minimal locktime encoding"));
    }
    let value = bytes
        .iter()
        .rev()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    u32::try_from(value).map_err(|_| SwapError::validation("locktime exceeds u32"))
}

// =============================================================================
// Spends
// =============================================================================

/// HTLC output being spent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FundingUtxo {
    /// Funding transaction id.
    pub txid: Txid,
    /// Output index.
    pub vout: u32,
    /// Output value.
    pub value: Amount,
}

impl FundingUtxo {
    /// Outpoint of the HTLC output.
    pub fn outpoint(&self) -> OutPoint {
        OutPoint {
            txid: self.txid,
            vout: self.vout,
        }
    }
}

/// Which script branch a spend selects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpendBranch {
    /// Branch A: secret plus recipient signature.
    Withdrawal(Secret),
    /// Branch B: sender signature after the locktime.
    Refund,
}

/// Unsigned spend of an HTLC output plus what is needed to finish it.
#[derive(Clone, Debug)]
pub struct SpendDescriptor {
    /// Transaction with an empty scriptSig.
    pub transaction: Transaction,
    /// Redeem script of the spent output.
    pub redeem_script: ScriptBuf,
    /// Selected branch.
    pub branch: SpendBranch,
}

impl SpendDescriptor {
    /// Legacy SIGHASH_ALL digest the spender must sign.
    pub fn signature_hash(&self) -> Result<[u8; 32], SwapError> {
        let cache = SighashCache::new(&self.transaction);
        let sighash = cache
            .legacy_signature_hash(
                0,
                self.redeem_script.as_script(),
                EcdsaSighashType::All.to_u32(),
            )
            .map_err(|e| SwapError::validation(format!("sighash: {}", e)))?;
        Ok(sighash.to_byte_array())
    }

    /// Attach the scriptSig for the selected branch.
    pub fn finalize(&self, der_signature: &[u8]) -> Result<Transaction, SwapError> {
        let mut sig = der_signature.to_vec();
        sig.push(EcdsaSighashType::All.to_u32() as u8);
        let sig = PushBytesBuf::try_from(sig)
            .map_err(|_| SwapError::validation("signature too large to push"))?;
        let script = PushBytesBuf::try_from(self.redeem_script.to_bytes())
            .map_err(|_| SwapError::validation("redeem script too large to push"))?;

        let builder = Builder::new().push_slice(&sig);
        let builder = match &self.branch {
            SpendBranch::Withdrawal(secret) => builder
                .push_slice(secret.as_bytes())
                .push_opcode(OP_PUSHNUM_1),
            SpendBranch::Refund => builder.push_opcode(OP_PUSHBYTES_0),
        };
        let script_sig = builder.push_slice(&script).into_script();

        let mut tx = self.transaction.clone();
        let input = tx
            .input
            .first_mut()
            .ok_or_else(|| SwapError::validation("spend has no input"))?;
        input.script_sig = script_sig;
        Ok(tx)
    }
}

/// Withdrawal (branch A) spend paying `recipient_address`.
pub fn create_withdrawal_transaction_data(
    utxo: &FundingUtxo,
    recipient_address: &Address,
    params: &HtlcScriptParams,
    secret: &Secret,
    fee_sats: u64,
) -> Result<SpendDescriptor, SwapError> {
    if !verify_secret(secret.as_bytes(), &params.hashlock) {
        return Err(SwapError::InvalidSecret);
    }
    let transaction = build_spend(utxo, recipient_address, fee_sats, LockTime::ZERO)?;
    Ok(SpendDescriptor {
        transaction,
        redeem_script: params.redeem_script(),
        branch: SpendBranch::Withdrawal(secret.clone()),
    })
}

/// Refund (branch B) spend paying `sender_address`, valid from the locktime.
pub fn create_refund_transaction_data(
    utxo: &FundingUtxo,
    sender_address: &Address,
    params: &HtlcScriptParams,
    fee_sats: u64,
) -> Result<SpendDescriptor, SwapError> {
    let lock_time = LockTime::from_consensus(params.locktime);
    let transaction = build_spend(utxo, sender_address, fee_sats, lock_time)?;
    Ok(SpendDescriptor {
        transaction,
        redeem_script: params.redeem_script(),
        branch: SpendBranch::Refund,
    })
}

fn build_spend(
    utxo: &FundingUtxo,
    destination: &Address,
    fee_sats: u64,
    lock_time: LockTime,
) -> Result<Transaction, SwapError> {
    let value = utxo
        .value
        .checked_sub(Amount::from_sat(fee_sats))
        .filter(|v| *v > Amount::ZERO)
        .ok_or_else(|| {
            SwapError::validation(format!(
                "fee {} sats leaves nothing of {} sats",
                fee_sats,
                utxo.value.to_sat()
            ))
        })?;

    Ok(Transaction {
        version: Version::TWO,
        lock_time,
        input: vec![TxIn {
            previous_output: utxo.outpoint(),
            script_sig: ScriptBuf::new(),
            // Non-final so nLockTime is enforced on the refund path
            sequence: Sequence::ENABLE_LOCKTIME_NO_RBF,
            witness: Witness::default(),
        }],
        output: vec![TxOut {
            value,
            script_pubkey: destination.script_pubkey(),
        }],
    })
}

/// A scriptSig recognised as an HTLC spend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParsedSpend {
    /// `<sig> <secret> OP_1 <script>`
    Withdrawal {
        /// DER signature with sighash byte
        signature: Vec<u8>,
        /// Revealed preimage
        secret: Vec<u8>,
        /// Redeem script
        redeem_script: ScriptBuf,
    },
    /// `<sig> OP_0 <script>`
    Refund {
        /// DER signature with sighash byte
        signature: Vec<u8>,
        /// Redeem script
        redeem_script: ScriptBuf,
    },
}

/// Recognise a withdrawal or refund scriptSig.
pub fn parse_spend_script_sig(script_sig: &Script) -> Result<ParsedSpend, SwapError> {
    let ins = collect_instructions(script_sig)?;
    match ins.as_slice() {
        [Instruction::PushBytes(sig), Instruction::PushBytes(secret), Instruction::Op(op), Instruction::PushBytes(script)]
            if *op == OP_PUSHNUM_1 =>
        {
            Ok(ParsedSpend::Withdrawal {
                signature: sig.as_bytes().to_vec(),
                secret: secret.as_bytes().to_vec(),
                redeem_script: ScriptBuf::from_bytes(script.as_bytes().to_vec()),
            })
        }
        [Instruction::PushBytes(sig), Instruction::PushBytes(selector), Instruction::PushBytes(script)]
            if selector.as_bytes().is_empty() =>
        {
            Ok(ParsedSpend::Refund {
                signature: sig.as_bytes().to_vec(),
                redeem_script: ScriptBuf::from_bytes(script.as_bytes().to_vec()),
            })
        }
        _ => Err(SwapError::validation("scriptSig is not an HTLC spend")),
    }
}
