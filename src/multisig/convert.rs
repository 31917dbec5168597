//! Single-signature to multisig slot conversion
//!
//! Signers reached through different paths return either a plain
//! single-signature envelope or an envelope that is already multisig with
//! one populated slot. Conversion normalizes the former into the latter so
//! that every contribution can be merged slot by slot.

use crate::core::{MultisigSig, MultisigSubsig, SignedTransaction};
use crate::crypto::{Address, Signature};
use crate::multisig::account::{MultisigAccount, MultisigError};

/// Build a multisig signature with a single populated slot
///
/// Returns the signature set and the slot index of `key`.
pub fn single_slot(
    key: &Address,
    account: &MultisigAccount,
    signature: Signature,
) -> Result<(MultisigSig, usize), MultisigError> {
    let slot = account
        .slot_of(key)
        .ok_or(MultisigError::InvalidParticipant(*key))?;

    let mut subsigs: Vec<MultisigSubsig> = account
        .keys()
        .iter()
        .map(|k| MultisigSubsig::blank(*k))
        .collect();
    subsigs[slot].sig = Some(signature);

    Ok((
        MultisigSig {
            version: account.version(),
            threshold: account.threshold(),
            subsigs,
        },
        slot,
    ))
}

/// Place an envelope's signature at its slot of `account`
///
/// Envelopes that already carry a multisig signature are returned unchanged.
/// Otherwise the signing identity (authorizing address, else sender) must be
/// a participant of `account`.
pub fn to_multisig_slot(
    stx: &SignedTransaction,
    account: &MultisigAccount,
) -> Result<SignedTransaction, MultisigError> {
    if stx.has_multisig() {
        return Ok(stx.clone());
    }

    let signature = stx.sig.ok_or(MultisigError::MissingSignature)?;
    let signer = stx.signer();

    let (msig, slot) = single_slot(&signer, account, signature)?;
    log::debug!(
        "Converted signature of {} into slot {} of {}",
        signer,
        slot,
        account.description()
    );

    let account_address = account.address();
    let auth_addr = (stx.txn.sender != account_address).then_some(account_address);

    Ok(SignedTransaction {
        sig: None,
        msig: Some(msig),
        auth_addr,
        txn: stx.txn.clone(),
    })
}

/// Byte-level conversion; already-multisig input is returned byte for byte
pub fn convert_encoded(bytes: &[u8], account: &MultisigAccount) -> Result<Vec<u8>, MultisigError> {
    let stx = SignedTransaction::decode(bytes)?;

    if stx.has_multisig() {
        return Ok(bytes.to_vec());
    }

    Ok(to_multisig_slot(&stx, account)?.encode()?)
}
