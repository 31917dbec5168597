//! Native multisig signing and verification

use crate::core::{SignedTransaction, Transaction};
use crate::crypto::{verify_signature, KeyPair};
use crate::multisig::account::{MultisigAccount, MultisigError};
use crate::multisig::convert::single_slot;

/// Sign a transaction as one participant of a multisig account
///
/// The result has every slot of `account` with only the signer's populated.
/// The authorizing address is the account when it is not the sender.
pub fn sign_multisig_transaction(
    key_pair: &KeyPair,
    account: &MultisigAccount,
    txn: &Transaction,
) -> Result<SignedTransaction, MultisigError> {
    let signature = key_pair.sign(&txn.signing_bytes()?)?;
    let (msig, _) = single_slot(&key_pair.address(), account, signature)?;

    let account_address = account.address();
    let auth_addr = (txn.sender != account_address).then_some(account_address);

    Ok(SignedTransaction {
        sig: None,
        msig: Some(msig),
        auth_addr,
        txn: txn.clone(),
    })
}

/// Verify a multisig envelope
///
/// Every populated slot must verify against its key, and at least
/// `threshold` slots must be populated. Partial envelopes return `false`.
pub fn verify_multisig(stx: &SignedTransaction) -> Result<bool, MultisigError> {
    let Some(msig) = stx.multisig() else {
        return Ok(false);
    };

    let account = MultisigAccount::from_msig(msig)?;
    let expected_signer = account.address();
    if stx.signer() != expected_signer {
        return Ok(false);
    }

    let message = stx.txn.signing_bytes()?;
    let mut valid = 0usize;

    for subsig in &msig.subsigs {
        let Some(signature) = &subsig.sig else {
            continue;
        };
        if !verify_signature(&subsig.key.public_key()?, &message, signature)? {
            return Ok(false);
        }
        valid += 1;
    }

    Ok(valid >= account.threshold() as usize)
}
