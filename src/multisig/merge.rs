//! Merging multisig contributions
//!
//! Each contribution fills some slots of the same account's sub-signature
//! list; the merge is the positional union. Two different signatures for one
//! slot are a hard error, so the result never depends on input order.

use crate::core::{PartialSignatureSet, SignedTransaction};
use crate::multisig::account::{MultisigAccount, MultisigError};

/// Merge multisig envelopes for the same account and transaction
pub fn merge(envelopes: &[SignedTransaction]) -> Result<SignedTransaction, MultisigError> {
    let (first, rest) = envelopes
        .split_first()
        .ok_or_else(|| MultisigError::IncompatibleMerge("no envelopes to merge".to_string()))?;

    let reference = first.multisig().ok_or_else(|| {
        MultisigError::IncompatibleMerge("envelope 0 is not a multisig envelope".to_string())
    })?;
    let account = MultisigAccount::from_msig(reference)?;

    if rest.is_empty() {
        return Ok(first.clone());
    }

    let mut merged = reference.clone();

    for (offset, other) in rest.iter().enumerate() {
        let index = offset + 1;

        let msig = other.multisig().ok_or_else(|| {
            MultisigError::IncompatibleMerge(format!(
                "envelope {} is not a multisig envelope",
                index
            ))
        })?;

        let other_account = MultisigAccount::from_msig(msig)?;
        if other_account != account {
            return Err(MultisigError::IncompatibleMerge(format!(
                "envelope {} is for account {} ({}), expected {} ({})",
                index,
                other_account.address(),
                other_account.description(),
                account.address(),
                account.description()
            )));
        }

        if other.txn != first.txn {
            return Err(MultisigError::IncompatibleMerge(format!(
                "envelope {} signs a different transaction",
                index
            )));
        }

        if other.auth_addr != first.auth_addr {
            return Err(MultisigError::IncompatibleMerge(format!(
                "envelope {} has a different authorizing address",
                index
            )));
        }

        for (slot, (into, from)) in merged.subsigs.iter_mut().zip(&msig.subsigs).enumerate() {
            match (&into.sig, &from.sig) {
                (_, None) => {}
                (None, Some(sig)) => into.sig = Some(*sig),
                (Some(a), Some(b)) if a == b => {}
                (Some(_), Some(_)) => {
                    return Err(MultisigError::ConflictingSignature {
                        slot,
                        key: into.key,
                    })
                }
            }
        }
    }

    Ok(SignedTransaction {
        sig: None,
        msig: Some(merged),
        auth_addr: first.auth_addr,
        txn: first.txn.clone(),
    })
}

/// Byte-level merge of encoded envelopes
pub fn merge_encoded(envelopes: &[Vec<u8>]) -> Result<Vec<u8>, MultisigError> {
    if let [single] = envelopes {
        if !SignedTransaction::decode(single)?.has_multisig() {
            return Err(MultisigError::IncompatibleMerge(
                "envelope 0 is not a multisig envelope".to_string(),
            ));
        }
        return Ok(single.clone());
    }

    let decoded = envelopes
        .iter()
        .map(|bytes| SignedTransaction::decode(bytes))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(merge(&decoded)?.encode()?)
}

/// Merge several signers' batches index by index
///
/// Every batch must have the same length. Entries a signer skipped are
/// ignored; an index skipped by every signer stays empty.
pub fn merge_batches(batches: &[PartialSignatureSet]) -> Result<PartialSignatureSet, MultisigError> {
    let expected = batches.iter().map(Vec::len).max().unwrap_or(0);

    for (batch, entries) in batches.iter().enumerate() {
        if entries.len() != expected {
            return Err(MultisigError::BatchLengthMismatch {
                batch,
                got: entries.len(),
                expected,
            });
        }
    }

    (0..expected)
        .map(|index| {
            let entries: Vec<Vec<u8>> = batches
                .iter()
                .filter_map(|batch| batch[index].clone())
                .collect();

            if entries.is_empty() {
                return Ok(None);
            }

            merge_encoded(&entries)
                .map(Some)
                .map_err(|source| MultisigError::InBatch {
                    index,
                    source: Box::new(source),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{sign_transaction, Transaction};
    use crate::crypto::KeyPair;
    use crate::multisig::convert::to_multisig_slot;
    use crate::multisig::sign::sign_multisig_transaction;

    fn setup(n: usize, threshold: u8) -> (MultisigAccount, Vec<KeyPair>) {
        let keys: Vec<KeyPair> = (0..n).map(|_| KeyPair::generate()).collect();
        let account =
            MultisigAccount::with_params(threshold, keys.iter().map(|k| k.address()).collect())
                .unwrap();
        (account, keys)
    }

    fn payment(account: &MultisigAccount) -> Transaction {
        Transaction::payment(account.address(), account.address(), 1000, 123)
            .with_genesis_id("testnet-v1")
            .with_note(b"test")
    }

    #[test]
    fn test_converted_singles_merge_like_native() {
        let (account, keys) = setup(2, 1);
        let txn = payment(&account);

        // Sign as single, then convert and merge
        let c1 = to_multisig_slot(&sign_transaction(&keys[0], &txn).unwrap(), &account).unwrap();
        let c2 = to_multisig_slot(&sign_transaction(&keys[1], &txn).unwrap(), &account).unwrap();
        let a = merge(&[c1, c2]).unwrap();

        // Sign as multisig, then merge
        let m1 = sign_multisig_transaction(&keys[0], &account, &txn).unwrap();
        let m2 = sign_multisig_transaction(&keys[1], &account, &txn).unwrap();
        let b = merge(&[m1, m2]).unwrap();

        assert_eq!(a.encode().unwrap(), b.encode().unwrap());
    }

    #[test]
    fn test_mixed_native_and_converted() {
        // Account {A, B, C}, threshold 2
        let (account, keys) = setup(3, 2);
        let txn = payment(&account);

        let native_a = sign_multisig_transaction(&keys[0], &account, &txn).unwrap();
        let single_b = sign_transaction(&keys[1], &txn).unwrap();
        let converted_b = to_multisig_slot(&single_b, &account).unwrap();
        let mixed = merge(&[native_a.clone(), converted_b]).unwrap();

        let native_b = sign_multisig_transaction(&keys[1], &account, &txn).unwrap();
        let native = merge(&[native_a, native_b]).unwrap();

        assert_eq!(mixed.encode().unwrap(), native.encode().unwrap());
        assert_eq!(mixed.multisig().unwrap().signed_count(), 2);
    }

    #[test]
    fn test_merge_is_commutative_and_associative() {
        let (account, keys) = setup(4, 3);
        let txn = payment(&account);

        let parts: Vec<SignedTransaction> = keys[..3]
            .iter()
            .map(|k| sign_multisig_transaction(k, &account, &txn).unwrap())
            .collect();
        let (a, b, c) = (parts[0].clone(), parts[1].clone(), parts[2].clone());

        let abc = merge(&[a.clone(), b.clone(), c.clone()]).unwrap();
        let cba = merge(&[c.clone(), b.clone(), a.clone()]).unwrap();
        let bac = merge(&[b.clone(), a.clone(), c.clone()]).unwrap();
        assert_eq!(abc, cba);
        assert_eq!(abc, bac);

        let ab_c = merge(&[merge(&[a.clone(), b.clone()]).unwrap(), c.clone()]).unwrap();
        let a_bc = merge(&[a, merge(&[b, c]).unwrap()]).unwrap();
        assert_eq!(ab_c, a_bc);
        assert_eq!(ab_c, abc);
    }

    #[test]
    fn test_single_input_returned_unchanged() {
        let (account, keys) = setup(2, 1);
        let txn = payment(&account);

        let stx = sign_multisig_transaction(&keys[0], &account, &txn).unwrap();
        assert_eq!(merge(std::slice::from_ref(&stx)).unwrap(), stx);

        let bytes = stx.encode().unwrap();
        assert_eq!(merge_encoded(std::slice::from_ref(&bytes)).unwrap(), bytes);
    }

    #[test]
    fn test_identical_contributions_are_accepted() {
        let (account, keys) = setup(3, 2);
        let txn = payment(&account);

        let a = sign_multisig_transaction(&keys[0], &account, &txn).unwrap();
        let merged = merge(&[a.clone(), a.clone()]).unwrap();
        assert_eq!(merged.multisig().unwrap().signed_count(), 1);
    }

    #[test]
    fn test_conflicting_slot_is_fatal() {
        let (account, keys) = setup(3, 2);
        let txn = payment(&account);

        let a = sign_multisig_transaction(&keys[0], &account, &txn).unwrap();
        let mut forged = sign_multisig_transaction(&keys[1], &account, &txn).unwrap();
        let msig = forged.msig.as_mut().unwrap();
        msig.subsigs[0].sig = msig.subsigs[1].sig;

        assert!(matches!(
            merge(&[a, forged]),
            Err(MultisigError::ConflictingSignature { slot: 0, .. })
        ));
    }

    #[test]
    fn test_different_accounts_rejected() {
        let (account, keys) = setup(3, 2);
        let reordered = MultisigAccount::with_params(
            2,
            vec![keys[1].address(), keys[0].address(), keys[2].address()],
        )
        .unwrap();
        let txn = payment(&account);

        let a = sign_multisig_transaction(&keys[0], &account, &txn).unwrap();
        let b = sign_multisig_transaction(&keys[1], &reordered, &txn).unwrap();

        assert!(matches!(
            merge(&[a, b]),
            Err(MultisigError::IncompatibleMerge(_))
        ));
    }

    #[test]
    fn test_different_transactions_rejected() {
        let (account, keys) = setup(3, 2);
        let txn = payment(&account);
        let other = txn.clone().with_fee(5000);

        let a = sign_multisig_transaction(&keys[0], &account, &txn).unwrap();
        let b = sign_multisig_transaction(&keys[1], &account, &other).unwrap();

        assert!(matches!(
            merge(&[a, b]),
            Err(MultisigError::IncompatibleMerge(_))
        ));
    }

    #[test]
    fn test_unconverted_input_rejected() {
        let (account, keys) = setup(2, 1);
        let txn = payment(&account);

        let a = sign_multisig_transaction(&keys[0], &account, &txn).unwrap();
        let plain = sign_transaction(&keys[1], &txn).unwrap();

        assert!(matches!(
            merge(&[a, plain]),
            Err(MultisigError::IncompatibleMerge(_))
        ));
        assert!(matches!(merge(&[]), Err(MultisigError::IncompatibleMerge(_))));
    }

    #[test]
    fn test_batches_with_different_lengths_fail() {
        let (account, keys) = setup(2, 2);
        let txn = payment(&account);

        let a = sign_multisig_transaction(&keys[0], &account, &txn).unwrap().encode().unwrap();
        let b = sign_multisig_transaction(&keys[1], &account, &txn).unwrap().encode().unwrap();

        let result = merge_batches(&[vec![Some(a.clone()), Some(a)], vec![Some(b)]]);
        assert!(matches!(
            result,
            Err(MultisigError::BatchLengthMismatch {
                batch: 1,
                got: 1,
                expected: 2
            })
        ));
    }

    #[test]
    fn test_batches_skip_blank_entries() {
        let (account, keys) = setup(2, 2);
        let first = payment(&account);
        let second = payment(&account).with_fee(2000);

        let a1 = sign_multisig_transaction(&keys[0], &account, &first).unwrap().encode().unwrap();
        let b1 = sign_multisig_transaction(&keys[1], &account, &first).unwrap().encode().unwrap();
        let b2 = sign_multisig_transaction(&keys[1], &account, &second).unwrap().encode().unwrap();

        let merged = merge_batches(&[
            vec![Some(a1), None, None],
            vec![Some(b1), Some(b2.clone()), None],
        ])
        .unwrap();

        assert_eq!(merged.len(), 3);
        let full = SignedTransaction::decode(merged[0].as_ref().unwrap()).unwrap();
        assert_eq!(full.multisig().unwrap().signed_count(), 2);
        assert_eq!(merged[1].as_ref(), Some(&b2));
        assert!(merged[2].is_none());
    }

    #[test]
    fn test_batch_errors_name_the_index() {
        let (account, keys) = setup(2, 2);
        let txn = payment(&account);

        let a = sign_multisig_transaction(&keys[0], &account, &txn).unwrap().encode().unwrap();
        let other = sign_multisig_transaction(&keys[1], &account, &txn.clone().with_fee(1))
            .unwrap()
            .encode()
            .unwrap();

        let result = merge_batches(&[vec![None, Some(a)], vec![None, Some(other)]]);
        assert!(matches!(result, Err(MultisigError::InBatch { index: 1, .. })));
    }
}
