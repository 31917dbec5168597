//! CLI commands for the quorum signer
//!
//! Requests and responses are exchanged as JSON files so that each step
//! (build, sign, convert, merge) can run on a different machine.

use crate::core::{format_txn, verify_single, Transaction, TransactionKind};
use crate::crypto::Address;
use crate::multisig::{
    convert_encoded, merge_batches, parse_addrs, verify_multisig, MultisigAccount,
    SigningIdentity,
};
use crate::signer::{
    LocalPeer, LocalSignerOptions, PeerRegistry, QuorumConfig, QuorumSigner, SignRequest,
    SignResponse, Signer, SignerError,
};
use crate::wallet::KeyStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Separator for address lists on the command line
pub const ADDR_SEPARATOR: &str = ",";

/// Application state
pub struct AppState {
    pub key_store: KeyStore,
    pub data_dir: PathBuf,
}

impl AppState {
    pub fn new(data_dir: PathBuf) -> CliResult<Self> {
        let key_store = KeyStore::new(&data_dir.join("keys"))?;
        Ok(Self {
            key_store,
            data_dir,
        })
    }
}

/// Parameters of a payment batch
#[derive(Debug, Clone)]
pub struct PaymentParams {
    pub sender: Address,
    pub receivers: Vec<Address>,
    pub amount: u64,
    pub first_valid: u64,
    pub last_valid: Option<u64>,
    pub fee: Option<u64>,
    pub genesis_id: Option<String>,
    pub note: Option<String>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> CliResult<T> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> CliResult<()> {
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

fn resolve_identity(addrs: &str, threshold: u8) -> CliResult<SigningIdentity> {
    Ok(SigningIdentity::resolve(
        parse_addrs(addrs, ADDR_SEPARATOR)?,
        threshold,
    )?)
}

fn resolve_multisig(addrs: &str, threshold: u8) -> CliResult<MultisigAccount> {
    match resolve_identity(addrs, threshold)? {
        SigningIdentity::Multisig(account) => Ok(account),
        SigningIdentity::Single(address) => {
            Err(format!("{} is a single-key account, not a multisig account", address).into())
        }
    }
}

fn print_request(request: &SignRequest) -> CliResult<()> {
    for (i, txn) in request.transactions()?.iter().enumerate() {
        println!("\n   Transaction #{} ({})", i, txn.id()?);
        for line in format_txn(txn).lines() {
            println!("   │ {}", line);
        }
    }
    Ok(())
}

/// Create a new key file
pub fn cmd_keygen(state: &AppState, label: Option<&str>) -> CliResult<()> {
    let wallet = state.key_store.create(label)?;

    println!("🔐 New key created!");
    println!("   📍 Address: {}", wallet.address());
    println!("   🔑 Public Key: {}", wallet.public_key());
    if let Some(l) = &wallet.label {
        println!("   🏷️  Label: {}", l);
    }
    println!("\n   ⚠️  IMPORTANT: The private key is stored in {:?}", state.data_dir.join("keys"));

    Ok(())
}

/// List key files
pub fn cmd_keys(state: &AppState) -> CliResult<()> {
    let wallets = state.key_store.load_all()?;

    if wallets.is_empty() {
        println!("📭 No keys found. Create one with: quorum keygen");
        return Ok(());
    }

    println!("📋 Keys:");
    for wallet in &wallets {
        println!(
            "   {} ({}) created {}",
            wallet.address(),
            wallet.label.as_deref().unwrap_or("-"),
            wallet.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}

/// Show the account an address list and threshold resolve to
pub fn cmd_address(addrs: &str, threshold: u8) -> CliResult<()> {
    match resolve_identity(addrs, threshold)? {
        SigningIdentity::Single(address) => {
            println!("👤 Single-key account");
            println!("   📍 Address: {}", address);
        }
        SigningIdentity::Multisig(account) => {
            println!("👥 Multisig account ({})", account.description());
            println!("   📍 Address: {}", account.address());
            for (slot, key) in account.keys().iter().enumerate() {
                println!("   └─ #{} {}", slot, key);
            }
        }
    }

    Ok(())
}

/// Build a payment to each receiver and write the sign request
pub fn cmd_txn(params: PaymentParams, out: &Path) -> CliResult<()> {
    let txns = params
        .receivers
        .iter()
        .map(|receiver| {
            let mut txn =
                Transaction::payment(params.sender, *receiver, params.amount, params.first_valid);
            if let Some(last_valid) = params.last_valid {
                txn = txn.with_validity(params.first_valid, last_valid);
            }
            if let Some(fee) = params.fee {
                txn = txn.with_fee(fee);
            }
            if let Some(genesis_id) = &params.genesis_id {
                txn = txn.with_genesis_id(genesis_id);
            }
            if let Some(note) = &params.note {
                txn = txn.with_note(note.as_bytes());
            }
            txn
        })
        .collect::<Vec<_>>();

    let request = SignRequest::from_transactions(&txns)?;
    write_json(out, &request)?;

    println!("📝 Sign request with {} transaction(s) written to {:?}", request.len(), out);
    print_request(&request)?;

    Ok(())
}

/// Sign a request with one local key
pub async fn cmd_sign(
    state: &AppState,
    key: &Address,
    request_path: &Path,
    multisig: Option<(&str, u8)>,
    match_sender: Option<Address>,
    out: &Path,
) -> CliResult<()> {
    let wallet = state.key_store.load(key)?;
    let request: SignRequest = read_json(request_path)?;

    let options = LocalSignerOptions {
        multisig: match multisig {
            Some((addrs, threshold)) => Some(resolve_multisig(addrs, threshold)?),
            None => None,
        },
        match_sender,
    };
    let signer = wallet.signer(options);

    println!("✍️  Signing {} transaction(s) as {}", request.len(), signer.address());
    print_request(&request)?;

    let response = signer.sign(request).await?;
    write_json(out, &response)?;

    let signed = response.result.iter().filter(|entry| entry.is_some()).count();
    println!("\n✅ Signed {} of {} -> {:?}", signed, response.result.len(), out);

    Ok(())
}

/// Convert every single-signature entry of a response into its multisig slot
pub fn cmd_convert(response_path: &Path, addrs: &str, threshold: u8, out: &Path) -> CliResult<()> {
    let account = resolve_multisig(addrs, threshold)?;
    let response: SignResponse = read_json(response_path)?;

    let converted = response
        .to_partials()?
        .iter()
        .map(|entry| -> CliResult<Option<Vec<u8>>> {
            match entry {
                Some(bytes) => Ok(Some(convert_encoded(bytes, &account)?)),
                None => Ok(None),
            }
        })
        .collect::<CliResult<Vec<_>>>()?;

    write_json(out, &SignResponse::from_partials(&converted))?;
    println!(
        "🔄 Converted {} entries for {} ({}) -> {:?}",
        converted.len(),
        account.address(),
        account.description(),
        out
    );

    Ok(())
}

/// Merge several signers' responses index by index
pub fn cmd_merge(inputs: &[PathBuf], out: &Path) -> CliResult<()> {
    let batches = inputs
        .iter()
        .map(|path| -> CliResult<_> {
            let response: SignResponse = read_json(path)?;
            Ok(response.to_partials()?)
        })
        .collect::<CliResult<Vec<_>>>()?;

    let merged = SignResponse::from_partials(&merge_batches(&batches)?);
    write_json(out, &merged)?;

    println!("🔗 Merged {} responses -> {:?}", inputs.len(), out);
    Ok(())
}

/// Check every signed entry of a response
pub fn cmd_verify(response_path: &Path) -> CliResult<()> {
    let response: SignResponse = read_json(response_path)?;

    println!("🔍 Verifying {} entries...", response.result.len());
    for (i, entry) in response.signed_transactions()?.iter().enumerate() {
        let Some(stx) = entry else {
            println!("   #{} ⏭️  not signed", i);
            continue;
        };

        let (kind, valid) = match stx.multisig() {
            Some(msig) => (
                format!("multisig {}/{}", msig.signed_count(), msig.threshold),
                verify_multisig(stx)?,
            ),
            None => ("single".to_string(), verify_single(stx)?),
        };

        let amount = match &stx.txn.kind {
            TransactionKind::Payment { amount, .. } => amount.to_string(),
            other => other.name().to_string(),
        };

        println!(
            "   #{} {} {} ({}, {})",
            i,
            if valid { "✅" } else { "❌" },
            stx.id()?,
            kind,
            amount
        );
    }

    Ok(())
}

/// Collect a quorum of signatures from the local key files
///
/// Every key file is offered as a peer session; keys that are not
/// participants of the account are left unbound.
#[allow(clippy::too_many_arguments)]
pub async fn cmd_quorum(
    state: &AppState,
    request_path: &Path,
    addrs: &str,
    threshold: u8,
    native: bool,
    config: QuorumConfig,
    out: &Path,
    raw: Option<&Path>,
) -> CliResult<()> {
    let identity = resolve_identity(addrs, threshold)?;
    let request: SignRequest = read_json(request_path)?;

    let expected = match &identity {
        SigningIdentity::Single(address) => vec![*address],
        SigningIdentity::Multisig(account) => account.keys().to_vec(),
    };
    let registry = Arc::new(PeerRegistry::new(expected));

    for wallet in state.key_store.load_all()? {
        let options = LocalSignerOptions {
            multisig: identity.multisig().filter(|_| native).cloned(),
            match_sender: None,
        };
        let peer = LocalPeer::new(Arc::new(wallet.signer(options)));
        registry.offer(Arc::new(peer), &[wallet.address()]);
    }

    let mut signer = QuorumSigner::new(identity.address(), registry.clone()).with_config(config);
    if let Some(account) = identity.multisig() {
        signer = signer.with_multisig(account.clone());
    }

    if !registry.is_ready(signer.quorum()) {
        for address in registry.remaining() {
            println!("   ⚠️  No key for {}", address);
        }
        return Err(SignerError::QuorumUnreachable {
            got: registry.bound_count(),
            needed: signer.quorum(),
        }
        .into());
    }

    println!(
        "🗳️  Collecting {} signature(s) for {} from {} signer(s)",
        signer.quorum(),
        signer.address(),
        registry.bound_count()
    );
    print_request(&request)?;

    let response = signer.sign(request).await?;
    write_json(out, &response)?;
    println!("\n✅ Signed response written to {:?}", out);

    if let Some(raw) = raw {
        let batch = response.to_raw_batch()?;
        fs::write(raw, &batch)?;
        println!("📦 Raw batch ({} bytes) written to {:?}", batch.len(), raw);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(dir.path().to_path_buf()).unwrap();
        (dir, state)
    }

    fn addr_list(addrs: &[Address]) -> String {
        addrs
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(ADDR_SEPARATOR)
    }

    #[tokio::test]
    async fn test_sign_convert_merge_flow() {
        let (dir, state) = state();
        let keys: Vec<Address> = (0..3)
            .map(|_| state.key_store.create(None).unwrap().address())
            .collect();
        let addrs = addr_list(&keys);
        let account = resolve_multisig(&addrs, 2).unwrap();

        let request = dir.path().join("request.json");
        cmd_txn(
            PaymentParams {
                sender: account.address(),
                receivers: vec![keys[2]],
                amount: 5000,
                first_valid: 10,
                last_valid: None,
                fee: None,
                genesis_id: Some("testnet-v1".to_string()),
                note: None,
            },
            &request,
        )
        .unwrap();

        // A signs natively, B signs plainly and is converted afterwards
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");
        let b_converted = dir.path().join("b_converted.json");
        cmd_sign(&state, &keys[0], &request, Some((addrs.as_str(), 2)), None, &a)
            .await
            .unwrap();
        cmd_sign(&state, &keys[1], &request, None, None, &b)
            .await
            .unwrap();
        cmd_convert(&b, &addrs, 2, &b_converted).unwrap();

        let merged = dir.path().join("merged.json");
        cmd_merge(&[a, b_converted], &merged).unwrap();
        cmd_verify(&merged).unwrap();

        let response: SignResponse = read_json(&merged).unwrap();
        let stx = response.signed_transactions().unwrap().remove(0).unwrap();
        assert!(verify_multisig(&stx).unwrap());
    }

    #[tokio::test]
    async fn test_quorum_from_key_files() {
        let (dir, state) = state();
        let keys: Vec<Address> = (0..2)
            .map(|_| state.key_store.create(None).unwrap().address())
            .collect();
        // Not a participant; left unbound
        state.key_store.create(Some("outsider")).unwrap();

        let addrs = addr_list(&keys);
        let account = resolve_multisig(&addrs, 2).unwrap();
        let request = dir.path().join("request.json");
        write_json(
            &request,
            &SignRequest::from_transactions(&[Transaction::payment(
                account.address(),
                account.address(),
                1,
                1,
            )])
            .unwrap(),
        )
        .unwrap();

        let out = dir.path().join("signed.json");
        let raw = dir.path().join("signed.bin");
        cmd_quorum(
            &state,
            &request,
            &addrs,
            2,
            false,
            QuorumConfig::default(),
            &out,
            Some(&raw),
        )
        .await
        .unwrap();

        let response: SignResponse = read_json(&out).unwrap();
        assert_eq!(fs::read(&raw).unwrap(), response.to_raw_batch().unwrap());
        let stx = response.signed_transactions().unwrap().remove(0).unwrap();
        assert!(verify_multisig(&stx).unwrap());
    }

    #[tokio::test]
    async fn test_quorum_without_enough_keys() {
        let (dir, state) = state();
        let mine = state.key_store.create(None).unwrap().address();
        let missing = crate::crypto::KeyPair::generate().address();
        let addrs = addr_list(&[mine, missing]);

        let request = dir.path().join("request.json");
        write_json(&request, &SignRequest::default()).unwrap();

        let result = cmd_quorum(
            &state,
            &request,
            &addrs,
            2,
            true,
            QuorumConfig::default(),
            &dir.path().join("out.json"),
            None,
        )
        .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_convert_requires_multisig() {
        let (dir, _state) = state();
        let single = crate::crypto::KeyPair::generate().address().to_string();
        let result = cmd_convert(
            &dir.path().join("missing.json"),
            &single,
            1,
            &dir.path().join("out.json"),
        );
        assert!(result.is_err());
    }
}
