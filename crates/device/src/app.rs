//! Commands understood by the device dashboard and the Iron Fish
//! signing application.
//!
//! Each function performs one logical request on a borrowed
//! [DeviceSession] and is expected to run inside a queued operation.
use crate::{
    apdu::ApduCommand, DeviceSession, Error, Identity, Result,
    Signature, SignatureShare, SigningCommitment, SigningPackage,
    TxHash, UnsignedTransaction,
};

/// Instruction class of the dashboard.
pub const CLA_DASHBOARD: u8 = 0xb0;
/// Query the running application name and version.
pub const INS_APP_INFO: u8 = 0x01;

/// Instruction class of the signing application.
pub const CLA_APP: u8 = 0x59;
/// Application version.
pub const INS_GET_VERSION: u8 = 0x00;
/// Public keys for a derivation path.
pub const INS_GET_KEYS: u8 = 0x01;
/// Single key transaction signature.
pub const INS_SIGN: u8 = 0x02;
/// Threshold identity derivation.
pub const INS_DKG_GET_IDENTITY: u8 = 0x10;
/// Signing commitment for a reviewed transaction.
pub const INS_DKG_GET_COMMITMENTS: u8 = 0x14;
/// Signature share for a signing package.
pub const INS_DKG_SIGN: u8 = 0x15;
/// Display an unsigned transaction for approval.
pub const INS_DKG_REVIEW_TX: u8 = 0x1a;

/// Key type selecting the public address in `GET_KEYS`.
pub const KEY_TYPE_ADDRESS: u8 = 0x00;

/// Names reported by the signing application.
pub const APP_NAMES: [&str; 2] = ["Ironfish", "Ironfish DKG"];

const HARDENED: u32 = 0x8000_0000;
const COIN_TYPE: u32 = 1338;
const PUBLIC_ADDRESS_LENGTH: usize = 32;

/// Application running on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    /// Application name.
    pub name: String,
    /// Application version.
    pub version: String,
}

impl AppInfo {
    /// Whether the running application is the signing application.
    pub fn is_signing_app(&self) -> bool {
        APP_NAMES.contains(&self.name.as_str())
    }
}

/// Version of the signing application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppVersion {
    /// Whether the application was built in test mode.
    pub test_mode: bool,
    /// Major version.
    pub major: u16,
    /// Minor version.
    pub minor: u16,
    /// Patch version.
    pub patch: u16,
}

/// Serialized derivation path `m/44'/1338'/<account>'/0'/0'`.
pub fn account_path(account: u32) -> Vec<u8> {
    [44, COIN_TYPE, account, 0, 0]
        .into_iter()
        .flat_map(|n| (n | HARDENED).to_le_bytes())
        .collect()
}

/// Query the running application from the dashboard.
pub fn app_info(session: &mut DeviceSession) -> Result<AppInfo> {
    let data = session.exchange(&ApduCommand::new(
        CLA_DASHBOARD,
        INS_APP_INFO,
        0,
        0,
        vec![],
    ))?;
    parse_app_info(&data)
}

/// Query the signing application version.
pub fn app_version(session: &mut DeviceSession) -> Result<AppVersion> {
    let data = session.exchange(&ApduCommand::new(
        CLA_APP,
        INS_GET_VERSION,
        0,
        0,
        vec![],
    ))?;
    if data.len() < 7 {
        return Err(invalid("app version", "short response"));
    }
    let read = |i: usize| u16::from_be_bytes([data[i], data[i + 1]]);
    Ok(AppVersion {
        test_mode: data[0] != 0,
        major: read(1),
        minor: read(3),
        patch: read(5),
    })
}

/// Public address of an account, hex encoded.
pub fn public_address(
    session: &mut DeviceSession,
    account: u32,
) -> Result<String> {
    let data = session.exchange(&ApduCommand::new(
        CLA_APP,
        INS_GET_KEYS,
        0,
        KEY_TYPE_ADDRESS,
        account_path(account),
    ))?;
    if data.len() < PUBLIC_ADDRESS_LENGTH {
        return Err(invalid("public address", "short response"));
    }
    Ok(hex::encode(&data[..PUBLIC_ADDRESS_LENGTH]))
}

/// Derive the threshold identity at an index.
pub fn derive_identity(
    session: &mut DeviceSession,
    index: u8,
) -> Result<Identity> {
    let data = session.exchange(&ApduCommand::new(
        CLA_APP,
        INS_DKG_GET_IDENTITY,
        0,
        0,
        vec![index],
    ))?;
    Identity::from_bytes(data)
        .map_err(|e| invalid("derive identity", e.to_string()))
}

/// Show a transaction on the device and wait for the operator.
pub fn review_transaction(
    session: &mut DeviceSession,
    account: u32,
    transaction: &UnsignedTransaction,
) -> Result<TxHash> {
    let data = session.exchange_chunks(&ApduCommand::chunked(
        CLA_APP,
        INS_DKG_REVIEW_TX,
        0,
        account_path(account),
        transaction.as_bytes(),
    ))?;
    TxHash::from_bytes(data)
        .map_err(|e| invalid("review transaction", e.to_string()))
}

/// Signing commitment for a reviewed transaction.
pub fn signing_commitment(
    session: &mut DeviceSession,
    account: u32,
    tx_hash: &TxHash,
) -> Result<SigningCommitment> {
    let data = session.exchange_chunks(&ApduCommand::chunked(
        CLA_APP,
        INS_DKG_GET_COMMITMENTS,
        0,
        account_path(account),
        tx_hash.as_bytes(),
    ))?;
    SigningCommitment::from_bytes(data)
        .map_err(|e| invalid("signing commitment", e.to_string()))
}

/// Signature share over a signing package.
pub fn signature_share(
    session: &mut DeviceSession,
    account: u32,
    package: &SigningPackage,
    identity: &Identity,
) -> Result<SignatureShare> {
    let mut payload = identity.as_bytes().to_vec();
    payload.extend_from_slice(package.as_bytes());
    let data = session.exchange_chunks(&ApduCommand::chunked(
        CLA_APP,
        INS_DKG_SIGN,
        0,
        account_path(account),
        &payload,
    ))?;
    SignatureShare::from_bytes(data)
        .map_err(|e| invalid("signature share", e.to_string()))
}

/// Sign a transaction with the single device key.
pub fn sign_transaction(
    session: &mut DeviceSession,
    account: u32,
    transaction: &UnsignedTransaction,
) -> Result<Signature> {
    let data = session.exchange_chunks(&ApduCommand::chunked(
        CLA_APP,
        INS_SIGN,
        0,
        account_path(account),
        transaction.as_bytes(),
    ))?;
    Signature::from_bytes(data)
        .map_err(|e| invalid("sign transaction", e.to_string()))
}

fn parse_app_info(data: &[u8]) -> Result<AppInfo> {
    let mut reader = data.iter().copied();
    if reader.next() != Some(1) {
        return Err(invalid("app info", "unknown format"));
    }
    let name = read_string(&mut reader)
        .ok_or_else(|| invalid("app info", "truncated name"))?;
    let version = read_string(&mut reader)
        .ok_or_else(|| invalid("app info", "truncated version"))?;
    Ok(AppInfo { name, version })
}

fn read_string(
    reader: &mut impl Iterator<Item = u8>,
) -> Option<String> {
    let len = reader.next()? as usize;
    let bytes: Vec<u8> = reader.take(len).collect();
    if bytes.len() != len {
        return None;
    }
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

fn invalid(
    operation: &'static str,
    reason: impl Into<String>,
) -> Error {
    Error::InvalidResponse {
        operation,
        reason: reason.into(),
    }
}
