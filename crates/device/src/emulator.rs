//! In-process device emulating the Iron Fish signing application.
//!
//! The emulator answers the same APDUs as a real device and derives
//! every artifact deterministically from a seed with SHA-256 so
//! tests can predict identities, transaction hashes and signature
//! shares. It is not a cryptographic implementation.
use sha2::{Digest, Sha256};
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread,
    time::Duration,
};

use crate::{
    apdu::{ApduAnswer, ApduCommand, P1_ADD, P1_INIT, P1_LAST},
    app::{
        CLA_APP, CLA_DASHBOARD, INS_APP_INFO, INS_DKG_GET_COMMITMENTS,
        INS_DKG_GET_IDENTITY, INS_DKG_REVIEW_TX, INS_DKG_SIGN,
        INS_GET_KEYS, INS_GET_VERSION, INS_SIGN,
    },
    Connector, DecodeError, DeviceInfo, Identity, SignatureShare,
    SigningPackage, Transport, TransportError, TxHash,
};

const SW_CONDITIONS_NOT_SATISFIED: u16 = 0x6985;
const SW_DENIED: u16 = 0x6986;
const SW_DATA_INVALID: u16 = 0x6984;
const SW_LOCKED: u16 = 0x5515;
const SW_APP_NOT_OPEN: u16 = 0x6e01;
const SW_CLA_NOT_SUPPORTED: u16 = 0x6e00;
const SW_INS_NOT_SUPPORTED: u16 = 0x6d00;

const IDENTITY_LENGTH: usize = 129;

/// What the emulated device is doing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Presence {
    /// Unplugged.
    Absent,
    /// Plugged in but the port is held by another program.
    PortBusy,
    /// Plugged in with the screen locked.
    Locked,
    /// Unlocked on the dashboard.
    Dashboard,
    /// Signing application open.
    #[default]
    AppOpen,
}

struct Pending {
    ins: u8,
    payload: Vec<u8>,
}

#[derive(Default)]
struct State {
    presence: Presence,
    delay: Duration,
    reject_reviews: bool,
    reviewed: Option<Vec<u8>>,
    pending: Option<Pending>,
    opens: usize,
    exchanges: usize,
    in_flight: usize,
    max_in_flight: usize,
}

struct Inner {
    seed: [u8; 32],
    state: Mutex<State>,
}

/// Emulated device shared between the test and its transports.
#[derive(Clone)]
pub struct DeviceEmulator {
    inner: Arc<Inner>,
}

impl DeviceEmulator {
    /// Create an emulator with the signing application open.
    pub fn new(seed: [u8; 32]) -> Self {
        Self {
            inner: Arc::new(Inner {
                seed,
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Connector opening transports to this emulator.
    pub fn connector(&self) -> Box<dyn Connector> {
        Box::new(EmulatedConnector {
            device: self.clone(),
        })
    }

    /// Label reported when a transport is opened.
    pub fn label(&self) -> String {
        "Nano X (emulated)".to_string()
    }

    /// Change what the device is doing.
    pub fn set_presence(&self, presence: Presence) {
        let mut state = self.state();
        state.presence = presence;
        if presence != Presence::AppOpen {
            // leaving the app discards its state
            state.reviewed = None;
            state.pending = None;
        }
    }

    /// Current presence.
    pub fn presence(&self) -> Presence {
        self.state().presence
    }

    /// Delay applied to every exchange.
    pub fn set_delay(&self, delay: Duration) {
        self.state().delay = delay;
    }

    /// Make the operator reject transaction reviews.
    pub fn set_reject_reviews(&self, reject: bool) {
        self.state().reject_reviews = reject;
    }

    /// Number of transports opened.
    pub fn opens(&self) -> usize {
        self.state().opens
    }

    /// Number of commands exchanged.
    pub fn exchanges(&self) -> usize {
        self.state().exchanges
    }

    /// Highest number of overlapping exchanges observed.
    pub fn max_in_flight(&self) -> usize {
        self.state().max_in_flight
    }

    /// Hash of the last approved review.
    pub fn reviewed_hash(&self) -> Option<Vec<u8>> {
        self.state().reviewed.clone()
    }

    /// Threshold identity derived at an index.
    pub fn identity(&self, index: u8) -> Result<Identity, DecodeError> {
        Identity::from_bytes(self.identity_bytes(index))
    }

    /// Hex encoded public address of an account.
    pub fn public_address(&self, account: u32) -> String {
        hex::encode(digest(&[
            b"address",
            &self.inner.seed,
            &account.to_le_bytes(),
        ]))
    }

    /// Hash computed when reviewing a transaction.
    pub fn transaction_hash(
        transaction: &[u8],
    ) -> Result<TxHash, DecodeError> {
        TxHash::from_bytes(
            digest(&[b"transaction", transaction]).to_vec(),
        )
    }

    /// Signature share produced for a package and identity after the
    /// transaction with `tx_hash` was reviewed.
    pub fn expected_share(
        package: &SigningPackage,
        identity: &Identity,
        tx_hash: &TxHash,
    ) -> Result<SignatureShare, DecodeError> {
        SignatureShare::from_bytes(share_bytes(
            package.as_bytes(),
            identity.as_bytes(),
            tx_hash.as_bytes(),
        ))
    }

    fn identity_bytes(&self, index: u8) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(IDENTITY_LENGTH + 32);
        let mut counter = 0u8;
        while bytes.len() < IDENTITY_LENGTH {
            bytes.extend_from_slice(&digest(&[
                b"identity",
                &self.inner.seed,
                &[index, counter],
            ]));
            counter += 1;
        }
        bytes.truncate(IDENTITY_LENGTH);
        bytes
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn open(&self) -> Result<(), TransportError> {
        let mut state = self.state();
        match state.presence {
            Presence::Absent => Err(TransportError::Discovery {
                id: "NoDeviceFound".to_string(),
                message: "no ledger device found".to_string(),
            }),
            Presence::PortBusy => Err(TransportError::Other(
                "cannot open device with path /dev/hidraw0".to_string(),
            )),
            _ => {
                state.opens += 1;
                Ok(())
            }
        }
    }

    fn exchange(
        &self,
        command: &ApduCommand,
    ) -> Result<ApduAnswer, TransportError> {
        let delay = {
            let mut state = self.state();
            state.exchanges += 1;
            state.in_flight += 1;
            state.max_in_flight =
                state.max_in_flight.max(state.in_flight);
            state.delay
        };
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let mut state = self.state();
        state.in_flight -= 1;
        self.respond(&mut state, command)
    }

    fn respond(
        &self,
        state: &mut State,
        command: &ApduCommand,
    ) -> Result<ApduAnswer, TransportError> {
        let answer = match state.presence {
            Presence::Absent => {
                return Err(TransportError::Other(
                    "device disconnected".to_string(),
                ))
            }
            Presence::Locked => ApduAnswer::status(SW_LOCKED),
            Presence::Dashboard => {
                if command.cla == CLA_DASHBOARD
                    && command.ins == INS_APP_INFO
                {
                    ApduAnswer::ok(app_info("BOLOS", "2.2.3"))
                } else {
                    ApduAnswer::status(SW_APP_NOT_OPEN)
                }
            }
            // an open handle keeps working while the port is busy
            Presence::PortBusy | Presence::AppOpen => {
                self.respond_app(state, command)
            }
        };
        Ok(answer)
    }

    fn respond_app(
        &self,
        state: &mut State,
        command: &ApduCommand,
    ) -> ApduAnswer {
        if command.cla == CLA_DASHBOARD && command.ins == INS_APP_INFO {
            return ApduAnswer::ok(app_info("Ironfish DKG", "1.2.0"));
        }
        if command.cla != CLA_APP {
            return ApduAnswer::status(SW_CLA_NOT_SUPPORTED);
        }

        match command.ins {
            INS_GET_VERSION => {
                ApduAnswer::ok(vec![0, 0, 1, 0, 2, 0, 0])
            }
            INS_GET_KEYS => match account_of(&command.data) {
                Some(account) => {
                    let address = self.public_address(account);
                    match hex::decode(address) {
                        Ok(bytes) => ApduAnswer::ok(bytes),
                        Err(_) => ApduAnswer::status(SW_DATA_INVALID),
                    }
                }
                None => ApduAnswer::status(SW_DATA_INVALID),
            },
            INS_DKG_GET_IDENTITY => match command.data.first() {
                Some(index) => {
                    ApduAnswer::ok(self.identity_bytes(*index))
                }
                None => ApduAnswer::status(SW_DATA_INVALID),
            },
            INS_DKG_REVIEW_TX | INS_DKG_GET_COMMITMENTS | INS_DKG_SIGN
            | INS_SIGN => self.chunk(state, command),
            _ => ApduAnswer::status(SW_INS_NOT_SUPPORTED),
        }
    }

    fn chunk(
        &self,
        state: &mut State,
        command: &ApduCommand,
    ) -> ApduAnswer {
        match command.p1 {
            P1_INIT => {
                state.pending = Some(Pending {
                    ins: command.ins,
                    payload: Vec::new(),
                });
                ApduAnswer::ok(Vec::new())
            }
            P1_ADD | P1_LAST => {
                let Some(pending) = state.pending.as_mut() else {
                    return ApduAnswer::status(
                        SW_CONDITIONS_NOT_SATISFIED,
                    );
                };
                if pending.ins != command.ins {
                    state.pending = None;
                    return ApduAnswer::status(SW_DATA_INVALID);
                }
                pending.payload.extend_from_slice(&command.data);
                if command.p1 == P1_ADD {
                    return ApduAnswer::ok(Vec::new());
                }
                match state.pending.take() {
                    Some(pending) => self.complete(state, pending),
                    None => {
                        ApduAnswer::status(SW_CONDITIONS_NOT_SATISFIED)
                    }
                }
            }
            _ => ApduAnswer::status(SW_DATA_INVALID),
        }
    }

    fn complete(
        &self,
        state: &mut State,
        pending: Pending,
    ) -> ApduAnswer {
        let payload = pending.payload;
        match pending.ins {
            INS_DKG_REVIEW_TX => {
                if state.reject_reviews {
                    return ApduAnswer::status(SW_DENIED);
                }
                let hash = digest(&[b"transaction", &payload]).to_vec();
                state.reviewed = Some(hash.clone());
                ApduAnswer::ok(hash)
            }
            INS_DKG_GET_COMMITMENTS => {
                if state.reviewed.as_deref() != Some(payload.as_slice())
                {
                    return ApduAnswer::status(
                        SW_CONDITIONS_NOT_SATISFIED,
                    );
                }
                ApduAnswer::ok(
                    digest(&[b"commitment", &self.inner.seed, &payload])
                        .to_vec(),
                )
            }
            INS_DKG_SIGN => {
                let Some(reviewed) = state.reviewed.as_deref() else {
                    return ApduAnswer::status(
                        SW_CONDITIONS_NOT_SATISFIED,
                    );
                };
                if payload.len() <= IDENTITY_LENGTH {
                    return ApduAnswer::status(SW_DATA_INVALID);
                }
                let (identity, package) =
                    payload.split_at(IDENTITY_LENGTH);
                ApduAnswer::ok(share_bytes(package, identity, reviewed))
            }
            INS_SIGN => {
                let mut signature = digest(&[
                    b"signature-r",
                    &self.inner.seed,
                    &payload,
                ])
                .to_vec();
                signature.extend_from_slice(&digest(&[
                    b"signature-s",
                    &self.inner.seed,
                    &payload,
                ]));
                ApduAnswer::ok(signature)
            }
            _ => ApduAnswer::status(SW_INS_NOT_SUPPORTED),
        }
    }
}

struct EmulatedConnector {
    device: DeviceEmulator,
}

impl Connector for EmulatedConnector {
    fn open(
        &mut self,
    ) -> Result<(Box<dyn Transport>, DeviceInfo), TransportError> {
        self.device.open()?;
        Ok((
            Box::new(EmulatedTransport {
                device: self.device.clone(),
            }),
            DeviceInfo {
                label: self.device.label(),
            },
        ))
    }
}

struct EmulatedTransport {
    device: DeviceEmulator,
}

impl Transport for EmulatedTransport {
    fn exchange(
        &mut self,
        command: &ApduCommand,
    ) -> Result<ApduAnswer, TransportError> {
        self.device.exchange(command)
    }
}

fn digest(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

fn share_bytes(
    package: &[u8],
    identity: &[u8],
    tx_hash: &[u8],
) -> Vec<u8> {
    digest(&[b"share", package, identity, tx_hash]).to_vec()
}

fn app_info(name: &str, version: &str) -> Vec<u8> {
    let mut data = vec![1, name.len() as u8];
    data.extend_from_slice(name.as_bytes());
    data.push(version.len() as u8);
    data.extend_from_slice(version.as_bytes());
    data.extend_from_slice(&[1, 0]);
    data
}

fn account_of(path: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = path.get(8..12)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes) & 0x7fff_ffff)
}
