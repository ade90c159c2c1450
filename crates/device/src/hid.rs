//! USB HID transport for Ledger devices.
use ledger_apdu::APDUCommand;
use ledger_transport_hid::{
    hidapi::HidApi, LedgerHIDError, TransportNativeHID,
};

use crate::{
    apdu::{ApduAnswer, ApduCommand},
    Connector, DeviceInfo, Transport, TransportError,
};

/// Opens the first Ledger device attached over USB.
#[derive(Default)]
pub struct HidConnector {
    api: Option<HidApi>,
}

impl HidConnector {
    /// Create a connector; the HID context is created on first use.
    pub fn new() -> Self {
        Self::default()
    }

    fn api(&mut self) -> Result<&HidApi, TransportError> {
        match &mut self.api {
            Some(api) => {
                api.refresh_devices().map_err(hid_error)?;
            }
            None => {
                self.api = Some(HidApi::new().map_err(hid_error)?);
            }
        }
        self.api
            .as_ref()
            .ok_or_else(|| {
                TransportError::Other("hid unavailable".into())
            })
    }
}

impl Connector for HidConnector {
    fn open(
        &mut self,
    ) -> Result<(Box<dyn Transport>, DeviceInfo), TransportError> {
        let api = self.api()?;
        let device = TransportNativeHID::list_ledgers(api)
            .next()
            .ok_or_else(|| TransportError::Discovery {
                id: "NoDeviceFound".to_string(),
                message: "no ledger device found".to_string(),
            })?;
        let label = device
            .product_string()
            .unwrap_or("Ledger")
            .to_string();
        let transport = TransportNativeHID::open_device(api, device)
            .map_err(ledger_error)?;
        tracing::debug!(label = %label, "hid device opened");
        Ok((Box::new(HidTransport { transport }), DeviceInfo { label }))
    }
}

struct HidTransport {
    transport: TransportNativeHID,
}

impl Transport for HidTransport {
    fn exchange(
        &mut self,
        command: &ApduCommand,
    ) -> Result<ApduAnswer, TransportError> {
        let command = APDUCommand {
            cla: command.cla,
            ins: command.ins,
            p1: command.p1,
            p2: command.p2,
            data: command.data.as_slice(),
        };
        let answer =
            self.transport.exchange(&command).map_err(ledger_error)?;
        Ok(ApduAnswer {
            data: answer.data().to_vec(),
            status: answer.retcode(),
        })
    }
}

fn hid_error(e: impl std::fmt::Display) -> TransportError {
    TransportError::Other(e.to_string())
}

fn ledger_error(e: LedgerHIDError) -> TransportError {
    match e {
        LedgerHIDError::DeviceNotFound => TransportError::Discovery {
            id: "DeviceNotFound".to_string(),
            message: e.to_string(),
        },
        other => TransportError::Other(other.to_string()),
    }
}
