//! APDU command and answer framing.
use crate::TransportError;

/// Status word for a successful command.
pub const SW_OK: u16 = 0x9000;

/// Maximum payload carried by a single chunk.
pub const CHUNK_SIZE: usize = 250;

/// First chunk of a chunked payload.
pub const P1_INIT: u8 = 0x00;
/// Intermediate chunk of a chunked payload.
pub const P1_ADD: u8 = 0x01;
/// Final chunk of a chunked payload.
pub const P1_LAST: u8 = 0x02;

/// Command sent to a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduCommand {
    /// Instruction class.
    pub cla: u8,
    /// Instruction code.
    pub ins: u8,
    /// First parameter.
    pub p1: u8,
    /// Second parameter.
    pub p2: u8,
    /// Command payload.
    pub data: Vec<u8>,
}

impl ApduCommand {
    /// Create a command.
    pub fn new(
        cla: u8,
        ins: u8,
        p1: u8,
        p2: u8,
        data: Vec<u8>,
    ) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data,
        }
    }

    /// Split a payload into a sequence of commands.
    ///
    /// The `head` is sent alone in the `INIT` chunk, the payload
    /// follows in chunks of at most [CHUNK_SIZE] bytes and the last
    /// chunk is always flagged `LAST`, even when the payload is empty.
    pub fn chunked(
        cla: u8,
        ins: u8,
        p2: u8,
        head: Vec<u8>,
        payload: &[u8],
    ) -> Vec<Self> {
        let mut parts = vec![head];
        parts.extend(payload.chunks(CHUNK_SIZE).map(|c| c.to_vec()));
        if parts.len() == 1 {
            parts.push(Vec::new());
        }

        let last = parts.len() - 1;
        parts
            .into_iter()
            .enumerate()
            .map(|(index, data)| {
                let p1 = match index {
                    0 => P1_INIT,
                    i if i == last => P1_LAST,
                    _ => P1_ADD,
                };
                Self::new(cla, ins, p1, p2, data)
            })
            .collect()
    }
}

/// Answer returned by a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduAnswer {
    /// Response payload without the status word.
    pub data: Vec<u8>,
    /// Status word.
    pub status: u16,
}

impl ApduAnswer {
    /// Successful answer.
    pub fn ok(data: Vec<u8>) -> Self {
        Self { data, status: SW_OK }
    }

    /// Answer carrying only an error status word.
    pub fn status(status: u16) -> Self {
        Self {
            data: Vec::new(),
            status,
        }
    }

    /// Payload of a successful answer.
    pub fn into_result(self) -> Result<Vec<u8>, TransportError> {
        if self.status == SW_OK {
            Ok(self.data)
        } else {
            Err(TransportError::Status(self.status))
        }
    }
}
