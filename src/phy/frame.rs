// 802.15.4 data frames with 16-bit addressing, little-endian on the wire:
// [FCF:2] [seq:1] [dest PAN:2] [dest:2] [src PAN:2] [src:2] [payload] [FCS:2]

use super::crc::{calculate_fcs, verify_fcs};
use crate::utils::consts::{
    DEFAULT_DEST_ADDR, DEFAULT_DEST_PAN, DEFAULT_SRC_ADDR, DEFAULT_SRC_PAN, FCS_BYTES,
    MAX_PSDU_BYTES, PREAMBLE_BYTES, SFD,
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("payload of {got} bytes overflows the 7-bit PHR (max {max})")]
    PayloadTooLong { got: usize, max: usize },
    #[error("frame truncated at {0} bytes")]
    Truncated(usize),
    #[error("frame check sequence mismatch: frame carries {carried:#06x}, computed {computed:#06x}")]
    FcsMismatch { carried: u16, computed: u16 },
    #[error("unsupported frame type {0:#05b}")]
    UnsupportedType(u8),
    #[error("unsupported addressing mode {0:#04b} (only 16-bit addresses)")]
    UnsupportedAddressing(u8),
    #[error("missing start-of-frame delimiter")]
    NoDelimiter,
    #[error("PHR announces {phr} PSDU bytes but {actual} follow")]
    LengthMismatch { phr: usize, actual: usize },
}

// FCF bit positions
const FCF_TYPE_MASK: u16 = 0x0007;
const FCF_PAN_COMPRESSION: u16 = 0x0040;
const FCF_DEST_MODE_SHIFT: u16 = 10;
const FCF_SRC_MODE_SHIFT: u16 = 14;
const ADDR_MODE_SHORT: u16 = 0b10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Beacon = 0,
    Data = 1,
    Ack = 2,
    MacCommand = 3,
}

impl FrameType {
    pub fn from_bits(value: u8) -> Option<Self> {
        match value {
            0 => Some(FrameType::Beacon),
            1 => Some(FrameType::Data),
            2 => Some(FrameType::Ack),
            3 => Some(FrameType::MacCommand),
            _ => None,
        }
    }

    pub fn to_bits(self) -> u8 {
        self as u8
    }
}

/// MAC frame with the short-address layout the tag transmits
#[derive(Debug, Clone, PartialEq)]
pub struct MacFrame {
    pub frame_type: FrameType,
    pub sequence: u8,
    pub dest_pan: u16,
    pub dest_addr: u16,
    pub src_pan: u16,
    pub src_addr: u16,
    pub pan_compression: bool,
    pub payload: Vec<u8>,
}

impl MacFrame {
    pub fn new(
        frame_type: FrameType,
        sequence: u8,
        dest_pan: u16,
        dest_addr: u16,
        src_pan: u16,
        src_addr: u16,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            frame_type,
            sequence,
            dest_pan,
            dest_addr,
            src_pan,
            src_addr,
            pan_compression: false,
            payload,
        }
    }

    /// Data frame with the addressing the tag firmware uses for its test
    /// packets
    pub fn new_data(sequence: u8, payload: Vec<u8>) -> Self {
        Self::new(
            FrameType::Data,
            sequence,
            DEFAULT_DEST_PAN,
            DEFAULT_DEST_ADDR,
            DEFAULT_SRC_PAN,
            DEFAULT_SRC_ADDR,
            payload,
        )
    }

    fn header_len(&self) -> usize {
        // FCF + seq + dest PAN + dest + [src PAN] + src
        if self.pan_compression { 9 } else { 11 }
    }

    /// Largest payload that still fits the 7-bit PHR
    pub fn max_payload(&self) -> usize {
        MAX_PSDU_BYTES - FCS_BYTES - self.header_len()
    }

    fn fcf(&self) -> u16 {
        let mut fcf = u16::from(self.frame_type.to_bits()) & FCF_TYPE_MASK;
        if self.pan_compression {
            fcf |= FCF_PAN_COMPRESSION;
        }
        fcf |= ADDR_MODE_SHORT << FCF_DEST_MODE_SHIFT;
        fcf |= ADDR_MODE_SHORT << FCF_SRC_MODE_SHIFT;
        fcf
    }

    /// Serialize to the PSDU: header, payload, FCS
    pub fn to_psdu(&self) -> Result<Vec<u8>, FrameError> {
        if self.payload.len() > self.max_payload() {
            return Err(FrameError::PayloadTooLong {
                got: self.payload.len(),
                max: self.max_payload(),
            });
        }

        let mut bytes = Vec::with_capacity(self.header_len() + self.payload.len() + FCS_BYTES);
        bytes.extend_from_slice(&self.fcf().to_le_bytes());
        bytes.push(self.sequence);
        bytes.extend_from_slice(&self.dest_pan.to_le_bytes());
        bytes.extend_from_slice(&self.dest_addr.to_le_bytes());
        if !self.pan_compression {
            bytes.extend_from_slice(&self.src_pan.to_le_bytes());
        }
        bytes.extend_from_slice(&self.src_addr.to_le_bytes());
        bytes.extend_from_slice(&self.payload);

        let fcs = calculate_fcs(&bytes);
        bytes.extend_from_slice(&fcs.to_le_bytes());
        Ok(bytes)
    }

    /// Parse a PSDU and verify its FCS
    pub fn from_psdu(bytes: &[u8]) -> Result<Self, FrameError> {
        // shortest frame: compressed header + FCS
        if bytes.len() < 9 + FCS_BYTES {
            return Err(FrameError::Truncated(bytes.len()));
        }

        let fcf = u16::from_le_bytes([bytes[0], bytes[1]]);
        let type_bits = (fcf & FCF_TYPE_MASK) as u8;
        let frame_type = FrameType::from_bits(type_bits).ok_or(FrameError::UnsupportedType(type_bits))?;

        let dest_mode = (fcf >> FCF_DEST_MODE_SHIFT) & 0b11;
        let src_mode = (fcf >> FCF_SRC_MODE_SHIFT) & 0b11;
        if dest_mode != ADDR_MODE_SHORT {
            return Err(FrameError::UnsupportedAddressing(dest_mode as u8));
        }
        if src_mode != ADDR_MODE_SHORT {
            return Err(FrameError::UnsupportedAddressing(src_mode as u8));
        }

        let pan_compression = fcf & FCF_PAN_COMPRESSION != 0;
        let header_len = if pan_compression { 9 } else { 11 };
        if bytes.len() < header_len + FCS_BYTES {
            return Err(FrameError::Truncated(bytes.len()));
        }

        let sequence = bytes[2];
        let dest_pan = u16::from_le_bytes([bytes[3], bytes[4]]);
        let dest_addr = u16::from_le_bytes([bytes[5], bytes[6]]);
        let (src_pan, src_addr) = if pan_compression {
            (dest_pan, u16::from_le_bytes([bytes[7], bytes[8]]))
        } else {
            (
                u16::from_le_bytes([bytes[7], bytes[8]]),
                u16::from_le_bytes([bytes[9], bytes[10]]),
            )
        };

        let fcs_at = bytes.len() - FCS_BYTES;
        let carried = u16::from_le_bytes([bytes[fcs_at], bytes[fcs_at + 1]]);
        if !verify_fcs(&bytes[..fcs_at], carried) {
            return Err(FrameError::FcsMismatch {
                carried,
                computed: calculate_fcs(&bytes[..fcs_at]),
            });
        }

        Ok(Self {
            frame_type,
            sequence,
            dest_pan,
            dest_addr,
            src_pan,
            src_addr,
            pan_compression,
            payload: bytes[header_len..fcs_at].to_vec(),
        })
    }
}

/// Complete over-the-air frame: preamble, SFD, 7-bit PHR, PSDU
#[derive(Debug, Clone, PartialEq)]
pub struct PhyFrame {
    pub psdu: Vec<u8>,
}

impl PhyFrame {
    pub fn new(mac: &MacFrame) -> Result<Self, FrameError> {
        Ok(Self {
            psdu: mac.to_psdu()?,
        })
    }

    /// Wrap an already-serialized PSDU (e.g. a captured packet)
    pub fn from_raw_psdu(psdu: Vec<u8>) -> Result<Self, FrameError> {
        if psdu.len() > MAX_PSDU_BYTES {
            return Err(FrameError::PayloadTooLong {
                got: psdu.len(),
                max: MAX_PSDU_BYTES,
            });
        }
        Ok(Self { psdu })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(PREAMBLE_BYTES + 2 + self.psdu.len());
        bytes.extend_from_slice(&[0x00; PREAMBLE_BYTES]);
        bytes.push(SFD);
        bytes.push((self.psdu.len() & 0x7F) as u8);
        bytes.extend_from_slice(&self.psdu);
        bytes
    }

    /// Parse a full air frame back into its PSDU
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < PREAMBLE_BYTES + 2 {
            return Err(FrameError::Truncated(bytes.len()));
        }
        if bytes[PREAMBLE_BYTES] != SFD {
            return Err(FrameError::NoDelimiter);
        }

        let phr = usize::from(bytes[PREAMBLE_BYTES + 1] & 0x7F);
        let psdu = &bytes[PREAMBLE_BYTES + 2..];
        if psdu.len() != phr {
            return Err(FrameError::LengthMismatch {
                phr,
                actual: psdu.len(),
            });
        }
        Ok(Self {
            psdu: psdu.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fcf_layout() {
        let frame = MacFrame::new_data(1, vec![]);
        // data type, short/short addressing, no compression
        assert_eq!(frame.fcf(), 0x8801);

        let mut compressed = frame.clone();
        compressed.pan_compression = true;
        assert_eq!(compressed.fcf(), 0x8841);
    }

    #[test]
    fn test_psdu_layout() {
        let frame = MacFrame::new_data(0x0B, vec![0x01, 0x02]);
        let psdu = frame.to_psdu().unwrap();

        assert_eq!(psdu.len(), 11 + 2 + 2);
        assert_eq!(&psdu[..2], &[0x01, 0x88]);
        assert_eq!(psdu[2], 0x0B);
        assert_eq!(&psdu[3..5], &[0x44, 0x44]); // dest PAN LE
        assert_eq!(&psdu[5..7], &[0xCD, 0xAB]); // dest addr LE
        assert_eq!(&psdu[7..9], &[0x22, 0x22]); // src PAN LE
        assert_eq!(&psdu[9..11], &[0x34, 0x12]); // src addr LE
        assert_eq!(&psdu[11..13], &[0x01, 0x02]);
    }

    #[test]
    fn test_psdu_round_trip() {
        let frame = MacFrame::new_data(7, vec![0xDE, 0xAD, 0xBE, 0xEF]);
        let psdu = frame.to_psdu().unwrap();
        assert_eq!(MacFrame::from_psdu(&psdu).unwrap(), frame);
    }

    #[test]
    fn test_compressed_round_trip() {
        let mut frame = MacFrame::new_data(3, vec![0x55; 8]);
        frame.pan_compression = true;
        frame.src_pan = frame.dest_pan; // compression implies a shared PAN
        let psdu = frame.to_psdu().unwrap();
        assert_eq!(psdu.len(), 9 + 8 + 2);
        assert_eq!(MacFrame::from_psdu(&psdu).unwrap(), frame);
    }

    #[test]
    fn test_corruption_detected() {
        let frame = MacFrame::new_data(7, vec![1, 2, 3]);
        let mut psdu = frame.to_psdu().unwrap();
        psdu[12] ^= 0x10;
        assert!(matches!(
            MacFrame::from_psdu(&psdu),
            Err(FrameError::FcsMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated_rejected() {
        assert_eq!(
            MacFrame::from_psdu(&[0x01, 0x88, 0x00]),
            Err(FrameError::Truncated(3))
        );
    }

    #[test]
    fn test_payload_cap() {
        let frame = MacFrame::new_data(1, vec![0xAA; 115]);
        assert_eq!(
            frame.to_psdu(),
            Err(FrameError::PayloadTooLong { got: 115, max: 114 })
        );

        let frame = MacFrame::new_data(1, vec![0xAA; 114]);
        assert_eq!(frame.to_psdu().unwrap().len(), 127);
    }

    #[test]
    fn test_air_frame_layout() {
        let mac = MacFrame::new_data(1, vec![0x0A; 10]);
        let phy = PhyFrame::new(&mac).unwrap();
        let bytes = phy.to_bytes();

        assert_eq!(&bytes[..5], &[0x00, 0x00, 0x00, 0x00, 0xA7]);
        assert_eq!(usize::from(bytes[5]), phy.psdu.len());
        assert_eq!(PhyFrame::from_bytes(&bytes).unwrap(), phy);
    }

    #[test]
    fn test_air_frame_errors() {
        assert_eq!(
            PhyFrame::from_bytes(&[0x00, 0x00, 0x00, 0x00, 0xFF, 0x00]),
            Err(FrameError::NoDelimiter)
        );
        assert_eq!(
            PhyFrame::from_bytes(&[0x00, 0x00, 0x00, 0x00, 0xA7, 0x05, 0x01]),
            Err(FrameError::LengthMismatch { phr: 5, actual: 1 })
        );
    }
}
