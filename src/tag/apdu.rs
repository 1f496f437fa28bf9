// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use alloc::vec::Vec;
use byteorder::{BigEndian, ByteOrder};
use core::convert::TryFrom;
#[cfg(test)]
use enum_iterator::IntoEnumIterator;

pub const APDU_HEADER_LEN: usize = 4;
pub const APDU_STATUS_LEN: usize = 2;

// Largest expected length of a short APDU, encoded as 0x00.
const SHORT_LE_MAX: u32 = 0x100;
// Largest expected length of an extended APDU, encoded as 0x0000.
const EXTENDED_LE_MAX: u32 = 0x10000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(IntoEnumIterator))]
#[allow(non_camel_case_types)]
pub enum ApduStatusCode {
    SW_SUCCESS = 0x90_00,
    SW_WRONG_LENGTH = 0x67_00,
    SW_SECURE_MESSAGING_NOT_SUPPORTED = 0x68_82,
    /// Access to the file is denied by its access policy.
    SW_SECURITY_STATUS_NOT_SATISFIED = 0x69_82,
    SW_DATA_INVALID = 0x69_84,
    /// No file is selected.
    SW_COND_USE_NOT_SATISFIED = 0x69_85,
    SW_COMMAND_NOT_ALLOWED = 0x69_86,
    SW_WRONG_DATA = 0x6a_80,
    SW_FUNC_NOT_SUPPORTED = 0x6a_81,
    SW_FILE_NOT_FOUND = 0x6a_82,
    SW_INCORRECT_P1P2 = 0x6a_86,
    /// Offset outside of the selected file.
    SW_WRONG_P1P2 = 0x6b_00,
    /// Instruction code not supported or invalid
    SW_INS_INVALID = 0x6d_00,
    SW_CLA_INVALID = 0x6e_00,
    SW_INTERNAL_EXCEPTION = 0x6f_00,
}

impl From<ApduStatusCode> for u16 {
    fn from(code: ApduStatusCode) -> Self {
        code as u16
    }
}

impl TryFrom<u16> for ApduStatusCode {
    type Error = u16;

    fn try_from(status_word: u16) -> Result<Self, u16> {
        use ApduStatusCode::*;
        let code = match status_word {
            0x90_00 => SW_SUCCESS,
            0x67_00 => SW_WRONG_LENGTH,
            0x68_82 => SW_SECURE_MESSAGING_NOT_SUPPORTED,
            0x69_82 => SW_SECURITY_STATUS_NOT_SATISFIED,
            0x69_84 => SW_DATA_INVALID,
            0x69_85 => SW_COND_USE_NOT_SATISFIED,
            0x69_86 => SW_COMMAND_NOT_ALLOWED,
            0x6a_80 => SW_WRONG_DATA,
            0x6a_81 => SW_FUNC_NOT_SUPPORTED,
            0x6a_82 => SW_FILE_NOT_FOUND,
            0x6a_86 => SW_INCORRECT_P1P2,
            0x6b_00 => SW_WRONG_P1P2,
            0x6d_00 => SW_INS_INVALID,
            0x6e_00 => SW_CLA_INVALID,
            0x6f_00 => SW_INTERNAL_EXCEPTION,
            _ => return Err(status_word),
        };
        Ok(code)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApduInstructions {
    Select = 0xA4,
    ReadBinary = 0xB0,
    UpdateBinary = 0xD6,
}

impl TryFrom<u8> for ApduInstructions {
    type Error = ApduStatusCode;

    fn try_from(ins: u8) -> Result<Self, ApduStatusCode> {
        match ins {
            0xA4 => Ok(ApduInstructions::Select),
            0xB0 => Ok(ApduInstructions::ReadBinary),
            0xD6 => Ok(ApduInstructions::UpdateBinary),
            _ => Err(ApduStatusCode::SW_INS_INVALID),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApduHeader {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
}

impl From<&[u8; APDU_HEADER_LEN]> for ApduHeader {
    fn from(header: &[u8; APDU_HEADER_LEN]) -> Self {
        ApduHeader {
            cla: header[0],
            ins: header[1],
            p1: header[2],
            p2: header[3],
        }
    }
}

impl ApduHeader {
    /// Returns whether the class byte follows the ISO 7816-4 interindustry coding.
    pub fn is_interindustry(&self) -> bool {
        self.cla & 0x80 == 0
    }

    /// Returns whether the class byte announces secure messaging.
    ///
    /// The first interindustry range (CLA 0x00 to 0x3F) codes secure messaging in bits 4 and 3,
    /// the further interindustry range (CLA 0x40 to 0x7F) in bit 6.
    pub fn is_secure_messaging(&self) -> bool {
        if self.cla & 0x40 == 0 {
            self.cla & 0x0C != 0
        } else {
            self.cla & 0x20 != 0
        }
    }

    /// Returns P1 and P2 as one big-endian word, as used for file offsets.
    pub fn p1p2(&self) -> u16 {
        BigEndian::read_u16(&[self.p1, self.p2])
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// The APDU cases
pub enum Case {
    Le1,
    Lc1Data,
    Lc1DataLe1,
    Lc3Data,
    Lc3DataLe1,
    Lc3DataLe2,
    Le3,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApduType {
    Instruction,
    Short(Case),
    Extended(Case),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Apdu {
    pub header: ApduHeader,
    pub lc: u16,
    pub data: Vec<u8>,
    pub le: u32,
    pub case_type: ApduType,
}

// Decodes a one byte Le field, where 0x00 stands for 256.
fn short_le(byte: u8) -> u32 {
    if byte == 0x00 {
        SHORT_LE_MAX
    } else {
        byte.into()
    }
}

// Decodes a two byte Le field, where 0x0000 stands for 65536.
fn extended_le(bytes: &[u8]) -> u32 {
    match BigEndian::read_u16(bytes) {
        0x00 => EXTENDED_LE_MAX,
        le => le.into(),
    }
}

impl TryFrom<&[u8]> for Apdu {
    type Error = ApduStatusCode;

    fn try_from(frame: &[u8]) -> Result<Self, ApduStatusCode> {
        if frame.len() < APDU_HEADER_LEN {
            return Err(ApduStatusCode::SW_WRONG_DATA);
        }
        //        +-----+-----+----+----+
        // header | CLA | INS | P1 | P2 |
        //        +-----+-----+----+----+
        let (header, payload) = frame.split_at(APDU_HEADER_LEN);
        let header: ApduHeader = array_ref!(header, 0, APDU_HEADER_LEN).into();

        let (byte_0, last_byte) = match (payload.first(), payload.last()) {
            (Some(&first), Some(&last)) => (first, last),
            // Lc is zero-bytes in length
            _ => {
                return Ok(Apdu {
                    header,
                    lc: 0x00,
                    data: Vec::new(),
                    le: 0x00,
                    case_type: ApduType::Instruction,
                })
            }
        };
        if payload.len() == 1 {
            // There is only one byte in the payload, that byte cannot be Lc because that would
            // entail at *least* one another byte in the payload (for the command data)
            return Ok(Apdu {
                header,
                lc: 0x00,
                data: Vec::new(),
                le: short_le(byte_0),
                case_type: ApduType::Short(Case::Le1),
            });
        }
        if payload.len() == 1 + (byte_0 as usize) && byte_0 != 0 {
            // Lc is one-byte long and since the size specified by Lc covers the rest of the
            // payload there's no Le at the end
            return Ok(Apdu {
                header,
                lc: byte_0.into(),
                data: payload[1..].to_vec(),
                le: 0x00,
                case_type: ApduType::Short(Case::Lc1Data),
            });
        }
        if payload.len() == 2 + (byte_0 as usize) && byte_0 != 0 {
            // Lc is one-byte long and since the size specified by Lc covers the rest of the
            // payload with ONE additional byte that byte must be Le
            return Ok(Apdu {
                header,
                lc: byte_0.into(),
                data: payload[1..(payload.len() - 1)].to_vec(),
                le: short_le(last_byte),
                case_type: ApduType::Short(Case::Lc1DataLe1),
            });
        }
        if byte_0 != 0 || payload.len() < 3 {
            return Err(ApduStatusCode::SW_WRONG_LENGTH);
        }
        if payload.len() == 3 {
            // No command data, the two bytes after the marker are an extended Le
            return Ok(Apdu {
                header,
                lc: 0x00,
                data: Vec::new(),
                le: extended_le(&payload[1..3]),
                case_type: ApduType::Extended(Case::Le3),
            });
        }
        // If the first byte is zero, the next two bytes are a big-endian length that covers the
        // rest of the block, plus at most 2 additional bytes for Le.
        let extended_apdu_lc = BigEndian::read_u16(&payload[1..3]) as usize;
        let extended_apdu_le_len = payload
            .len()
            .checked_sub(extended_apdu_lc + 3)
            .ok_or(ApduStatusCode::SW_WRONG_LENGTH)?;
        if extended_apdu_lc == 0 {
            return Err(ApduStatusCode::SW_WRONG_LENGTH);
        }
        let data = payload[3..(payload.len() - extended_apdu_le_len)].to_vec();
        let (le, case) = match extended_apdu_le_len {
            0 => (0x00, Case::Lc3Data),
            1 => (short_le(last_byte), Case::Lc3DataLe1),
            2 => (extended_le(&payload[payload.len() - 2..]), Case::Lc3DataLe2),
            _ => return Err(ApduStatusCode::SW_WRONG_LENGTH),
        };
        Ok(Apdu {
            header,
            lc: extended_apdu_lc as u16,
            data,
            le,
            case_type: ApduType::Extended(case),
        })
    }
}

impl Apdu {
    /// Builds a command APDU, choosing the short encoding whenever the sizes allow it.
    ///
    /// An `le` of 0 means that no response data is expected.
    pub fn new(header: ApduHeader, data: Vec<u8>, le: u32) -> Self {
        let extended = data.len() > 0xFF || le > SHORT_LE_MAX;
        let case = match (data.is_empty(), le == 0, extended) {
            (true, true, _) => None,
            (true, false, false) => Some(Case::Le1),
            (true, false, true) => Some(Case::Le3),
            (false, true, false) => Some(Case::Lc1Data),
            (false, true, true) => Some(Case::Lc3Data),
            (false, false, false) => Some(Case::Lc1DataLe1),
            (false, false, true) => Some(Case::Lc3DataLe2),
        };
        let case_type = match case {
            None => ApduType::Instruction,
            Some(case) if extended => ApduType::Extended(case),
            Some(case) => ApduType::Short(case),
        };
        Apdu {
            header,
            lc: data.len() as u16,
            data,
            le,
            case_type,
        }
    }

    /// Serializes the command APDU according to its case.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(APDU_HEADER_LEN + 3 + self.data.len() + 2);
        frame.extend_from_slice(&[
            self.header.cla,
            self.header.ins,
            self.header.p1,
            self.header.p2,
        ]);
        match &self.case_type {
            ApduType::Instruction => (),
            ApduType::Short(case) => {
                if !self.data.is_empty() {
                    frame.push(self.lc as u8);
                    frame.extend_from_slice(&self.data);
                }
                if *case == Case::Le1 || *case == Case::Lc1DataLe1 {
                    // Truncation turns 256 into the 0x00 encoding.
                    frame.push(self.le as u8);
                }
            }
            ApduType::Extended(case) => {
                frame.push(0x00);
                if !self.data.is_empty() {
                    frame.extend_from_slice(&self.lc.to_be_bytes());
                    frame.extend_from_slice(&self.data);
                }
                match case {
                    Case::Le3 | Case::Lc3DataLe2 => {
                        frame.extend_from_slice(&(self.le as u16).to_be_bytes())
                    }
                    Case::Lc3DataLe1 => frame.push(self.le as u8),
                    _ => (),
                }
            }
        }
        frame
    }
}

/// Splits a response APDU into its data and status word.
///
/// Returns `None` if the response is too short to hold a status word.
pub fn split_response(response: &[u8]) -> Option<(&[u8], u16)> {
    let data_len = response.len().checked_sub(APDU_STATUS_LEN)?;
    let (data, status) = response.split_at(data_len);
    Some((data, BigEndian::read_u16(status)))
}

#[cfg(test)]
mod test {
    use super::*;

    fn pass_frame(frame: &[u8]) -> Result<Apdu, ApduStatusCode> {
        Apdu::try_from(frame)
    }

    #[test]
    fn test_case_type_1() {
        let frame: [u8; 4] = [0x00, 0x12, 0x00, 0x80];
        let response = pass_frame(&frame);
        assert!(response.is_ok());
        let expected = Apdu {
            header: ApduHeader {
                cla: 0x00,
                ins: 0x12,
                p1: 0x00,
                p2: 0x80,
            },
            lc: 0x00,
            data: Vec::new(),
            le: 0x00,
            case_type: ApduType::Instruction,
        };
        assert_eq!(Ok(expected), response);
    }

    #[test]
    fn test_case_type_2_short() {
        let frame: [u8; 5] = [0x00, 0xb0, 0x00, 0x00, 0x0f];
        let response = pass_frame(&frame);
        let expected = Apdu {
            header: ApduHeader {
                cla: 0x00,
                ins: 0xb0,
                p1: 0x00,
                p2: 0x00,
            },
            lc: 0x00,
            data: Vec::new(),
            le: 0x0f,
            case_type: ApduType::Short(Case::Le1),
        };
        assert_eq!(Ok(expected), response);
    }

    #[test]
    fn test_case_type_2_short_le() {
        let frame: [u8; 5] = [0x00, 0xb0, 0x00, 0x00, 0x00];
        let response = pass_frame(&frame);
        assert_eq!(response.map(|apdu| apdu.le), Ok(0x100));
    }

    #[test]
    fn test_case_type_3_short() {
        let frame: [u8; 7] = [0x00, 0xa4, 0x00, 0x0c, 0x02, 0xe1, 0x04];
        let payload = [0xe1, 0x04];
        let response = pass_frame(&frame);
        let expected = Apdu {
            header: ApduHeader {
                cla: 0x00,
                ins: 0xa4,
                p1: 0x00,
                p2: 0x0c,
            },
            lc: 0x02,
            data: payload.to_vec(),
            le: 0x00,
            case_type: ApduType::Short(Case::Lc1Data),
        };
        assert_eq!(Ok(expected), response);
    }

    #[test]
    fn test_case_type_4_short() {
        let frame: [u8; 13] = [
            0x00, 0xa4, 0x04, 0x00, 0x07, 0xd2, 0x76, 0x00, 0x00, 0x85, 0x01, 0x01, 0xff,
        ];
        let payload = [0xd2, 0x76, 0x00, 0x00, 0x85, 0x01, 0x01];
        let response = pass_frame(&frame);
        let expected = Apdu {
            header: ApduHeader {
                cla: 0x00,
                ins: 0xa4,
                p1: 0x04,
                p2: 0x00,
            },
            lc: 0x07,
            data: payload.to_vec(),
            le: 0xff,
            case_type: ApduType::Short(Case::Lc1DataLe1),
        };
        assert_eq!(Ok(expected), response);
    }

    #[test]
    fn test_case_type_4_short_le() {
        let frame: [u8; 13] = [
            0x00, 0xa4, 0x04, 0x00, 0x07, 0xd2, 0x76, 0x00, 0x00, 0x85, 0x01, 0x01, 0x00,
        ];
        let response = pass_frame(&frame);
        assert_eq!(response.map(|apdu| apdu.le), Ok(0x100));
    }

    #[test]
    fn test_invalid_apdu_header_length() {
        let frame: [u8; 3] = [0x00, 0x12, 0x00];
        let response = pass_frame(&frame);
        assert_eq!(Err(ApduStatusCode::SW_WRONG_DATA), response);
    }

    #[test]
    fn test_inconsistent_lc() {
        // Lc announces 4 bytes, but only 2 follow.
        let frame = [0x00, 0xd6, 0x00, 0x00, 0x04, 0x01, 0x02];
        assert_eq!(
            pass_frame(&frame),
            Err(ApduStatusCode::SW_WRONG_LENGTH)
        );
        // Lc announces 2 bytes, but 4 follow.
        let frame = [0x00, 0xd6, 0x00, 0x00, 0x02, 0x01, 0x02, 0x03, 0x04];
        assert_eq!(
            pass_frame(&frame),
            Err(ApduStatusCode::SW_WRONG_LENGTH)
        );
    }

    #[test]
    fn test_extended_length_apdu() {
        let mut frame = vec![0x00, 0xd6, 0x00, 0x02, 0x00, 0x01, 0x2c];
        frame.extend_from_slice(&[0x5A; 300]);
        frame.extend_from_slice(&[0x00, 0x00]);
        let response = pass_frame(&frame);
        let expected = Apdu {
            header: ApduHeader {
                cla: 0x00,
                ins: 0xd6,
                p1: 0x00,
                p2: 0x02,
            },
            lc: 300,
            data: vec![0x5A; 300],
            le: 0x10000,
            case_type: ApduType::Extended(Case::Lc3DataLe2),
        };
        assert_eq!(Ok(expected), response);
    }

    #[test]
    fn test_extended_le_only() {
        let frame = [0x00, 0xb0, 0x00, 0x00, 0x00, 0x01, 0x00];
        let response = pass_frame(&frame);
        assert_eq!(response.as_ref().map(|apdu| apdu.le), Ok(0x100));
        assert_eq!(
            response.map(|apdu| apdu.case_type),
            Ok(ApduType::Extended(Case::Le3))
        );
    }

    #[test]
    fn test_encode_read_binary() {
        let header = ApduHeader {
            cla: 0x00,
            ins: ApduInstructions::ReadBinary as u8,
            p1: 0x00,
            p2: 0x02,
        };
        let apdu = Apdu::new(header, Vec::new(), 0x100);
        assert_eq!(apdu.to_bytes(), vec![0x00, 0xb0, 0x00, 0x02, 0x00]);
        assert_eq!(pass_frame(&apdu.to_bytes()), Ok(apdu));
    }

    #[test]
    fn test_encode_update_binary() {
        let header = ApduHeader {
            cla: 0x00,
            ins: ApduInstructions::UpdateBinary as u8,
            p1: 0x00,
            p2: 0x00,
        };
        let apdu = Apdu::new(header, vec![0x00, 0x03], 0);
        assert_eq!(
            apdu.to_bytes(),
            vec![0x00, 0xd6, 0x00, 0x00, 0x02, 0x00, 0x03]
        );
        assert_eq!(pass_frame(&apdu.to_bytes()), Ok(apdu));
    }

    #[test]
    fn test_encode_extended() {
        let header = ApduHeader {
            cla: 0x00,
            ins: ApduInstructions::UpdateBinary as u8,
            p1: 0x00,
            p2: 0x02,
        };
        let apdu = Apdu::new(header, vec![0x11; 0x100], 0);
        assert_eq!(apdu.case_type, ApduType::Extended(Case::Lc3Data));
        assert_eq!(&apdu.to_bytes()[..7], &[0x00, 0xd6, 0x00, 0x02, 0x00, 0x01, 0x00]);
        assert_eq!(pass_frame(&apdu.to_bytes()), Ok(apdu));
    }

    #[test]
    fn test_class_byte() {
        let mut header = ApduHeader::default();
        assert!(header.is_interindustry());
        assert!(!header.is_secure_messaging());
        header.cla = 0x0C;
        assert!(header.is_secure_messaging());
        header.cla = 0x40;
        assert!(!header.is_secure_messaging());
        header.cla = 0x60;
        assert!(header.is_secure_messaging());
        header.cla = 0x80;
        assert!(!header.is_interindustry());
    }

    #[test]
    fn test_p1p2() {
        let header = ApduHeader {
            cla: 0x00,
            ins: 0xb0,
            p1: 0x01,
            p2: 0x02,
        };
        assert_eq!(header.p1p2(), 0x0102);
    }

    #[test]
    fn test_instructions() {
        for &ins in &[
            ApduInstructions::Select,
            ApduInstructions::ReadBinary,
            ApduInstructions::UpdateBinary,
        ] {
            assert_eq!(ApduInstructions::try_from(ins as u8), Ok(ins));
        }
        assert_eq!(
            ApduInstructions::try_from(0xCA),
            Err(ApduStatusCode::SW_INS_INVALID)
        );
    }

    #[test]
    fn test_status_code_conversion() {
        for code in ApduStatusCode::into_enum_iter() {
            let status_word: u16 = code.into();
            assert_eq!(ApduStatusCode::try_from(status_word), Ok(code));
        }
        assert_eq!(ApduStatusCode::try_from(0x6999), Err(0x6999));
    }

    #[test]
    fn test_split_response() {
        assert_eq!(
            split_response(&[0x01, 0x02, 0x90, 0x00]),
            Some((&[0x01, 0x02][..], 0x9000))
        );
        assert_eq!(split_response(&[0x6a, 0x82]), Some((&[][..], 0x6a82)));
        assert_eq!(split_response(&[0x90]), None);
    }
}
