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

//! The capability container (CC) file, built on the card and parsed by the client.

use super::file::AccessCode;
use alloc::vec;
use alloc::vec::Vec;
use byteorder::{BigEndian, ByteOrder};
use core::convert::TryFrom;

/// Mapping version 2.0 of the Type 4 Tag specification.
pub const MAPPING_VERSION: u8 = 0x20;
/// Size of a capability container describing one NDEF file.
pub const CAPABILITY_CONTAINER_LEN: usize = 15;
/// Smallest maximum read size allowed by the mapping, enough to read the CC at once.
pub const MIN_MAX_READ: u16 = 0x0F;

// CCLEN, mapping version, MLe and MLc.
const HEADER_LEN: usize = 7;
const NDEF_FILE_CONTROL_TAG: u8 = 0x04;
const NDEF_FILE_CONTROL_LEN: u8 = 0x06;
const NDEF_FILE_CONTROL_TLV_LEN: usize = 2 + NDEF_FILE_CONTROL_LEN as usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CapabilityError {
    /// CCLEN disagrees with the container or the container is truncated.
    InvalidLength,
    UnsupportedVersion(u8),
    InvalidChunkSize,
    /// A TLV is not an NDEF file control TLV or there is none at all.
    InvalidFileControl,
}

/// Describes one NDEF file.
///
/// Access codes are kept as raw bytes, since a parsed container may carry any value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileControl {
    pub file_id: u16,
    /// Maximum size of the file, including the length prefix.
    pub file_size: u16,
    pub read_access: u8,
    pub write_access: u8,
}

impl FileControl {
    fn write_tlv(&self, buffer: &mut Vec<u8>) {
        let mut value = [0; NDEF_FILE_CONTROL_LEN as usize];
        BigEndian::write_u16(&mut value[0..2], self.file_id);
        BigEndian::write_u16(&mut value[2..4], self.file_size);
        value[4] = self.read_access;
        value[5] = self.write_access;
        buffer.push(NDEF_FILE_CONTROL_TAG);
        buffer.push(NDEF_FILE_CONTROL_LEN);
        buffer.extend_from_slice(&value);
    }

    fn parse_tlv(tlv: &[u8; NDEF_FILE_CONTROL_TLV_LEN]) -> Result<Self, CapabilityError> {
        let (tag, len, value) = array_refs![tlv, 1, 1, 6];
        if tag[0] != NDEF_FILE_CONTROL_TAG || len[0] != NDEF_FILE_CONTROL_LEN {
            return Err(CapabilityError::InvalidFileControl);
        }
        let (file_id, file_size, read_access, write_access) = array_refs![value, 2, 2, 1, 1];
        Ok(FileControl {
            file_id: BigEndian::read_u16(file_id),
            file_size: BigEndian::read_u16(file_size),
            read_access: read_access[0],
            write_access: write_access[0],
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapabilityContainer {
    pub mapping_version: u8,
    /// Maximum number of bytes per READ BINARY (MLe).
    pub max_read: u16,
    /// Maximum number of bytes per UPDATE BINARY (MLc).
    pub max_write: u16,
    pub files: Vec<FileControl>,
}

impl CapabilityContainer {
    pub fn new(max_read: u16, max_write: u16, file: FileControl) -> Self {
        CapabilityContainer {
            mapping_version: MAPPING_VERSION,
            max_read,
            max_write,
            files: vec![file],
        }
    }

    pub fn find_file(&self, file_id: u16) -> Option<&FileControl> {
        self.files.iter().find(|file| file.file_id == file_id)
    }

    /// Returns a copy with proprietary access codes replaced by standard ones.
    ///
    /// The flags tell whether read and write access are currently granted.
    pub fn fixed_up(&self, read_granted: bool, write_granted: bool) -> Self {
        let files = self
            .files
            .iter()
            .map(|file| FileControl {
                read_access: fix_access(file.read_access, read_granted),
                write_access: fix_access(file.write_access, write_granted),
                ..*file
            })
            .collect();
        CapabilityContainer { files, ..*self }
    }

    /// Serializes the container, starting with its own length.
    pub fn to_bytes(&self) -> Vec<u8> {
        let length = HEADER_LEN + self.files.len() * NDEF_FILE_CONTROL_TLV_LEN;
        let mut buffer = Vec::with_capacity(length);
        let mut header = [0; HEADER_LEN];
        BigEndian::write_u16(&mut header[0..2], length as u16);
        header[2] = self.mapping_version;
        BigEndian::write_u16(&mut header[3..5], self.max_read);
        BigEndian::write_u16(&mut header[5..7], self.max_write);
        buffer.extend_from_slice(&header);
        for file in &self.files {
            file.write_tlv(&mut buffer);
        }
        buffer
    }
}

impl TryFrom<&[u8]> for CapabilityContainer {
    type Error = CapabilityError;

    /// Parses a complete container, including its CCLEN prefix.
    fn try_from(bytes: &[u8]) -> Result<Self, CapabilityError> {
        if bytes.len() < HEADER_LEN {
            return Err(CapabilityError::InvalidLength);
        }
        let (header, mut tlvs) = bytes.split_at(HEADER_LEN);
        let (length, version, max_read, max_write) =
            array_refs![array_ref!(header, 0, HEADER_LEN), 2, 1, 2, 2];
        if BigEndian::read_u16(length) as usize != bytes.len() {
            return Err(CapabilityError::InvalidLength);
        }
        let mapping_version = version[0];
        if mapping_version >> 4 != MAPPING_VERSION >> 4 {
            return Err(CapabilityError::UnsupportedVersion(mapping_version));
        }
        let max_read = BigEndian::read_u16(max_read);
        let max_write = BigEndian::read_u16(max_write);
        if max_read < MIN_MAX_READ || max_write == 0 {
            return Err(CapabilityError::InvalidChunkSize);
        }
        let mut files = Vec::new();
        while !tlvs.is_empty() {
            if tlvs.len() < NDEF_FILE_CONTROL_TLV_LEN {
                return Err(CapabilityError::InvalidFileControl);
            }
            let (tlv, rest) = tlvs.split_at(NDEF_FILE_CONTROL_TLV_LEN);
            files.push(FileControl::parse_tlv(array_ref!(tlv, 0, NDEF_FILE_CONTROL_TLV_LEN))?);
            tlvs = rest;
        }
        if files.is_empty() {
            return Err(CapabilityError::InvalidFileControl);
        }
        Ok(CapabilityContainer {
            mapping_version,
            max_read,
            max_write,
            files,
        })
    }
}

/// Hides a proprietary access code behind the standard code with the same current effect.
pub fn fix_access(code: u8, granted: bool) -> u8 {
    match AccessCode::try_from(code) {
        Ok(access) if access.is_proprietary() => {
            if granted {
                AccessCode::Open.into()
            } else {
                AccessCode::None.into()
            }
        }
        _ => code,
    }
}
