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

//! The two files of the tag and their access policy.

use super::apdu::ApduStatusCode;
use super::capability::{CapabilityContainer, FileControl};
use super::install::Configuration;
use crate::api::connection::Interface;
use alloc::borrow::Cow;
use alloc::vec;
use alloc::vec::Vec;
#[cfg(feature = "fuzz")]
use arbitrary::Arbitrary;
use byteorder::{BigEndian, ByteOrder};
use core::convert::TryFrom;
#[cfg(test)]
use enum_iterator::IntoEnumIterator;

pub const CAPABILITY_FILE_ID: u16 = 0xE103;
pub const DATA_FILE_ID: u16 = 0xE104;

/// Size of the big-endian length in front of the NDEF message.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Access conditions of a file, as encoded in the capability container.
///
/// `ContactOnly` and `WriteOnce` are proprietary. They are never disclosed to readers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(IntoEnumIterator))]
#[cfg_attr(feature = "fuzz", derive(Arbitrary))]
pub enum AccessCode {
    /// Access is always granted.
    Open = 0x00,
    /// Access is granted only over the contact interface.
    ContactOnly = 0xF0,
    /// Access is granted only while the data file is empty.
    WriteOnce = 0xF1,
    /// Access is never granted.
    None = 0xFF,
}

impl AccessCode {
    pub fn is_proprietary(self) -> bool {
        matches!(self, AccessCode::ContactOnly | AccessCode::WriteOnce)
    }
}

impl From<AccessCode> for u8 {
    fn from(code: AccessCode) -> Self {
        code as u8
    }
}

impl TryFrom<u8> for AccessCode {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, u8> {
        match code {
            0x00 => Ok(AccessCode::Open),
            0xF0 => Ok(AccessCode::ContactOnly),
            0xF1 => Ok(AccessCode::WriteOnce),
            0xFF => Ok(AccessCode::None),
            _ => Err(code),
        }
    }
}

/// A file that can be selected after the applet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(IntoEnumIterator))]
pub enum SelectedFile {
    Capabilities,
    Data,
}

impl SelectedFile {
    pub fn file_id(self) -> u16 {
        match self {
            SelectedFile::Capabilities => CAPABILITY_FILE_ID,
            SelectedFile::Data => DATA_FILE_ID,
        }
    }
}

impl TryFrom<u16> for SelectedFile {
    type Error = ApduStatusCode;

    fn try_from(file_id: u16) -> Result<Self, ApduStatusCode> {
        match file_id {
            CAPABILITY_FILE_ID => Ok(SelectedFile::Capabilities),
            DATA_FILE_ID => Ok(SelectedFile::Data),
            _ => Err(ApduStatusCode::SW_FILE_NOT_FOUND),
        }
    }
}

/// Owns the capability container and the NDEF data file.
pub struct NdefFiles {
    // Holds the true access codes. Readers only get fixed up copies.
    capabilities: CapabilityContainer,
    data: Vec<u8>,
    read_access: AccessCode,
    write_access: AccessCode,
    advanced_access_control: bool,
}

impl NdefFiles {
    // The configuration must have passed `Configuration::validate`.
    pub(crate) fn new(
        configuration: &Configuration,
        max_read_chunk: u16,
        max_write_chunk: u16,
        advanced_access_control: bool,
    ) -> Self {
        let mut data = vec![0; configuration.data_capacity as usize];
        if let Some(initial_data) = &configuration.initial_data {
            if !initial_data.is_empty() {
                let end = LENGTH_PREFIX_SIZE + initial_data.len();
                BigEndian::write_u16(&mut data[..LENGTH_PREFIX_SIZE], initial_data.len() as u16);
                data[LENGTH_PREFIX_SIZE..end].copy_from_slice(initial_data);
            }
        }
        let file_control = FileControl {
            file_id: DATA_FILE_ID,
            file_size: configuration.data_capacity,
            read_access: configuration.read_access.into(),
            write_access: configuration.write_access.into(),
        };
        NdefFiles {
            capabilities: CapabilityContainer::new(max_read_chunk, max_write_chunk, file_control),
            data,
            read_access: configuration.read_access,
            write_access: configuration.write_access,
            advanced_access_control,
        }
    }

    /// The capability container with the true access codes.
    pub fn capabilities(&self) -> &CapabilityContainer {
        &self.capabilities
    }

    /// The raw data file, including the length prefix.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The logical length of the NDEF message, as stored in the length prefix.
    pub fn data_length(&self) -> u16 {
        BigEndian::read_u16(&self.data[..LENGTH_PREFIX_SIZE])
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn read_access(&self) -> AccessCode {
        self.read_access
    }

    pub fn write_access(&self) -> AccessCode {
        self.write_access
    }

    /// Evaluates an access code in the current state.
    pub fn check_access(&self, code: AccessCode, interface: Interface) -> bool {
        match code {
            AccessCode::Open => true,
            AccessCode::None => false,
            AccessCode::ContactOnly => {
                self.advanced_access_control && interface == Interface::Contact
            }
            // Only the length prefix is checked, not the whole file.
            AccessCode::WriteOnce => {
                self.advanced_access_control && self.data[0] == 0 && self.data[1] == 0
            }
        }
    }

    /// The capability container as seen by a reader on the given interface.
    pub fn disclosed_capabilities(&self, interface: Interface) -> CapabilityContainer {
        self.capabilities.fixed_up(
            self.check_access(self.read_access, interface),
            self.check_access(self.write_access, interface),
        )
    }

    /// Returns the content of the selected file if it may be read.
    pub fn access_for_read(
        &self,
        selected_file: Option<SelectedFile>,
        interface: Interface,
    ) -> Result<Cow<[u8]>, ApduStatusCode> {
        match selected_file {
            None => Err(ApduStatusCode::SW_COND_USE_NOT_SATISFIED),
            Some(SelectedFile::Capabilities) => Ok(Cow::Owned(
                self.disclosed_capabilities(interface).to_bytes(),
            )),
            Some(SelectedFile::Data) => {
                if self.check_access(self.read_access, interface) {
                    Ok(Cow::Borrowed(&self.data))
                } else {
                    Err(ApduStatusCode::SW_SECURITY_STATUS_NOT_SATISFIED)
                }
            }
        }
    }

    /// Returns the content of the selected file if it may be written.
    pub fn access_for_write(
        &mut self,
        selected_file: Option<SelectedFile>,
        interface: Interface,
    ) -> Result<&mut [u8], ApduStatusCode> {
        match selected_file {
            None => Err(ApduStatusCode::SW_COND_USE_NOT_SATISFIED),
            Some(SelectedFile::Capabilities) => Err(ApduStatusCode::SW_FUNC_NOT_SUPPORTED),
            Some(SelectedFile::Data) => {
                if self.check_access(self.write_access, interface) {
                    Ok(&mut self.data)
                } else {
                    Err(ApduStatusCode::SW_SECURITY_STATUS_NOT_SATISFIED)
                }
            }
        }
    }
}
