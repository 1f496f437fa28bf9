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

//! Installation parameters of the tag.
//!
//! The applet data is a TLV sequence with the following optional entries:
//!
//! - `0x80` INITIAL_DATA: the NDEF message the tag starts with. The data file is then sized to
//!   fit it exactly and becomes read-only, unless overridden below.
//! - `0x81` ACCESS: two bytes, the read and write access codes of the data file.
//! - `0x82` SIZE: two bytes, the big-endian size of the data file including its length prefix.
//!
//! Unknown tags are ignored.

use super::apdu::ApduStatusCode;
use super::file::{AccessCode, LENGTH_PREFIX_SIZE};
use super::tlv;
use crate::api::customization::Customization;
use alloc::vec::Vec;
use byteorder::{BigEndian, ByteOrder};
use core::convert::TryFrom;

pub const TAG_INITIAL_DATA: u8 = 0x80;
pub const TAG_ACCESS: u8 = 0x81;
pub const TAG_SIZE: u8 = 0x82;

/// Largest data file, so that every offset fits into a positive 16 bit integer.
pub const MAX_DATA_CAPACITY: usize = 0x7FFF;

const MIN_AID_LEN: usize = 5;
const MAX_AID_LEN: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The install buffer is truncated or holds an invalid AID.
    InvalidInstallData,
    /// The applet data is not a sequence of complete TLVs.
    InconsistentParameters,
    /// A recognized parameter has the wrong length.
    InvalidParameterLength(u8),
    InvalidAccessCode(u8),
    InvalidSize,
    InitialDataTooLarge,
}

impl From<ConfigurationError> for ApduStatusCode {
    fn from(_: ConfigurationError) -> Self {
        ApduStatusCode::SW_DATA_INVALID
    }
}

/// The parts of a GlobalPlatform INSTALL [for install] buffer.
///
/// Each part is preceded by a one byte length: `[AID][control information][applet data]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallData<'a> {
    pub aid: &'a [u8],
    pub control_info: &'a [u8],
    pub applet_data: &'a [u8],
}

// Splits a length prefixed field from the front of the buffer.
fn split_field(buffer: &[u8]) -> Result<(&[u8], &[u8]), ConfigurationError> {
    let (&length, rest) = buffer
        .split_first()
        .ok_or(ConfigurationError::InvalidInstallData)?;
    if rest.len() < length as usize {
        return Err(ConfigurationError::InvalidInstallData);
    }
    Ok(rest.split_at(length as usize))
}

impl<'a> InstallData<'a> {
    pub fn parse(buffer: &'a [u8]) -> Result<Self, ConfigurationError> {
        let (aid, rest) = split_field(buffer)?;
        if aid.len() < MIN_AID_LEN || aid.len() > MAX_AID_LEN {
            return Err(ConfigurationError::InvalidInstallData);
        }
        let (control_info, rest) = split_field(rest)?;
        let (applet_data, _) = split_field(rest)?;
        Ok(InstallData {
            aid,
            control_info,
            applet_data,
        })
    }
}

/// Settings of the data file, fixed at installation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Configuration {
    /// NDEF message written into the data file at installation.
    pub initial_data: Option<Vec<u8>>,
    /// Size of the data file, including the length prefix.
    pub data_capacity: u16,
    pub read_access: AccessCode,
    pub write_access: AccessCode,
}

// Returns the value of a parameter that must have a fixed length.
fn fixed_value(
    applet_data: &[u8],
    tag: u8,
    length: usize,
) -> Result<Option<&[u8]>, ConfigurationError> {
    match tlv::find_value(applet_data, tag) {
        Some(value) if value.len() != length => {
            Err(ConfigurationError::InvalidParameterLength(tag))
        }
        value => Ok(value),
    }
}

fn parse_access_code(code: u8) -> Result<AccessCode, ConfigurationError> {
    AccessCode::try_from(code).map_err(ConfigurationError::InvalidAccessCode)
}

impl Configuration {
    /// The configuration without installation parameters.
    pub fn default_for(customization: &impl Customization) -> Self {
        let write_access = if customization.writing_supported() {
            customization.default_write_access()
        } else {
            AccessCode::None
        };
        Configuration {
            initial_data: None,
            data_capacity: customization.default_data_size(),
            read_access: customization.default_read_access(),
            write_access,
        }
    }

    /// Resolves the installation parameters in `applet_data` against the defaults.
    pub fn resolve(
        customization: &impl Customization,
        applet_data: &[u8],
    ) -> Result<Self, ConfigurationError> {
        let mut configuration = Configuration::default_for(customization);
        if !customization.allows_install_parameters() {
            return Ok(configuration);
        }
        if !tlv::is_consistent(applet_data) {
            return Err(ConfigurationError::InconsistentParameters);
        }
        let mut capacity = configuration.data_capacity as usize;

        if let Some(initial_data) = tlv::find_value(applet_data, TAG_INITIAL_DATA) {
            capacity = LENGTH_PREFIX_SIZE + initial_data.len();
            configuration.initial_data = Some(initial_data.to_vec());
            configuration.write_access = AccessCode::None;
        }

        if let Some(access) = fixed_value(applet_data, TAG_ACCESS, 2)? {
            configuration.read_access = parse_access_code(access[0])?;
            configuration.write_access = parse_access_code(access[1])?;
        }

        if let Some(size) = fixed_value(applet_data, TAG_SIZE, 2)? {
            capacity = BigEndian::read_u16(size) as usize;
        }

        if !customization.writing_supported() {
            configuration.write_access = AccessCode::None;
        }
        if capacity > MAX_DATA_CAPACITY {
            return Err(ConfigurationError::InvalidSize);
        }
        configuration.data_capacity = capacity as u16;
        configuration.validate(customization)?;
        Ok(configuration)
    }

    /// Checks that a data file can be built from this configuration.
    pub fn validate(&self, customization: &impl Customization) -> Result<(), ConfigurationError> {
        if !customization.advanced_access_control() {
            for code in &[self.read_access, self.write_access] {
                if code.is_proprietary() {
                    return Err(ConfigurationError::InvalidAccessCode((*code).into()));
                }
            }
        }
        let capacity = self.data_capacity as usize;
        if capacity < LENGTH_PREFIX_SIZE || capacity > MAX_DATA_CAPACITY {
            return Err(ConfigurationError::InvalidSize);
        }
        if let Some(initial_data) = &self.initial_data {
            if LENGTH_PREFIX_SIZE + initial_data.len() > capacity {
                return Err(ConfigurationError::InitialDataTooLarge);
            }
        }
        Ok(())
    }
}
