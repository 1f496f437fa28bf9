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

//! Card side of the NFC Forum Type 4 Tag.

pub mod apdu;
pub mod capability;
pub mod file;
pub mod install;
pub mod tlv;

use self::apdu::{Apdu, ApduInstructions, ApduStatusCode};
use self::capability::CapabilityContainer;
use self::file::{NdefFiles, SelectedFile};
use self::install::{Configuration, ConfigurationError, InstallData};
use crate::api::connection::Interface;
use crate::api::customization::Customization;
use crate::env::Env;
use alloc::vec::Vec;
use byteorder::{BigEndian, ByteOrder};
use core::cmp::min;
use core::convert::TryFrom;

/// Application identifier of the NDEF Tag Application, mapping version 2.
pub const NDEF_AID: [u8; 7] = [0xD2, 0x76, 0x00, 0x00, 0x85, 0x01, 0x01];

const SELECT_BY_NAME: u8 = 0x04;
const SELECT_BY_FILE_ID: u8 = 0x00;
const SELECT_FIRST_OR_ONLY: u8 = 0x0C;
const FILE_ID_LEN: usize = 2;

// A missing Le is served like the largest short Le.
const DEFAULT_LE: usize = 0x100;

/// Session state of the tag and its files.
pub struct NdefTagState {
    aid: Vec<u8>,
    applet_selected: bool,
    selected_file: Option<SelectedFile>,
    files: NdefFiles,
    max_read_chunk: u16,
    max_write_chunk: u16,
    writing_supported: bool,
}

impl NdefTagState {
    pub fn new(env: &impl Env) -> Self {
        let configuration = Configuration::default_for(env.customization());
        NdefTagState::build(env, NDEF_AID.to_vec(), &configuration)
    }

    pub fn install(env: &impl Env, install_data: &[u8]) -> Result<Self, ConfigurationError> {
        let install_data = InstallData::parse(install_data)?;
        let configuration = Configuration::resolve(env.customization(), install_data.applet_data)?;
        Ok(NdefTagState::build(
            env,
            install_data.aid.to_vec(),
            &configuration,
        ))
    }

    /// Creates a tag from a configuration that was not resolved from installation parameters.
    pub fn with_configuration(
        env: &impl Env,
        aid: Vec<u8>,
        configuration: &Configuration,
    ) -> Result<Self, ConfigurationError> {
        configuration.validate(env.customization())?;
        Ok(NdefTagState::build(env, aid, configuration))
    }

    // The configuration must be valid for the customization of `env`.
    fn build(env: &impl Env, aid: Vec<u8>, configuration: &Configuration) -> Self {
        let customization = env.customization();
        NdefTagState {
            aid,
            applet_selected: false,
            selected_file: None,
            files: NdefFiles::new(
                configuration,
                customization.max_read_chunk(),
                customization.max_write_chunk(),
                customization.advanced_access_control(),
            ),
            max_read_chunk: customization.max_read_chunk(),
            max_write_chunk: customization.max_write_chunk(),
            writing_supported: customization.writing_supported(),
        }
    }

    pub fn aid(&self) -> &[u8] {
        &self.aid
    }

    pub fn is_selected(&self) -> bool {
        self.applet_selected
    }

    pub fn selected_file(&self) -> Option<SelectedFile> {
        self.selected_file
    }

    pub fn files(&self) -> &NdefFiles {
        &self.files
    }

    /// The stored capability container, with the true access codes.
    pub fn capabilities(&self) -> &CapabilityContainer {
        self.files.capabilities()
    }

    pub fn deselect(&mut self) {
        self.applet_selected = false;
        self.selected_file = None;
    }

    /// Processes a command APDU and returns the response APDU including its status word.
    pub fn process_apdu(
        &mut self,
        env: &mut impl Env,
        command: &[u8],
        interface: Interface,
    ) -> Vec<u8> {
        let (mut response, status) = match self.process_command(env, command, interface) {
            Ok(payload) => (payload, ApduStatusCode::SW_SUCCESS),
            Err(status) => (Vec::new(), status),
        };
        debug_tag!(env, "Responding with {:?} and {} bytes", status, response.len());
        let code: u16 = status.into();
        response.extend_from_slice(&code.to_be_bytes());
        response
    }

    fn process_command(
        &mut self,
        env: &mut impl Env,
        command: &[u8],
        interface: Interface,
    ) -> Result<Vec<u8>, ApduStatusCode> {
        let apdu = Apdu::try_from(command)?;
        debug_tag!(env, "Received {:?} over {:?}", apdu.header, interface);

        if apdu.header.ins == ApduInstructions::Select as u8 && apdu.header.p1 == SELECT_BY_NAME {
            return self.select_applet(env, &apdu);
        }
        if !self.applet_selected {
            return Err(ApduStatusCode::SW_COMMAND_NOT_ALLOWED);
        }
        if apdu.header.is_secure_messaging() {
            return Err(ApduStatusCode::SW_SECURE_MESSAGING_NOT_SUPPORTED);
        }
        if !apdu.header.is_interindustry() {
            return Err(ApduStatusCode::SW_CLA_INVALID);
        }

        match ApduInstructions::try_from(apdu.header.ins)? {
            ApduInstructions::Select => self.select_file(env, &apdu),
            ApduInstructions::ReadBinary => self.read_binary(&apdu, interface),
            ApduInstructions::UpdateBinary => {
                if !self.writing_supported {
                    return Err(ApduStatusCode::SW_COMMAND_NOT_ALLOWED);
                }
                self.update_binary(&apdu, interface)
            }
        }
    }

    fn select_applet(
        &mut self,
        env: &mut impl Env,
        apdu: &Apdu,
    ) -> Result<Vec<u8>, ApduStatusCode> {
        if apdu.data != self.aid {
            // Another application is being selected.
            self.deselect();
            return Err(ApduStatusCode::SW_FILE_NOT_FOUND);
        }
        debug_tag!(env, "Applet selected");
        self.applet_selected = true;
        self.selected_file = None;
        Ok(Vec::new())
    }

    fn select_file(
        &mut self,
        env: &mut impl Env,
        apdu: &Apdu,
    ) -> Result<Vec<u8>, ApduStatusCode> {
        if apdu.header.p1 != SELECT_BY_FILE_ID || apdu.header.p2 != SELECT_FIRST_OR_ONLY {
            return Err(ApduStatusCode::SW_INCORRECT_P1P2);
        }
        if apdu.data.len() != FILE_ID_LEN {
            return Err(ApduStatusCode::SW_WRONG_LENGTH);
        }
        let file = SelectedFile::try_from(BigEndian::read_u16(&apdu.data))?;
        debug_tag!(env, "Selected {:?}", file);
        self.selected_file = Some(file);
        Ok(Vec::new())
    }

    fn read_binary(&self, apdu: &Apdu, interface: Interface) -> Result<Vec<u8>, ApduStatusCode> {
        let file = self.files.access_for_read(self.selected_file, interface)?;
        let offset = apdu.header.p1p2() as usize;
        if offset >= file.len() {
            return Err(ApduStatusCode::SW_WRONG_P1P2);
        }
        let le = match apdu.le as usize {
            0 => DEFAULT_LE,
            le => le,
        };
        let length = min(min(le, self.max_read_chunk as usize), file.len() - offset);
        let end = chunk_end(offset, length, file.len())?;
        Ok(file[offset..end].to_vec())
    }

    fn update_binary(
        &mut self,
        apdu: &Apdu,
        interface: Interface,
    ) -> Result<Vec<u8>, ApduStatusCode> {
        let max_write_chunk = self.max_write_chunk as usize;
        let file = self.files.access_for_write(self.selected_file, interface)?;
        let offset = apdu.header.p1p2() as usize;
        if offset >= file.len() {
            return Err(ApduStatusCode::SW_WRONG_P1P2);
        }
        if apdu.data.len() > max_write_chunk {
            return Err(ApduStatusCode::SW_WRONG_LENGTH);
        }
        let end = chunk_end(offset, apdu.data.len(), file.len())?;
        file[offset..end].copy_from_slice(&apdu.data);
        Ok(Vec::new())
    }
}

// End of a chunk that must lie within a file.
fn chunk_end(offset: usize, length: usize, file_length: usize) -> Result<usize, ApduStatusCode> {
    offset
        .checked_add(length)
        .filter(|end| *end <= file_length)
        .ok_or(ApduStatusCode::SW_WRONG_LENGTH)
}
