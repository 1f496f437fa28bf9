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

//! Host side of the NFC Forum Type 4 Tag.
//!
//! The client selects the NDEF application on a card, reads its capability container, and then
//! reads and writes NDEF files in chunks the card accepts. Writes clear the length prefix first
//! and restore it last, so that readers never see a partially written message.

use crate::api::connection::{CardChannel, TransportError};
use crate::tag::apdu::{split_response, Apdu, ApduHeader, ApduInstructions, ApduStatusCode};
use crate::tag::capability::{CapabilityContainer, CapabilityError};
use crate::tag::file::{CAPABILITY_FILE_ID, DATA_FILE_ID, LENGTH_PREFIX_SIZE};
use crate::tag::NDEF_AID;
use alloc::vec::Vec;
use byteorder::{BigEndian, ByteOrder};
use core::cmp::min;
use core::convert::TryFrom;
use log::{debug, info, warn};

const CLA_ISO: u8 = 0x00;
const SELECT_BY_FILE_ID: u8 = 0x00;
const SELECT_BY_NAME: u8 = 0x04;
const SELECT_FIRST_OR_ONLY: u8 = 0x0C;
// Largest Le of a short READ BINARY.
const MAX_LE: usize = 0x100;
// Offsets with the highest bit set are not file offsets in P1-P2.
const MAX_OFFSET: usize = 0x7FFF;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientError {
    /// The channel to the card failed.
    Transport,
    /// The card answered with a status word other than success.
    Status(u16),
    NotConnected,
    /// The capability container does not list the file.
    FileNotFound(u16),
    /// The data does not fit into the file.
    DataTooLarge,
    /// A chunk exceeds the limits announced by the card.
    ChunkTooLong,
    InvalidResponse,
    InvalidCapabilities(CapabilityError),
}

impl ClientError {
    /// Returns the card's status code, if the card reported one.
    pub fn status_code(&self) -> Option<ApduStatusCode> {
        match self {
            ClientError::Status(status) => ApduStatusCode::try_from(*status).ok(),
            _ => None,
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(_: TransportError) -> Self {
        ClientError::Transport
    }
}

impl From<CapabilityError> for ClientError {
    fn from(error: CapabilityError) -> Self {
        ClientError::InvalidCapabilities(error)
    }
}

/// A session with the NDEF application of one card.
pub struct NdefClient<C: CardChannel> {
    channel: C,
    aid: Vec<u8>,
    connected: bool,
    capabilities: Option<CapabilityContainer>,
}

impl<C: CardChannel> NdefClient<C> {
    pub fn new(channel: C) -> Self {
        NdefClient::with_aid(channel, NDEF_AID.to_vec())
    }

    /// Creates a client for an NDEF application installed under a different AID.
    pub fn with_aid(channel: C, aid: Vec<u8>) -> Self {
        NdefClient {
            channel,
            aid,
            connected: false,
            capabilities: None,
        }
    }

    pub fn aid(&self) -> &[u8] {
        &self.aid
    }

    pub fn channel(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn into_channel(self) -> C {
        self.channel
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// The capability container read while connecting.
    pub fn capabilities(&self) -> Option<&CapabilityContainer> {
        self.capabilities.as_ref()
    }

    /// Returns whether the card hosts the NDEF application.
    ///
    /// On success, the client stays connected.
    pub fn detect(&mut self) -> bool {
        self.connect().is_ok()
    }

    /// Claims the card, selects the application and reads its capabilities.
    ///
    /// On failure, the card is released again.
    pub fn connect(&mut self) -> Result<(), ClientError> {
        if self.connected {
            self.disconnect();
        }
        self.channel.begin_exclusive()?;
        self.connected = true;
        match self.open_session() {
            Ok(capabilities) => {
                info!(
                    "Connected to NDEF application, mapping version {:#04x}, {} file(s)",
                    capabilities.mapping_version,
                    capabilities.files.len()
                );
                self.capabilities = Some(capabilities);
                Ok(())
            }
            Err(error) => {
                warn!("Failed to connect to NDEF application: {:?}", error);
                self.disconnect();
                Err(error)
            }
        }
    }

    /// Releases the card. Failures to release are only logged.
    pub fn disconnect(&mut self) {
        if self.connected {
            if let Err(error) = self.channel.end_exclusive() {
                warn!("Failed to release the card: {:?}", error);
            }
        }
        self.connected = false;
        self.capabilities = None;
    }

    pub fn read_data(&mut self) -> Result<Vec<u8>, ClientError> {
        self.read_file(DATA_FILE_ID)
    }

    pub fn write_data(&mut self, data: &[u8]) -> Result<(), ClientError> {
        self.write_file(DATA_FILE_ID, data)
    }

    /// Reads the NDEF message stored in a file, without its length prefix.
    pub fn read_file(&mut self, file_id: u16) -> Result<Vec<u8>, ClientError> {
        let max_read = self.connected_capabilities()?.max_read as usize;
        let result = self.read_file_chunks(file_id, max_read);
        self.disconnect_on_failure(result)
    }

    /// Replaces the NDEF message stored in a file.
    ///
    /// The length prefix is zero while the message is written, so concurrent readers see either
    /// an empty file or the complete message.
    pub fn write_file(&mut self, file_id: u16, data: &[u8]) -> Result<(), ClientError> {
        let capabilities = self.connected_capabilities()?;
        let max_write = capabilities.max_write as usize;
        let file = capabilities
            .find_file(file_id)
            .ok_or(ClientError::FileNotFound(file_id))?;
        // The prefix and every chunk must be writable before the prefix is cleared.
        if max_write < LENGTH_PREFIX_SIZE {
            return Err(ClientError::ChunkTooLong);
        }
        let end = data.len() + LENGTH_PREFIX_SIZE;
        if end > file.file_size as usize || end > MAX_OFFSET + 1 {
            return Err(ClientError::DataTooLarge);
        }
        let result = self.write_file_chunks(file_id, data, max_write);
        self.disconnect_on_failure(result)
    }

    fn connected_capabilities(&self) -> Result<&CapabilityContainer, ClientError> {
        match (self.connected, &self.capabilities) {
            (true, Some(capabilities)) => Ok(capabilities),
            _ => Err(ClientError::NotConnected),
        }
    }

    // Only failures of the card or the channel end the session.
    fn disconnect_on_failure<T>(
        &mut self,
        result: Result<T, ClientError>,
    ) -> Result<T, ClientError> {
        if let Err(error) = &result {
            if matches!(error, ClientError::Transport | ClientError::Status(_)) {
                warn!("Disconnecting after failure: {:?}", error);
                self.disconnect();
            }
        }
        result
    }

    fn open_session(&mut self) -> Result<CapabilityContainer, ClientError> {
        let header = ApduHeader {
            cla: CLA_ISO,
            ins: ApduInstructions::Select as u8,
            p1: SELECT_BY_NAME,
            p2: SELECT_FIRST_OR_ONLY,
        };
        self.transact(Apdu::new(header, self.aid.clone(), 0))?;
        self.read_capabilities()
    }

    // The length prefix of the capability container covers the prefix itself, so the container
    // is read at once.
    fn read_capabilities(&mut self) -> Result<CapabilityContainer, ClientError> {
        self.select_file(CAPABILITY_FILE_ID)?;
        let data = self.read_binary(0, MAX_LE)?;
        if data.len() < LENGTH_PREFIX_SIZE {
            return Err(ClientError::InvalidResponse);
        }
        let length = BigEndian::read_u16(&data[..LENGTH_PREFIX_SIZE]) as usize;
        if length > data.len() {
            return Err(CapabilityError::InvalidLength.into());
        }
        Ok(CapabilityContainer::try_from(&data[..length])?)
    }

    fn read_file_chunks(&mut self, file_id: u16, max_read: usize) -> Result<Vec<u8>, ClientError> {
        self.select_file(file_id)?;
        let length = self.read_binary(0, LENGTH_PREFIX_SIZE)?;
        if length.len() != LENGTH_PREFIX_SIZE {
            return Err(ClientError::InvalidResponse);
        }
        let length = BigEndian::read_u16(&length) as usize;
        debug!("Reading {} bytes from file {:#06x}", length, file_id);

        let mut data = Vec::with_capacity(length);
        while data.len() < length {
            let need = length - data.len();
            let offset = LENGTH_PREFIX_SIZE + data.len();
            let chunk = self.read_binary(offset, min(min(need, max_read), MAX_LE))?;
            if chunk.is_empty() {
                return Err(ClientError::InvalidResponse);
            }
            data.extend_from_slice(&chunk[..min(chunk.len(), need)]);
        }
        Ok(data)
    }

    fn write_file_chunks(
        &mut self,
        file_id: u16,
        data: &[u8],
        max_write: usize,
    ) -> Result<(), ClientError> {
        debug!("Writing {} bytes to file {:#06x}", data.len(), file_id);
        self.select_file(file_id)?;
        self.update_binary(0, &[0x00, 0x00], max_write)?;
        for (index, chunk) in data.chunks(max_write).enumerate() {
            let offset = LENGTH_PREFIX_SIZE + index * max_write;
            self.update_binary(offset, chunk, max_write)?;
        }
        self.update_binary(0, &(data.len() as u16).to_be_bytes(), max_write)
    }

    fn select_file(&mut self, file_id: u16) -> Result<(), ClientError> {
        let header = ApduHeader {
            cla: CLA_ISO,
            ins: ApduInstructions::Select as u8,
            p1: SELECT_BY_FILE_ID,
            p2: SELECT_FIRST_OR_ONLY,
        };
        self.transact(Apdu::new(header, file_id.to_be_bytes().to_vec(), 0))?;
        Ok(())
    }

    fn read_binary(&mut self, offset: usize, le: usize) -> Result<Vec<u8>, ClientError> {
        let offset = offset_parameter(offset)?;
        let header = ApduHeader {
            cla: CLA_ISO,
            ins: ApduInstructions::ReadBinary as u8,
            p1: offset[0],
            p2: offset[1],
        };
        let data = self.transact(Apdu::new(header, Vec::new(), le as u32))?;
        if data.len() > le {
            return Err(ClientError::ChunkTooLong);
        }
        Ok(data)
    }

    fn update_binary(
        &mut self,
        offset: usize,
        data: &[u8],
        max_write: usize,
    ) -> Result<(), ClientError> {
        if data.len() > max_write {
            return Err(ClientError::ChunkTooLong);
        }
        let offset = offset_parameter(offset)?;
        let header = ApduHeader {
            cla: CLA_ISO,
            ins: ApduInstructions::UpdateBinary as u8,
            p1: offset[0],
            p2: offset[1],
        };
        self.transact(Apdu::new(header, data.to_vec(), 0))?;
        Ok(())
    }

    fn transact(&mut self, command: Apdu) -> Result<Vec<u8>, ClientError> {
        let response = self.channel.transmit(&command.to_bytes())?;
        let (data, status) = split_response(&response).ok_or(ClientError::InvalidResponse)?;
        if status != u16::from(ApduStatusCode::SW_SUCCESS) {
            debug!(
                "Command {:02x?} failed with status {:#06x}",
                command.header, status
            );
            return Err(ClientError::Status(status));
        }
        Ok(data.to_vec())
    }
}

// Encodes a file offset as P1-P2.
fn offset_parameter(offset: usize) -> Result<[u8; 2], ClientError> {
    if offset > MAX_OFFSET {
        return Err(ClientError::DataTooLarge);
    }
    Ok((offset as u16).to_be_bytes())
}
