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

use arbitrary::{Arbitrary, Unstructured};
use ndef_tag::api::connection::Interface;
use ndef_tag::env::test::TestEnv;
use ndef_tag::tag::capability::CapabilityContainer;
use ndef_tag::tag::file::AccessCode;
use ndef_tag::tag::NDEF_AID;
use ndef_tag::NdefTag;
use std::convert::TryFrom;

const SELECT_APPLET: [u8; 12] = [
    0x00, 0xA4, 0x04, 0x0C, 0x07, 0xD2, 0x76, 0x00, 0x00, 0x85, 0x01, 0x01,
];

#[derive(Clone, Copy, PartialEq)]
pub enum InputType {
    /// A single command APDU to a selected tag.
    Apdu,
    /// A GlobalPlatform install buffer.
    InstallData,
}

/// A tag configuration and a sequence of commands it receives.
#[derive(Arbitrary, Debug)]
pub struct FuzzSession {
    read_access: AccessCode,
    write_access: AccessCode,
    data_size: u16,
    commands: Vec<(Interface, Vec<u8>)>,
}

fn install_buffer(applet_data: &[u8]) -> Vec<u8> {
    let mut buffer = vec![NDEF_AID.len() as u8];
    buffer.extend_from_slice(&NDEF_AID);
    buffer.push(0x00);
    buffer.push(applet_data.len() as u8);
    buffer.extend_from_slice(applet_data);
    buffer
}

// Checks the invariants that hold after every command.
fn check_tag(tag: &mut NdefTag<TestEnv>, response: &[u8]) {
    assert!(response.len() >= 2);
    let files = tag.state().files();
    for &interface in &[Interface::Contact, Interface::Contactless] {
        let bytes = files.disclosed_capabilities(interface).to_bytes();
        let capabilities = CapabilityContainer::try_from(bytes.as_slice()).unwrap();
        for file in &capabilities.files {
            for &code in &[file.read_access, file.write_access] {
                assert!(!AccessCode::try_from(code).map_or(false, AccessCode::is_proprietary));
            }
        }
    }
}

fn process_commands(tag: &mut NdefTag<TestEnv>, commands: &[(Interface, Vec<u8>)]) {
    for (interface, command) in commands {
        let response = tag.process_apdu(command, *interface);
        check_tag(tag, &response);
    }
}

/// Interprets the raw data according to the input type and runs it through a tag.
pub fn process_input(data: &[u8], input_type: InputType) {
    match input_type {
        InputType::Apdu => {
            let mut tag = NdefTag::new(TestEnv::default());
            let response = tag.process_apdu(&SELECT_APPLET, Interface::Contactless);
            check_tag(&mut tag, &response);
            process_commands(&mut tag, &[(Interface::Contactless, data.to_vec())]);
        }
        InputType::InstallData => {
            if let Ok(mut tag) = NdefTag::install(TestEnv::default(), data) {
                let response = tag.process_apdu(&SELECT_APPLET, Interface::Contact);
                check_tag(&mut tag, &response);
            }
        }
    }
}

/// Builds a tag from structured data and runs the command sequence through it.
pub fn process_structured(data: &[u8]) {
    let mut unstructured = Unstructured::new(data);
    let session = match FuzzSession::arbitrary(&mut unstructured) {
        Ok(session) => session,
        Err(_) => return,
    };
    let size = session.data_size.to_be_bytes();
    let applet_data = [
        0x81,
        0x02,
        u8::from(session.read_access),
        u8::from(session.write_access),
        0x82,
        0x02,
        size[0],
        size[1],
    ];
    let mut tag = match NdefTag::install(TestEnv::default(), &install_buffer(&applet_data)) {
        Ok(tag) => tag,
        Err(_) => return,
    };
    let response = tag.process_apdu(&SELECT_APPLET, Interface::Contactless);
    check_tag(&mut tag, &response);
    process_commands(&mut tag, &session.commands);
}
