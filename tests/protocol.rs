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

use ndef_tag::api::connection::Interface;
use ndef_tag::client::{ClientError, NdefClient};
use ndef_tag::env::test::TestEnv;
use ndef_tag::tag::NDEF_AID;
use ndef_tag::test_helpers::LoopbackChannel;
use ndef_tag::NdefTag;
use std::cell::Cell;
use std::rc::Rc;

const SELECT_DATA: [u8; 7] = [0x00, 0xA4, 0x00, 0x0C, 0x02, 0xE1, 0x04];
const READ_LENGTH: [u8; 5] = [0x00, 0xB0, 0x00, 0x00, 0x02];
const UPDATE_BINARY: u8 = 0xD6;

fn install_data(applet_data: &[u8]) -> Vec<u8> {
    let mut buffer = vec![NDEF_AID.len() as u8];
    buffer.extend_from_slice(&NDEF_AID);
    buffer.push(0x00);
    buffer.push(applet_data.len() as u8);
    buffer.extend_from_slice(applet_data);
    buffer
}

fn install(applet_data: &[u8]) -> NdefTag<TestEnv> {
    NdefTag::install(TestEnv::default(), &install_data(applet_data)).unwrap()
}

fn connect(tag: NdefTag<TestEnv>) -> NdefClient<LoopbackChannel<TestEnv>> {
    let mut client = NdefClient::new(LoopbackChannel::new(tag));
    client.connect().unwrap();
    client
}

#[test]
fn install_with_size_and_open_access() {
    let tag = install(&[0x82, 0x02, 0x01, 0x00, 0x81, 0x02, 0x00, 0x00]);
    let client = connect(tag);
    let capabilities = client.capabilities().unwrap();
    assert_eq!(capabilities.mapping_version, 0x20);
    let file = capabilities.find_file(0xE104).unwrap();
    assert_eq!(file.file_size, 0x0100);
    assert_eq!(file.read_access, 0x00);
    assert_eq!(file.write_access, 0x00);
}

#[test]
fn install_with_initial_data() {
    let tag = install(&[0x80, 0x03, b'a', b'b', b'c']);
    let mut client = connect(tag);
    let file = client.capabilities().unwrap().find_file(0xE104).unwrap();
    assert_eq!(file.file_size, 5);
    assert_eq!(file.write_access, 0xFF);
    assert_eq!(client.read_data(), Ok(b"abc".to_vec()));

    assert_eq!(client.write_data(b"x"), Err(ClientError::Status(0x6982)));
    assert!(!client.is_connected());
    assert!(!client.channel().is_exclusive());
}

#[test]
fn write_and_read_in_chunks() {
    let tag = install(&[0x82, 0x02, 0x02, 0x00]);
    let mut client = connect(tag);
    assert_eq!(client.capabilities().unwrap().max_write, 128);
    client.channel().clear_commands();

    let payload: Vec<u8> = (0..300).map(|i| i as u8).collect();
    let observed_empty = Rc::new(Cell::new(0));
    let observations = observed_empty.clone();
    client.channel().set_observer(move |tag, command| {
        let is_final_write =
            command[1] == UPDATE_BINARY && command[2..4] == [0x00, 0x00] && command[5..] != [0, 0];
        if command[1] == UPDATE_BINARY && (command[2..4] != [0x00, 0x00] || is_final_write) {
            // A concurrent reader only ever sees an empty message.
            tag.process_apdu(&SELECT_DATA, Interface::Contactless);
            let response = tag.process_apdu(&READ_LENGTH, Interface::Contactless);
            assert_eq!(response, vec![0x00, 0x00, 0x90, 0x00]);
            observations.set(observations.get() + 1);
        }
    });
    assert_eq!(client.write_data(&payload), Ok(()));
    assert_eq!(observed_empty.get(), 4);

    let updates: Vec<(u16, usize)> = client
        .channel()
        .commands()
        .iter()
        .filter(|command| command[1] == UPDATE_BINARY)
        .map(|command| {
            let offset = u16::from_be_bytes([command[2], command[3]]);
            (offset, command[4] as usize)
        })
        .collect();
    assert_eq!(
        updates,
        vec![(0, 2), (2, 128), (130, 128), (258, 44), (0, 2)]
    );
    let last = client.channel().commands().last().unwrap().clone();
    assert_eq!(&last[5..], &[0x01, 0x2C]);

    assert_eq!(client.read_data(), Ok(payload));
}

#[test]
fn write_once() {
    let tag = install(&[0x81, 0x02, 0x00, 0xF1]);
    let mut client = connect(tag);
    let file = client.capabilities().unwrap().find_file(0xE104).unwrap();
    assert_eq!(file.write_access, 0x00);
    assert_eq!(client.write_data(b"hello"), Ok(()));
    assert_eq!(client.read_data(), Ok(b"hello".to_vec()));

    client.connect().unwrap();
    let file = client.capabilities().unwrap().find_file(0xE104).unwrap();
    assert_eq!(file.write_access, 0xFF);
    assert_eq!(client.write_data(b"world"), Err(ClientError::Status(0x6982)));

    client.connect().unwrap();
    assert_eq!(client.read_data(), Ok(b"hello".to_vec()));
}

#[test]
fn contact_only() {
    let tag = install(&[0x81, 0x02, 0xF0, 0xF0]);
    let mut client = connect(tag);
    let file = client.capabilities().unwrap().find_file(0xE104).unwrap();
    assert_eq!((file.read_access, file.write_access), (0xFF, 0xFF));
    assert_eq!(client.read_data(), Err(ClientError::Status(0x6982)));

    client.channel().set_interface(Interface::Contact);
    client.connect().unwrap();
    let file = client.capabilities().unwrap().find_file(0xE104).unwrap();
    assert_eq!((file.read_access, file.write_access), (0x00, 0x00));
    assert_eq!(client.write_data(b"contact"), Ok(()));
    assert_eq!(client.read_data(), Ok(b"contact".to_vec()));
}

#[test]
fn proprietary_codes_are_never_disclosed() {
    for &interface in &[Interface::Contact, Interface::Contactless] {
        let tag = install(&[0x81, 0x02, 0xF0, 0xF1]);
        let mut client = NdefClient::new(LoopbackChannel::with_interface(tag, interface));
        client.connect().unwrap();
        let file = client.capabilities().unwrap().find_file(0xE104).unwrap();
        for &code in &[file.read_access, file.write_access] {
            assert!(code == 0x00 || code == 0xFF);
        }
    }
}

#[test]
fn size_is_checked_before_writing() {
    let tag = install(&[0x82, 0x02, 0x00, 0x10]);
    let mut client = connect(tag);
    let sent = client.channel().commands().len();
    assert_eq!(client.write_data(&[0x42; 15]), Err(ClientError::DataTooLarge));
    assert_eq!(client.channel().commands().len(), sent);
    assert!(client.is_connected());

    assert_eq!(client.write_data(&[0x42; 14]), Ok(()));
    assert_eq!(client.read_data(), Ok(vec![0x42; 14]));
}

#[test]
fn read_only_tag() {
    let mut env = TestEnv::default();
    env.customization_mut().writing_supported = false;
    let tag = NdefTag::install(env, &install_data(&[0x81, 0x02, 0x00, 0x00])).unwrap();
    let mut client = connect(tag);
    let file = client.capabilities().unwrap().find_file(0xE104).unwrap();
    assert_eq!(file.write_access, 0xFF);
    assert_eq!(client.write_data(b"x"), Err(ClientError::Status(0x6986)));
}

#[test]
fn disconnect_releases_card() {
    let mut client = connect(NdefTag::new(TestEnv::default()));
    assert!(client.channel().is_exclusive());
    client.disconnect();
    assert!(!client.channel().is_exclusive());
    assert_eq!(client.read_data(), Err(ClientError::NotConnected));
    assert!(client.detect());
    assert_eq!(client.read_data(), Ok(Vec::new()));
}

#[test]
fn unknown_application() {
    let tag = NdefTag::new(TestEnv::default());
    let mut client = NdefClient::with_aid(LoopbackChannel::new(tag), vec![0xF0, 1, 2, 3, 4]);
    assert_eq!(client.connect(), Err(ClientError::Status(0x6A82)));
    assert!(!client.is_connected());
    assert!(!client.channel().is_exclusive());
}

#[test]
fn reset_deselects_application() {
    let mut client = connect(NdefTag::new(TestEnv::default()));
    client.channel().tag().reset();
    assert_eq!(client.read_data(), Err(ClientError::Status(0x6986)));
    assert!(!client.is_connected());
}
