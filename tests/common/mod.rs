//! Shared utilities for the integration tests.

use std::io::Read;
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use sni_responder::challenge::SigningKey;
use sni_responder::config::ResponderConfig;

/// ClientHello for www.eff.org as sent by a 2014-era browser.
#[allow(dead_code)]
pub const EFF_CLIENT_HELLO: &str = concat!(
    "16030100c4010000c003030cfef9971eda442c60cbb6c397",
    "7957a81a8ada317e800b7867a8c61f71c40cab000020c02b",
    "c02fc00ac009c013c014c007c011003300320039002f0035",
    "000a000500040100007700000010000e00000b7777772e65",
    "66662e6f7267ff01000100000a0008000600170018001900",
    "0b00020100002300003374000000100021001f0568322d31",
    "3408737064792f332e3106737064792f3308687474702f31",
    "2e31000500050100000000000d0012001004010501020104",
    "030503020304020202",
);

pub fn decode_hex(hex: &str) -> Vec<u8> {
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
        .collect()
}

fn vec16(body: &[u8]) -> Vec<u8> {
    let mut out = (body.len() as u16).to_be_bytes().to_vec();
    out.extend_from_slice(body);
    out
}

/// ClientHello record with a 2-byte session id and one SNI host name.
pub fn client_hello(server_name: &str) -> Vec<u8> {
    let mut list = vec![0x00];
    list.extend(vec16(server_name.as_bytes()));
    let mut extensions = vec![0x00, 0x00];
    extensions.extend(vec16(&vec16(&list)));

    let mut body = vec![0x03, 0x03];
    body.extend([0x42; 32]);
    body.extend([2, 0xab, 0xcd]);
    body.extend(vec16(&[0xc0, 0x2b, 0xc0, 0x2f]));
    body.extend([1, 0]);
    body.extend(vec16(&extensions));

    let mut handshake = vec![0x01];
    handshake.extend(&(body.len() as u32).to_be_bytes()[1..]);
    handshake.extend(body);

    let mut record = vec![0x16, 0x03, 0x01];
    record.extend(vec16(&handshake));
    record
}

pub fn signing_key() -> SigningKey {
    SigningKey::from_pem(rcgen::KeyPair::generate().unwrap().serialize_pem()).unwrap()
}

/// A loopback port that was free a moment ago.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Loopback config with short timeouts.
pub fn loopback_config(port: u16) -> ResponderConfig {
    let mut config = ResponderConfig::default();
    config.listener.bind_address = "127.0.0.1".into();
    config.listener.port = port;
    config.timeouts.startup_secs = 5;
    config.timeouts.handshake_secs = 2;
    config
}

/// Send `request` and collect everything the server writes before closing.
pub fn exchange(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    use std::io::Write;

    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.write_all(request).unwrap();

    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).unwrap();
    reply
}
