//! ClientHello parsing.
//!
//! Only the fields needed to pick a certificate are kept: the session id
//! and the first SNI host_name. Everything the client offers for cipher
//! or compression negotiation is skipped, since the responder answers with
//! a fixed selection.

use super::codec::Reader;
use super::server::SELECTED_CIPHER_SUITE;
use super::{TlsError, CONTENT_TYPE_HANDSHAKE, EXT_SERVER_NAME, HANDSHAKE_CLIENT_HELLO};

/// SNI name_type for a DNS hostname.
const NAME_TYPE_HOST_NAME: u8 = 0x00;

/// The parts of a ClientHello the responder acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    /// Cipher suite the responder will answer with.
    pub cipher_suite: [u8; 2],
    /// Requested hostname, lowercased.
    pub server_name: String,
    /// Session id the client offered (possibly empty).
    pub session_id: Vec<u8>,
}

/// Parse one TLS record holding a ClientHello.
pub fn parse_client_hello(raw: &[u8]) -> Result<ClientHello, TlsError> {
    let mut record = Reader::new(raw);

    let content_type = record.u8("record type")?;
    if content_type != CONTENT_TYPE_HANDSHAKE {
        return Err(TlsError::UnexpectedRecordType(content_type));
    }
    let version = record.u16("record version")?;
    if version >> 8 != 0x03 {
        return Err(TlsError::UnsupportedVersion(version));
    }
    let fragment = record.vec16("record payload")?;

    let mut handshake = Reader::new(fragment);
    let msg_type = handshake.u8("handshake type")?;
    if msg_type != HANDSHAKE_CLIENT_HELLO {
        return Err(TlsError::UnexpectedHandshakeType(msg_type));
    }
    let mut body = Reader::new(handshake.vec24("client hello body")?);

    body.u16("client version")?;
    body.take(32, "client random")?;
    let session_id = body.vec8("session id")?;
    body.vec16("cipher suites")?;
    body.vec8("compression methods")?;

    // Extensions are optional in the grammar, but without them there is no SNI.
    if body.is_empty() {
        return Err(TlsError::MissingServerName);
    }
    let mut extensions = Reader::new(body.vec16("extensions")?);

    while !extensions.is_empty() {
        let ext_type = extensions.u16("extension type")?;
        let data = extensions.vec16("extension data")?;
        if ext_type == EXT_SERVER_NAME {
            return Ok(ClientHello {
                cipher_suite: SELECTED_CIPHER_SUITE,
                server_name: parse_server_name(data)?,
                session_id: session_id.to_vec(),
            });
        }
    }

    Err(TlsError::MissingServerName)
}

/// Extract the first host_name entry of a server_name extension.
fn parse_server_name(data: &[u8]) -> Result<String, TlsError> {
    let mut list = Reader::new(Reader::new(data).vec16("server name list")?);

    while !list.is_empty() {
        let name_type = list.u8("server name type")?;
        let name = list.vec16("server name")?;
        if name_type != NAME_TYPE_HOST_NAME {
            continue;
        }
        if name.is_empty() || !name.iter().all(|b| b.is_ascii_graphic()) {
            return Err(TlsError::InvalidServerName);
        }
        let host = std::str::from_utf8(name).map_err(|_| TlsError::InvalidServerName)?;
        return Ok(host.to_ascii_lowercase());
    }

    Err(TlsError::MissingServerName)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::codec::{pack2, pack3};

    /// ClientHello for www.eff.org as sent by a 2014-era browser.
    const EFF_CLIENT_HELLO: &str = concat!(
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

    fn decode_hex(hex: &str) -> Vec<u8> {
        (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
            .collect()
    }

    fn vec16(body: &[u8]) -> Vec<u8> {
        let mut out = pack2(body.len() as u16).to_vec();
        out.extend_from_slice(body);
        out
    }

    fn sni_extension(entries: &[(u8, &[u8])]) -> Vec<u8> {
        let mut list = Vec::new();
        for (name_type, name) in entries {
            list.push(*name_type);
            list.extend(vec16(name));
        }
        let mut ext = pack2(EXT_SERVER_NAME).to_vec();
        ext.extend(vec16(&vec16(&list)));
        ext
    }

    fn client_hello(extensions: Option<&[u8]>) -> Vec<u8> {
        let mut body = vec![0x03, 0x03];
        body.extend([0x11; 32]);
        body.push(0);
        body.extend(vec16(&[0xc0, 0x2f]));
        body.extend([1, 0]);
        if let Some(ext) = extensions {
            body.extend(vec16(ext));
        }
        let mut handshake = vec![HANDSHAKE_CLIENT_HELLO];
        handshake.extend(pack3(body.len() as u32).unwrap());
        handshake.extend(body);
        let mut record = vec![CONTENT_TYPE_HANDSHAKE, 0x03, 0x01];
        record.extend(vec16(&handshake));
        record
    }

    #[test]
    fn parses_captured_client_hello() {
        let hello = parse_client_hello(&decode_hex(EFF_CLIENT_HELLO)).unwrap();
        assert_eq!(hello.cipher_suite, [0xc0, 0x2b]);
        assert_eq!(hello.server_name, "www.eff.org");
        assert!(hello.session_id.is_empty());
    }

    #[test]
    fn first_host_name_wins() {
        let ext = sni_extension(&[(0, b"first.example"), (0, b"second.example")]);
        let hello = parse_client_hello(&client_hello(Some(&ext))).unwrap();
        assert_eq!(hello.server_name, "first.example");
    }

    #[test]
    fn skips_non_host_name_entries_and_lowercases() {
        let ext = sni_extension(&[(7, b"opaque"), (0, b"AbCdEf.ACME.invalid")]);
        let hello = parse_client_hello(&client_hello(Some(&ext))).unwrap();
        assert_eq!(hello.server_name, "abcdef.acme.invalid");
    }

    #[test]
    fn missing_sni_is_rejected() {
        let mut other = pack2(0xff01).to_vec();
        other.extend(vec16(&[0]));
        assert!(matches!(
            parse_client_hello(&client_hello(Some(&other))),
            Err(TlsError::MissingServerName)
        ));
        assert!(matches!(
            parse_client_hello(&client_hello(None)),
            Err(TlsError::MissingServerName)
        ));
    }

    #[test]
    fn wrong_record_type_is_rejected() {
        let mut raw = decode_hex(EFF_CLIENT_HELLO);
        raw[0] = 0x17;
        assert!(matches!(
            parse_client_hello(&raw),
            Err(TlsError::UnexpectedRecordType(0x17))
        ));
    }

    #[test]
    fn wrong_handshake_type_is_rejected() {
        let mut raw = decode_hex(EFF_CLIENT_HELLO);
        raw[5] = 0x02;
        assert!(matches!(
            parse_client_hello(&raw),
            Err(TlsError::UnexpectedHandshakeType(0x02))
        ));
    }

    #[test]
    fn truncated_input_is_rejected_at_every_cut() {
        let raw = decode_hex(EFF_CLIENT_HELLO);
        for cut in 0..raw.len() {
            assert!(
                parse_client_hello(&raw[..cut]).is_err(),
                "prefix of {} bytes parsed",
                cut
            );
        }
    }

    #[test]
    fn overlong_inner_length_is_rejected() {
        let mut raw = decode_hex(EFF_CLIENT_HELLO);
        // Handshake length claims one byte more than the record carries.
        raw[8] = raw[8].wrapping_add(1);
        assert!(matches!(
            parse_client_hello(&raw),
            Err(TlsError::Truncated { .. })
        ));
    }
}
