//! Server flight synthesis: ServerHello, Certificate, ServerHelloDone, Alert.

use rand::RngCore;

use super::codec::{pack2, pack3_len};
use super::{
    TlsError, CONTENT_TYPE_ALERT, CONTENT_TYPE_HANDSHAKE, HANDSHAKE_CERTIFICATE,
    HANDSHAKE_SERVER_HELLO, HANDSHAKE_SERVER_HELLO_DONE, MAX_FRAGMENT_LEN, TLS12,
};

/// TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256, answered to every client.
pub const SELECTED_CIPHER_SUITE: [u8; 2] = [0xc0, 0x2b];

const COMPRESSION_NULL: u8 = 0x00;

/// Record header plus an empty ServerHelloDone handshake message.
const SERVER_HELLO_DONE: [u8; 9] = [
    CONTENT_TYPE_HANDSHAKE,
    TLS12[0],
    TLS12[1],
    0x00,
    0x04,
    HANDSHAKE_SERVER_HELLO_DONE,
    0x00,
    0x00,
    0x00,
];

const ALERT_LEVEL_FATAL: u8 = 0x02;

/// Alert descriptions the responder sends.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDescription {
    UnrecognizedName = 112,
}

/// Build a ServerHello record echoing `session_id` with fresh server randomness.
pub fn build_server_hello<R: RngCore + ?Sized>(
    rng: &mut R,
    session_id: &[u8],
) -> Result<Vec<u8>, TlsError> {
    let session_len =
        u8::try_from(session_id.len()).map_err(|_| TlsError::SessionIdTooLong(session_id.len()))?;

    let mut random = [0u8; 32];
    rng.fill_bytes(&mut random);

    let mut body = Vec::with_capacity(2 + 32 + 1 + session_id.len() + 2 + 1);
    body.extend_from_slice(&TLS12);
    body.extend_from_slice(&random);
    body.push(session_len);
    body.extend_from_slice(session_id);
    body.extend_from_slice(&SELECTED_CIPHER_SUITE);
    body.push(COMPRESSION_NULL);

    handshake_records(HANDSHAKE_SERVER_HELLO, &body)
}

/// Build a Certificate record carrying a single DER certificate (no chain).
pub fn build_certificate_message(cert_der: &[u8]) -> Result<Vec<u8>, TlsError> {
    let mut entry = pack3_len(cert_der.len())?.to_vec();
    entry.extend_from_slice(cert_der);

    let mut list = pack3_len(entry.len())?.to_vec();
    list.extend_from_slice(&entry);

    handshake_records(HANDSHAKE_CERTIFICATE, &list)
}

pub fn build_server_hello_done() -> [u8; 9] {
    SERVER_HELLO_DONE
}

/// Build a fatal alert record.
pub fn build_alert(description: AlertDescription) -> [u8; 7] {
    let [len_hi, len_lo] = pack2(2);
    [
        CONTENT_TYPE_ALERT,
        TLS12[0],
        TLS12[1],
        len_hi,
        len_lo,
        ALERT_LEVEL_FATAL,
        description as u8,
    ]
}

/// Frame a handshake message and wrap it in as many records as it needs.
fn handshake_records(msg_type: u8, body: &[u8]) -> Result<Vec<u8>, TlsError> {
    let mut message = Vec::with_capacity(4 + body.len());
    message.push(msg_type);
    message.extend_from_slice(&pack3_len(body.len())?);
    message.extend_from_slice(body);

    let mut out = Vec::with_capacity(message.len() + 5);
    for fragment in message.chunks(MAX_FRAGMENT_LEN) {
        out.push(CONTENT_TYPE_HANDSHAKE);
        out.extend_from_slice(&TLS12);
        // chunks() never yields more than MAX_FRAGMENT_LEN, which fits in u16.
        out.extend_from_slice(&pack2(fragment.len() as u16));
        out.extend_from_slice(fragment);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::codec::{unpack2, unpack3};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn record_len(record: &[u8]) -> usize {
        unpack2([record[3], record[4]]) as usize
    }

    fn handshake_len(record: &[u8]) -> usize {
        unpack3([record[6], record[7], record[8]]) as usize
    }

    #[test]
    fn server_hello_header_matches_reference_bytes() {
        let mut rng = StdRng::seed_from_u64(1);
        let hello = build_server_hello(&mut rng, b"Q!").unwrap();
        assert_eq!(
            &hello[..11],
            &[0x16, 0x03, 0x03, 0x00, 0x2c, 0x02, 0x00, 0x00, 0x28, 0x03, 0x03]
        );
        assert_eq!(&hello[43..], &[0x02, b'Q', b'!', 0xc0, 0x2b, 0x00]);
    }

    #[test]
    fn server_hello_lengths_track_session_id() {
        let mut rng = StdRng::seed_from_u64(2);
        for session_id in [Vec::new(), vec![0xab; 255]] {
            let hello = build_server_hello(&mut rng, &session_id).unwrap();
            assert_eq!(record_len(&hello), hello.len() - 5);
            assert_eq!(handshake_len(&hello), hello.len() - 9);
            assert_eq!(hello[43] as usize, session_id.len());
            assert_eq!(&hello[44..44 + session_id.len()], session_id.as_slice());
        }
    }

    #[test]
    fn server_hello_rejects_oversized_session_id() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(matches!(
            build_server_hello(&mut rng, &[0; 256]),
            Err(TlsError::SessionIdTooLong(256))
        ));
    }

    #[test]
    fn server_hello_randomness_differs_between_calls() {
        let mut rng = StdRng::seed_from_u64(4);
        let first = build_server_hello(&mut rng, &[]).unwrap();
        let second = build_server_hello(&mut rng, &[]).unwrap();
        assert_ne!(&first[11..43], &second[11..43]);
    }

    #[test]
    fn certificate_message_nests_three_lengths() {
        let der = vec![0x30; 482];
        let msg = build_certificate_message(&der).unwrap();
        assert_eq!(
            &msg[..15],
            &[0x16, 0x03, 0x03, 0x01, 0xec, 0x0b, 0x00, 0x01, 0xe8, 0x00, 0x01, 0xe5, 0x00, 0x01, 0xe2]
        );
        assert_eq!(&msg[15..], der.as_slice());
    }

    #[test]
    fn certificate_message_fragments_large_certificates() {
        let der = vec![0x42; MAX_FRAGMENT_LEN + 100];
        let msg = build_certificate_message(&der).unwrap();

        let first_len = record_len(&msg);
        assert_eq!(first_len, MAX_FRAGMENT_LEN);
        let second = &msg[5 + first_len..];
        assert_eq!(second[0], CONTENT_TYPE_HANDSHAKE);
        assert_eq!(record_len(second), second.len() - 5);
        // Handshake header declares the whole message, not just the first fragment.
        assert_eq!(handshake_len(&msg), der.len() + 6);
    }

    #[test]
    fn server_hello_done_is_constant() {
        assert_eq!(
            build_server_hello_done(),
            [0x16, 0x03, 0x03, 0x00, 0x04, 0x0e, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn unrecognized_name_alert_is_fatal() {
        assert_eq!(
            build_alert(AlertDescription::UnrecognizedName),
            [0x15, 0x03, 0x03, 0x00, 0x02, 0x02, 112]
        );
    }
}
