//! Reading whole records off a stream.

use tokio::io::{AsyncRead, AsyncReadExt};

use super::codec::unpack2;
use super::{TlsError, MAX_FRAGMENT_LEN};

/// Header size: type, version, length.
pub const RECORD_HEADER_LEN: usize = 5;

/// Largest record payload a peer may legally send (RFC 5246 §6.2.3).
pub const MAX_RECORD_PAYLOAD: usize = MAX_FRAGMENT_LEN + 2048;

/// Read exactly one record, returning header and payload together.
pub async fn read_record<S>(stream: &mut S) -> Result<Vec<u8>, TlsError>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; RECORD_HEADER_LEN];
    stream.read_exact(&mut header).await?;

    let payload_len = unpack2([header[3], header[4]]) as usize;
    if payload_len > MAX_RECORD_PAYLOAD {
        return Err(TlsError::RecordTooLarge(payload_len));
    }

    let mut record = Vec::with_capacity(RECORD_HEADER_LEN + payload_len);
    record.extend_from_slice(&header);
    record.resize(RECORD_HEADER_LEN + payload_len, 0);
    stream.read_exact(&mut record[RECORD_HEADER_LEN..]).await?;

    Ok(record)
}
