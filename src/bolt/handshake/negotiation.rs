//! Bolt handshake negotiation.
//!
//! The client writes the magic preamble followed by four version proposals,
//! then reads a single 4-byte answer naming the version the server picked.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::{BoltVersion, HandshakeError, VersionProposal, BOLT_MAGIC, HANDSHAKE_SIZE};
use crate::bolt::error::{BoltError, BoltResult};

/// Build the 20-byte client preamble. Unused slots are zero.
pub fn client_handshake(proposals: &[VersionProposal]) -> Result<[u8; HANDSHAKE_SIZE], HandshakeError> {
    if proposals.is_empty() || proposals.len() > 4 {
        return Err(HandshakeError::InvalidData(format!(
            "Expected 1 to 4 version proposals, got {}",
            proposals.len()
        )));
    }

    let mut data = [0u8; HANDSHAKE_SIZE];
    data[0..4].copy_from_slice(&BOLT_MAGIC);
    for (i, proposal) in proposals.iter().enumerate() {
        let offset = 4 + i * 4;
        data[offset..offset + 4].copy_from_slice(&proposal.to_bytes());
    }
    Ok(data)
}

/// Interpret the server's 4-byte answer.
pub fn parse_server_response(response: [u8; 4]) -> BoltResult<BoltVersion> {
    let raw = u32::from_be_bytes(response);
    if raw == 0 {
        return Err(HandshakeError::NoCompatibleVersion.into());
    }
    if raw & 0xFFFF_0000 != 0 {
        // A chosen version never carries a range.
        return Err(BoltError::UnsupportedVersion(raw));
    }
    BoltVersion::from_u32(raw).ok_or(BoltError::UnsupportedVersion(raw))
}

/// Perform the handshake over `stream` and return the agreed version.
pub async fn negotiate<S>(stream: &mut S, proposals: &[VersionProposal]) -> BoltResult<BoltVersion>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let preamble = client_handshake(proposals)?;
    stream.write_all(&preamble).await?;
    stream.flush().await?;

    let mut response = [0u8; 4];
    stream.read_exact(&mut response).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            BoltError::Handshake(HandshakeError::ConnectionClosed)
        } else {
            BoltError::Io(e)
        }
    })?;

    let version = parse_server_response(response)?;
    debug!(%version, "negotiated bolt version");
    Ok(version)
}

/// Server-side choice for a client preamble: the first proposal (in client
/// order) that covers a supported version. Returns the 4-byte answer.
///
/// Scripted peers use this to answer [`negotiate`].
pub fn select_version(preamble: &[u8], supported: &[BoltVersion]) -> [u8; 4] {
    if preamble.len() < HANDSHAKE_SIZE || preamble[0..4] != BOLT_MAGIC {
        return [0; 4];
    }

    preamble[4..HANDSHAKE_SIZE]
        .chunks_exact(4)
        .filter_map(|slot| {
            let version = BoltVersion::from_parts(slot[3], slot[2])?;
            Some(VersionProposal::with_range(version, slot[1]))
        })
        .flat_map(VersionProposal::versions)
        .find(|v| supported.contains(v))
        .map(BoltVersion::to_bytes)
        .unwrap_or([0; 4])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_handshake_layout() {
        let data = client_handshake(&[
            VersionProposal::with_range(BoltVersion::V4_4, 2),
            BoltVersion::V4_1.into(),
            BoltVersion::V3.into(),
        ])
        .unwrap();

        assert_eq!(&data[0..4], &BOLT_MAGIC);
        assert_eq!(&data[4..8], &[0x00, 0x02, 0x04, 0x04]);
        assert_eq!(&data[8..12], &[0x00, 0x00, 0x01, 0x04]);
        assert_eq!(&data[12..16], &[0x00, 0x00, 0x00, 0x03]);
        assert_eq!(&data[16..20], &[0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_too_many_proposals() {
        let five = [VersionProposal::exact(BoltVersion::V4_4); 5];
        assert!(matches!(client_handshake(&five), Err(HandshakeError::InvalidData(_))));
        assert!(client_handshake(&[]).is_err());
    }

    #[test]
    fn test_parse_zero_response() {
        assert!(matches!(
            parse_server_response([0; 4]),
            Err(BoltError::Handshake(HandshakeError::NoCompatibleVersion))
        ));
    }

    #[test]
    fn test_parse_unknown_version() {
        assert!(matches!(
            parse_server_response([0x00, 0x00, 0x00, 0x05]),
            Err(BoltError::UnsupportedVersion(5))
        ));
        assert_eq!(parse_server_response([0, 0, 3, 4]).unwrap(), BoltVersion::V4_3);
    }

    #[test]
    fn test_select_version_honours_range() {
        let preamble = client_handshake(&[VersionProposal::with_range(BoltVersion::V4_4, 3)]).unwrap();
        assert_eq!(select_version(&preamble, &[BoltVersion::V4_2]), BoltVersion::V4_2.to_bytes());
        assert_eq!(select_version(&preamble, &[BoltVersion::V3]), [0; 4]);
    }

    #[tokio::test]
    async fn test_negotiate_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(64);

        let peer = tokio::spawn(async move {
            let mut preamble = [0u8; HANDSHAKE_SIZE];
            server.read_exact(&mut preamble).await.unwrap();
            let answer = select_version(&preamble, &[BoltVersion::V4_1, BoltVersion::V3]);
            server.write_all(&answer).await.unwrap();
        });

        let proposals = [VersionProposal::exact(BoltVersion::V4_4), VersionProposal::exact(BoltVersion::V4_1)];
        let version = negotiate(&mut client, &proposals).await.unwrap();
        assert_eq!(version, BoltVersion::V4_1);
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_negotiate_peer_hangs_up() {
        let (mut client, server) = tokio::io::duplex(64);
        drop(server);

        let err = negotiate(&mut client, &[VersionProposal::exact(BoltVersion::V4_4)]).await.unwrap_err();
        assert!(matches!(err, BoltError::Io(_) | BoltError::Handshake(HandshakeError::ConnectionClosed)));
    }
}
