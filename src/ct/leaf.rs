// RFC 6962 Merkle tree leaf codec
//
// Decodes the base64 leaf_input of a get-entries response far enough to
// pull out the DER certificate. Layout of a v1 MerkleTreeLeaf:
//   byte 0       version (0)
//   byte 1       leaf type (0 = timestamped_entry)
//   bytes 2-9    timestamp, big-endian milliseconds
//   bytes 10-11  entry type (0 = x509_entry, 1 = precert_entry)
//   bytes 12-14  certificate length, 24-bit big-endian
//   bytes 15..   DER certificate

use crate::error::CertStreamError;
use crate::Result;
use base64::Engine;

const ENTRY_TYPE_X509: u16 = 0;
const ENTRY_TYPE_PRECERT: u16 = 1;

/// Outcome of decoding one leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLeaf {
    /// DER-encoded X.509 certificate
    X509(Vec<u8>),
    /// Precertificate entry, recognized but not streamed
    Precert,
}

/// Decode a base64 `leaf_input` into its certificate payload.
pub fn decode_leaf(leaf_input: &str) -> Result<ParsedLeaf> {
    let leaf = base64::engine::general_purpose::STANDARD
        .decode(leaf_input)
        .map_err(|e| CertStreamError::ParseError {
            message: format!("invalid leaf_input base64: {}", e),
        })?;
    parse_leaf(&leaf)
}

/// Parse raw MerkleTreeLeaf bytes.
pub fn parse_leaf(leaf: &[u8]) -> Result<ParsedLeaf> {
    if leaf.len() < 15 {
        return Err(parse_error(format!("leaf too short: {} bytes", leaf.len())));
    }

    let version = leaf[0];
    if version != 0 {
        return Err(parse_error(format!("unsupported leaf version: {}", version)));
    }

    let leaf_type = leaf[1];
    if leaf_type != 0 {
        return Err(parse_error(format!("unsupported leaf type: {}", leaf_type)));
    }

    let entry_type = u16::from_be_bytes([leaf[10], leaf[11]]);
    match entry_type {
        ENTRY_TYPE_X509 => {
            let cert_len = u32::from_be_bytes([0, leaf[12], leaf[13], leaf[14]]) as usize;
            let cert_start = 15;
            let cert_end = cert_start + cert_len;
            if cert_end > leaf.len() {
                return Err(parse_error(format!(
                    "certificate length {} exceeds leaf size {}",
                    cert_len,
                    leaf.len()
                )));
            }
            Ok(ParsedLeaf::X509(leaf[cert_start..cert_end].to_vec()))
        }
        ENTRY_TYPE_PRECERT => Ok(ParsedLeaf::Precert),
        other => Err(parse_error(format!("unknown entry type: {}", other))),
    }
}

fn parse_error(message: String) -> CertStreamError {
    CertStreamError::ParseError { message }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_x509_leaf(payload: &[u8]) -> Vec<u8> {
        let mut leaf = vec![0u8, 0u8];
        leaf.extend_from_slice(&1722600000000u64.to_be_bytes());
        leaf.extend_from_slice(&ENTRY_TYPE_X509.to_be_bytes());
        let len = payload.len() as u32;
        leaf.extend_from_slice(&len.to_be_bytes()[1..]);
        leaf.extend_from_slice(payload);
        leaf
    }

    #[test]
    fn test_x509_leaf_round_trip() {
        let payload = vec![0x30, 0x82, 0x01, 0x0a, 0xde, 0xad, 0xbe, 0xef];
        let leaf = encode_x509_leaf(&payload);
        assert_eq!(parse_leaf(&leaf).unwrap(), ParsedLeaf::X509(payload));
    }

    #[test]
    fn test_base64_round_trip() {
        let payload = vec![0x30, 0x03, 0x02, 0x01, 0x01];
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(encode_x509_leaf(&payload));
        assert_eq!(decode_leaf(&encoded).unwrap(), ParsedLeaf::X509(payload));
    }

    #[test]
    fn test_precert_recognized() {
        let mut leaf = vec![0u8, 0u8];
        leaf.extend_from_slice(&0u64.to_be_bytes());
        leaf.extend_from_slice(&ENTRY_TYPE_PRECERT.to_be_bytes());
        // Precert leaves carry an issuer key hash next; the codec does not
        // read past the entry type
        leaf.extend_from_slice(&[0u8; 35]);
        assert_eq!(parse_leaf(&leaf).unwrap(), ParsedLeaf::Precert);
    }

    #[test]
    fn test_rejects_bad_version() {
        let mut leaf = encode_x509_leaf(&[0x30]);
        leaf[0] = 1;
        assert!(parse_leaf(&leaf).is_err());
    }

    #[test]
    fn test_rejects_bad_leaf_type() {
        let mut leaf = encode_x509_leaf(&[0x30]);
        leaf[1] = 2;
        assert!(parse_leaf(&leaf).is_err());
    }

    #[test]
    fn test_rejects_unknown_entry_type() {
        let mut leaf = encode_x509_leaf(&[0x30]);
        leaf[11] = 7;
        assert!(parse_leaf(&leaf).is_err());
    }

    #[test]
    fn test_rejects_truncated_leaf() {
        assert!(parse_leaf(&[0u8; 14]).is_err());
        assert!(parse_leaf(&[]).is_err());
    }

    #[test]
    fn test_rejects_length_overflow() {
        let mut leaf = encode_x509_leaf(&[0x30, 0x00]);
        // Claim more certificate bytes than the leaf holds
        leaf[14] = 0xff;
        assert!(parse_leaf(&leaf).is_err());
    }

    #[test]
    fn test_rejects_invalid_base64() {
        assert!(decode_leaf("not base64!!!").is_err());
    }
}
