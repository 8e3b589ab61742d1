//! PEM text encoding of a single DER certificate.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

pub const BEGIN_CERTIFICATE: &str = "-----BEGIN CERTIFICATE-----";
pub const END_CERTIFICATE: &str = "-----END CERTIFICATE-----";

const LINE_WIDTH: usize = 64;

#[derive(Debug, Error)]
pub enum PemError {
    #[error("missing BEGIN CERTIFICATE marker")]
    MissingBegin,
    #[error("missing END CERTIFICATE marker")]
    MissingEnd,
    #[error("certificate block is empty")]
    Empty,
    #[error("invalid base64 in certificate block: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Wraps DER bytes in a `CERTIFICATE` block with 64-column base64 lines.
pub fn encode_pem(der: &[u8]) -> String {
    let body = STANDARD.encode(der);
    let mut pem = String::with_capacity(body.len() + body.len() / LINE_WIDTH + 64);
    pem.push_str(BEGIN_CERTIFICATE);
    pem.push('\n');
    for (i, c) in body.chars().enumerate() {
        if i > 0 && i % LINE_WIDTH == 0 {
            pem.push('\n');
        }
        pem.push(c);
    }
    pem.push('\n');
    pem.push_str(END_CERTIFICATE);
    pem.push('\n');
    pem
}

/// Extracts the DER bytes of the first `CERTIFICATE` block in `text`.
pub fn decode_pem(text: &str) -> Result<Vec<u8>, PemError> {
    let start = text.find(BEGIN_CERTIFICATE).ok_or(PemError::MissingBegin)? + BEGIN_CERTIFICATE.len();
    let len = text[start..].find(END_CERTIFICATE).ok_or(PemError::MissingEnd)?;
    let body: String = text[start..start + len]
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if body.is_empty() {
        return Err(PemError::Empty);
    }
    Ok(STANDARD.decode(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = include_str!("../testdata/localhost.pem");

    #[test]
    fn decodes_openssl_output_and_re_encodes_identically() {
        let der = decode_pem(FIXTURE).unwrap();
        assert_eq!(der[0], 0x30, "DER certificates start with a SEQUENCE tag");
        assert_eq!(encode_pem(&der), FIXTURE);
    }

    #[test]
    fn lines_are_at_most_64_columns() {
        let pem = encode_pem(&[0xAB; 300]);
        assert!(pem.starts_with(BEGIN_CERTIFICATE));
        assert!(pem.lines().all(|line| line.len() <= LINE_WIDTH));
    }

    #[test]
    fn rejects_text_without_markers() {
        assert!(matches!(decode_pem("hello"), Err(PemError::MissingBegin)));
        assert!(matches!(
            decode_pem("-----BEGIN CERTIFICATE-----\nAAAA\n"),
            Err(PemError::MissingEnd)
        ));
    }

    #[test]
    fn rejects_empty_block() {
        let text = format!("{BEGIN_CERTIFICATE}\n\n{END_CERTIFICATE}\n");
        assert!(matches!(decode_pem(&text), Err(PemError::Empty)));
    }

    #[test]
    fn rejects_invalid_base64() {
        let text = format!("{BEGIN_CERTIFICATE}\n!!!!\n{END_CERTIFICATE}\n");
        assert!(matches!(decode_pem(&text), Err(PemError::Base64(_))));
    }
}
