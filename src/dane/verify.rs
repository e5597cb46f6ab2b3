use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use sha2::{Digest, Sha256, Sha512};
use mail_send::{smtp::tls::build_tls_connector, smtp::AssertReply, SmtpClient};
use smtp_proto::{EhloResponse, EXT_START_TLS};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use x509_parser::prelude::{FromDer, X509Certificate};

use super::Tlsa;

impl Tlsa {
    /// Whether this association matches a presented certificate.
    ///
    /// The certificate is hashed per the record's selector and matching
    /// type; usage is not interpreted here (an auditor reports that some
    /// pin covers the presented leaf, it does not enforce chain positions).
    pub fn matches(&self, der: &[u8], spki: Option<&[u8]>) -> bool {
        let input = if self.is_spki {
            match spki {
                Some(spki) => spki,
                None => return false,
            }
        } else {
            der
        };

        if self.is_sha256 {
            let mut hasher = Sha256::new();
            hasher.update(input);
            hasher.finalize()[..] == self.data[..]
        } else {
            let mut hasher = Sha512::new();
            hasher.update(input);
            hasher.finalize()[..] == self.data[..]
        }
    }
}

/// Whether any record of the set matches the DER certificate (multiple
/// records usually represent a key rollover, so one match is enough).
pub fn verify_certificate(records: &[Tlsa], der: &[u8]) -> bool {
    let parsed = X509Certificate::from_der(der).ok();
    let spki = parsed
        .as_ref()
        .map(|(_, certificate)| certificate.public_key().raw);

    records.iter().any(|record| record.matches(der, spki))
}

/// Outcome of a live STARTTLS certificate check against one MX.
#[derive(Debug)]
pub enum ProbeOutcome {
    /// The leaf certificate matched one of the TLSA records.
    Match,
    /// TLS was negotiated but no record matched the leaf certificate.
    Mismatch,
    /// The server does not advertise STARTTLS.
    NoStartTls,
    /// The server could not be reached or did not speak SMTP.
    Connect(String),
    /// STARTTLS was advertised but the upgrade failed.
    Tls(String),
}

/// Connects to an MX on port 25, negotiates STARTTLS and matches the peer's
/// leaf certificate against the MX's TLSA records.
pub async fn probe_starttls(
    addrs: &[IpAddr],
    mx_host: &str,
    timeout: Duration,
    records: &[Tlsa],
) -> ProbeOutcome {
    // Connect to the first address that accepts
    let mut connected = None;
    let mut last_err = None;
    for addr in addrs {
        match SmtpClient::connect(SocketAddr::new(*addr, 25), timeout).await {
            Ok(smtp_client) => {
                connected = Some(smtp_client);
                break;
            }
            Err(err) => {
                last_err = Some(err);
            }
        }
    }
    let mut smtp_client = match connected {
        Some(smtp_client) => smtp_client,
        None => {
            return ProbeOutcome::Connect(match last_err {
                Some(err) => err.to_string(),
                None => "no addresses".to_string(),
            })
        }
    };
    smtp_client.timeout = timeout;

    // Read greeting
    if let Err(err) = read_greeting(&mut smtp_client, timeout).await {
        return ProbeOutcome::Connect(err.to_string());
    }

    // Obtain capabilities
    let capabilities = match say_ehlo(&mut smtp_client, timeout).await {
        Ok(capabilities) => capabilities,
        Err(err) => return ProbeOutcome::Connect(err.to_string()),
    };
    if !capabilities.has_capability(EXT_START_TLS) {
        return ProbeOutcome::NoStartTls;
    }

    // Upgrade the connection
    let response = match smtp_client.cmd("STARTTLS\r\n").await {
        Ok(response) => response,
        Err(err) => return ProbeOutcome::Tls(err.to_string()),
    };
    if response.code() != 220 {
        return ProbeOutcome::Tls(format!("STARTTLS rejected with code {}", response.code()));
    }
    // DANE replaces WebPKI validation, so the connector must accept
    // whatever certificate the server presents.
    let tls_connector = build_tls_connector(true);
    let smtp_client = match smtp_client.into_tls(&tls_connector, mx_host).await {
        Ok(smtp_client) => smtp_client,
        Err(err) => return ProbeOutcome::Tls(err.to_string()),
    };

    match smtp_client.tls_connection().peer_certificates() {
        Some(certificates) if !certificates.is_empty() => {
            if verify_certificate(records, certificates[0].as_ref()) {
                ProbeOutcome::Match
            } else {
                ProbeOutcome::Mismatch
            }
        }
        _ => ProbeOutcome::Tls("no certificate presented".to_string()),
    }
}

async fn read_greeting(
    smtp_client: &mut SmtpClient<TcpStream>,
    timeout: Duration,
) -> mail_send::Result<()> {
    tokio::time::timeout(timeout, smtp_client.read())
        .await
        .map_err(|_| mail_send::Error::Timeout)?
        .and_then(|response| response.assert_code(220))
}

async fn say_ehlo(
    smtp_client: &mut SmtpClient<TcpStream>,
    timeout: Duration,
) -> mail_send::Result<EhloResponse<String>> {
    tokio::time::timeout(timeout, async {
        smtp_client
            .stream
            .write_all(format!("EHLO {}\r\n", crate::config::EHLO_HOSTNAME).as_bytes())
            .await?;
        smtp_client.read_ehlo().await
    })
    .await
    .map_err(|_| mail_send::Error::Timeout)?
}

#[cfg(test)]
mod tests {
    use sha2::{Digest, Sha256, Sha512};

    use super::verify_certificate;
    use crate::dane::Tlsa;

    fn sha256(data: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hasher.finalize().to_vec()
    }

    fn sha512(data: &[u8]) -> Vec<u8> {
        let mut hasher = Sha512::new();
        hasher.update(data);
        hasher.finalize().to_vec()
    }

    #[test]
    fn match_certificate_hash() {
        let der = b"not really a certificate, but hashes all the same";

        let sha256_pin = Tlsa {
            is_end_entity: true,
            is_sha256: true,
            is_spki: false,
            data: sha256(der),
        };
        let sha512_pin = Tlsa {
            is_end_entity: false,
            is_sha256: false,
            is_spki: false,
            data: sha512(der),
        };
        let stale_pin = Tlsa {
            is_end_entity: true,
            is_sha256: true,
            is_spki: false,
            data: sha256(b"previous certificate"),
        };

        assert!(sha256_pin.matches(der, None));
        assert!(sha512_pin.matches(der, None));
        assert!(!stale_pin.matches(der, None));

        // One matching record out of a rollover set is enough.
        assert!(verify_certificate(
            &[stale_pin, sha256_pin],
            der
        ));
        assert!(!verify_certificate(
            &[Tlsa {
                is_end_entity: true,
                is_sha256: true,
                is_spki: false,
                data: sha256(b"previous certificate"),
            }],
            der
        ));
        assert!(!verify_certificate(&[], der));
    }

    #[test]
    fn spki_pin_needs_a_parseable_certificate() {
        let der = b"junk bytes do not parse as X.509";
        let spki_pin = Tlsa {
            is_end_entity: true,
            is_sha256: true,
            is_spki: true,
            data: sha256(der),
        };

        assert!(!spki_pin.matches(der, None));
        assert!(!verify_certificate(&[spki_pin], der));
    }
}
