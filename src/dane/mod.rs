use std::{sync::Arc, time::Instant};

use mail_auth::{
    common::lru::DnsCache,
    trust_dns_resolver::proto::rr::rdata::tlsa::{CertUsage, Matching, Selector},
};

use crate::resolver::{classify, fqdn, AuthResolver, Authenticated, Classified, DnsError, DnsResult, CACHE_TTL};

pub mod verify;

/// A TLSA certificate association (RFC 6698).
///
/// Only DANE-TA (2) and DANE-EE (3) usages are retained; the PKIX usages
/// are meaningless without WebPKI validation and are skipped at lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlsa {
    pub is_end_entity: bool,
    pub is_sha256: bool,
    pub is_spki: bool,
    pub data: Vec<u8>,
}

impl std::fmt::Display for Tlsa {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} ",
            if self.is_end_entity { 3 } else { 2 },
            if self.is_spki { 1 } else { 0 },
            if self.is_sha256 { 1 } else { 2 },
        )?;
        for byte in &self.data {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl AuthResolver {
    /// TLSA records at `name` (usually `_25._tcp.<mx>`).
    pub async fn tlsa_lookup(&self, name: &str) -> DnsResult<Arc<Vec<Tlsa>>> {
        let name = fqdn(name);
        if let Some(entry) = self.cache.tlsa.get(name.as_str()) {
            return entry;
        }

        fn records(
            lookup: mail_auth::trust_dns_resolver::lookup::TlsaLookup,
        ) -> Vec<Tlsa> {
            let mut tlsa_list = Vec::new();
            for record in lookup.as_lookup().record_iter() {
                if let Some(tlsa) = record.data().and_then(|r| r.as_tlsa()) {
                    tlsa_list.push(Tlsa {
                        is_end_entity: match tlsa.cert_usage() {
                            CertUsage::DomainIssued => true,
                            CertUsage::TrustAnchor => false,
                            _ => continue,
                        },
                        is_sha256: match tlsa.matching() {
                            Matching::Sha256 => true,
                            Matching::Sha512 => false,
                            _ => continue,
                        },
                        is_spki: match tlsa.selector() {
                            Selector::Spki => true,
                            Selector::Full => false,
                            _ => continue,
                        },
                        data: tlsa.cert_data().to_vec(),
                    });
                }
            }
            tlsa_list
        }

        let entry = match self.validating().tlsa_lookup(name.as_str()).await {
            Ok(lookup) => Ok(Authenticated::new(true, Arc::new(records(lookup)))),
            Err(err) => match classify(&err) {
                Classified::Unsigned => match self.plain().tlsa_lookup(name.as_str()).await {
                    Ok(lookup) => Ok(Authenticated::new(false, Arc::new(records(lookup)))),
                    Err(err) => match classify(&err) {
                        Classified::NxDomain => Err(DnsError::NotFound),
                        Classified::Empty => Ok(Authenticated::new(false, Arc::new(Vec::new()))),
                        _ => Err(DnsError::Lookup(err.to_string())),
                    },
                },
                Classified::Empty => Ok(Authenticated::new(true, Arc::new(Vec::new()))),
                Classified::NxDomain => Err(DnsError::NotFound),
                Classified::Failed(err) => Err(err),
            },
        };

        self.cache
            .tlsa
            .insert(name, entry, Instant::now() + CACHE_TTL)
    }

    #[cfg(test)]
    pub(crate) fn tlsa_add(&self, name: &str, authentic: bool, records: Vec<Tlsa>) {
        self.cache.tlsa.insert(
            fqdn(name),
            Ok(Authenticated::new(authentic, Arc::new(records))),
            Instant::now() + CACHE_TTL,
        );
    }

    #[cfg(test)]
    pub(crate) fn tlsa_fail(&self, name: &str, error: DnsError) {
        self.cache
            .tlsa
            .insert(fqdn(name), Err(error), Instant::now() + CACHE_TTL);
    }
}
