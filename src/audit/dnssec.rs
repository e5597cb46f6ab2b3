use crate::audit::{Audit, CheckReport, Error, Level};
use crate::resolver::DnsError;

impl Audit {
    /// Whether the records a sender relies on (apex A/AAAA and MX) are
    /// DNSSEC-signed.
    pub(crate) async fn check_dnssec(
        &self,
        domain: &str,
        report: &mut CheckReport,
    ) -> Result<(), Error> {
        let host = match self.resolver.host_lookup(domain).await {
            Ok(lookup) => lookup,
            Err(DnsError::NotFound) => return Err(Error::NoAddress(domain.to_string())),
            Err(err) => return Err(err.into()),
        };
        if host.value.is_empty() {
            return Err(Error::NoAddress(domain.to_string()));
        }
        if !host.authentic {
            report.level = Level::Insecure;
            report.note("A/AAAA records are not signed;");
            return Ok(());
        }

        let mx = match self.resolver.mx_lookup(domain).await {
            Ok(lookup) => lookup,
            Err(DnsError::NotFound) => return Err(Error::NoMxRecords(domain.to_string())),
            Err(err) => return Err(err.into()),
        };
        if mx.value.is_empty() {
            return Err(Error::NoMxRecords(domain.to_string()));
        }
        if !mx.authentic {
            report.level = Level::Insecure;
            report.note("MX records are not signed;");
            return Ok(());
        }

        report.level = Level::Secure;
        report.note("A/AAAA and MX records are signed;");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::IpAddr;

    use crate::audit::{Audit, CheckReport, Level};

    fn addr() -> IpAddr {
        "192.0.2.25".parse().unwrap()
    }

    #[tokio::test]
    async fn both_signed_is_secure() {
        let audit = Audit::for_tests();
        audit.resolver.host_add("example.org", true, vec![addr()]);
        audit
            .resolver
            .mx_add("example.org", true, vec!["mx1.example.org".to_string()]);

        let mut report = CheckReport::default();
        audit.check_dnssec("example.org", &mut report).await.unwrap();
        assert_eq!(report.level, Level::Secure);
        assert_eq!(report.description, "A/AAAA and MX records are signed;");
    }

    #[tokio::test]
    async fn unsigned_addresses_are_insecure() {
        let audit = Audit::for_tests();
        audit.resolver.host_add("example.org", false, vec![addr()]);

        let mut report = CheckReport::default();
        audit.check_dnssec("example.org", &mut report).await.unwrap();
        assert_eq!(report.level, Level::Insecure);
        assert_eq!(report.description, "A/AAAA records are not signed;");
    }

    #[tokio::test]
    async fn unsigned_mx_is_insecure() {
        let audit = Audit::for_tests();
        audit.resolver.host_add("example.org", true, vec![addr()]);
        audit
            .resolver
            .mx_add("example.org", false, vec!["mx1.example.org".to_string()]);

        let mut report = CheckReport::default();
        audit.check_dnssec("example.org", &mut report).await.unwrap();
        assert_eq!(report.level, Level::Insecure);
        assert_eq!(report.description, "MX records are not signed;");
    }

    #[tokio::test]
    async fn unresolvable_domain_is_fatal() {
        let audit = Audit::for_tests();
        audit.resolver.host_add("example.org", true, vec![]);

        let mut report = CheckReport::default();
        let err = audit
            .check_dnssec("example.org", &mut report)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(report.level, Level::Unknown);
    }
}
