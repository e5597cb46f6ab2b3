use crate::audit::{Audit, CheckReport, Error, Level};
use crate::resolver::DnsError;

impl Audit {
    /// Probes for the organizational `_domainkey` subdomain. A deliberately
    /// coarse signal: individual selectors are neither enumerated nor
    /// validated.
    pub(crate) async fn check_dkim(
        &self,
        domain: &str,
        report: &mut CheckReport,
    ) -> Result<(), Error> {
        let lookup = match self
            .resolver
            .txt_lookup(&format!("_domainkey.{domain}"))
            .await
        {
            Ok(lookup) => lookup,
            Err(DnsError::NotFound) => {
                report.level = Level::Missing;
                report.note("no _domainkey subdomain;");
                return Ok(());
            }
            Err(err) => {
                report.level = Level::Invalid;
                report.note(format!("domain query error: {err};"));
                return Err(err.into());
            }
        };

        report.level = Level::Secure;
        report.note("_domainkey subdomain present; ");

        if !lookup.authentic {
            report.downgrade(Level::Insecure);
            report.note("no DNSSEC; ");
        } else {
            report.note("DNSSEC-signed; ");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::audit::{Audit, CheckReport, Level};
    use crate::resolver::DnsError;

    #[tokio::test]
    async fn dkim_presence() {
        let audit = Audit::for_tests();
        audit
            .resolver
            .txt_fail("_domainkey.missing.example", DnsError::NotFound);
        audit
            .resolver
            .txt_add("_domainkey.signed.example", true, vec![]);
        audit
            .resolver
            .txt_add("_domainkey.unsigned.example", false, vec![]);

        let mut report = CheckReport::default();
        audit
            .check_dkim("missing.example", &mut report)
            .await
            .unwrap();
        assert_eq!(report.level, Level::Missing);
        assert_eq!(report.description, "no _domainkey subdomain;");

        let mut report = CheckReport::default();
        audit
            .check_dkim("signed.example", &mut report)
            .await
            .unwrap();
        assert_eq!(report.level, Level::Secure);
        assert_eq!(
            report.description,
            "_domainkey subdomain present; DNSSEC-signed; "
        );

        let mut report = CheckReport::default();
        audit
            .check_dkim("unsigned.example", &mut report)
            .await
            .unwrap();
        assert_eq!(report.level, Level::Insecure);
        assert_eq!(
            report.description,
            "_domainkey subdomain present; no DNSSEC; "
        );
    }
}
