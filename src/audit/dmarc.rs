use crate::audit::{Audit, CheckReport, Error, Level};
use crate::dmarc::{DmarcRecord, Policy};
use crate::resolver::DnsError;

impl Audit {
    pub(crate) async fn check_dmarc(
        &self,
        domain: &str,
        report: &mut CheckReport,
    ) -> Result<(), Error> {
        report.level = Level::Secure;

        let lookup = match self.resolver.txt_lookup(&format!("_dmarc.{domain}")).await {
            Ok(lookup) => lookup,
            Err(DnsError::NotFound) => {
                report.level = Level::Missing;
                report.note("no _dmarc subdomain;");
                return Ok(());
            }
            Err(err) => {
                report.level = Level::Invalid;
                report.note(format!("domain query error: {err};"));
                return Err(err.into());
            }
        };

        let txt = lookup.value.join("");
        report.record = Some(txt.clone());

        let record = match DmarcRecord::parse(&txt) {
            Ok(record) => record,
            Err(err) => {
                report.level = Level::Invalid;
                report.note(format!("policy parse error: {err}"));
                return Ok(());
            }
        };

        report.note("present; ");

        if record.policy == Policy::None {
            report.downgrade(Level::Missing);
            report.note("no-op; ");
        } else if record.percent != 100 {
            report.downgrade(Level::Missing);
            report.note("applied partially; ");
        } else {
            report.note("strict; ");
        }

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

    async fn check(audit: &Audit, domain: &str) -> CheckReport {
        let mut report = CheckReport::default();
        audit.check_dmarc(domain, &mut report).await.unwrap();
        report
    }

    #[tokio::test]
    async fn dmarc_classification() {
        let audit = Audit::for_tests();
        audit.resolver.txt_add(
            "_dmarc.strict.example",
            true,
            vec!["v=DMARC1; p=reject; pct=100".to_string()],
        );
        audit.resolver.txt_add(
            "_dmarc.noop.example",
            true,
            vec!["v=DMARC1; p=none".to_string()],
        );
        audit.resolver.txt_add(
            "_dmarc.partial.example",
            true,
            vec!["v=DMARC1; p=reject; pct=50".to_string()],
        );
        audit.resolver.txt_add(
            "_dmarc.unsigned.example",
            false,
            vec!["v=DMARC1; p=quarantine".to_string()],
        );
        audit.resolver.txt_add(
            "_dmarc.broken.example",
            true,
            vec!["v=DMARC1; p=block".to_string()],
        );
        audit
            .resolver
            .txt_fail("_dmarc.missing.example", DnsError::NotFound);

        let report = check(&audit, "strict.example").await;
        assert_eq!(report.level, Level::Secure);
        assert_eq!(report.description, "present; strict; DNSSEC-signed; ");
        assert_eq!(
            report.record.as_deref(),
            Some("v=DMARC1; p=reject; pct=100")
        );

        let report = check(&audit, "noop.example").await;
        assert_eq!(report.level, Level::Missing);
        assert_eq!(report.description, "present; no-op; DNSSEC-signed; ");

        let report = check(&audit, "partial.example").await;
        assert_eq!(report.level, Level::Missing);
        assert_eq!(
            report.description,
            "present; applied partially; DNSSEC-signed; "
        );

        let report = check(&audit, "unsigned.example").await;
        assert_eq!(report.level, Level::Insecure);
        assert_eq!(report.description, "present; strict; no DNSSEC; ");

        let report = check(&audit, "broken.example").await;
        assert_eq!(report.level, Level::Invalid);
        assert!(report.description.starts_with("policy parse error: "));

        let report = check(&audit, "missing.example").await;
        assert_eq!(report.level, Level::Missing);
        assert_eq!(report.description, "no _dmarc subdomain;");
    }
}
