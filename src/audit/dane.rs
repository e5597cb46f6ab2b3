use crate::audit::{Audit, CheckReport, Error, Level};
use crate::dane::verify::{probe_starttls, ProbeOutcome};
use crate::resolver::DnsError;

impl Audit {
    /// TLSA presence and authentication for every MX, plus — in active mode
    /// — a live STARTTLS probe matching each MX's leaf certificate against
    /// its own TLSA records.
    pub(crate) async fn check_dane(
        &self,
        domain: &str,
        report: &mut CheckReport,
    ) -> Result<(), Error> {
        report.level = Level::Secure;

        let mxs = match self.resolver.mx_lookup(domain).await {
            Ok(lookup) => lookup.value,
            Err(DnsError::NotFound) => return Err(Error::NoMxRecords(domain.to_string())),
            Err(err) => {
                report.level = Level::Unknown;
                return Err(err.into());
            }
        };
        if mxs.is_empty() {
            return Err(Error::NoMxRecords(domain.to_string()));
        }

        let mut all_ad = true;
        let mut all_present = true;
        let mut all_valid = true;

        for mx in mxs.iter() {
            let lookup = match self.resolver.tlsa_lookup(&format!("_25._tcp.{mx}")).await {
                Ok(lookup) => lookup,
                // Partial failure: move on to the next MX
                Err(_) => {
                    all_present = false;
                    report.downgrade(Level::Missing);
                    report.note(format!("no record for {mx}; "));
                    continue;
                }
            };
            if !lookup.authentic {
                all_ad = false;
            }
            if lookup.value.is_empty() {
                all_present = false;
                report.downgrade(Level::Missing);
                report.note(format!("no record for {mx}; "));
                continue;
            }

            let record = report.record.get_or_insert_with(String::new);
            for tlsa in lookup.value.iter() {
                record.push_str(&tlsa.to_string());
                record.push('\n');
            }

            if !self.active {
                continue;
            }

            let addrs = match self.resolver.host_lookup(mx).await {
                Ok(lookup) => lookup.value,
                Err(err) => {
                    all_valid = false;
                    report.downgrade(Level::Unknown);
                    report.note(format!("can't connect to {mx}: {err}; "));
                    continue;
                }
            };
            match probe_starttls(&addrs, mx, self.timeout, &lookup.value).await {
                ProbeOutcome::Match => {
                    tracing::debug!(module = "dane", event = "success", mx = mx.as_str());
                }
                ProbeOutcome::Mismatch => {
                    tracing::debug!(module = "dane", event = "failure", mx = mx.as_str());
                    all_valid = false;
                    report.downgrade(Level::Invalid);
                    report.note(format!("{mx} uses wrong cert; "));
                }
                ProbeOutcome::NoStartTls => {
                    all_valid = false;
                    report.downgrade(Level::Invalid);
                    report.note(format!("{mx} doesn't support STARTTLS; "));
                }
                ProbeOutcome::Connect(reason) => {
                    all_valid = false;
                    report.downgrade(Level::Unknown);
                    report.note(format!("can't connect to {mx}: {reason}; "));
                }
                ProbeOutcome::Tls(reason) => {
                    all_valid = false;
                    report.downgrade(Level::Invalid);
                    report.note(format!("{mx}: {reason}; "));
                }
            }
        }

        if all_present {
            report.note("present for all MXs; ");
        }

        if !all_ad {
            report.downgrade(Level::Invalid);
            report.note("no DNSSEC; ");
        } else {
            report.note("DNSSEC-signed; ");
        }

        if !self.active {
            report.note("no validity check done; ");
            return Ok(());
        }

        if all_valid {
            report.note("valid for all MXs; ");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::audit::{Audit, CheckReport, Level};
    use crate::dane::Tlsa;
    use crate::resolver::DnsError;

    fn pin() -> Tlsa {
        Tlsa {
            is_end_entity: true,
            is_sha256: true,
            is_spki: true,
            data: vec![0xab; 32],
        }
    }

    async fn check(audit: &Audit, domain: &str) -> CheckReport {
        let mut report = CheckReport::default();
        audit.check_dane(domain, &mut report).await.unwrap();
        report
    }

    #[tokio::test]
    async fn records_present_and_signed_for_all_mxs() {
        let audit = Audit::for_tests();
        audit.resolver.mx_add(
            "example.org",
            true,
            vec!["mx1.example.org".to_string(), "mx2.example.org".to_string()],
        );
        audit
            .resolver
            .tlsa_add("_25._tcp.mx1.example.org", true, vec![pin()]);
        audit
            .resolver
            .tlsa_add("_25._tcp.mx2.example.org", true, vec![pin()]);

        let report = check(&audit, "example.org").await;
        assert_eq!(report.level, Level::Secure);
        assert_eq!(
            report.description,
            "present for all MXs; DNSSEC-signed; no validity check done; "
        );
        assert!(report.record.is_some());
    }

    #[tokio::test]
    async fn one_missing_mx_caps_the_level_at_missing() {
        let audit = Audit::for_tests();
        audit.resolver.mx_add(
            "example.org",
            true,
            vec!["mx1.example.org".to_string(), "mx2.example.org".to_string()],
        );
        audit
            .resolver
            .tlsa_add("_25._tcp.mx1.example.org", true, vec![pin()]);
        audit
            .resolver
            .tlsa_fail("_25._tcp.mx2.example.org", DnsError::NotFound);

        let report = check(&audit, "example.org").await;
        assert!(report.level <= Level::Missing);
        assert!(report.description.contains("no record for mx2.example.org; "));
        assert!(!report.description.contains("present for all MXs"));
    }

    #[tokio::test]
    async fn unauthenticated_records_are_invalid() {
        let audit = Audit::for_tests();
        audit
            .resolver
            .mx_add("example.org", true, vec!["mx1.example.org".to_string()]);
        audit
            .resolver
            .tlsa_add("_25._tcp.mx1.example.org", false, vec![pin()]);

        let report = check(&audit, "example.org").await;
        assert_eq!(report.level, Level::Invalid);
        assert!(report.description.contains("no DNSSEC; "));
    }

    #[tokio::test]
    async fn no_mx_records_is_fatal() {
        let audit = Audit::for_tests();
        audit.resolver.mx_add("example.org", true, vec![]);

        let mut report = CheckReport::default();
        let err = audit
            .check_dane("example.org", &mut report)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
