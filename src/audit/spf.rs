use std::collections::HashSet;

use crate::audit::{Audit, CheckReport, Error, Level};
use crate::resolver::DnsError;

/// RFC 7208 §4.6.4 caps the number of lookup-triggering terms; the same
/// bound keeps a redirect chain finite.
const MAX_REDIRECTS: usize = 10;

impl Audit {
    pub(crate) async fn check_spf(
        &self,
        domain: &str,
        report: &mut CheckReport,
    ) -> Result<(), Error> {
        report.level = Level::Secure;

        let lookup = match self.resolver.txt_lookup(domain).await {
            Ok(lookup) => lookup,
            Err(DnsError::NotFound) => {
                report.level = Level::Missing;
                report.note("no domain;");
                return Ok(());
            }
            Err(err) => {
                report.level = Level::Invalid;
                report.note(format!("domain query error: {err};"));
                return Err(err.into());
            }
        };

        let mut present = false;
        for txt in lookup.value.iter() {
            if txt.starts_with("v=spf1") {
                present = true;
                report.record = Some(txt.clone());
                report.note("present; ");
                self.eval_spf_record(txt, report).await?;
            }
        }

        if !present {
            report.level = Level::Missing;
            report.note("no policy;");
            return Ok(());
        }

        if report.description == "present; " {
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

    /// Scans the record's terms for the policy default. A `redirect=`
    /// modifier abandons the current record and restarts the scan on the
    /// target's TXT data, last redirect wins; the chain is bounded by a
    /// visited set and `MAX_REDIRECTS`.
    async fn eval_spf_record(&self, record: &str, report: &mut CheckReport) -> Result<(), Error> {
        let mut record = record.to_string();
        let mut visited = HashSet::new();

        loop {
            let mut next = None;
            for term in record.split(' ') {
                if let Some(target) = term.strip_prefix("redirect=") {
                    let target = target.to_lowercase();
                    if visited.len() >= MAX_REDIRECTS || !visited.insert(target.clone()) {
                        report.downgrade(Level::Invalid);
                        report.note("redirect loop in policy; ");
                        return Ok(());
                    }
                    next = match self.resolver.txt_lookup(&target).await {
                        Ok(lookup) => Some(lookup.value.join("")),
                        Err(DnsError::NotFound) => {
                            report.downgrade(Level::Invalid);
                            report.note(format!("redirect target {target} does not exist; "));
                            return Ok(());
                        }
                        Err(err) => {
                            report.downgrade(Level::Invalid);
                            report.note(format!("domain query error: {err}; "));
                            return Err(err.into());
                        }
                    };
                    break;
                }
                match term {
                    "all" | "+all" => {
                        report.downgrade(Level::Insecure);
                        report.note("policy allows any host; ");
                    }
                    "?all" => {
                        report.downgrade(Level::Insecure);
                        report.note("policy defines neutral result as default; ");
                    }
                    _ => (),
                }
            }
            match next {
                Some(redirected) => record = redirected,
                None => break,
            }
        }

        Ok(())
    }
}
