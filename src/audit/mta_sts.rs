use crate::audit::{Audit, CheckReport, Error, Level};
use crate::mta_sts::{DnsRecord, Policy};
use crate::resolver::DnsError;

impl Audit {
    /// The MTA-STS pipeline: DNS record, record syntax, HTTPS policy fetch,
    /// policy syntax, MX matching. Each stage short-circuits to a terminal
    /// verdict on failure.
    pub(crate) async fn check_mta_sts(
        &self,
        domain: &str,
        report: &mut CheckReport,
    ) -> Result<(), Error> {
        report.level = Level::Secure;

        let lookup = match self.resolver.txt_lookup(&format!("_mta-sts.{domain}")).await {
            Ok(lookup) => lookup,
            Err(DnsError::NotFound) => {
                report.level = Level::Missing;
                report.note("no _mta-sts subdomain;");
                return Ok(());
            }
            Err(err) => {
                report.level = Level::Invalid;
                report.note(format!("domain query error: {err};"));
                return Err(err.into());
            }
        };

        let txt = lookup.value.join("");
        if txt.trim().is_empty() {
            report.level = Level::Missing;
            report.note("no policy;");
            return Ok(());
        }
        report.record = Some(txt.clone());

        if let Err(err) = DnsRecord::parse(&txt) {
            report.level = Level::Invalid;
            report.note(format!("{err};"));
            return Ok(());
        }

        let policy = match Policy::fetch(domain, self.timeout).await {
            Ok((policy, _body)) => policy,
            Err(err) => {
                tracing::debug!(module = "mta-sts", event = "fetch-error", reason = %err);
                report.level = Level::Invalid;
                report.note(format!("{err};"));
                return Ok(());
            }
        };

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

        let mut all_matched = true;
        let mut all_unmatched = true;
        for mx in mxs.iter() {
            if policy.matches(mx) {
                all_unmatched = false;
            } else {
                report.downgrade(Level::Invalid);
                report.note(format!("{mx} does not match the policy; "));
                all_matched = false;
            }
        }

        if policy.enforce() {
            report.note("enforced; ");
        } else {
            report.downgrade(Level::Insecure);
            report.note("not enforced; ");
        }

        if all_matched {
            report.note("all MXs match policy; ");
        } else if all_unmatched {
            report.downgrade(Level::Invalid);
            report.note("no MXs match policy; ");
        }

        Ok(())
    }
}
