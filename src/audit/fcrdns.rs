use crate::audit::{Audit, CheckReport, Error, Level};
use crate::resolver::DnsError;

impl Audit {
    /// Forward-confirmed reverse DNS: every MX address must have a PTR name
    /// that resolves back to the MX hostname.
    pub(crate) async fn check_fcrdns(
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

        let mut all_unmatched = true;
        let mut all_matched = true;

        for mx in mxs.iter() {
            let addrs = match self.resolver.host_lookup(mx).await {
                Ok(lookup) => lookup.value,
                Err(err) => {
                    all_matched = false;
                    report.downgrade(Level::Missing);
                    report.note(format!("lookup error {mx}: {err}; "));
                    continue;
                }
            };

            for addr in addrs.iter() {
                let names = match self.resolver.ptr_lookup(*addr).await {
                    Ok(lookup) => lookup.value,
                    Err(err) => {
                        all_matched = false;
                        report.downgrade(Level::Missing);
                        report.note(format!("lookup error {addr}: {err}; "));
                        continue;
                    }
                };
                if names.is_empty() {
                    all_matched = false;
                    report.downgrade(Level::Missing);
                    report.note(format!("no rDNS for {addr}; "));
                    continue;
                }

                let mx_host = mx.trim_end_matches('.');
                let matched = names
                    .iter()
                    .any(|name| name.trim_end_matches('.').eq_ignore_ascii_case(mx_host));
                if matched {
                    all_unmatched = false;
                } else {
                    all_matched = false;
                    report.downgrade(Level::Insecure);
                    report.note(format!("{} [{addr}] != {mx}; ", names[0]));
                }
            }
        }

        if all_unmatched {
            report.level = Level::Missing;
            report.description = "no MXs with forward-confirmed rDNS".to_string();
        } else if all_matched {
            report.level = Level::Secure;
            report.description = "all MXs have forward-confirmed rDNS".to_string();
        }

        Ok(())
    }
}
