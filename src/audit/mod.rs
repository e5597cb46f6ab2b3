use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::task::JoinSet;

use crate::resolver::{AuthResolver, DnsError};

pub mod dane;
pub mod dkim;
pub mod dmarc;
pub mod dnssec;
pub mod fcrdns;
pub mod mta_sts;
pub mod spf;

/// Severity verdict of a check. The order is total: `Unknown` (not
/// evaluated) is weakest, `Secure` strongest.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Unknown,
    Invalid,
    Missing,
    Insecure,
    Secure,
}

impl Level {
    /// Lowers the level to `to` if it is currently higher. Severity never
    /// increases within one evaluation run.
    pub fn downgrade(&mut self, to: Level) {
        if *self > to {
            *self = to;
        }
    }
}

/// Verdict, accumulated rationale and optionally the raw protocol record
/// behind one check.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub level: Level,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<String>,
}

impl CheckReport {
    pub(crate) fn downgrade(&mut self, to: Level) {
        self.level.downgrade(to);
    }

    /// Appends a description fragment. Fragments are never overwritten so
    /// the description keeps the full trail of sub-findings.
    pub(crate) fn note(&mut self, fragment: impl AsRef<str>) {
        self.description.push_str(fragment.as_ref());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Check {
    Dkim,
    Spf,
    Dmarc,
    MtaSts,
    Dane,
    Dnssec,
    Fcrdns,
}

/// The fixed battery; adding a check is a data change here plus a match arm
/// in `Audit::run`.
pub const CHECKS: [Check; 7] = [
    Check::Dkim,
    Check::Spf,
    Check::Dmarc,
    Check::MtaSts,
    Check::Dane,
    Check::Dnssec,
    Check::Fcrdns,
];

impl Check {
    pub fn name(&self) -> &'static str {
        match self {
            Check::Dkim => "DKIM",
            Check::Spf => "SPF",
            Check::Dmarc => "DMARC",
            Check::MtaSts => "MTA-STS",
            Check::Dane => "DANE",
            Check::Dnssec => "DNSSEC",
            Check::Fcrdns => "FCrDNS",
        }
    }
}

#[derive(Debug)]
pub enum Error {
    /// The domain does not resolve to any address. Fatal: the domain is
    /// unusable for mail.
    NoAddress(String),
    /// The domain has no MX records. Fatal as well.
    NoMxRecords(String),
    /// A lookup failed for reasons other than the name not existing.
    Dns(DnsError),
}

impl Error {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::NoAddress(_) | Error::NoMxRecords(_))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NoAddress(domain) => {
                write!(f, "domain {domain} does not resolve to an IP address")
            }
            Error::NoMxRecords(domain) => {
                write!(f, "domain {domain} does not have any MX records")
            }
            Error::Dns(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<DnsError> for Error {
    fn from(value: DnsError) -> Self {
        Error::Dns(value)
    }
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct AuditResult {
    pub dkim: CheckReport,
    pub spf: CheckReport,
    pub dmarc: CheckReport,
    #[serde(rename = "mta-sts")]
    pub mta_sts: CheckReport,
    pub dane: CheckReport,
    pub dnssec: CheckReport,
    pub fcrdns: CheckReport,
}

impl AuditResult {
    fn report_mut(&mut self, check: Check) -> &mut CheckReport {
        match check {
            Check::Dkim => &mut self.dkim,
            Check::Spf => &mut self.spf,
            Check::Dmarc => &mut self.dmarc,
            Check::MtaSts => &mut self.mta_sts,
            Check::Dane => &mut self.dane,
            Check::Dnssec => &mut self.dnssec,
            Check::Fcrdns => &mut self.fcrdns,
        }
    }
}

/// A transient per-check failure, surfaced next to the result instead of
/// being discarded.
#[derive(Debug)]
pub struct CheckFailure {
    pub check: Check,
    pub error: Error,
}

#[derive(Debug)]
pub struct AuditReport {
    pub result: AuditResult,
    pub errors: Vec<CheckFailure>,
}

pub struct Audit {
    pub resolver: AuthResolver,
    /// Whether DANE performs live STARTTLS verification.
    pub active: bool,
    /// Timeout for HTTPS and SMTP operations.
    pub timeout: Duration,
}

impl Audit {
    pub fn new(resolver: AuthResolver, active: bool, timeout: Duration) -> Self {
        Audit {
            resolver,
            active,
            timeout,
        }
    }

    /// Runs the whole battery concurrently against one domain.
    ///
    /// Every check runs to completion before this returns; a failing check
    /// never cancels its siblings. Fatal errors (the domain does not
    /// resolve, or has no MX records) fail the evaluation after the join
    /// barrier; transient per-check errors are collected into
    /// `AuditReport::errors`.
    pub async fn evaluate(self: Arc<Self>, domain: &str) -> Result<AuditReport, Error> {
        let domain: Arc<str> = Arc::from(domain);
        let mut set = JoinSet::new();

        for check in CHECKS {
            let audit = self.clone();
            let domain = domain.clone();
            set.spawn(async move {
                let mut report = CheckReport::default();
                let outcome = audit.run(check, &domain, &mut report).await;
                (check, report, outcome)
            });
        }

        let mut result = AuditResult::default();
        let mut errors = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((check, report, outcome)) => {
                    *result.report_mut(check) = report;
                    if let Err(error) = outcome {
                        tracing::debug!(
                            module = "audit",
                            event = "check-error",
                            check = check.name(),
                            reason = %error,
                        );
                        errors.push(CheckFailure { check, error });
                    }
                }
                Err(err) => {
                    tracing::warn!(module = "audit", event = "join-error", reason = %err);
                }
            }
        }

        if let Some(pos) = errors.iter().position(|failure| failure.error.is_fatal()) {
            return Err(errors.swap_remove(pos).error);
        }

        Ok(AuditReport { result, errors })
    }

    pub(crate) async fn run(
        &self,
        check: Check,
        domain: &str,
        report: &mut CheckReport,
    ) -> Result<(), Error> {
        match check {
            Check::Dkim => self.check_dkim(domain, report).await,
            Check::Spf => self.check_spf(domain, report).await,
            Check::Dmarc => self.check_dmarc(domain, report).await,
            Check::MtaSts => self.check_mta_sts(domain, report).await,
            Check::Dane => self.check_dane(domain, report).await,
            Check::Dnssec => self.check_dnssec(domain, report).await,
            Check::Fcrdns => self.check_fcrdns(domain, report).await,
        }
    }
}

#[cfg(test)]
impl Audit {
    pub(crate) fn for_tests() -> Self {
        Audit::new(
            AuthResolver::for_tests(),
            false,
            Duration::from_secs(5),
        )
    }
}
