//! Minimal DMARC record parser (RFC 7489 §6.3), covering the tags the
//! audit classification needs.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    None,
    Quarantine,
    Reject,
}

impl Policy {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "none" => Some(Policy::None),
            "quarantine" => Some(Policy::Quarantine),
            "reject" => Some(Policy::Reject),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmarcRecord {
    pub policy: Policy,
    pub subdomain_policy: Policy,
    /// Percentage of messages the policy applies to, 100 unless `pct=` says
    /// otherwise.
    pub percent: u8,
    pub rua: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub detail: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.detail)
    }
}

impl std::error::Error for ParseError {}

fn error(detail: impl Into<String>) -> ParseError {
    ParseError {
        detail: detail.into(),
    }
}

impl DmarcRecord {
    /// Parses a DMARC TXT record.
    ///
    /// `v=DMARC1` must be the first tag and a valid `p=` is required; the
    /// first occurrence of a tag wins and unknown tags are ignored.
    pub fn parse(record: &str) -> Result<Self, ParseError> {
        let mut tags = record
            .split(';')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(|tag| match tag.split_once('=') {
                Some((name, value)) => Ok((name.trim(), value.trim())),
                None => Err(error(format!("invalid tag: {tag}"))),
            });

        match tags.next().transpose()? {
            Some((name, value)) if name.eq_ignore_ascii_case("v") => {
                if !value.eq_ignore_ascii_case("DMARC1") {
                    return Err(error(format!("unsupported version: {value}")));
                }
            }
            Some((name, _)) => {
                return Err(error(format!("v= must be the first tag, found {name}=")));
            }
            None => return Err(error("empty record")),
        }

        let mut policy = None;
        let mut subdomain_policy = None;
        let mut percent = None;
        let mut rua = None;

        for tag in tags {
            let (name, value) = tag?;
            match name.to_ascii_lowercase().as_str() {
                "p" if policy.is_none() => {
                    policy = Some(
                        Policy::parse(value)
                            .ok_or_else(|| error(format!("invalid p value: {value}")))?,
                    );
                }
                "sp" if subdomain_policy.is_none() => {
                    // An unparseable sp is ignored and the domain policy
                    // applies (RFC 7489 §6.3).
                    subdomain_policy = Policy::parse(value);
                }
                "pct" if percent.is_none() => {
                    percent = value.parse::<u8>().ok().filter(|pct| *pct <= 100);
                }
                "rua" if rua.is_none() => {
                    rua = Some(
                        value
                            .split(',')
                            .map(str::trim)
                            .filter(|uri| !uri.is_empty())
                            .map(str::to_string)
                            .collect::<Vec<_>>(),
                    );
                }
                _ => (),
            }
        }

        let policy = policy.ok_or_else(|| error("missing required p tag"))?;

        Ok(DmarcRecord {
            policy,
            subdomain_policy: subdomain_policy.unwrap_or(policy),
            percent: percent.unwrap_or(100),
            rua: rua.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{DmarcRecord, Policy};

    #[test]
    fn parse_dmarc_record() {
        for (record, expected) in [
            (
                "v=DMARC1; p=reject; pct=100",
                DmarcRecord {
                    policy: Policy::Reject,
                    subdomain_policy: Policy::Reject,
                    percent: 100,
                    rua: vec![],
                },
            ),
            (
                "v=DMARC1; p=quarantine; sp=none; pct=25; rua=mailto:reports@example.com",
                DmarcRecord {
                    policy: Policy::Quarantine,
                    subdomain_policy: Policy::None,
                    percent: 25,
                    rua: vec!["mailto:reports@example.com".to_string()],
                },
            ),
            (
                "v=DMARC1;p=none;rua=mailto:a@example.com,mailto:b@example.com;",
                DmarcRecord {
                    policy: Policy::None,
                    subdomain_policy: Policy::None,
                    percent: 100,
                    rua: vec![
                        "mailto:a@example.com".to_string(),
                        "mailto:b@example.com".to_string(),
                    ],
                },
            ),
            (
                // Out-of-range pct falls back to the default, invalid sp
                // falls back to p.
                "v=DMARC1; p=reject; sp=blocked; pct=250",
                DmarcRecord {
                    policy: Policy::Reject,
                    subdomain_policy: Policy::Reject,
                    percent: 100,
                    rua: vec![],
                },
            ),
        ] {
            assert_eq!(DmarcRecord::parse(record).unwrap(), expected, "{record:?}");
        }
    }

    #[test]
    fn reject_malformed_dmarc_record() {
        for record in [
            "",
            "p=reject",
            "v=DMARC2; p=reject",
            "p=reject; v=DMARC1",
            "v=DMARC1",
            "v=DMARC1; p=block",
            "v=DMARC1; p",
        ] {
            assert!(DmarcRecord::parse(record).is_err(), "{record:?}");
        }
    }
}
