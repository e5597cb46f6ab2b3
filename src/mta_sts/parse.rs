use super::{DnsRecord, Error, Mode, MxPattern, Policy};

impl DnsRecord {
    /// Parses the `_mta-sts` TXT record, `v=STSv1; id=<id>`.
    ///
    /// Pairs are `;`-separated `key=value` with optional surrounding
    /// whitespace; whitespace inside a key or value is not allowed. The
    /// version must be `STSv1` and the id non-empty (RFC 8461 §3.1).
    pub fn parse(raw: &str) -> Result<DnsRecord, Error> {
        let mut id = None;
        let mut has_version = false;

        for part in raw.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let kv = part.split('=').collect::<Vec<_>>();
            if kv.len() != 2 {
                return Err(Error::MalformedRecord(format!(
                    "invalid record part: {part}"
                )));
            }
            if kv[0].contains([' ', '\t']) || kv[1].contains([' ', '\t']) {
                return Err(Error::MalformedRecord(
                    "whitespace is not allowed in name or value".to_string(),
                ));
            }
            match kv[0] {
                "v" => {
                    if kv[1] != "STSv1" {
                        return Err(Error::MalformedRecord(format!(
                            "unsupported version: {}",
                            kv[1]
                        )));
                    }
                    has_version = true;
                }
                "id" => {
                    id = Some(kv[1].to_string());
                }
                _ => (),
            }
        }

        if !has_version {
            return Err(Error::MalformedRecord("missing version value".to_string()));
        }
        match id {
            Some(id) if !id.is_empty() => Ok(DnsRecord { id }),
            _ => Err(Error::MalformedRecord("missing id value".to_string())),
        }
    }
}

impl Policy {
    /// Parses a policy body of `field: value` lines.
    ///
    /// `version`, `mode` and `max_age` are required; `mx` may repeat. A
    /// policy whose mode is not `none` must list at least one `mx`
    /// (RFC 8461 §3.2).
    pub fn parse(data: &str) -> Result<Policy, Error> {
        let mut mode = None;
        let mut max_age = None;
        let mut has_version = false;
        let mut mx = Vec::new();

        for line in data.lines() {
            let fields = line.split(':').collect::<Vec<_>>();
            if fields.len() != 2 {
                return Err(Error::MalformedPolicy(format!("invalid field: {line}")));
            }
            // Arbitrary whitespace is allowed after the colon only:
            //   sts-policy-field-delim = ":" *WSP
            let value = fields[1].trim();
            match fields[0] {
                "version" => {
                    if value != "STSv1" {
                        return Err(Error::MalformedPolicy(format!(
                            "unsupported policy version: {value}"
                        )));
                    }
                    has_version = true;
                }
                "mode" => {
                    mode = match value {
                        "enforce" => Some(Mode::Enforce),
                        "testing" => Some(Mode::Testing),
                        "none" => Some(Mode::None),
                        _ => {
                            return Err(Error::MalformedPolicy(format!(
                                "invalid mode value: {value}"
                            )))
                        }
                    };
                }
                "max_age" => {
                    max_age = Some(value.parse::<u64>().map_err(|err| {
                        Error::MalformedPolicy(format!("invalid max_age value: {err}"))
                    })?);
                }
                "mx" => {
                    if let Some(suffix) = value.strip_prefix("*.") {
                        if suffix.is_empty() {
                            return Err(Error::MalformedPolicy(format!(
                                "invalid mx value: {value}"
                            )));
                        }
                        mx.push(MxPattern::Wildcard(suffix.to_lowercase()));
                    } else if !value.is_empty() {
                        mx.push(MxPattern::Equals(value.to_lowercase()));
                    } else {
                        return Err(Error::MalformedPolicy("empty mx value".to_string()));
                    }
                }
                _ => (),
            }
        }

        if !has_version {
            return Err(Error::MalformedPolicy("version field required".to_string()));
        }
        let mode = mode.ok_or_else(|| Error::MalformedPolicy("mode field required".to_string()))?;
        let max_age =
            max_age.ok_or_else(|| Error::MalformedPolicy("max_age field required".to_string()))?;

        if mode != Mode::None && mx.is_empty() {
            return Err(Error::MalformedPolicy(
                "at least one mx field required when mode is not none".to_string(),
            ));
        }

        Ok(Policy { mode, max_age, mx })
    }
}

#[cfg(test)]
mod tests {
    use crate::mta_sts::{DnsRecord, Error, Mode, MxPattern, Policy};

    #[test]
    fn parse_dns_record() {
        for (record, expected) in [
            (
                "v=STSv1; id=20160831085700Z;",
                DnsRecord {
                    id: "20160831085700Z".to_string(),
                },
            ),
            (
                "v=STSv1;id=20190429T010101",
                DnsRecord {
                    id: "20190429T010101".to_string(),
                },
            ),
            (
                " v=STSv1 ; id=a ;;",
                DnsRecord {
                    id: "a".to_string(),
                },
            ),
        ] {
            assert_eq!(DnsRecord::parse(record).unwrap(), expected, "{record:?}");
        }
    }

    #[test]
    fn reject_malformed_dns_record() {
        for record in [
            "",
            "id=20160831085700Z",
            "v=STSv1",
            "v=STSv1; id=",
            "v=STSv2; id=a",
            "v=STSv1; id=a b",
            "v=STSv1; id",
            "v=STSv1; id=a=b",
        ] {
            assert!(
                matches!(DnsRecord::parse(record), Err(Error::MalformedRecord(_))),
                "{record:?}"
            );
        }
    }

    #[test]
    fn parse_policy() {
        for (policy, expected) in [
            (
                "version: STSv1\nmode: enforce\nmx: mail.example.com\nmx: *.example.net\nmx: backupmx.example.com\nmax_age: 604800",
                Policy {
                    mode: Mode::Enforce,
                    max_age: 604800,
                    mx: vec![
                        MxPattern::Equals("mail.example.com".to_string()),
                        MxPattern::Wildcard("example.net".to_string()),
                        MxPattern::Equals("backupmx.example.com".to_string()),
                    ],
                },
            ),
            (
                "version: STSv1\nmode: testing\nmx: gmail-smtp-in.l.google.com\nmax_age: 86400\n",
                Policy {
                    mode: Mode::Testing,
                    max_age: 86400,
                    mx: vec![MxPattern::Equals("gmail-smtp-in.l.google.com".to_string())],
                },
            ),
            (
                "version: STSv1\nmode: none\nmax_age: 0",
                Policy {
                    mode: Mode::None,
                    max_age: 0,
                    mx: vec![],
                },
            ),
        ] {
            assert_eq!(Policy::parse(policy).unwrap(), expected, "{policy:?}");
        }
    }

    #[test]
    fn reject_malformed_policy() {
        for policy in [
            // Missing required fields.
            "mode: enforce\nmx: mail.example.com\nmax_age: 604800",
            "version: STSv1\nmx: mail.example.com\nmax_age: 604800",
            "version: STSv1\nmode: enforce\nmx: mail.example.com",
            // Invalid values.
            "version: STSv2\nmode: enforce\nmx: a.example.com\nmax_age: 1",
            "version: STSv1\nmode: strict\nmx: a.example.com\nmax_age: 1",
            "version: STSv1\nmode: enforce\nmx: a.example.com\nmax_age: -1",
            "version: STSv1\nmode: enforce\nmx: a.example.com\nmax_age: soon",
            "version: STSv1\nmode: enforce\nmx:\nmax_age: 1",
            // Lines must be a single field: value pair.
            "version: STSv1\nmode: enforce\nmx: a.example.com\nmax_age: 1\ngarbage",
            // Enforced and testing policies need at least one mx.
            "version: STSv1\nmode: enforce\nmax_age: 604800",
            "version: STSv1\nmode: testing\nmax_age: 604800",
        ] {
            assert!(
                matches!(Policy::parse(policy), Err(Error::MalformedPolicy(_))),
                "{policy:?}"
            );
        }
    }
}
