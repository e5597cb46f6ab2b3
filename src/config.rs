use std::time::Duration;

use mail_auth::trust_dns_resolver::{
    config::{ResolverConfig, ResolverOpts},
    system_conf::read_system_conf,
};

/// EHLO hostname used by the live STARTTLS probe.
pub const EHLO_HOSTNAME: &str = "localhost";

pub struct Settings {
    pub domain: String,
    /// Enables tests that connect to the SMTP servers.
    pub active: bool,
    /// Displays raw protocol records under each check.
    pub show_records: bool,
    pub json: bool,
    pub resolver: String,
    pub timeout: Duration,
    pub log_level: tracing::Level,
}

impl Settings {
    pub fn parse(args: impl Iterator<Item = String>) -> Result<Settings, String> {
        let mut settings = Settings {
            domain: String::new(),
            active: false,
            show_records: false,
            json: false,
            resolver: "system".to_string(),
            timeout: Duration::from_secs(60),
            log_level: tracing::Level::WARN,
        };
        let mut domain = None;

        for arg in args {
            if let Some((key, value)) = arg.split_once('=') {
                match key {
                    "--resolver" => {
                        settings.resolver = value.to_string();
                    }
                    "--timeout" => {
                        settings.timeout = Duration::from_secs(
                            value
                                .parse()
                                .map_err(|_| format!("Invalid timeout value: {value}"))?,
                        );
                    }
                    "--log-level" => {
                        settings.log_level = value
                            .parse()
                            .map_err(|_| format!("Invalid log level: {value}"))?;
                    }
                    _ => return Err(format!("Invalid command line argument: {key}")),
                }
            } else if let Some(flag) = arg.strip_prefix("--") {
                match flag {
                    "active" => settings.active = true,
                    "records" => settings.show_records = true,
                    "json" => settings.json = true,
                    _ => return Err(format!("Invalid command line argument: {arg}")),
                }
            } else if domain.is_none() {
                domain = Some(arg);
            } else {
                return Err(format!("Unexpected argument: {arg}"));
            }
        }

        settings.domain = domain.ok_or_else(|| "Missing domain argument".to_string())?;
        Ok(settings)
    }

    pub fn resolver_config(&self) -> Result<(ResolverConfig, ResolverOpts), String> {
        Ok(match self.resolver.as_str() {
            "cloudflare" => (ResolverConfig::cloudflare(), ResolverOpts::default()),
            "cloudflare-tls" => (ResolverConfig::cloudflare_tls(), ResolverOpts::default()),
            "quad9" => (ResolverConfig::quad9(), ResolverOpts::default()),
            "quad9-tls" => (ResolverConfig::quad9_tls(), ResolverOpts::default()),
            "google" => (ResolverConfig::google(), ResolverOpts::default()),
            "system" => read_system_conf()
                .map_err(|err| format!("Failed to read system DNS config: {err}"))?,
            other => return Err(format!("Unknown resolver type {other:?}.")),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Settings;

    fn parse(args: &[&str]) -> Result<Settings, String> {
        Settings::parse(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn parse_arguments() {
        let settings = parse(&["example.org"]).unwrap();
        assert_eq!(settings.domain, "example.org");
        assert!(!settings.active);
        assert!(!settings.show_records);
        assert_eq!(settings.resolver, "system");
        assert_eq!(settings.timeout, Duration::from_secs(60));

        let settings = parse(&[
            "--active",
            "--records",
            "--json",
            "--resolver=cloudflare",
            "--timeout=10",
            "example.org",
        ])
        .unwrap();
        assert!(settings.active);
        assert!(settings.show_records);
        assert!(settings.json);
        assert_eq!(settings.resolver, "cloudflare");
        assert_eq!(settings.timeout, Duration::from_secs(10));
        assert_eq!(settings.domain, "example.org");
    }

    #[test]
    fn reject_bad_arguments() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["--active"]).is_err());
        assert!(parse(&["--bogus", "example.org"]).is_err());
        assert!(parse(&["--timeout=never", "example.org"]).is_err());
        assert!(parse(&["example.org", "example.net"]).is_err());
    }
}
