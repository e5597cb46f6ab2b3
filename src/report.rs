use crate::audit::{AuditReport, AuditResult, CheckFailure, CheckReport, Level};

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";
const GRAY: &str = "\x1b[90m";

/// Renders the grouped, colorized report to stdout.
pub fn print_human(report: &AuditReport, show_records: bool) {
    let result = &report.result;

    println!("{BOLD}-- Source forgery protection{RESET}");
    print_status("DKIM", &result.dkim, show_records);
    print_status("SPF", &result.spf, show_records);
    print_status("DMARC", &result.dmarc, show_records);
    println!();

    println!("{BOLD}-- TLS enforcement{RESET}");
    print_status("MTA-STS", &result.mta_sts, show_records);
    print_status("DANE", &result.dane, show_records);
    println!();

    println!("{BOLD}-- DNS consistency{RESET}");
    print_status("FCrDNS", &result.fcrdns, show_records);
    print_status("DNSSEC", &result.dnssec, show_records);
}

fn print_status(name: &str, report: &CheckReport, show_records: bool) {
    let (color, mark) = match report.level {
        Level::Unknown => (GRAY, ' '),
        Level::Secure => (GREEN, '+'),
        Level::Insecure => (YELLOW, ' '),
        Level::Missing => (RED, ' '),
        Level::Invalid => (RED, '!'),
    };
    let description = if report.level == Level::Unknown {
        "not evaluated;"
    } else {
        report.description.as_str()
    };

    println!("[{color}{mark}{RESET}] {color}{BOLD}{name}:{RESET} \t {description}");

    if show_records {
        if let Some(record) = &report.record {
            println!("    {BLUE}Record:{RESET}");
            for line in record.lines() {
                println!("\t{line}");
            }
        }
    }
}

pub fn print_json(result: &AuditResult) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

/// Transient per-check failures go to stderr; they are findings about the
/// audit itself, not about the domain.
pub fn print_failures(errors: &[CheckFailure]) {
    for failure in errors {
        eprintln!(
            "{YELLOW}warning:{RESET} {} check: {}",
            failure.check.name(),
            failure.error
        );
    }
}
