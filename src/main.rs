use std::{process, sync::Arc};

use mxaudit::{
    audit::Audit, config::Settings, report, resolver::AuthResolver, UnwrapFailure,
};

#[tokio::main]
async fn main() {
    // Read command line parameters
    let settings = match Settings::parse(std::env::args().skip(1)) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("{err}");
            eprintln!(
                "Usage: mxaudit [--active] [--records] [--json] [--resolver=<name>] \
                 [--timeout=<secs>] [--log-level=<level>] <domain>"
            );
            process::exit(2);
        }
    };

    // Enable logging; reports go to stdout, diagnostics to stderr
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(settings.log_level)
            .with_writer(std::io::stderr)
            .finish(),
    )
    .failed("Failed to set tracing subscriber");

    // Build the authenticated resolver
    let (resolver_config, resolver_opts) = match settings.resolver_config() {
        Ok(resolver_config) => resolver_config,
        Err(err) => {
            eprintln!("{err}");
            process::exit(3);
        }
    };
    let resolver = match AuthResolver::new(resolver_config, resolver_opts) {
        Ok(resolver) => resolver,
        Err(err) => {
            eprintln!("Failed to build DNS resolver: {err}");
            process::exit(3);
        }
    };

    // Evaluate and render
    let audit = Arc::new(Audit::new(resolver, settings.active, settings.timeout));
    let outcome = audit
        .evaluate(&settings.domain)
        .await
        .failed("Evaluation failed");

    if settings.json {
        report::print_json(&outcome.result).failed("Failed to serialize result");
    } else {
        report::print_human(&outcome, settings.show_records);
    }
    report::print_failures(&outcome.errors);
}
