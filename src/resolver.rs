use std::{
    net::IpAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use mail_auth::{
    common::lru::{DnsCache, LruCache},
    trust_dns_resolver::{
        config::{ResolverConfig, ResolverOpts},
        error::{ResolveError, ResolveErrorKind},
        proto::{error::ProtoErrorKind, op::ResponseCode},
        AsyncResolver, TokioAsyncResolver,
    },
};

use crate::dane::Tlsa;

pub(crate) const CACHE_TTL: Duration = Duration::from_secs(60);

/// A lookup answer together with its DNSSEC authentication state.
///
/// `authentic` mirrors the AD bit of a validating resolver: the answer was
/// validated when it is true, the zone is unsigned when it is false.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated<T> {
    pub authentic: bool,
    pub value: T,
}

impl<T> Authenticated<T> {
    pub fn new(authentic: bool, value: T) -> Self {
        Authenticated { authentic, value }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsError {
    /// The name does not exist (NXDOMAIN). An expected outcome, not a failure.
    NotFound,
    /// Any other lookup failure.
    Lookup(String),
}

pub type DnsResult<T> = Result<Authenticated<T>, DnsError>;

impl std::fmt::Display for DnsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DnsError::NotFound => f.write_str("name does not exist"),
            DnsError::Lookup(reason) => f.write_str(reason),
        }
    }
}

impl std::error::Error for DnsError {}

/// DNSSEC-aware lookup facade.
///
/// Every query is first sent through a validating resolver; a validated
/// answer is authentic. Zones without RRSIGs surface as `RrsigsNotPresent`,
/// in which case the query is retried on the plain resolver and the answer
/// marked unauthenticated. Answers are memoized per process run.
pub struct AuthResolver {
    validating: TokioAsyncResolver,
    plain: TokioAsyncResolver,
    pub(crate) cache: DnsCaches,
}

pub(crate) struct DnsCaches {
    host: LruCache<String, DnsResult<Arc<Vec<IpAddr>>>>,
    mx: LruCache<String, DnsResult<Arc<Vec<String>>>>,
    txt: LruCache<String, DnsResult<Arc<Vec<String>>>>,
    ptr: LruCache<String, DnsResult<Arc<Vec<String>>>>,
    pub(crate) tlsa: LruCache<String, DnsResult<Arc<Vec<Tlsa>>>>,
}

pub(crate) enum Classified {
    Unsigned,
    Empty,
    NxDomain,
    Failed(DnsError),
}

pub(crate) fn classify(err: &ResolveError) -> Classified {
    match err.kind() {
        ResolveErrorKind::Proto(proto)
            if matches!(proto.kind(), ProtoErrorKind::RrsigsNotPresent { .. }) =>
        {
            Classified::Unsigned
        }
        ResolveErrorKind::NoRecordsFound { response_code, .. } => {
            if *response_code == ResponseCode::NXDomain {
                Classified::NxDomain
            } else {
                Classified::Empty
            }
        }
        _ => Classified::Failed(DnsError::Lookup(err.to_string())),
    }
}

pub(crate) fn fqdn(name: &str) -> String {
    let name = name.to_lowercase();
    if name.ends_with('.') {
        name
    } else {
        format!("{name}.")
    }
}

fn hostname(name: impl ToString) -> String {
    name.to_string().trim_end_matches('.').to_lowercase()
}

impl AuthResolver {
    pub fn new(config: ResolverConfig, opts: ResolverOpts) -> Result<Self, ResolveError> {
        let config_dnssec = config.clone();
        let mut opts_dnssec = opts;
        opts_dnssec.validate = true;

        Ok(AuthResolver {
            validating: AsyncResolver::tokio(config_dnssec, opts_dnssec)?,
            plain: AsyncResolver::tokio(config, opts)?,
            cache: DnsCaches {
                host: LruCache::with_capacity(128),
                mx: LruCache::with_capacity(128),
                txt: LruCache::with_capacity(128),
                ptr: LruCache::with_capacity(128),
                tlsa: LruCache::with_capacity(128),
            },
        })
    }

    pub async fn host_lookup(&self, host: &str) -> DnsResult<Arc<Vec<IpAddr>>> {
        let name = fqdn(host);
        if let Some(entry) = self.cache.host.get(name.as_str()) {
            return entry;
        }

        let entry = match self.validating.lookup_ip(name.as_str()).await {
            Ok(lookup) => Ok(Authenticated::new(
                true,
                Arc::new(lookup.iter().collect::<Vec<_>>()),
            )),
            Err(err) => match classify(&err) {
                Classified::Unsigned => match self.plain.lookup_ip(name.as_str()).await {
                    Ok(lookup) => Ok(Authenticated::new(
                        false,
                        Arc::new(lookup.iter().collect::<Vec<_>>()),
                    )),
                    Err(err) => match classify(&err) {
                        Classified::NxDomain => Err(DnsError::NotFound),
                        Classified::Empty => Ok(Authenticated::new(false, Arc::new(Vec::new()))),
                        _ => Err(DnsError::Lookup(err.to_string())),
                    },
                },
                Classified::Empty => Ok(Authenticated::new(true, Arc::new(Vec::new()))),
                Classified::NxDomain => Err(DnsError::NotFound),
                Classified::Failed(err) => Err(err),
            },
        };

        self.cache
            .host
            .insert(name, entry, Instant::now() + CACHE_TTL)
    }

    /// Exchange hostnames ordered by preference, lowercased, without the
    /// trailing dot. A null MX (".") is dropped.
    pub async fn mx_lookup(&self, domain: &str) -> DnsResult<Arc<Vec<String>>> {
        let name = fqdn(domain);
        if let Some(entry) = self.cache.mx.get(name.as_str()) {
            return entry;
        }

        fn exchanges(
            lookup: mail_auth::trust_dns_resolver::lookup::MxLookup,
        ) -> Vec<String> {
            let mut records = lookup
                .iter()
                .map(|mx| (mx.preference(), hostname(mx.exchange())))
                .collect::<Vec<_>>();
            records.sort();
            records
                .into_iter()
                .map(|(_, host)| host)
                .filter(|host| !host.is_empty())
                .collect()
        }

        let entry = match self.validating.mx_lookup(name.as_str()).await {
            Ok(lookup) => Ok(Authenticated::new(true, Arc::new(exchanges(lookup)))),
            Err(err) => match classify(&err) {
                Classified::Unsigned => match self.plain.mx_lookup(name.as_str()).await {
                    Ok(lookup) => Ok(Authenticated::new(false, Arc::new(exchanges(lookup)))),
                    Err(err) => match classify(&err) {
                        Classified::NxDomain => Err(DnsError::NotFound),
                        Classified::Empty => Ok(Authenticated::new(false, Arc::new(Vec::new()))),
                        _ => Err(DnsError::Lookup(err.to_string())),
                    },
                },
                Classified::Empty => Ok(Authenticated::new(true, Arc::new(Vec::new()))),
                Classified::NxDomain => Err(DnsError::NotFound),
                Classified::Failed(err) => Err(err),
            },
        };

        self.cache.mx.insert(name, entry, Instant::now() + CACHE_TTL)
    }

    /// TXT values with the character strings of each record concatenated.
    pub async fn txt_lookup(&self, name: &str) -> DnsResult<Arc<Vec<String>>> {
        let name = fqdn(name);
        if let Some(entry) = self.cache.txt.get(name.as_str()) {
            return entry;
        }

        fn values(lookup: mail_auth::trust_dns_resolver::lookup::TxtLookup) -> Vec<String> {
            lookup
                .iter()
                .map(|txt| {
                    txt.txt_data()
                        .iter()
                        .map(|part| String::from_utf8_lossy(part))
                        .collect::<String>()
                })
                .collect()
        }

        let entry = match self.validating.txt_lookup(name.as_str()).await {
            Ok(lookup) => Ok(Authenticated::new(true, Arc::new(values(lookup)))),
            Err(err) => match classify(&err) {
                Classified::Unsigned => match self.plain.txt_lookup(name.as_str()).await {
                    Ok(lookup) => Ok(Authenticated::new(false, Arc::new(values(lookup)))),
                    Err(err) => match classify(&err) {
                        Classified::NxDomain => Err(DnsError::NotFound),
                        Classified::Empty => Ok(Authenticated::new(false, Arc::new(Vec::new()))),
                        _ => Err(DnsError::Lookup(err.to_string())),
                    },
                },
                Classified::Empty => Ok(Authenticated::new(true, Arc::new(Vec::new()))),
                Classified::NxDomain => Err(DnsError::NotFound),
                Classified::Failed(err) => Err(err),
            },
        };

        self.cache.txt.insert(name, entry, Instant::now() + CACHE_TTL)
    }

    /// PTR names for an address, lowercased, without the trailing dot.
    pub async fn ptr_lookup(&self, addr: IpAddr) -> DnsResult<Arc<Vec<String>>> {
        let key = addr.to_string();
        if let Some(entry) = self.cache.ptr.get(key.as_str()) {
            return entry;
        }

        fn names(lookup: mail_auth::trust_dns_resolver::lookup::ReverseLookup) -> Vec<String> {
            lookup.iter().map(hostname).collect()
        }

        let entry = match self.validating.reverse_lookup(addr).await {
            Ok(lookup) => Ok(Authenticated::new(true, Arc::new(names(lookup)))),
            Err(err) => match classify(&err) {
                Classified::Unsigned => match self.plain.reverse_lookup(addr).await {
                    Ok(lookup) => Ok(Authenticated::new(false, Arc::new(names(lookup)))),
                    Err(err) => match classify(&err) {
                        Classified::NxDomain => Err(DnsError::NotFound),
                        Classified::Empty => Ok(Authenticated::new(false, Arc::new(Vec::new()))),
                        _ => Err(DnsError::Lookup(err.to_string())),
                    },
                },
                Classified::Empty => Ok(Authenticated::new(true, Arc::new(Vec::new()))),
                Classified::NxDomain => Err(DnsError::NotFound),
                Classified::Failed(err) => Err(err),
            },
        };

        self.cache.ptr.insert(key, entry, Instant::now() + CACHE_TTL)
    }

    pub(crate) fn validating(&self) -> &TokioAsyncResolver {
        &self.validating
    }

    pub(crate) fn plain(&self) -> &TokioAsyncResolver {
        &self.plain
    }
}

#[cfg(test)]
impl AuthResolver {
    pub(crate) fn for_tests() -> Self {
        AuthResolver::new(ResolverConfig::cloudflare(), ResolverOpts::default()).unwrap()
    }

    pub(crate) fn host_add(&self, name: &str, authentic: bool, addrs: Vec<IpAddr>) {
        self.cache.host.insert(
            fqdn(name),
            Ok(Authenticated::new(authentic, Arc::new(addrs))),
            Instant::now() + CACHE_TTL,
        );
    }

    pub(crate) fn mx_add(&self, name: &str, authentic: bool, hosts: Vec<String>) {
        self.cache.mx.insert(
            fqdn(name),
            Ok(Authenticated::new(authentic, Arc::new(hosts))),
            Instant::now() + CACHE_TTL,
        );
    }

    pub(crate) fn txt_add(&self, name: &str, authentic: bool, values: Vec<String>) {
        self.cache.txt.insert(
            fqdn(name),
            Ok(Authenticated::new(authentic, Arc::new(values))),
            Instant::now() + CACHE_TTL,
        );
    }

    pub(crate) fn txt_fail(&self, name: &str, error: DnsError) {
        self.cache
            .txt
            .insert(fqdn(name), Err(error), Instant::now() + CACHE_TTL);
    }

    pub(crate) fn ptr_add(&self, addr: IpAddr, authentic: bool, names: Vec<String>) {
        self.cache.ptr.insert(
            addr.to_string(),
            Ok(Authenticated::new(authentic, Arc::new(names))),
            Instant::now() + CACHE_TTL,
        );
    }

    pub(crate) fn ptr_fail(&self, addr: IpAddr, error: DnsError) {
        self.cache
            .ptr
            .insert(addr.to_string(), Err(error), Instant::now() + CACHE_TTL);
    }
}
