//! Per-address resolve → cache → format pipeline

use anyhow::Result;
use std::collections::HashSet;
use std::io::Write;
use std::net::IpAddr;
use std::path::PathBuf;

use crate::error::TemplateError;
use crate::format::formatter::{Formatter, enrich};
use crate::geo::client::GeoLookup;
use crate::geo::types::{LookupOutcome, PresentationRecord};
use crate::geo::utils::{SELF_SENTINEL, is_self_sentinel};
use crate::storage::ResultCache;
use crate::{log_info, log_warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckerOptions {
    /// Where the cache is loaded from and saved to; `None` keeps it in memory
    pub cache_path: Option<PathBuf>,
    /// Ignore entries not fetched during this run
    pub refresh: bool,
}

pub struct Checker<L: GeoLookup> {
    source: L,
    formatter: Formatter,
    cache: ResultCache,
    options: CheckerOptions,
    fetched: HashSet<String>,
}

impl<L: GeoLookup> Checker<L> {
    /// Build a checker, loading the cache file when one is configured
    pub fn new(source: L, formatter: Formatter, options: CheckerOptions) -> Self {
        let cache = match &options.cache_path {
            Some(path) => ResultCache::load(path),
            None => ResultCache::new(),
        };
        Self::with_cache(source, formatter, cache, options)
    }

    pub fn with_cache(
        source: L,
        formatter: Formatter,
        cache: ResultCache,
        options: CheckerOptions,
    ) -> Self {
        Self {
            source,
            formatter,
            cache,
            options,
            fetched: HashSet::new(),
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn source(&self) -> &L {
        &self.source
    }

    /// Produce the record for one requested address
    pub fn check(&mut self, ip: &str) -> Result<PresentationRecord, TemplateError> {
        let outcome = self.resolve(ip);
        self.formatter.format(&outcome)
    }

    /// Resolve one requested address to a lookup outcome, consulting the
    /// cache first. Failures come back as `LookupOutcome::Failed`.
    pub fn resolve(&mut self, ip: &str) -> LookupOutcome {
        log_info!("get info about {} IP-address", ip);

        let address = if is_self_sentinel(ip) {
            match self.source.resolve_self() {
                Ok(address) => address,
                Err(e) => {
                    log_warn!("{}", e);
                    return e.into();
                }
            }
        } else {
            canonical_address(ip)
        };

        if !self.options.refresh || self.fetched.contains(&address) {
            if let Some(info) = self.cache.get(&address) {
                log_info!("found {} info in cache", address);
                return LookupOutcome::Found(info.clone());
            }
        }

        match self.source.lookup(Some(&address)) {
            LookupOutcome::Found(mut info) => {
                enrich(&mut info, chrono::Local::now().naive_local());
                let key = info
                    .ip
                    .as_deref()
                    .map(canonical_address)
                    .filter(|ip| !ip.is_empty())
                    .unwrap_or(address);
                self.cache.put(key.clone(), info.clone());
                self.fetched.insert(key);
                LookupOutcome::Found(info)
            }
            other => other,
        }
    }

    /// Emit one JSON line per address, then save the cache once.
    ///
    /// An empty list means "my own address". A template error stops the
    /// run with the cache left untouched. An output error stops it too, but
    /// whatever was fetched so far is still saved.
    pub fn run<W: Write>(&mut self, ips: &[String], out: &mut W) -> Result<()> {
        let own = [SELF_SENTINEL.to_string()];
        let ips = if ips.is_empty() { &own[..] } else { ips };

        for ip in ips {
            let record = self.check(ip)?;
            if let Err(e) = emit(out, &record) {
                self.persist();
                return Err(e);
            }
        }

        self.persist();
        Ok(())
    }

    /// Best-effort save of the cache, if a path is configured
    pub fn persist(&self) {
        if let Some(path) = &self.options.cache_path {
            if let Err(e) = self.cache.save(path) {
                log_warn!("failed to save cache to {}: {}", path.display(), e);
            }
        }
    }
}

fn emit<W: Write>(out: &mut W, record: &PresentationRecord) -> Result<()> {
    writeln!(out, "{}", serde_json::to_string(record)?)?;
    out.flush()?;
    Ok(())
}

/// Trimmed address text; IP literals are rewritten in their shortest form
/// so `2001:db8:0:0::1` and `2001:db8::1` share a cache entry
fn canonical_address(ip: &str) -> String {
    let ip = ip.trim();
    match ip.parse::<IpAddr>() {
        Ok(parsed) => parsed.to_string(),
        Err(_) => ip.to_string(),
    }
}
