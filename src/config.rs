use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

use crate::checker::CheckerOptions;
use crate::geo::client::Endpoints;
use crate::geo::constants::{GEO_API_BASE, SELF_IP_URL};

pub const TIMEOUT_SECONDS: u64 = 10;
pub const CACHE_FILE_NAME: &str = "ipcheck.json";

// Output templates
pub const DEFAULT_TEXT_FMT: &str = "{region_code}/{country_code} {flag}";
pub const DEFAULT_ALT_FMT: &str = "{country_code}";
pub const DEFAULT_TOOLTIP_FMT: &str = "IP: <b>{ip}</b>
Network: <b>{network}</b>

City: <b>{city}</b>
Country: <b>{country_name}</b>
Country Code: <b>{country_code}</b>
Flag: {flag}

ASN: <b>{asn}</b>
Provider: <b>{org}</b>

Last update: <i>{last_update}</i>";

/// Platform cache location: `$XDG_CACHE_HOME` or `~/.cache` on Linux,
/// `~/Library/Caches` on macOS, `%LOCALAPPDATA%` on Windows.
///
/// Does not ensure that the directory exists.
pub fn default_cache_file() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CACHE_FILE_NAME)
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Waybar module for checking external IP",
    after_help = "Examples:\n  ipcheck my\n  ipcheck my -F \"{flag}\"\n  ipcheck 8.8.8.8 -F \"{city}\""
)]
pub struct Cli {
    /// IP list to check ("my" = own external address)
    #[arg(value_name = "IP", default_value = "my")]
    pub ips: Vec<String>,

    /// Increase output verbosity
    #[arg(short, long, action = ArgAction::Count)]
    pub verbosity: u8,

    /// Enable debug output
    #[arg(short = 'D', long)]
    pub debug: bool,

    /// Load and save the result cache (default)
    #[arg(long, overrides_with = "no_cache")]
    pub use_cache: bool,

    /// Do not read or write the cache file
    #[arg(long, overrides_with = "use_cache")]
    pub no_cache: bool,

    /// Cache file location (default: platform cache dir)
    #[arg(long, value_name = "PATH")]
    pub cache_file: Option<PathBuf>,

    /// Ignore cached entries, fetch fresh data and update the cache
    #[arg(long)]
    pub refresh: bool,

    /// Format for output text
    #[arg(short = 'F', long, default_value = DEFAULT_TEXT_FMT)]
    pub text_fmt: String,

    /// Format for output alt. May be used for icons
    #[arg(long, default_value = DEFAULT_ALT_FMT)]
    pub alt_fmt: String,

    /// Format for output tooltip (Pango markup)
    #[arg(long, default_value = DEFAULT_TOOLTIP_FMT, hide_default_value = true)]
    pub tooltip_fmt: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = TIMEOUT_SECONDS)]
    pub timeout: u64,

    /// Geolocation API base URL
    #[arg(long, default_value = GEO_API_BASE)]
    pub geo_api: String,

    /// Plain text "what is my IP" URL
    #[arg(long, default_value = SELF_IP_URL)]
    pub self_ip_url: String,
}

impl Cli {
    pub fn cache_enabled(&self) -> bool {
        !self.no_cache
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            geo_api: self.geo_api.clone(),
            self_ip: self.self_ip_url.clone(),
        }
    }

    pub fn checker_options(&self) -> CheckerOptions {
        let cache_path = self.cache_enabled().then(|| {
            self.cache_file
                .clone()
                .unwrap_or_else(default_cache_file)
        });

        CheckerOptions {
            cache_path,
            refresh: self.refresh,
        }
    }
}
