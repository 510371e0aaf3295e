// API endpoints
pub const GEO_API_BASE: &str = "https://ipapi.co";
pub const SELF_IP_URL: &str = "https://ifconfig.me/ip";

pub const USER_AGENT: &str = concat!("ipcheck/", env!("CARGO_PKG_VERSION"));

/// Maximum number of payload characters quoted in a malformed-response reason
pub const PAYLOAD_PREVIEW_CHARS: usize = 200;
