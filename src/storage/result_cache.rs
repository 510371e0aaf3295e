use serde_json::Value;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CacheError;
use crate::geo::types::GeoInfo;
use crate::utils::to_pretty_json;
use crate::{log_debug, log_info, log_warn};

/// Lookup results keyed by IP, persisted as one JSON document.
///
/// Keys are kept sorted so a save/load/save cycle writes identical bytes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultCache {
    entries: BTreeMap<String, GeoInfo>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the cache file. A missing, unreadable or corrupt file yields an
    /// empty cache; entries that do not decode are dropped individually.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            log_debug!("no cache file at {}", path.display());
            return Self::new();
        }

        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                log_warn!("failed to read cache {}: {}", path.display(), e);
                return Self::new();
            }
        };

        let cache = Self::from_json(&raw).unwrap_or_else(|e| {
            log_warn!("ignoring corrupt cache {}: {}", path.display(), e);
            Self::new()
        });

        log_info!("cache loaded from {}, {} entries", path.display(), cache.len());
        cache
    }

    fn from_json(raw: &str) -> Result<Self, CacheError> {
        let document: BTreeMap<String, Value> = serde_json::from_str(raw)?;

        let mut entries = BTreeMap::new();
        for (ip, value) in document {
            match serde_json::from_value::<GeoInfo>(value) {
                Ok(info) => {
                    entries.insert(ip, info);
                }
                Err(e) => log_warn!("dropping cache entry {}: {}", ip, e),
            }
        }

        Ok(Self { entries })
    }

    pub fn get(&self, ip: &str) -> Option<&GeoInfo> {
        self.entries.get(ip)
    }

    /// Insert or overwrite the entry for `ip`
    pub fn put(&mut self, ip: impl Into<String>, info: GeoInfo) {
        self.entries.insert(ip.into(), info);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Result<String, CacheError> {
        let mut document = to_pretty_json(&self.entries)?;
        document.push('\n');
        Ok(document)
    }

    /// Write the whole cache to `path`, replacing it atomically
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
                log_info!("Created cache directory: {}", parent.display());
            }
        }

        let document = self.to_json()?;
        let tmp = temp_path(path);
        fs::write(&tmp, document)?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        log_info!("save {} cache entries to {}", self.len(), path.display());
        Ok(())
    }
}

/// Sibling file used for write-then-rename
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("cache"));
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample(ip: &str, country_code: &str) -> GeoInfo {
        let mut info = GeoInfo {
            ip: Some(ip.to_string()),
            country_code: Some(country_code.to_string()),
            asn: Some("AS15169".to_string()),
            last_update: Some(
                NaiveDate::from_ymd_opt(2023, 5, 22)
                    .unwrap()
                    .and_hms_micro_opt(16, 2, 0, 42)
                    .unwrap(),
            ),
            ..Default::default()
        };
        info.extra.insert("latitude".to_string(), json!(37.42301));
        info
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let cache = ResultCache::load(&dir.path().join("nope.json"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_load_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        for garbage in ["{not json", "[1, 2]", "", "\"just a string\""] {
            fs::write(&path, garbage).unwrap();
            assert!(ResultCache::load(&path).is_empty(), "content {:?}", garbage);
        }
    }

    #[test]
    fn test_load_drops_only_bad_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(
            &path,
            r#"{
                "8.8.8.8": {"ip": "8.8.8.8", "country_code": "US", "future_field": [1, 2]},
                "1.1.1.1": "not a record",
                "9.9.9.9": {"ip": "9.9.9.9", "last_update": "not a date"}
            }"#,
        )
        .unwrap();

        let cache = ResultCache::load(&path);
        assert_eq!(cache.len(), 1);

        let info = cache.get("8.8.8.8").unwrap();
        assert_eq!(info.extra.get("future_field"), Some(&json!([1, 2])));
    }

    #[test]
    fn test_put_overwrites() {
        let mut cache = ResultCache::new();
        cache.put("8.8.8.8", sample("8.8.8.8", "US"));
        cache.put("8.8.8.8", sample("8.8.8.8", "DE"));

        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get("8.8.8.8").unwrap().country_code.as_deref(),
            Some("DE")
        );
        assert!(cache.get("1.1.1.1").is_none());
    }

    #[test]
    fn test_save_load_round_trip_is_stable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("ipcheck.json");

        let mut cache = ResultCache::new();
        cache.put("8.8.8.8", sample("8.8.8.8", "US"));
        cache.put("1.1.1.1", sample("1.1.1.1", "AU"));
        cache.save(&path).unwrap();
        let first = fs::read_to_string(&path).unwrap();

        let loaded = ResultCache::load(&path);
        assert_eq!(loaded, cache);

        loaded.save(&path).unwrap();
        let second = fs::read_to_string(&path).unwrap();
        assert_eq!(first, second);

        assert!(first.contains("\"last_update\": \"2023-05-22 16:02:00.000042\""));
        assert!(first.starts_with("{\n   \"1.1.1.1\": {"));
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ipcheck.json");

        let mut cache = ResultCache::new();
        cache.put("8.8.8.8", sample("8.8.8.8", "US"));
        cache.save(&path).unwrap();
        cache.save(&path).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![OsString::from("ipcheck.json")]);
    }

    #[test]
    fn test_save_to_unwritable_path_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();

        let cache = ResultCache::new();
        assert!(cache.save(&blocker.join("ipcheck.json")).is_err());
    }
}
