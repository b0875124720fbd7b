use std::path::PathBuf;
use std::str::FromStr;

/// Server settings, read once from `BROKERSLOT_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub bind: String,
    pub data_dir: PathBuf,
    pub password: String,
    pub max_connections: usize,
    /// WAL appends since the last compaction before the compactor rewrites it.
    pub compact_threshold: u64,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5433,
            bind: "0.0.0.0".into(),
            data_dir: PathBuf::from("./data"),
            password: "brokerslot".into(),
            max_connections: 256,
            compact_threshold: 1000,
            tls_cert: None,
            tls_key: None,
            metrics_port: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable numbers fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        Self {
            port: parsed(&lookup, "BROKERSLOT_PORT").unwrap_or(d.port),
            bind: lookup("BROKERSLOT_BIND").unwrap_or(d.bind),
            data_dir: lookup("BROKERSLOT_DATA_DIR").map(PathBuf::from).unwrap_or(d.data_dir),
            password: lookup("BROKERSLOT_PASSWORD").unwrap_or(d.password),
            max_connections: parsed(&lookup, "BROKERSLOT_MAX_CONNECTIONS").unwrap_or(d.max_connections),
            compact_threshold: parsed(&lookup, "BROKERSLOT_COMPACT_THRESHOLD").unwrap_or(d.compact_threshold),
            tls_cert: lookup("BROKERSLOT_TLS_CERT"),
            tls_key: lookup("BROKERSLOT_TLS_KEY"),
            metrics_port: parsed(&lookup, "BROKERSLOT_METRICS_PORT"),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let c = config(&[]);
        assert_eq!(c, Config::default());
        assert_eq!(c.listen_addr(), "0.0.0.0:5433");
    }

    #[test]
    fn reads_overrides() {
        let c = config(&[
            ("BROKERSLOT_PORT", "6000"),
            ("BROKERSLOT_DATA_DIR", "/var/lib/brokerslot"),
            ("BROKERSLOT_COMPACT_THRESHOLD", "50"),
            ("BROKERSLOT_METRICS_PORT", "9100"),
        ]);
        assert_eq!(c.port, 6000);
        assert_eq!(c.data_dir, PathBuf::from("/var/lib/brokerslot"));
        assert_eq!(c.compact_threshold, 50);
        assert_eq!(c.metrics_port, Some(9100));
    }

    #[test]
    fn bad_numbers_fall_back() {
        let c = config(&[("BROKERSLOT_MAX_CONNECTIONS", "lots"), ("BROKERSLOT_METRICS_PORT", "-1")]);
        assert_eq!(c.max_connections, 256);
        assert_eq!(c.metrics_port, None);
    }
}
