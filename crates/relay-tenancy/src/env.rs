//! Immutable environment snapshots for single-tenant configuration.

use std::collections::BTreeMap;

/// Point-in-time copy of environment-style `NAME=value` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    values: BTreeMap<String, String>,
}

impl EnvSnapshot {
    pub fn from_process() -> Self {
        Self {
            values: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    /// Returns the trimmed value, treating blank values as unset.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Returns the value or an empty string, so absent credentials stay detectable.
    pub fn get_or_empty(&self, name: &str) -> String {
        self.get(name).unwrap_or_default().to_string()
    }

    pub fn get_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or(default).to_string()
    }

    /// Parses common boolean spellings; anything unrecognised keeps `default`.
    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        match self.get(name).map(str::to_ascii_lowercase).as_deref() {
            Some("1" | "true" | "yes" | "on") => true,
            Some("0" | "false" | "no" | "off") => false,
            _ => default,
        }
    }
}

/// Where single-tenant values come from each time the loader runs.
#[derive(Debug, Clone)]
pub enum EnvironmentSource {
    /// Re-read the live process environment on every load and reload.
    Process,
    /// A fixed snapshot, reused verbatim on reload.
    Fixed(EnvSnapshot),
}

impl EnvironmentSource {
    pub fn snapshot(&self) -> EnvSnapshot {
        match self {
            Self::Process => EnvSnapshot::from_process(),
            Self::Fixed(snapshot) => snapshot.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::EnvSnapshot;

    #[test]
    fn unit_env_snapshot_treats_blank_values_as_unset() {
        let env = EnvSnapshot::from_pairs([("MICROSOFT_APP_ID", "   "), ("UPLOAD_DIR", " /data ")]);
        assert_eq!(env.get("MICROSOFT_APP_ID"), None);
        assert_eq!(env.get_or_empty("MICROSOFT_APP_ID"), "");
        assert_eq!(env.get("UPLOAD_DIR"), Some("/data"));
    }

    #[test]
    fn unit_env_snapshot_bool_parsing_keeps_default_for_unknown_values() {
        let env = EnvSnapshot::from_pairs([("A", "off"), ("B", "YES"), ("C", "maybe")]);
        assert!(!env.get_bool("A", true));
        assert!(env.get_bool("B", false));
        assert!(env.get_bool("C", true));
        assert!(!env.get_bool("MISSING", false));
    }
}
