use std::collections::HashMap;

const DEFAULT_LABEL: &str = "default";

/// Parsed form of `API_KEYS`: `"k1:label1,k2:label2,k3"`. An empty configured list means
/// permissive mode — every request to an authenticated route is allowed.
#[derive(Clone, Debug, Default)]
pub struct ApiKeys {
    labels: HashMap<String, String>,
}

impl ApiKeys {
    pub fn parse(raw: &str) -> Self {
        let mut labels = HashMap::new();
        for entry in raw.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            match entry.split_once(':') {
                Some((key, label)) => {
                    labels.insert(key.trim().to_string(), label.trim().to_string());
                }
                None => {
                    labels.insert(entry.to_string(), DEFAULT_LABEL.to_string());
                }
            }
        }
        Self { labels }
    }

    pub fn is_enforced(&self) -> bool {
        !self.labels.is_empty()
    }

    /// Returns the key's label if it's a configured key.
    pub fn label_for(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}
