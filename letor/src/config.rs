use anyhow::{bail, Context, Result};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// Parameters the pipeline cannot start without.
const REQUIRED: [&str; 4] = [
    "indexPath",
    "queryFilePath",
    "trecEvalOutputPath",
    "retrievalAlgorithm",
];

/// `key=value` parameter file, one pair per line. Missing required
/// keys abort before any work starts.
pub struct Params {
    map: HashMap<String, String>,
}

impl Params {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading parameter file {}", path.display()))?;
        let mut map = HashMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .with_context(|| format!("malformed parameter line: {line}"))?;
            map.insert(key.trim().to_string(), value.trim().to_string());
        }

        let missing: Vec<&str> = REQUIRED
            .iter()
            .copied()
            .filter(|k| !map.contains_key(*k))
            .collect();
        if !missing.is_empty() {
            bail!("missing required parameters: {}", missing.join(", "));
        }
        Ok(Params { map })
    }

    pub fn get(&self, key: &str) -> Result<&str> {
        self.map
            .get(key)
            .map(String::as_str)
            .with_context(|| format!("missing parameter {key}"))
    }

    pub fn get_opt(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Result<f64> {
        self.get(key)?
            .parse()
            .with_context(|| format!("parameter {key} is not a number"))
    }

    /// 1-based disabled feature slots from the comma-separated
    /// `letor:featureDisable` parameter; empty when unset.
    pub fn disabled_slots(&self) -> Result<HashSet<usize>> {
        let mut slots = HashSet::new();
        if let Some(raw) = self.get_opt("letor:featureDisable") {
            for part in raw.split(',') {
                let slot: usize = part
                    .trim()
                    .parse()
                    .with_context(|| format!("bad letor:featureDisable entry: {part}"))?;
                slots.insert(slot);
            }
        }
        Ok(slots)
    }
}
