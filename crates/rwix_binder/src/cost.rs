//! Disk cost accounting per volume.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bytes a payload set needs on one volume.
///
/// `cost` is the installed size; `temp_cost` is the staging space needed
/// while payloads are extracted from containers. The two are accumulated
/// independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallCost {
    pub volume: String,
    pub cost: u64,
    pub temp_cost: u64,
}

#[derive(Debug, Default)]
pub(crate) struct CostAccumulator {
    volumes: BTreeMap<String, (u64, u64)>,
}

impl CostAccumulator {
    pub(crate) fn add(&mut self, volume: &str, size: u64, containerized: bool) {
        let entry = self.volumes.entry(volume.to_string()).or_default();
        entry.0 += size;
        if containerized {
            entry.1 += size;
        }
    }

    /// Costs sorted by volume.
    pub(crate) fn finish(self) -> Vec<InstallCost> {
        self.volumes
            .into_iter()
            .map(|(volume, (cost, temp_cost))| InstallCost {
                volume,
                cost,
                temp_cost,
            })
            .collect()
    }
}
