use super::{KeyValue, Resource, Scope};
use serde::{Deserialize, Serialize};

/// A collection of log records grouped by resource and instrumentation scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Logs {
    pub resource_logs: Vec<ResourceLogs>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLogs {
    pub resource: Resource,
    pub scope_logs: Vec<ScopeLogs>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeLogs {
    pub scope: Scope,
    pub log_records: Vec<LogRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub time_unix_nano: u64,
    pub severity_number: i32,
    pub severity_text: String,
    pub body: String,
    pub attributes: Vec<KeyValue>,
}

impl Logs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of log records across all resource and scope groups.
    pub fn log_record_count(&self) -> usize {
        self.resource_logs
            .iter()
            .map(ResourceLogs::log_record_count)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.log_record_count() == 0
    }

    /// Moves all resource groups out of `other` onto the tail of `self`.
    pub fn append(&mut self, mut other: Logs) {
        self.resource_logs.append(&mut other.resource_logs);
    }

    /// Removes and returns the first `count` log records in iteration order.
    ///
    /// Groups that are consumed whole move as-is; a group that is split
    /// keeps its remainder under a copy of the original resource/scope
    /// envelope. Requesting at least `log_record_count()` records takes
    /// everything and leaves `self` empty.
    pub fn split(&mut self, count: usize) -> Logs {
        if count >= self.log_record_count() {
            return std::mem::take(self);
        }
        let mut taken = Vec::new();
        let mut remaining = count;
        while remaining > 0 {
            let group = &mut self.resource_logs[0];
            let group_count = group.log_record_count();
            if group_count <= remaining {
                remaining -= group_count;
                taken.push(self.resource_logs.remove(0));
            } else {
                taken.push(group.split(remaining));
                remaining = 0;
            }
        }
        Logs {
            resource_logs: taken,
        }
    }

    /// Serialized size of the collection in bytes.
    pub fn encoded_size(&self) -> usize {
        serde_json::to_vec(self).map_or(0, |encoded| encoded.len())
    }
}

impl ResourceLogs {
    pub fn log_record_count(&self) -> usize {
        self.scope_logs
            .iter()
            .map(|scope| scope.log_records.len())
            .sum()
    }

    fn split(&mut self, count: usize) -> ResourceLogs {
        let mut taken = Vec::new();
        let mut remaining = count;
        while remaining > 0 {
            let group = &mut self.scope_logs[0];
            if group.log_records.len() <= remaining {
                remaining -= group.log_records.len();
                taken.push(self.scope_logs.remove(0));
            } else {
                taken.push(ScopeLogs {
                    scope: group.scope.clone(),
                    log_records: group.log_records.drain(..remaining).collect(),
                });
                remaining = 0;
            }
        }
        ResourceLogs {
            resource: self.resource.clone(),
            scope_logs: taken,
        }
    }
}
