use super::{KeyValue, Resource, Scope};
use serde::{Deserialize, Serialize};

/// A collection of metric data points grouped by resource, instrumentation
/// scope and metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub resource_metrics: Vec<ResourceMetrics>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetrics {
    pub resource: Resource,
    pub scope_metrics: Vec<ScopeMetrics>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeMetrics {
    pub scope: Scope,
    pub metrics: Vec<Metric>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub description: String,
    pub unit: String,
    pub data_points: Vec<DataPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub attributes: Vec<KeyValue>,
    pub time_unix_nano: u64,
    pub value: MetricValue,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Double(f64),
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of data points across all groups; the item count of a metric
    /// payload.
    pub fn data_point_count(&self) -> usize {
        self.resource_metrics
            .iter()
            .map(ResourceMetrics::data_point_count)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.data_point_count() == 0
    }

    /// Moves all resource groups out of `other` onto the tail of `self`.
    pub fn append(&mut self, mut other: Metrics) {
        self.resource_metrics.append(&mut other.resource_metrics);
    }

    /// Removes and returns the first `count` data points in iteration order.
    ///
    /// A metric whose data points are split across the boundary keeps its
    /// remainder under a copy of the metric envelope (and of the enclosing
    /// resource/scope envelopes). Requesting at least `data_point_count()`
    /// points takes everything and leaves `self` empty.
    pub fn split(&mut self, count: usize) -> Metrics {
        if count >= self.data_point_count() {
            return std::mem::take(self);
        }
        let mut taken = Vec::new();
        let mut remaining = count;
        while remaining > 0 {
            let group = &mut self.resource_metrics[0];
            let group_count = group.data_point_count();
            if group_count <= remaining {
                remaining -= group_count;
                taken.push(self.resource_metrics.remove(0));
            } else {
                taken.push(group.split(remaining));
                remaining = 0;
            }
        }
        Metrics {
            resource_metrics: taken,
        }
    }

    /// Serialized size of the collection in bytes.
    pub fn encoded_size(&self) -> usize {
        serde_json::to_vec(self).map_or(0, |encoded| encoded.len())
    }
}

impl ResourceMetrics {
    pub fn data_point_count(&self) -> usize {
        self.scope_metrics
            .iter()
            .map(ScopeMetrics::data_point_count)
            .sum()
    }

    fn split(&mut self, count: usize) -> ResourceMetrics {
        let mut taken = Vec::new();
        let mut remaining = count;
        while remaining > 0 {
            let group = &mut self.scope_metrics[0];
            let group_count = group.data_point_count();
            if group_count <= remaining {
                remaining -= group_count;
                taken.push(self.scope_metrics.remove(0));
            } else {
                taken.push(group.split(remaining));
                remaining = 0;
            }
        }
        ResourceMetrics {
            resource: self.resource.clone(),
            scope_metrics: taken,
        }
    }
}

impl ScopeMetrics {
    pub fn data_point_count(&self) -> usize {
        self.metrics
            .iter()
            .map(|metric| metric.data_points.len())
            .sum()
    }

    fn split(&mut self, count: usize) -> ScopeMetrics {
        let mut taken = Vec::new();
        let mut remaining = count;
        while remaining > 0 {
            let metric = &mut self.metrics[0];
            if metric.data_points.len() <= remaining {
                remaining -= metric.data_points.len();
                taken.push(self.metrics.remove(0));
            } else {
                taken.push(Metric {
                    name: metric.name.clone(),
                    description: metric.description.clone(),
                    unit: metric.unit.clone(),
                    data_points: metric.data_points.drain(..remaining).collect(),
                });
                remaining = 0;
            }
        }
        ScopeMetrics {
            scope: self.scope.clone(),
            metrics: taken,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_point(value: i64) -> DataPoint {
        DataPoint {
            attributes: vec![],
            time_unix_nano: 0,
            value: MetricValue::Int(value),
        }
    }

    /// One resource group with one scope group holding `counts.len()`
    /// metrics of the given data point counts.
    fn metrics(name: &str, counts: &[usize]) -> Metrics {
        let mut next = 0i64;
        let metrics = counts
            .iter()
            .enumerate()
            .map(|(i, count)| Metric {
                name: format!("{name}-{i}"),
                description: String::new(),
                unit: "1".to_string(),
                data_points: (0..*count)
                    .map(|_| {
                        next += 1;
                        data_point(next)
                    })
                    .collect(),
            })
            .collect();
        Metrics {
            resource_metrics: vec![ResourceMetrics {
                resource: Resource::default(),
                scope_metrics: vec![ScopeMetrics {
                    scope: Scope::new("test"),
                    metrics,
                }],
            }],
        }
    }

    fn values(md: &Metrics) -> Vec<MetricValue> {
        md.resource_metrics
            .iter()
            .flat_map(|r| r.scope_metrics.iter())
            .flat_map(|s| s.metrics.iter())
            .flat_map(|m| m.data_points.iter())
            .map(|point| point.value)
            .collect()
    }

    #[test]
    fn counts_data_points() {
        let md = metrics("m", &[2, 3]);
        assert_eq!(md.data_point_count(), 5);
    }

    #[test]
    fn append_moves_groups() {
        let mut md = metrics("a", &[2]);
        md.append(metrics("b", &[3]));
        assert_eq!(md.data_point_count(), 5);
        assert_eq!(md.resource_metrics.len(), 2);
    }

    #[test]
    fn split_inside_a_metric_copies_the_envelope() {
        let mut md = metrics("m", &[4]);
        let head = md.split(3);
        assert_eq!(head.data_point_count(), 3);
        assert_eq!(md.data_point_count(), 1);
        let head_metric = &head.resource_metrics[0].scope_metrics[0].metrics[0];
        let rest_metric = &md.resource_metrics[0].scope_metrics[0].metrics[0];
        assert_eq!(head_metric.name, rest_metric.name);
        assert_eq!(head_metric.unit, rest_metric.unit);
    }

    #[test]
    fn split_at_metric_boundary() {
        let mut md = metrics("m", &[2, 3]);
        let head = md.split(2);
        assert_eq!(head.data_point_count(), 2);
        assert_eq!(md.data_point_count(), 3);
        assert_eq!(md.resource_metrics[0].scope_metrics[0].metrics.len(), 1);
    }

    #[test]
    fn split_keeps_point_order() {
        let mut md = metrics("a", &[2, 2]);
        md.append(metrics("b", &[3]));
        let mut released = Vec::new();
        while !md.is_empty() {
            released.extend(values(&md.split(3)));
        }
        let expected: Vec<MetricValue> = (1..=4)
            .chain(1..=3)
            .map(MetricValue::Int)
            .collect();
        assert_eq!(released, expected);
    }

    #[test]
    fn split_whole_collection() {
        let mut md = metrics("m", &[2]);
        let head = md.split(2);
        assert_eq!(head.data_point_count(), 2);
        assert!(md.is_empty());
        assert!(md.resource_metrics.is_empty());
    }
}
