use super::{KeyValue, Resource, Scope};
use serde::{Deserialize, Serialize};

/// A collection of spans grouped by resource and instrumentation scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Traces {
    pub resource_spans: Vec<ResourceSpans>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpans {
    pub resource: Resource,
    pub scope_spans: Vec<ScopeSpans>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeSpans {
    pub scope: Scope,
    pub spans: Vec<Span>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub trace_id: u128,
    pub span_id: u64,
    pub name: String,
    pub start_time_unix_nano: u64,
    pub end_time_unix_nano: u64,
    pub attributes: Vec<KeyValue>,
}

impl Traces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of spans across all resource and scope groups.
    pub fn span_count(&self) -> usize {
        self.resource_spans
            .iter()
            .map(ResourceSpans::span_count)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.span_count() == 0
    }

    /// Moves all resource groups out of `other` onto the tail of `self`.
    pub fn append(&mut self, mut other: Traces) {
        self.resource_spans.append(&mut other.resource_spans);
    }

    /// Removes and returns the first `count` spans in iteration order.
    ///
    /// Resource and scope groups that are consumed whole move as-is; a group
    /// that is split keeps its remainder under a copy of the original
    /// resource/scope envelope. Requesting at least `span_count()` spans
    /// takes everything and leaves `self` empty.
    pub fn split(&mut self, count: usize) -> Traces {
        if count >= self.span_count() {
            return std::mem::take(self);
        }
        let mut taken = Vec::new();
        let mut remaining = count;
        while remaining > 0 {
            let group = &mut self.resource_spans[0];
            let group_count = group.span_count();
            if group_count <= remaining {
                remaining -= group_count;
                taken.push(self.resource_spans.remove(0));
            } else {
                taken.push(group.split(remaining));
                remaining = 0;
            }
        }
        Traces {
            resource_spans: taken,
        }
    }

    /// Serialized size of the collection in bytes.
    pub fn encoded_size(&self) -> usize {
        serde_json::to_vec(self).map_or(0, |encoded| encoded.len())
    }
}

impl ResourceSpans {
    pub fn span_count(&self) -> usize {
        self.scope_spans.iter().map(|scope| scope.spans.len()).sum()
    }

    fn split(&mut self, count: usize) -> ResourceSpans {
        let mut taken = Vec::new();
        let mut remaining = count;
        while remaining > 0 {
            let group = &mut self.scope_spans[0];
            if group.spans.len() <= remaining {
                remaining -= group.spans.len();
                taken.push(self.scope_spans.remove(0));
            } else {
                taken.push(ScopeSpans {
                    scope: group.scope.clone(),
                    spans: group.spans.drain(..remaining).collect(),
                });
                remaining = 0;
            }
        }
        ResourceSpans {
            resource: self.resource.clone(),
            scope_spans: taken,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(name: &str) -> Span {
        Span {
            name: name.to_string(),
            ..Span::default()
        }
    }

    /// One resource group holding one scope group of `count` spans.
    fn traces(prefix: &str, count: usize) -> Traces {
        let spans = (0..count).map(|i| span(&format!("{prefix}-{i}"))).collect();
        Traces {
            resource_spans: vec![ResourceSpans {
                resource: Resource::default(),
                scope_spans: vec![ScopeSpans {
                    scope: Scope::new("test"),
                    spans,
                }],
            }],
        }
    }

    fn span_names(traces: &Traces) -> Vec<String> {
        traces
            .resource_spans
            .iter()
            .flat_map(|r| r.scope_spans.iter())
            .flat_map(|s| s.spans.iter())
            .map(|span| span.name.clone())
            .collect()
    }

    #[test]
    fn counts_across_groups() {
        let mut td = traces("a", 3);
        td.append(traces("b", 2));
        assert_eq!(td.span_count(), 5);
        assert_eq!(td.resource_spans.len(), 2);
        assert!(!td.is_empty());
    }

    #[test]
    fn append_preserves_order() {
        let mut td = traces("a", 2);
        td.append(traces("b", 1));
        assert_eq!(span_names(&td), ["a-0", "a-1", "b-0"]);
    }

    #[test]
    fn split_mid_scope() {
        let mut td = traces("a", 5);
        let head = td.split(2);
        assert_eq!(head.span_count(), 2);
        assert_eq!(td.span_count(), 3);
        assert_eq!(span_names(&head), ["a-0", "a-1"]);
        assert_eq!(span_names(&td), ["a-2", "a-3", "a-4"]);
        // the remainder keeps its original envelope
        assert_eq!(td.resource_spans.len(), 1);
        assert_eq!(td.resource_spans[0].scope_spans[0].scope.name, "test");
    }

    #[test]
    fn split_across_resources() {
        let mut td = traces("a", 2);
        td.append(traces("b", 3));
        let head = td.split(4);
        assert_eq!(span_names(&head), ["a-0", "a-1", "b-0", "b-1"]);
        assert_eq!(span_names(&td), ["b-2"]);
    }

    #[test]
    fn split_at_group_boundary() {
        let mut td = traces("a", 2);
        td.append(traces("b", 2));
        let head = td.split(2);
        assert_eq!(span_names(&head), ["a-0", "a-1"]);
        assert_eq!(span_names(&td), ["b-0", "b-1"]);
        assert_eq!(td.resource_spans.len(), 1);
    }

    #[test]
    fn split_whole_collection() {
        let mut td = traces("a", 3);
        let head = td.split(10);
        assert_eq!(head.span_count(), 3);
        assert!(td.is_empty());
        assert!(td.resource_spans.is_empty());
    }

    #[test]
    fn repeated_split_round_trips() {
        let mut td = traces("a", 3);
        td.append(traces("b", 4));
        td.append(traces("c", 1));
        let mut released = Vec::new();
        while !td.is_empty() {
            released.extend(span_names(&td.split(3)));
        }
        assert_eq!(
            released,
            ["a-0", "a-1", "a-2", "b-0", "b-1", "b-2", "b-3", "c-0"]
        );
    }

    #[test]
    fn encoded_size_is_nonzero() {
        assert!(traces("a", 1).encoded_size() > 0);
    }
}
