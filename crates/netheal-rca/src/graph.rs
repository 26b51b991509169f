//! Dependency graph derived from the network topology
//!
//! Link edges connect devices both ways at weight 0.6; service support adds
//! service-to-device edges at 0.8 and dependent-to-critical-device edges at
//! 1.0. The graph is read-only once built.

use netheal_common::Topology;
use std::collections::HashMap;

const LINK_WEIGHT: f64 = 0.6;
const SERVICE_WEIGHT: f64 = 0.8;
const CRITICAL_WEIGHT: f64 = 1.0;

/// Weighted directed dependency edges between topology nodes
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    edges: HashMap<String, Vec<(String, f64)>>,
}

impl DependencyGraph {
    /// Build the graph from a topology snapshot
    pub fn build(topology: &Topology) -> Self {
        let mut graph = DependencyGraph::default();

        for link in &topology.links {
            graph.add_edge(&link.source_device, &link.dest_device, LINK_WEIGHT);
            graph.add_edge(&link.dest_device, &link.source_device, LINK_WEIGHT);
        }

        for service in &topology.services {
            let service_node = format!("service:{}", service.name);
            for device in &service.dependent_devices {
                graph.add_edge(&service_node, device, SERVICE_WEIGHT);
            }
            for dependent in &service.dependent_devices {
                for critical in &service.critical_devices {
                    if dependent != critical {
                        graph.add_edge(dependent, critical, CRITICAL_WEIGHT);
                    }
                }
            }
        }

        graph
    }

    fn add_edge(&mut self, from: &str, to: &str, weight: f64) {
        let targets = self.edges.entry(from.to_string()).or_default();
        if !targets.iter().any(|(t, _)| t == to) {
            targets.push((to.to_string(), weight));
        }
    }

    /// Whether `a` depends on `b`
    pub fn depends_on(&self, a: &str, b: &str) -> bool {
        self.edges
            .get(a)
            .map(|targets| targets.iter().any(|(t, _)| t == b))
            .unwrap_or(false)
    }

    pub fn edge_weight(&self, a: &str, b: &str) -> Option<f64> {
        self.edges
            .get(a)?
            .iter()
            .find(|(t, _)| t == b)
            .map(|(_, w)| *w)
    }

    /// How many of `among` depend on `device`
    pub fn dependent_count(&self, device: &str, among: &[String]) -> usize {
        among
            .iter()
            .filter(|other| other.as_str() != device && self.depends_on(other, device))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netheal_common::{LinkState, ServiceDependency, TopologyLink};

    fn topology() -> Topology {
        Topology {
            topology_id: "TOP-20260801-0001".to_string(),
            links: vec![TopologyLink {
                source_device: "r1".to_string(),
                source_interface: "Gi0/1".to_string(),
                dest_device: "r2".to_string(),
                dest_interface: "Gi0/2".to_string(),
                status: LinkState::Up,
            }],
            services: vec![ServiceDependency {
                name: "dns".to_string(),
                dependent_devices: vec!["r2".to_string(), "r3".to_string()],
                critical_devices: vec!["r1".to_string()],
                sla_target: Some(0.999),
            }],
            sites: HashMap::new(),
        }
    }

    #[test]
    fn link_edges_are_bidirectional() {
        let graph = DependencyGraph::build(&topology());
        assert!(graph.depends_on("r1", "r2"));
        assert!(graph.depends_on("r2", "r1"));
        assert_eq!(graph.edge_weight("r1", "r2"), Some(0.6));
    }

    #[test]
    fn critical_device_edges_outrank_links() {
        let graph = DependencyGraph::build(&topology());
        assert!(graph.depends_on("r3", "r1"));
        assert_eq!(graph.edge_weight("r3", "r1"), Some(1.0));
        // r2 already depends on r1 via the link; the first edge wins
        assert!(graph.depends_on("r2", "r1"));
        assert_eq!(graph.edge_weight("service:dns", "r2"), Some(0.8));
    }

    #[test]
    fn dependent_count_over_affected_set() {
        let graph = DependencyGraph::build(&topology());
        let affected = vec!["r1".to_string(), "r2".to_string(), "r3".to_string()];
        assert_eq!(graph.dependent_count("r1", &affected), 2);
        assert_eq!(graph.dependent_count("r3", &affected), 0);
    }
}
