//! Relationship Mapper: turns a flat resource list into graph nodes and
//! derived edges, using per-provider rule tables keyed on resource type.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::graph::{DependencyGraph, EdgeKind};
use crate::model::resource::{CloudProvider, Resource};

/// One rule: resources whose type contains `type_substring` get an edge to
/// any other resource whose id matches `id_substring` under `match_mode`.
#[derive(Debug, Clone)]
pub struct MappingRule {
    pub type_substring: &'static str,
    pub id_substring: &'static str,
    pub match_mode: MatchMode,
    pub edge_kind: EdgeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Contains,
    StartsWith,
}

impl MappingRule {
    fn matches_type(&self, resource_type: &str) -> bool {
        resource_type
            .to_lowercase()
            .contains(&self.type_substring.to_lowercase())
    }

    fn matches_id(&self, id: &str) -> bool {
        let id = id.to_lowercase();
        let needle = self.id_substring.to_lowercase();
        match self.match_mode {
            MatchMode::Contains => id.contains(&needle),
            MatchMode::StartsWith => id.starts_with(&needle),
        }
    }
}

/// Rule tables are data, not code paths: one table per
/// cloud, each entry a `(type substring, id pattern, mode, edge kind)`.
static AWS_RULES: Lazy<Vec<MappingRule>> = Lazy::new(|| {
    vec![
        MappingRule {
            type_substring: "instance",
            id_substring: "vpc-",
            match_mode: MatchMode::Contains,
            edge_kind: EdgeKind::Explicit,
        },
        MappingRule {
            type_substring: "instance",
            id_substring: "subnet-",
            match_mode: MatchMode::Contains,
            edge_kind: EdgeKind::Explicit,
        },
        MappingRule {
            type_substring: "instance",
            id_substring: "sg-",
            match_mode: MatchMode::StartsWith,
            edge_kind: EdgeKind::Explicit,
        },
        MappingRule {
            type_substring: "security_group",
            id_substring: "vpc-",
            match_mode: MatchMode::Contains,
            edge_kind: EdgeKind::Explicit,
        },
        MappingRule {
            type_substring: "subnet",
            id_substring: "vpc-",
            match_mode: MatchMode::Contains,
            edge_kind: EdgeKind::Explicit,
        },
        MappingRule {
            type_substring: "rds",
            id_substring: "subnet-",
            match_mode: MatchMode::Contains,
            edge_kind: EdgeKind::Implicit,
        },
        MappingRule {
            type_substring: "lambda",
            id_substring: "role/",
            match_mode: MatchMode::Contains,
            edge_kind: EdgeKind::Data,
        },
    ]
});

static AZURE_RULES: Lazy<Vec<MappingRule>> = Lazy::new(|| {
    vec![
        MappingRule {
            type_substring: "virtualmachine",
            id_substring: "virtualnetworks/",
            match_mode: MatchMode::Contains,
            edge_kind: EdgeKind::Explicit,
        },
        MappingRule {
            type_substring: "virtualmachine",
            id_substring: "subnets/",
            match_mode: MatchMode::Contains,
            edge_kind: EdgeKind::Explicit,
        },
        MappingRule {
            type_substring: "networkinterface",
            id_substring: "networksecuritygroups/",
            match_mode: MatchMode::Contains,
            edge_kind: EdgeKind::Explicit,
        },
        MappingRule {
            type_substring: "subnet",
            id_substring: "virtualnetworks/",
            match_mode: MatchMode::Contains,
            edge_kind: EdgeKind::Explicit,
        },
    ]
});

static GCP_RULES: Lazy<Vec<MappingRule>> = Lazy::new(|| {
    vec![
        MappingRule {
            type_substring: "instance",
            id_substring: "networks/",
            match_mode: MatchMode::Contains,
            edge_kind: EdgeKind::Explicit,
        },
        MappingRule {
            type_substring: "instance",
            id_substring: "subnetworks/",
            match_mode: MatchMode::Contains,
            edge_kind: EdgeKind::Explicit,
        },
        MappingRule {
            type_substring: "firewall",
            id_substring: "networks/",
            match_mode: MatchMode::Contains,
            edge_kind: EdgeKind::Explicit,
        },
        MappingRule {
            type_substring: "subnetwork",
            id_substring: "networks/",
            match_mode: MatchMode::Contains,
            edge_kind: EdgeKind::Explicit,
        },
    ]
});

static DIGITALOCEAN_RULES: Lazy<Vec<MappingRule>> = Lazy::new(|| {
    vec![
        MappingRule {
            type_substring: "droplet",
            id_substring: "vpc-",
            match_mode: MatchMode::Contains,
            edge_kind: EdgeKind::Explicit,
        },
        MappingRule {
            type_substring: "droplet",
            id_substring: "fw-",
            match_mode: MatchMode::StartsWith,
            edge_kind: EdgeKind::Explicit,
        },
        MappingRule {
            type_substring: "loadbalancer",
            id_substring: "droplet-",
            match_mode: MatchMode::Contains,
            edge_kind: EdgeKind::Implicit,
        },
    ]
});

fn rules_for(provider: CloudProvider) -> &'static [MappingRule] {
    match provider {
        CloudProvider::Aws => &AWS_RULES,
        CloudProvider::Azure => &AZURE_RULES,
        CloudProvider::Gcp => &GCP_RULES,
        CloudProvider::DigitalOcean => &DIGITALOCEAN_RULES,
    }
}

/// Builds an `address` for a resource the same way throughout the mapper,
/// planner, and engine: `{type}.{id}`, mirroring Terraform-style addressing
/// closely enough to read naturally in logs.
pub fn resource_address(resource: &Resource) -> String {
    format!("{}.{}", resource.resource_type, resource.id)
}

/// Builds the graph from a flat resource list: adds every resource as a
/// node, then for each resource applies its provider's rule table against
/// every other resource's id to derive outgoing edges.
pub fn build_graph(resources: &[Resource]) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    let mut addresses: HashMap<String, String> = HashMap::new();

    for resource in resources {
        let address = resource_address(resource);
        let node = crate::graph::ResourceNode::new(
            address.clone(),
            resource.resource_type.clone(),
            resource.name.clone(),
            resource.provider,
        );
        graph.add_node(node);
        addresses.insert(resource.id.clone(), address);
    }

    for resource in resources {
        let from_address = &addresses[&resource.id];
        for rule in rules_for(resource.provider) {
            if !rule.matches_type(&resource.resource_type) {
                continue;
            }
            for other in resources {
                if other.id == resource.id || other.provider != resource.provider {
                    continue;
                }
                if rule.matches_id(&other.id) {
                    let to_address = &addresses[&other.id];
                    let _ = graph.add_edge(from_address, to_address, rule.edge_kind);
                }
            }
        }
    }

    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap as Map;

    fn resource(provider: CloudProvider, resource_type: &str, id: &str, name: &str) -> Resource {
        Resource {
            provider,
            id: id.to_string(),
            resource_type: resource_type.to_string(),
            name: name.to_string(),
            region: "us-east-1".to_string(),
            status: "running".to_string(),
            tags: Map::new(),
            metadata: Map::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn aws_instance_depends_on_subnet_and_security_group() {
        let resources = vec![
            resource(CloudProvider::Aws, "aws_vpc", "vpc-1", "main"),
            resource(CloudProvider::Aws, "aws_subnet", "subnet-1", "public"),
            resource(CloudProvider::Aws, "aws_security_group", "sg-web", "web"),
            resource(CloudProvider::Aws, "aws_instance", "i-1", "app"),
        ];
        let graph = build_graph(&resources);
        let deps = graph.dependencies_of("aws_instance.i-1").unwrap();
        assert!(deps.contains(&"aws_subnet.subnet-1".to_string()));
        assert!(deps.contains(&"aws_security_group.sg-web".to_string()));
    }

    #[test]
    fn unrelated_resources_produce_no_edges() {
        let resources = vec![
            resource(CloudProvider::Aws, "aws_s3_bucket", "bucket-a", "logs"),
            resource(CloudProvider::Aws, "aws_s3_bucket", "bucket-b", "backups"),
        ];
        let graph = build_graph(&resources);
        assert_eq!(graph.orphans().len(), 2);
    }

    #[test]
    fn cross_provider_resources_never_link() {
        let resources = vec![
            resource(CloudProvider::Aws, "aws_instance", "i-1", "app"),
            resource(CloudProvider::Gcp, "google_compute_subnetwork", "subnet-1", "public"),
        ];
        let graph = build_graph(&resources);
        assert!(graph.dependencies_of("aws_instance.i-1").unwrap().is_empty());
    }
}
