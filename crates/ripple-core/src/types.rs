//! Core domain types for the ripple topology graph.
//!
//! These types represent nodes and edges in the infrastructure digital twin,
//! shared across all ripple services. Nodes refer to each other by id only;
//! relationships live exclusively in edges.

use serde::{Deserialize, Serialize};

// ── Node identity ─────────────────────────────────────────────────

/// Identifier of a topology node: a human-readable slug such as `FW-DC1-01`.
///
/// Globally unique across node kinds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ── Enums ─────────────────────────────────────────────────────────

/// Deployment environment tag carried by devices, VLANs, and changes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Environment {
    Prod,
    Preprod,
    #[serde(rename = "DC1")]
    Dc1,
    #[serde(rename = "DC2")]
    Dc2,
}

/// Business criticality. Ordered: `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Criticality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Criticality::Low => "low",
            Criticality::Medium => "medium",
            Criticality::High => "high",
            Criticality::Critical => "critical",
        }
    }
}

/// Hardware role of a device node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Firewall,
    Router,
    Switch,
    Server,
    LoadBalancer,
    CloudGateway,
    WirelessAp,
    WirelessController,
    Rack,
    PatchPanel,
}

// ── Node types ────────────────────────────────────────────────────

/// A managed network device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: NodeId,
    pub kind: DeviceKind,
    pub vendor: String,
    pub model: Option<String>,
    pub environment: Environment,
    pub criticality: Criticality,
    /// Derived flag: the device lies on at least K distinct shortest
    /// dependency paths between critical applications and their serving
    /// devices. Recomputed after every sync cycle.
    pub is_core: bool,
}

/// A physical or logical port on a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interface {
    pub id: NodeId,
    pub name: String,
    pub speed: Option<String>,
    pub enabled: bool,
}

/// A physical socket on a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    pub id: NodeId,
    pub number: u32,
    pub enabled: bool,
}

/// A layer-2 segment. `vlan_id` is unique within an environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vlan {
    pub id: NodeId,
    pub vlan_id: u16,
    pub environment: Environment,
    pub name: String,
}

/// An address assigned to an interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ip {
    pub id: NodeId,
    pub address: String,
}

/// A firewall rule hosted by exactly one device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: NodeId,
    pub src: String,
    pub dst: String,
    pub service: String,
    pub action: String,
    /// Source and destination both unrestricted. Always elevated risk.
    pub is_any_any: bool,
}

/// A business application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: NodeId,
    pub name: String,
    pub criticality: Criticality,
}

/// A runtime dependency (database, queue, shared platform service).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: NodeId,
    pub name: String,
    pub criticality: Criticality,
}

/// A physical site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Datacenter {
    pub id: NodeId,
    pub name: String,
    pub location: String,
}

/// A physical link between two ports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cable {
    pub id: NodeId,
    pub cable_type: String,
}

/// Enum wrapper for all node types in the topology graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "node_type")]
pub enum Node {
    Device(Device),
    Interface(Interface),
    Port(Port),
    Vlan(Vlan),
    Ip(Ip),
    Rule(Rule),
    Application(Application),
    Service(Service),
    Datacenter(Datacenter),
    Cable(Cable),
}

/// Semantic label of a node, used for indexing and typed roll-ups.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Device,
    Interface,
    Port,
    #[serde(rename = "VLAN")]
    Vlan,
    #[serde(rename = "IP")]
    Ip,
    Rule,
    Application,
    Service,
    Datacenter,
    Cable,
}

impl Node {
    pub fn id(&self) -> &NodeId {
        match self {
            Node::Device(n) => &n.id,
            Node::Interface(n) => &n.id,
            Node::Port(n) => &n.id,
            Node::Vlan(n) => &n.id,
            Node::Ip(n) => &n.id,
            Node::Rule(n) => &n.id,
            Node::Application(n) => &n.id,
            Node::Service(n) => &n.id,
            Node::Datacenter(n) => &n.id,
            Node::Cable(n) => &n.id,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Device(_) => NodeKind::Device,
            Node::Interface(_) => NodeKind::Interface,
            Node::Port(_) => NodeKind::Port,
            Node::Vlan(_) => NodeKind::Vlan,
            Node::Ip(_) => NodeKind::Ip,
            Node::Rule(_) => NodeKind::Rule,
            Node::Application(_) => NodeKind::Application,
            Node::Service(_) => NodeKind::Service,
            Node::Datacenter(_) => NodeKind::Datacenter,
            Node::Cable(_) => NodeKind::Cable,
        }
    }

    /// Criticality when the node kind carries one.
    pub fn criticality(&self) -> Option<Criticality> {
        match self {
            Node::Device(n) => Some(n.criticality),
            Node::Application(n) => Some(n.criticality),
            Node::Service(n) => Some(n.criticality),
            _ => None,
        }
    }

    /// Environment when the node kind carries one.
    pub fn environment(&self) -> Option<Environment> {
        match self {
            Node::Device(n) => Some(n.environment),
            Node::Vlan(n) => Some(n.environment),
            _ => None,
        }
    }
}

// ── Edge types ────────────────────────────────────────────────────

/// Directed relationship kind between two nodes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    ConnectsTo,
    HasInterface,
    HasVlan,
    HasRule,
    Protects,
    DependsOn,
    RoutesTo,
    LocatedIn,
    PartOf,
    AssignedTo,
    MemberOf,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::ConnectsTo => "CONNECTS_TO",
            EdgeKind::HasInterface => "HAS_INTERFACE",
            EdgeKind::HasVlan => "HAS_VLAN",
            EdgeKind::HasRule => "HAS_RULE",
            EdgeKind::Protects => "PROTECTS",
            EdgeKind::DependsOn => "DEPENDS_ON",
            EdgeKind::RoutesTo => "ROUTES_TO",
            EdgeKind::LocatedIn => "LOCATED_IN",
            EdgeKind::PartOf => "PART_OF",
            EdgeKind::AssignedTo => "ASSIGNED_TO",
            EdgeKind::MemberOf => "MEMBER_OF",
        }
    }
}

/// A directed edge, identified by `(kind, source, target)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub kind: EdgeKind,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default)]
    pub properties: serde_json::Value,
}

impl Edge {
    pub fn new(kind: EdgeKind, source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            kind,
            source: source.into(),
            target: target.into(),
            properties: serde_json::Value::Null,
        }
    }

    /// The identity triple of this edge.
    pub fn key(&self) -> (EdgeKind, &NodeId, &NodeId) {
        (self.kind, &self.source, &self.target)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
