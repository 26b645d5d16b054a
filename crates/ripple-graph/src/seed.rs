//! Administrative seed: populates the store with a demo infrastructure
//! topology (two datacenters, firewalls, switches, servers, VLANs, firewall
//! rules, applications, and services with full dependency wiring).
//!
//! This is the only write path besides the sync coordinator.

use chrono::Utc;

use ripple_core::types::{
    Application, Cable, Criticality, Datacenter, Device, DeviceKind, Edge, EdgeKind, Environment,
    Interface, Ip, Node, NodeId, Port, Rule, Service, Vlan,
};

use crate::{GraphError, GraphMutation, GraphStore};

/// Entity counts produced by the seed, for operator feedback.
#[derive(Debug, Default)]
pub struct SeedSummary {
    pub nodes: usize,
    pub edges: usize,
    pub core_devices: usize,
    pub revision: u64,
}

/// Clear nothing, seed everything: applies the demo topology as one batch,
/// then recomputes core-device flags with the given K.
pub fn seed_demo_topology(store: &GraphStore, core_k: usize) -> Result<SeedSummary, GraphError> {
    let batch = demo_batch();
    let node_count = batch
        .iter()
        .filter(|m| matches!(m, GraphMutation::UpsertNode { .. }))
        .count();
    let edge_count = batch.len() - node_count;

    store.apply(&batch)?;
    let core_devices = store.recompute_core_devices(core_k);
    let revision = store.revision();

    tracing::info!(node_count, edge_count, core_devices, revision, "Demo topology seeded");
    Ok(SeedSummary {
        nodes: node_count,
        edges: edge_count,
        core_devices,
        revision,
    })
}

fn device(
    id: &str,
    kind: DeviceKind,
    vendor: &str,
    environment: Environment,
    criticality: Criticality,
) -> GraphMutation {
    GraphMutation::UpsertNode {
        node: Node::Device(Device {
            id: NodeId::new(id),
            kind,
            vendor: vendor.to_string(),
            model: None,
            environment,
            criticality,
            is_core: false,
        }),
        observed_at: Utc::now(),
    }
}

fn node(n: Node) -> GraphMutation {
    GraphMutation::UpsertNode {
        node: n,
        observed_at: Utc::now(),
    }
}

fn edge(kind: EdgeKind, source: &str, target: &str) -> GraphMutation {
    GraphMutation::UpsertEdge {
        edge: Edge::new(kind, source, target),
    }
}

fn interface(id: &str, name: &str, speed: &str) -> GraphMutation {
    node(Node::Interface(Interface {
        id: NodeId::new(id),
        name: name.to_string(),
        speed: Some(speed.to_string()),
        enabled: true,
    }))
}

fn rule(id: &str, src: &str, dst: &str, service: &str, any_any: bool) -> GraphMutation {
    node(Node::Rule(Rule {
        id: NodeId::new(id),
        src: src.to_string(),
        dst: dst.to_string(),
        service: service.to_string(),
        action: "allow".to_string(),
        is_any_any: any_any,
    }))
}

fn application(id: &str, name: &str, criticality: Criticality) -> GraphMutation {
    node(Node::Application(Application {
        id: NodeId::new(id),
        name: name.to_string(),
        criticality,
    }))
}

fn service(id: &str, name: &str, criticality: Criticality) -> GraphMutation {
    node(Node::Service(Service {
        id: NodeId::new(id),
        name: name.to_string(),
        criticality,
    }))
}

fn demo_batch() -> Vec<GraphMutation> {
    use Criticality::*;
    use DeviceKind::*;
    use EdgeKind::*;
    use Environment::*;

    let mut batch = vec![
        // ── Datacenters ──────────────────────────────────────────
        node(Node::Datacenter(Datacenter {
            id: NodeId::new("DC1"),
            name: "Datacenter Paris".to_string(),
            location: "Paris, FR".to_string(),
        })),
        node(Node::Datacenter(Datacenter {
            id: NodeId::new("DC2"),
            name: "Datacenter London".to_string(),
            location: "London, UK".to_string(),
        })),
        // ── Firewalls ────────────────────────────────────────────
        device("FW-DC1-01", Firewall, "paloalto", Prod, Critical),
        device("FW-DC1-02", Firewall, "fortinet", Prod, Critical),
        device("FW-DC2-01", Firewall, "paloalto", Dc2, Critical),
        device("FW-DC2-02", Firewall, "fortinet", Dc2, High),
        // ── Switches ─────────────────────────────────────────────
        device("SW-DC1-CORE", Switch, "cisco", Prod, Critical),
        device("SW-DC1-ACC-01", Switch, "cisco", Prod, Medium),
        device("SW-DC1-ACC-02", Switch, "cisco", Prod, Medium),
        device("SW-DC2-CORE", Switch, "cisco", Dc2, Critical),
        device("SW-DC2-ACC-01", Switch, "cisco", Dc2, Medium),
        device("SW-DC2-ACC-02", Switch, "cisco", Dc2, Low),
        // ── Servers and load balancer ────────────────────────────
        device("SRV-PAY-01", Server, "dell", Prod, High),
        device("SRV-TRD-01", Server, "dell", Prod, High),
        device("SRV-CRM-01", Server, "hp", Prod, Medium),
        device("SRV-WIKI-01", Server, "hp", Prod, Low),
        device("LB-DC1-01", LoadBalancer, "f5", Prod, High),
    ];

    for (id, dc) in [
        ("FW-DC1-01", "DC1"),
        ("FW-DC1-02", "DC1"),
        ("SW-DC1-CORE", "DC1"),
        ("SW-DC1-ACC-01", "DC1"),
        ("SW-DC1-ACC-02", "DC1"),
        ("SRV-PAY-01", "DC1"),
        ("SRV-TRD-01", "DC1"),
        ("SRV-CRM-01", "DC1"),
        ("SRV-WIKI-01", "DC1"),
        ("LB-DC1-01", "DC1"),
        ("FW-DC2-01", "DC2"),
        ("FW-DC2-02", "DC2"),
        ("SW-DC2-CORE", "DC2"),
        ("SW-DC2-ACC-01", "DC2"),
        ("SW-DC2-ACC-02", "DC2"),
    ] {
        batch.push(edge(LocatedIn, id, dc));
    }

    // ── Device fabric ────────────────────────────────────────────
    for (src, dst) in [
        ("FW-DC1-01", "SW-DC1-CORE"),
        ("FW-DC1-02", "SW-DC1-CORE"),
        ("SW-DC1-CORE", "SW-DC1-ACC-01"),
        ("SW-DC1-CORE", "SW-DC1-ACC-02"),
        ("SW-DC1-CORE", "LB-DC1-01"),
        ("SW-DC1-ACC-01", "SRV-PAY-01"),
        ("SW-DC1-ACC-01", "SRV-TRD-01"),
        ("SW-DC1-ACC-02", "SRV-CRM-01"),
        ("SW-DC1-ACC-02", "SRV-WIKI-01"),
        ("FW-DC2-01", "SW-DC2-CORE"),
        ("FW-DC2-02", "SW-DC2-CORE"),
        ("SW-DC2-CORE", "SW-DC2-ACC-01"),
        ("SW-DC2-CORE", "SW-DC2-ACC-02"),
        ("SW-DC1-CORE", "SW-DC2-CORE"),
    ] {
        batch.push(edge(ConnectsTo, src, dst));
    }
    batch.push(edge(RoutesTo, "FW-DC1-01", "FW-DC2-01"));

    // ── Interfaces ───────────────────────────────────────────────
    let interfaces = [
        ("IF-FW-DC1-01-eth0", "FW-DC1-01", "10G"),
        ("IF-FW-DC1-01-eth1", "FW-DC1-01", "10G"),
        ("IF-FW-DC2-01-eth0", "FW-DC2-01", "10G"),
        ("IF-SW-DC1-CORE-gi01", "SW-DC1-CORE", "10G"),
        ("IF-SW-DC1-CORE-gi02", "SW-DC1-CORE", "10G"),
        ("IF-SW-DC1-ACC-01-gi01", "SW-DC1-ACC-01", "1G"),
        ("IF-SW-DC1-ACC-01-gi02", "SW-DC1-ACC-01", "1G"),
        ("IF-SW-DC1-ACC-01-gi03", "SW-DC1-ACC-01", "1G"),
        ("IF-SW-DC1-ACC-02-gi01", "SW-DC1-ACC-02", "1G"),
        ("IF-SW-DC1-ACC-02-gi02", "SW-DC1-ACC-02", "1G"),
        ("IF-SW-DC2-CORE-gi01", "SW-DC2-CORE", "10G"),
    ];
    for (id, dev, speed) in interfaces {
        let name = id.rsplit('-').next().unwrap_or("eth0").to_string();
        batch.push(interface(id, &name, speed));
        batch.push(edge(HasInterface, dev, id));
        batch.push(edge(PartOf, id, dev));
    }

    // ── Ports and cabling ────────────────────────────────────────
    for (id, dev, number) in [
        ("PORT-SW-DC1-CORE-01", "SW-DC1-CORE", 1u32),
        ("PORT-SW-DC2-CORE-01", "SW-DC2-CORE", 1),
        ("PORT-FW-DC1-01-01", "FW-DC1-01", 1),
    ] {
        batch.push(node(Node::Port(Port {
            id: NodeId::new(id),
            number,
            enabled: true,
        })));
        batch.push(edge(PartOf, id, dev));
    }
    batch.push(node(Node::Cable(Cable {
        id: NodeId::new("CBL-INTERDC-CORE"),
        cable_type: "fiber".to_string(),
    })));
    batch.push(edge(ConnectsTo, "CBL-INTERDC-CORE", "PORT-SW-DC1-CORE-01"));
    batch.push(edge(ConnectsTo, "CBL-INTERDC-CORE", "PORT-SW-DC2-CORE-01"));

    // ── IPs ──────────────────────────────────────────────────────
    batch.push(node(Node::Ip(Ip {
        id: NodeId::new("IP-10-0-0-1"),
        address: "10.0.0.1".to_string(),
    })));
    batch.push(edge(AssignedTo, "IP-10-0-0-1", "IF-FW-DC1-01-eth0"));

    // ── VLANs ────────────────────────────────────────────────────
    let vlans = [
        ("VLAN-10", 10u16, Prod, "Management"),
        ("VLAN-20", 20, Prod, "Production"),
        ("VLAN-30", 30, Prod, "DMZ"),
        ("VLAN-40", 40, Prod, "Database"),
        ("VLAN-50", 50, Dc2, "VPN"),
    ];
    for (id, vlan_id, env, name) in vlans {
        batch.push(node(Node::Vlan(Vlan {
            id: NodeId::new(id),
            vlan_id,
            environment: env,
            name: name.to_string(),
        })));
    }
    // VLAN-20 spans three switches with seven member interfaces.
    for dev in ["SW-DC1-CORE", "SW-DC1-ACC-01", "SW-DC1-ACC-02"] {
        batch.push(edge(HasVlan, dev, "VLAN-20"));
    }
    for iface in [
        "IF-SW-DC1-CORE-gi01",
        "IF-SW-DC1-CORE-gi02",
        "IF-SW-DC1-ACC-01-gi01",
        "IF-SW-DC1-ACC-01-gi02",
        "IF-SW-DC1-ACC-01-gi03",
        "IF-SW-DC1-ACC-02-gi01",
        "IF-SW-DC1-ACC-02-gi02",
    ] {
        batch.push(edge(MemberOf, iface, "VLAN-20"));
    }
    batch.push(edge(HasVlan, "SW-DC1-CORE", "VLAN-10"));
    batch.push(edge(HasVlan, "SW-DC2-CORE", "VLAN-50"));

    // ── Firewall rules ───────────────────────────────────────────
    batch.push(rule(
        "RULE-FW1-PAYMENTS",
        "10.20.0.0/16",
        "10.40.1.10/32",
        "tcp/443",
        false,
    ));
    batch.push(rule(
        "RULE-FW1-TRADING",
        "10.20.0.0/16",
        "10.40.1.20/32",
        "tcp/8443",
        false,
    ));
    batch.push(rule(
        "RULE-FW1-CRM",
        "10.20.0.0/16",
        "10.40.2.10/32",
        "tcp/443",
        false,
    ));
    batch.push(rule(
        "RULE-FW2-HR",
        "10.20.0.0/16",
        "10.40.2.20/32",
        "tcp/443",
        false,
    ));
    batch.push(rule("RULE-FW4-ANY", "any", "any", "any", true));
    for r in ["RULE-FW1-PAYMENTS", "RULE-FW1-TRADING", "RULE-FW1-CRM"] {
        batch.push(edge(HasRule, "FW-DC1-01", r));
    }
    batch.push(edge(HasRule, "FW-DC1-02", "RULE-FW2-HR"));
    batch.push(edge(HasRule, "FW-DC2-02", "RULE-FW4-ANY"));

    // ── Applications and services ────────────────────────────────
    batch.push(application("APP-PAYMENTS", "payments", Critical));
    batch.push(application("APP-TRADING", "trading", Critical));
    batch.push(application("APP-CRM", "crm", Critical));
    batch.push(application("APP-HR", "hr", Medium));
    batch.push(application("APP-WIKI", "wiki", Low));
    batch.push(service("SVC-PAY-DB", "payments-db", Critical));
    batch.push(service("SVC-TRD-QUEUE", "trading-queue", High));
    batch.push(service("SVC-DNS", "dns", High));
    batch.push(service("SVC-MON", "monitoring", Low));

    batch.push(edge(Protects, "RULE-FW1-PAYMENTS", "APP-PAYMENTS"));
    batch.push(edge(Protects, "RULE-FW1-TRADING", "APP-TRADING"));
    batch.push(edge(Protects, "RULE-FW1-CRM", "APP-CRM"));
    batch.push(edge(Protects, "RULE-FW2-HR", "APP-HR"));
    batch.push(edge(Protects, "RULE-FW4-ANY", "APP-WIKI"));

    // The three critical applications funnel through FW-DC1-01 with no
    // alternate ingress. APP-HR is dual-homed across both DC1 firewalls.
    for (src, dst) in [
        ("APP-PAYMENTS", "SVC-PAY-DB"),
        ("APP-PAYMENTS", "FW-DC1-01"),
        ("APP-TRADING", "SVC-TRD-QUEUE"),
        ("APP-TRADING", "FW-DC1-01"),
        ("APP-CRM", "FW-DC1-01"),
        ("APP-CRM", "SRV-CRM-01"),
        ("APP-HR", "FW-DC1-01"),
        ("APP-HR", "FW-DC1-02"),
        ("APP-HR", "SRV-CRM-01"),
        ("APP-WIKI", "SRV-WIKI-01"),
        ("SVC-PAY-DB", "SRV-PAY-01"),
        ("SVC-TRD-QUEUE", "SRV-TRD-01"),
        ("SVC-DNS", "SRV-WIKI-01"),
        ("SVC-MON", "LB-DC1-01"),
    ] {
        batch.push(edge(DependsOn, src, dst));
    }

    batch
}
