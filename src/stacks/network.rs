// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network Stack
//!
//! Builds the network boundary every other stack is placed into.
//!
//! # Layout
//!
//! ```text
//! 10.0.0.0/16
//! ├── PublicSubnet1   10.0.0.0/24  (zone a) ──> internet gateway, NAT 1
//! ├── PublicSubnet2   10.0.1.0/24  (zone b) ──> internet gateway
//! ├── PrivateSubnet1  10.0.2.0/24  (zone a) ──> NAT 1
//! └── PrivateSubnet2  10.0.3.0/24  (zone b) ──> NAT 1
//! ```
//!
//! Public subnets are carved first, then private ones, contiguously from the
//! start of the range. NAT gateways sit in the first N public subnets and
//! private subnet *i* egresses through NAT *i mod N*.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::config::{EnvironmentContext, NetworkSettings};
use crate::domain::{apply_tags, Ipv4Cidr, TagSet, Taggable, Tags, ZoneCount};
use crate::errors::{ProvisioningError, ProvisioningResult};
use crate::graph::{attribute, reference, Declare, LogicalId, Resource, ResourceGraph, ResourceKind};

/// Construct name of the network boundary
pub const VPC_NAME: &str = "GitOps-VPC";

const ANYWHERE: &str = "0.0.0.0/0";

/// Subnet reachability class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubnetKind {
    /// Routed directly to the internet gateway
    Public,
    /// No inbound route; egress through NAT
    Private,
}

impl SubnetKind {
    pub fn group_name(&self) -> &'static str {
        match self {
            Self::Public => "PublicSubnet",
            Self::Private => "PrivateSubnet",
        }
    }
}

/// Default route target of a subnet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Egress {
    InternetGateway(LogicalId),
    Nat(LogicalId),
}

/// Single subnet within one availability zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subnet {
    logical_id: LogicalId,
    kind: SubnetKind,
    zone: String,
    cidr: Ipv4Cidr,
    egress: Egress,
    tags: Tags,
}

impl Subnet {
    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    pub fn kind(&self) -> SubnetKind {
        self.kind
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    pub fn cidr(&self) -> Ipv4Cidr {
        self.cidr
    }

    pub fn egress(&self) -> &Egress {
        &self.egress
    }

    fn route_table_id(&self) -> ProvisioningResult<LogicalId> {
        self.logical_id.child("RouteTable")
    }
}

impl Taggable for Subnet {
    fn tag(&mut self, key: &str, value: &str) {
        self.tags.insert(key.to_string(), value.to_string());
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }
}

/// Subnets of one kind, one per zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetGroup {
    kind: SubnetKind,
    subnets: Vec<Subnet>,
}

impl SubnetGroup {
    pub fn kind(&self) -> SubnetKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.group_name()
    }

    pub fn subnets(&self) -> &[Subnet] {
        &self.subnets
    }

    /// Stable logical ids of every subnet in the group
    pub fn ids(&self) -> Vec<LogicalId> {
        self.subnets.iter().map(|s| s.logical_id.clone()).collect()
    }
}

/// NAT gateway with its elastic address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NatGateway {
    logical_id: LogicalId,
    address_id: LogicalId,
    /// Public subnet hosting the gateway
    subnet: LogicalId,
    tags: Tags,
}

impl NatGateway {
    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    pub fn subnet(&self) -> &LogicalId {
        &self.subnet
    }
}

impl Taggable for NatGateway {
    fn tag(&mut self, key: &str, value: &str) {
        self.tags.insert(key.to_string(), value.to_string());
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }
}

/// Resolved network boundary
///
/// Only [`NetworkStack::construct`] produces one, so holding a
/// `NetworkBoundary` proves the network was fully allocated. It cannot be
/// deserialized:
///
/// ```compile_fail
/// fn deserializable<T: serde::de::DeserializeOwned>() {}
/// deserializable::<gitops_platform::stacks::NetworkBoundary>();
/// ```
///
/// # Invariants
/// - Every subnet lies inside `cidr` and no two subnets overlap
/// - One public and one private subnet per zone
/// - `1 <= nat_gateways.len() <= zones`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkBoundary {
    logical_id: LogicalId,
    cidr: Ipv4Cidr,
    zones: ZoneCount,
    public: SubnetGroup,
    private: SubnetGroup,
    nat_gateways: Vec<NatGateway>,
    internet_gateway: LogicalId,
    tags: Tags,
}

impl NetworkBoundary {
    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    pub fn cidr(&self) -> Ipv4Cidr {
        self.cidr
    }

    pub fn zones(&self) -> ZoneCount {
        self.zones
    }

    pub fn public_subnets(&self) -> &SubnetGroup {
        &self.public
    }

    pub fn private_subnets(&self) -> &SubnetGroup {
        &self.private
    }

    pub fn private_subnet_ids(&self) -> Vec<LogicalId> {
        self.private.ids()
    }

    pub fn public_subnet_ids(&self) -> Vec<LogicalId> {
        self.public.ids()
    }

    pub fn nat_gateways(&self) -> &[NatGateway] {
        &self.nat_gateways
    }

    pub fn subnets(&self) -> impl Iterator<Item = &Subnet> {
        self.public.subnets.iter().chain(self.private.subnets.iter())
    }

    /// Check that the boundary and every child handle carry `tags`
    pub fn is_tagged_with(&self, tags: &TagSet) -> bool {
        tags.is_carried_by(&self.tags)
            && self.subnets().all(|s| tags.is_carried_by(&s.tags))
            && self.nat_gateways.iter().all(|n| tags.is_carried_by(&n.tags))
    }

    fn attachment_id(&self) -> ProvisioningResult<LogicalId> {
        self.logical_id.child("VPCGW")
    }

    fn declare_subnet(
        &self,
        stack: &str,
        subnet: &Subnet,
        graph: &mut ResourceGraph,
    ) -> ProvisioningResult<()> {
        let mut tags = subnet.tags.clone();
        tags.insert("Name".to_string(), format!("{}/{}", VPC_NAME, subnet.logical_id));

        graph.add(
            stack,
            Resource::new(subnet.logical_id.clone(), ResourceKind::Subnet)
                .property("VpcId", reference(&self.logical_id))
                .property("CidrBlock", json!(subnet.cidr.to_string()))
                .property("AvailabilityZone", json!(subnet.zone))
                .property("MapPublicIpOnLaunch", json!(subnet.kind == SubnetKind::Public))
                .tags(&tags),
        )?;

        let route_table = subnet.route_table_id()?;
        graph.add(
            stack,
            Resource::new(route_table.clone(), ResourceKind::RouteTable)
                .property("VpcId", reference(&self.logical_id))
                .tags(&tags),
        )?;
        graph.add(
            stack,
            Resource::new(
                subnet.logical_id.child("RouteTableAssociation")?,
                ResourceKind::SubnetRouteTableAssociation,
            )
            .property("RouteTableId", reference(&route_table))
            .property("SubnetId", reference(&subnet.logical_id)),
        )?;

        let route = Resource::new(subnet.logical_id.child("DefaultRoute")?, ResourceKind::Route)
            .property("RouteTableId", reference(&route_table))
            .property("DestinationCidrBlock", json!(ANYWHERE));
        let route = match &subnet.egress {
            Egress::InternetGateway(gateway) => route
                .property("GatewayId", reference(gateway))
                .depends_on(&self.attachment_id()?),
            Egress::Nat(nat) => route.property("NatGatewayId", reference(nat)),
        };
        graph.add(stack, route)?;

        Ok(())
    }
}

impl Taggable for NetworkBoundary {
    /// Tags the boundary and propagates to every child resource
    fn tag(&mut self, key: &str, value: &str) {
        self.tags.insert(key.to_string(), value.to_string());
        for subnet in self
            .public
            .subnets
            .iter_mut()
            .chain(self.private.subnets.iter_mut())
        {
            subnet.tag(key, value);
        }
        for nat in &mut self.nat_gateways {
            nat.tag(key, value);
        }
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }
}

impl Declare for NetworkBoundary {
    fn declare(&self, stack: &str, graph: &mut ResourceGraph) -> ProvisioningResult<()> {
        let mut vpc_tags = self.tags.clone();
        vpc_tags.insert("Name".to_string(), VPC_NAME.to_string());

        graph.add(
            stack,
            Resource::new(self.logical_id.clone(), ResourceKind::Vpc)
                .property("CidrBlock", json!(self.cidr.to_string()))
                .property("EnableDnsHostnames", json!(true))
                .property("EnableDnsSupport", json!(true))
                .property("InstanceTenancy", json!("default"))
                .tags(&vpc_tags),
        )?;

        graph.add(
            stack,
            Resource::new(self.internet_gateway.clone(), ResourceKind::InternetGateway)
                .tags(&vpc_tags),
        )?;
        graph.add(
            stack,
            Resource::new(self.attachment_id()?, ResourceKind::GatewayAttachment)
                .property("VpcId", reference(&self.logical_id))
                .property("InternetGatewayId", reference(&self.internet_gateway)),
        )?;

        for subnet in &self.public.subnets {
            self.declare_subnet(stack, subnet, graph)?;

            for nat in self.nat_gateways.iter().filter(|n| n.subnet == subnet.logical_id) {
                graph.add(
                    stack,
                    Resource::new(nat.address_id.clone(), ResourceKind::ElasticIp)
                        .property("Domain", json!("vpc"))
                        .tags(&nat.tags),
                )?;
                graph.add(
                    stack,
                    Resource::new(nat.logical_id.clone(), ResourceKind::NatGateway)
                        .property("SubnetId", reference(&subnet.logical_id))
                        .property("AllocationId", attribute(&nat.address_id, "AllocationId"))
                        .depends_on(&subnet.logical_id.child("DefaultRoute")?)
                        .depends_on(&subnet.logical_id.child("RouteTableAssociation")?)
                        .tags(&nat.tags),
                )?;
            }
        }

        for subnet in &self.private.subnets {
            self.declare_subnet(stack, subnet, graph)?;
        }

        graph.output(stack, "VpcId", reference(&self.logical_id), "Network boundary identifier")?;
        graph.output(
            stack,
            "PrivateSubnetIds",
            json!({
                "Fn::Join": [
                    ",",
                    self.private.subnets.iter().map(|s| reference(&s.logical_id)).collect::<Vec<_>>()
                ]
            }),
            "Private subnet identifiers used for cluster placement",
        )?;

        debug!("Declared network boundary {} into {}", self.logical_id, stack);
        Ok(())
    }
}

/// Network stack constructor
pub struct NetworkStack;

impl NetworkStack {
    /// Allocate the network boundary for a deployment
    ///
    /// Fails with a configuration error when the subnets do not fit the
    /// address range.
    pub fn construct(
        ctx: &EnvironmentContext,
        settings: &NetworkSettings,
    ) -> ProvisioningResult<NetworkBoundary> {
        let zones = settings.zones.value();
        if settings.nat_gateways == 0 || settings.nat_gateways > zones {
            return Err(ProvisioningError::Configuration(format!(
                "NAT gateway count {} must be between 1 and {}",
                settings.nat_gateways, zones
            )));
        }

        let vpc_id = LogicalId::new(VPC_NAME.replace('-', ""))?;
        let zone_names = settings.zones.zone_names(ctx.region().as_str());
        let internet_gateway = vpc_id.child("IGW")?;

        let mut public = Vec::with_capacity(zones);
        let mut nat_gateways = Vec::with_capacity(settings.nat_gateways);
        for (i, zone) in zone_names.iter().enumerate() {
            let logical_id = vpc_id.child(&format!("PublicSubnet{}", i + 1))?;
            if i < settings.nat_gateways {
                nat_gateways.push(NatGateway {
                    logical_id: logical_id.child("NATGateway")?,
                    address_id: logical_id.child("EIP")?,
                    subnet: logical_id.clone(),
                    tags: Tags::new(),
                });
            }
            public.push(Subnet {
                logical_id,
                kind: SubnetKind::Public,
                zone: zone.clone(),
                cidr: settings.cidr.subnet(settings.subnet_prefix, i as u32)?,
                egress: Egress::InternetGateway(internet_gateway.clone()),
                tags: Tags::new(),
            });
        }

        let mut private = Vec::with_capacity(zones);
        for (i, zone) in zone_names.iter().enumerate() {
            let nat = &nat_gateways[i % nat_gateways.len()];
            private.push(Subnet {
                logical_id: vpc_id.child(&format!("PrivateSubnet{}", i + 1))?,
                kind: SubnetKind::Private,
                zone: zone.clone(),
                cidr: settings.cidr.subnet(settings.subnet_prefix, (zones + i) as u32)?,
                egress: Egress::Nat(nat.logical_id.clone()),
                tags: Tags::new(),
            });
        }

        let mut boundary = NetworkBoundary {
            logical_id: vpc_id,
            cidr: settings.cidr,
            zones: settings.zones,
            public: SubnetGroup {
                kind: SubnetKind::Public,
                subnets: public,
            },
            private: SubnetGroup {
                kind: SubnetKind::Private,
                subnets: private,
            },
            nat_gateways,
            internet_gateway,
            tags: Tags::new(),
        };
        apply_tags(&mut boundary, ctx.tags());

        info!(
            "Allocated network {} across {} zones with {} NAT gateway(s)",
            boundary.cidr,
            zones,
            boundary.nat_gateways.len()
        );
        Ok(boundary)
    }
}
