//! Grid topology for the simulation
//!
//! An NxN grid of routers addressed `prefix.(row+offset).(col+offset)`.
//! Every router's neighbor set comes from the same address arithmetic the
//! real nodes use, so the simulation and a deployed grid agree on adjacency.

use std::collections::BTreeMap;

use qmesh_core::{Address, NeighborSet};
use qmesh_routing::{GridAddressing, GridCoord, RoutingResult};

/// A square grid of routers
#[derive(Debug, Clone)]
pub struct GridTopology {
    size: u16,
    addressing: GridAddressing,
    /// Neighbor sets in row-major address order
    nodes: BTreeMap<Address, NeighborSet>,
    order: Vec<Address>,
}

impl GridTopology {
    /// Create a `size`x`size` grid with the default addressing
    pub fn new(size: u16) -> RoutingResult<Self> {
        Self::with_addressing(size, GridAddressing::default())
    }

    /// Create a grid with a specific addressing scheme
    pub fn with_addressing(size: u16, addressing: GridAddressing) -> RoutingResult<Self> {
        let order = addressing.all_addresses(size)?;
        let mut nodes = BTreeMap::new();
        for address in &order {
            nodes.insert(*address, addressing.neighbors_of(address, size)?);
        }
        Ok(Self {
            size,
            addressing,
            nodes,
            order,
        })
    }

    pub fn size(&self) -> u16 {
        self.size
    }

    pub fn addressing(&self) -> &GridAddressing {
        &self.addressing
    }

    /// Address of the router at `(row, col)`
    pub fn address_of(&self, row: u16, col: u16) -> RoutingResult<Address> {
        self.addressing.address_of(GridCoord::new(row, col))
    }

    /// Grid position of `address`
    pub fn coord_of(&self, address: &Address) -> RoutingResult<GridCoord> {
        self.addressing.coord_of(address, self.size)
    }

    /// Neighbor set of `address`, if it is part of the grid
    pub fn neighbors(&self, address: &Address) -> Option<&NeighborSet> {
        self.nodes.get(address)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.nodes.contains_key(address)
    }

    /// All router addresses in row-major order
    pub fn addresses(&self) -> &[Address] {
        &self.order
    }

    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    /// Number of links between adjacent routers
    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(NeighborSet::len).sum::<usize>() / 2
    }

    /// Fewest forwards needed to get from `from` to `to`
    pub fn shortest_hops(&self, from: &Address, to: &Address) -> RoutingResult<u32> {
        Ok(self.coord_of(from)?.manhattan(&self.coord_of(to)?))
    }

    /// ASCII rendering of the grid and its adjacency
    pub fn visualize(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("Grid Topology ({0}x{0}):\n", self.size));
        output.push_str(&format!("  Routers: {}\n", self.node_count()));
        output.push_str(&format!("  Links: {}\n\n", self.edge_count()));

        for row in self.order.chunks(usize::from(self.size)) {
            let cells: Vec<String> = row.iter().map(|a| format!("{a:<12}")).collect();
            output.push_str(&format!("  {}\n", cells.join(" ").trim_end()));
        }
        output.push('\n');

        for address in &self.order {
            let Some(neighbors) = self.nodes.get(address) else {
                continue;
            };
            let list: Vec<String> = neighbors.iter().map(ToString::to_string).collect();
            output.push_str(&format!("  {} -> [{}]\n", address, list.join(", ")));
        }
        output
    }
}
