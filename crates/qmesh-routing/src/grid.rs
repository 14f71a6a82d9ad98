//! Grid addressing
//!
//! Nodes of an N×N grid are addressed `a.b.(row + offset).(col + offset)`.
//! A node derives its neighbors from its own address alone: the in-bounds
//! cells one unit step away, enumerated up, down, left, right.

use std::fmt;

use serde::{Deserialize, Serialize};

use qmesh_core::{Address, NeighborSet};

use crate::error::{RoutingError, RoutingResult};

/// Zero-based grid position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    pub row: u16,
    pub col: u16,
}

impl GridCoord {
    pub const fn new(row: u16, col: u16) -> Self {
        Self { row, col }
    }

    /// In-bounds cardinal neighbors in up, down, left, right order
    pub fn neighbors(&self, size: u16) -> Vec<GridCoord> {
        let mut out = Vec::with_capacity(4);
        if self.row > 0 {
            out.push(Self::new(self.row - 1, self.col));
        }
        if u32::from(self.row) + 1 < u32::from(size) {
            out.push(Self::new(self.row + 1, self.col));
        }
        if self.col > 0 {
            out.push(Self::new(self.row, self.col - 1));
        }
        if u32::from(self.col) + 1 < u32::from(size) {
            out.push(Self::new(self.row, self.col + 1));
        }
        out
    }

    /// Shortest path length between two cells
    pub fn manhattan(&self, other: &GridCoord) -> u32 {
        u32::from(self.row.abs_diff(other.row)) + u32::from(self.col.abs_diff(other.col))
    }
}

impl fmt::Display for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

/// Mapping between grid coordinates and IPv4 addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridAddressing {
    /// First two octets shared by every node
    pub prefix: [u8; 2],
    /// Added to row and column to form the last two octets
    pub offset: u8,
}

impl Default for GridAddressing {
    fn default() -> Self {
        Self {
            prefix: [10, 0],
            offset: 1,
        }
    }
}

impl GridAddressing {
    pub fn new(prefix: [u8; 2], offset: u8) -> Self {
        Self { prefix, offset }
    }

    /// Check that every cell of a `size`×`size` grid has an address
    pub fn validate_size(&self, size: u16) -> RoutingResult<()> {
        if size == 0 {
            return Err(RoutingError::InvalidGridSize {
                size,
                detail: "grid must have at least one cell".into(),
            });
        }
        if u32::from(size) + u32::from(self.offset) > 256 {
            return Err(RoutingError::InvalidGridSize {
                size,
                detail: format!("offset {} leaves no octet for the last row", self.offset),
            });
        }
        Ok(())
    }

    /// Address of a grid cell
    pub fn address_of(&self, coord: GridCoord) -> RoutingResult<Address> {
        let row = u8::try_from(u32::from(coord.row) + u32::from(self.offset));
        let col = u8::try_from(u32::from(coord.col) + u32::from(self.offset));
        match (row, col) {
            (Ok(row), Ok(col)) => Ok(Address::v4(self.prefix[0], self.prefix[1], row, col)),
            _ => Err(RoutingError::InvalidGridSize {
                size: coord.row.max(coord.col).saturating_add(1),
                detail: format!("cell {} has no address", coord),
            }),
        }
    }

    /// Grid cell of an address within a `size`×`size` grid
    pub fn coord_of(&self, address: &Address, size: u16) -> RoutingResult<GridCoord> {
        let [a, b, c, d] = address
            .ipv4_octets()
            .ok_or_else(|| RoutingError::off_grid(*address, "not an IPv4 address"))?;

        if [a, b] != self.prefix {
            return Err(RoutingError::off_grid(
                *address,
                format!("prefix is not {}.{}", self.prefix[0], self.prefix[1]),
            ));
        }

        let (Some(row), Some(col)) = (c.checked_sub(self.offset), d.checked_sub(self.offset)) else {
            return Err(RoutingError::off_grid(
                *address,
                format!("octets below offset {}", self.offset),
            ));
        };

        let coord = GridCoord::new(u16::from(row), u16::from(col));
        if coord.row >= size || coord.col >= size {
            return Err(RoutingError::off_grid(
                *address,
                format!("cell {} outside {}x{} grid", coord, size, size),
            ));
        }
        Ok(coord)
    }

    /// Neighbors of `address` in a `size`×`size` grid
    pub fn neighbors_of(&self, address: &Address, size: u16) -> RoutingResult<NeighborSet> {
        self.validate_size(size)?;
        let coord = self.coord_of(address, size)?;
        coord
            .neighbors(size)
            .into_iter()
            .map(|cell| self.address_of(cell))
            .collect()
    }

    /// Every address of the grid, row-major
    pub fn all_addresses(&self, size: u16) -> RoutingResult<Vec<Address>> {
        self.validate_size(size)?;
        let mut out = Vec::with_capacity(usize::from(size) * usize::from(size));
        for row in 0..size {
            for col in 0..size {
                out.push(self.address_of(GridCoord::new(row, col))?);
            }
        }
        Ok(out)
    }
}

/// Neighbors of `address` in a `grid_size`×`grid_size` grid under the
/// default `10.0.(row+1).(col+1)` addressing
pub fn neighbors_of(address: &Address, grid_size: u16) -> RoutingResult<NeighborSet> {
    GridAddressing::default().neighbors_of(address, grid_size)
}
