//! # Table Inventory
//!
//! The static catalog of physical tables and the combinations they can form.
//!
//! ## Bookable Units
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Bookable Units                                    │
//! │                                                                         │
//! │  Physical tables                 Combinations (virtual)                 │
//! │  ───────────────                 ──────────────────────                 │
//! │  m1 (2) ─┐                                                              │
//! │  m2 (2) ─┴──────────────────────► c1 = {m1, m2}  cap 4                  │
//! │  m3 (2) ─┬──────────────────────► c2 = {m3, m5}  cap 6                  │
//! │  m5 (4) ─┘                                                              │
//! │  m11 (6) + m3 ──────────────────► c5 = {m11, m3} cap 8                  │
//! │                                                                         │
//! │  m3 appears in c2 AND c5: booking m3 breaks both (butterfly effect).    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The inventory is immutable once built. Callers construct it at startup
//! and pass it by reference into the resolver and aggregator.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{ConfigError, ConfigResult};
use crate::occupancy::OccupancySnapshot;
use crate::types::Location;

// =============================================================================
// Physical Table / Combination
// =============================================================================

/// A real table in the venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalTable {
    pub id: String,
    pub capacity: u32,
    pub location: Location,
}

impl PhysicalTable {
    pub fn new(id: impl Into<String>, capacity: u32, location: Location) -> Self {
        PhysicalTable {
            id: id.into(),
            capacity,
            location,
        }
    }
}

/// Two or more physical tables joined to seat a larger party.
///
/// `capacity` is configured, not derived: joining two 4-tops may seat 8
/// or a more conservative 7.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combination {
    pub id: String,
    pub components: Vec<String>,
    pub capacity: u32,
    pub location: Location,
}

impl Combination {
    pub fn new(
        id: impl Into<String>,
        components: &[&str],
        capacity: u32,
        location: Location,
    ) -> Self {
        Combination {
            id: id.into(),
            components: components.iter().map(|c| c.to_string()).collect(),
            capacity,
            location,
        }
    }
}

// =============================================================================
// Bookable Unit
// =============================================================================

/// Kind of bookable unit. Plain tables sort before combinations of equal
/// capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Table,
    Combination,
}

/// What the resolver works with: a table or a combination, seen uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookableUnit<'a> {
    Table(&'a PhysicalTable),
    Combination(&'a Combination),
}

impl<'a> BookableUnit<'a> {
    pub fn id(&self) -> &'a str {
        match self {
            BookableUnit::Table(t) => &t.id,
            BookableUnit::Combination(c) => &c.id,
        }
    }

    pub fn capacity(&self) -> u32 {
        match self {
            BookableUnit::Table(t) => t.capacity,
            BookableUnit::Combination(c) => c.capacity,
        }
    }

    pub fn location(&self) -> Location {
        match self {
            BookableUnit::Table(t) => t.location,
            BookableUnit::Combination(c) => c.location,
        }
    }

    pub fn kind(&self) -> UnitKind {
        match self {
            BookableUnit::Table(_) => UnitKind::Table,
            BookableUnit::Combination(_) => UnitKind::Combination,
        }
    }

    /// Physical table ids this unit consumes when granted.
    pub fn tables(&self) -> Vec<&'a str> {
        match self {
            BookableUnit::Table(t) => vec![t.id.as_str()],
            BookableUnit::Combination(c) => c.components.iter().map(String::as_str).collect(),
        }
    }

    /// A unit is free iff none of its physical tables is occupied.
    ///
    /// For a combination this is an AND over every component: one occupied
    /// component, whatever booked it, takes the whole combination out.
    pub fn is_free(&self, occupancy: &OccupancySnapshot) -> bool {
        match self {
            BookableUnit::Table(t) => !occupancy.is_occupied(&t.id),
            BookableUnit::Combination(c) => c.components.iter().all(|id| !occupancy.is_occupied(id)),
        }
    }
}

// =============================================================================
// Table Inventory
// =============================================================================

/// The venue's immutable table catalog.
///
/// ## Ordering Contract
/// [`units_capable_of`](Self::units_capable_of) returns units by ascending
/// capacity; ties go to plain tables before combinations, then to
/// declaration order. The order is identical on every call.
#[derive(Debug, Clone)]
pub struct TableInventory {
    tables: Vec<PhysicalTable>,
    combinations: Vec<Combination>,
    seat_limit: Option<u32>,
}

impl TableInventory {
    /// Builds an inventory, rejecting inconsistent definitions.
    ///
    /// ## Rules
    /// - Every capacity is positive
    /// - Ids are non-empty and unique across tables AND combinations
    /// - A combination joins at least two existing tables, each listed once
    pub fn new(tables: Vec<PhysicalTable>, combinations: Vec<Combination>) -> ConfigResult<Self> {
        let mut seen: HashSet<&str> = HashSet::new();

        for table in &tables {
            if table.id.trim().is_empty() {
                return Err(ConfigError::EmptyId);
            }
            if table.capacity == 0 {
                return Err(ConfigError::NonPositiveCapacity {
                    id: table.id.clone(),
                });
            }
            if !seen.insert(&table.id) {
                return Err(ConfigError::DuplicateId(table.id.clone()));
            }
        }

        let table_ids: HashSet<&str> = tables.iter().map(|t| t.id.as_str()).collect();

        for combo in &combinations {
            if combo.id.trim().is_empty() {
                return Err(ConfigError::EmptyId);
            }
            if combo.capacity == 0 {
                return Err(ConfigError::NonPositiveCapacity {
                    id: combo.id.clone(),
                });
            }
            if !seen.insert(&combo.id) {
                return Err(ConfigError::DuplicateId(combo.id.clone()));
            }

            let mut distinct: HashSet<&str> = HashSet::new();
            for component in &combo.components {
                if !distinct.insert(component.as_str()) {
                    return Err(ConfigError::DuplicateComponent {
                        combination: combo.id.clone(),
                        table: component.clone(),
                    });
                }
            }
            if distinct.len() < 2 {
                return Err(ConfigError::TooFewComponents(combo.id.clone()));
            }

            if let Some(missing) = combo
                .components
                .iter()
                .find(|c| !table_ids.contains(c.as_str()))
            {
                return Err(ConfigError::UnknownComponent {
                    combination: combo.id.clone(),
                    table: missing.clone(),
                });
            }
        }

        Ok(TableInventory {
            tables,
            combinations,
            seat_limit: None,
        })
    }

    /// Caps the total covers per slot regardless of free tables.
    pub fn with_seat_limit(mut self, limit: u32) -> ConfigResult<Self> {
        if limit == 0 {
            return Err(ConfigError::InvalidSeatLimit);
        }
        self.seat_limit = Some(limit);
        Ok(self)
    }

    /// Looks up a physical table.
    pub fn physical_table(&self, id: &str) -> Option<&PhysicalTable> {
        self.tables.iter().find(|t| t.id == id)
    }

    /// Looks up a combination.
    pub fn combination(&self, id: &str) -> Option<&Combination> {
        self.combinations.iter().find(|c| c.id == id)
    }

    /// Looks up any bookable unit by id.
    pub fn unit(&self, id: &str) -> Option<BookableUnit<'_>> {
        self.physical_table(id)
            .map(BookableUnit::Table)
            .or_else(|| self.combination(id).map(BookableUnit::Combination))
    }

    pub fn tables(&self) -> &[PhysicalTable] {
        &self.tables
    }

    pub fn combinations(&self) -> &[Combination] {
        &self.combinations
    }

    pub fn seat_limit(&self) -> Option<u32> {
        self.seat_limit
    }

    /// Sum of physical table capacities.
    pub fn total_seats(&self) -> u32 {
        self.tables.iter().map(|t| t.capacity).sum()
    }

    /// Every unit that can seat `party_size`, optionally restricted to a
    /// location, in resolution priority order.
    pub fn units_capable_of(
        &self,
        party_size: u32,
        location: Option<Location>,
    ) -> Vec<BookableUnit<'_>> {
        let mut units: Vec<BookableUnit<'_>> = self
            .tables
            .iter()
            .map(BookableUnit::Table)
            .chain(self.combinations.iter().map(BookableUnit::Combination))
            .filter(|u| u.capacity() >= party_size)
            .filter(|u| location.map_or(true, |loc| u.location() == loc))
            .collect();

        // Stable sort keeps declaration order inside each (capacity, kind) bucket
        units.sort_by_key(|u| (u.capacity(), u.kind()));
        units
    }
}

// =============================================================================
// House Inventory
// =============================================================================

/// The restaurant's standard floor plan, used when no tables are configured.
pub fn house_inventory() -> TableInventory {
    let tables = vec![
        PhysicalTable::new("m1", 2, Location::Interior),
        PhysicalTable::new("m2", 2, Location::Interior),
        PhysicalTable::new("m3", 2, Location::Interior),
        PhysicalTable::new("m4", 2, Location::Terraza),
        PhysicalTable::new("m5", 4, Location::Interior),
        PhysicalTable::new("m6", 4, Location::Interior),
        PhysicalTable::new("m7", 4, Location::Interior),
        PhysicalTable::new("m8", 4, Location::Terraza),
        PhysicalTable::new("m9", 4, Location::Terraza),
        PhysicalTable::new("m10", 4, Location::Interior),
        PhysicalTable::new("m11", 6, Location::Interior),
        PhysicalTable::new("m12", 6, Location::Interior),
        PhysicalTable::new("m13", 8, Location::Interior),
    ];

    let combinations = vec![
        Combination::new("c1", &["m1", "m2"], 4, Location::Interior),
        Combination::new("c2", &["m3", "m5"], 6, Location::Interior),
        Combination::new("c3", &["m8", "m9"], 8, Location::Terraza),
        Combination::new("c4", &["m6", "m7"], 8, Location::Interior),
        Combination::new("c5", &["m11", "m3"], 8, Location::Interior),
    ];

    // The house plan is a compile-time constant that satisfies every rule
    TableInventory {
        tables,
        combinations,
        seat_limit: None,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(units: &[BookableUnit<'_>]) -> Vec<String> {
        units.iter().map(|u| u.id().to_string()).collect()
    }

    #[test]
    fn test_house_inventory_is_valid() {
        let house = house_inventory();
        let rebuilt = TableInventory::new(house.tables().to_vec(), house.combinations().to_vec());
        assert!(rebuilt.is_ok());
        assert_eq!(house.total_seats(), 52);
    }

    #[test]
    fn test_unknown_component_rejected() {
        let err = TableInventory::new(
            vec![PhysicalTable::new("m1", 2, Location::Interior)],
            vec![Combination::new("c1", &["m1", "m2"], 4, Location::Interior)],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownComponent {
                combination: "c1".to_string(),
                table: "m2".to_string()
            }
        );
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = TableInventory::new(vec![PhysicalTable::new("m1", 0, Location::Interior)], vec![])
            .unwrap_err();
        assert!(matches!(err, ConfigError::NonPositiveCapacity { .. }));

        let err = TableInventory::new(
            vec![
                PhysicalTable::new("m1", 2, Location::Interior),
                PhysicalTable::new("m2", 2, Location::Interior),
            ],
            vec![Combination::new("c1", &["m1", "m2"], 0, Location::Interior)],
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::NonPositiveCapacity { .. }));
    }

    #[test]
    fn test_shared_namespace_rejected() {
        let err = TableInventory::new(
            vec![
                PhysicalTable::new("m1", 2, Location::Interior),
                PhysicalTable::new("m2", 2, Location::Interior),
            ],
            vec![Combination::new("m1", &["m1", "m2"], 4, Location::Interior)],
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateId("m1".to_string()));
    }

    #[test]
    fn test_single_component_rejected() {
        let err = TableInventory::new(
            vec![PhysicalTable::new("m1", 2, Location::Interior)],
            vec![Combination::new("c1", &["m1"], 4, Location::Interior)],
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::TooFewComponents("c1".to_string()));
    }

    #[test]
    fn test_repeated_component_rejected() {
        let tables = vec![
            PhysicalTable::new("m1", 2, Location::Interior),
            PhysicalTable::new("m2", 2, Location::Interior),
        ];

        let err = TableInventory::new(
            tables.clone(),
            vec![Combination::new("c1", &["m1", "m1"], 4, Location::Interior)],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateComponent {
                combination: "c1".to_string(),
                table: "m1".to_string()
            }
        );

        let err = TableInventory::new(
            tables,
            vec![Combination::new("c2", &["m1", "m2", "m2"], 6, Location::Interior)],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateComponent {
                combination: "c2".to_string(),
                table: "m2".to_string()
            }
        );
    }

    #[test]
    fn test_units_ordering() {
        let house = house_inventory();
        let units = house.units_capable_of(4, None);
        assert_eq!(
            ids(&units),
            vec![
                "m5", "m6", "m7", "m8", "m9", "m10", "c1", "m11", "m12", "c2", "m13", "c3", "c4",
                "c5"
            ]
        );
        // Same answer every time
        assert_eq!(ids(&units), ids(&house.units_capable_of(4, None)));
    }

    #[test]
    fn test_units_location_filter() {
        let house = house_inventory();
        let units = house.units_capable_of(3, Some(Location::Terraza));
        assert_eq!(ids(&units), vec!["m8", "m9", "c3"]);
    }

    #[test]
    fn test_zero_seat_limit_rejected() {
        let err = house_inventory().with_seat_limit(0).unwrap_err();
        assert_eq!(err, ConfigError::InvalidSeatLimit);
    }
}
