//! Territory distribution and division
//!
//! Distribution partitions a territory list across service groups with one
//! of three strategies. `Equal` is a plain round-robin. `ByDifficulty` and
//! `BySize` are the greedy longest-processing-time heuristic: heaviest
//! territory first, each to the currently least-loaded group. There is no
//! optimality guarantee; ties are broken deterministically (see
//! [`distribute`]).

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::{Territory, TerritoryAssignment};
use crate::time::days_between;
use crate::{Error, Result};

/// Upper bound on parts per division (one per letter of the alphabet)
pub const MAX_SUBDIVISIONS: usize = 26;

/// Days a territory may stay checked out before it is reported overdue
pub const DEFAULT_OVERDUE_DAYS: i64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionStrategy {
    Equal,
    ByDifficulty,
    BySize,
}

impl DistributionStrategy {
    /// Load a territory contributes to its group
    pub fn weight(&self, territory: &Territory) -> i64 {
        match self {
            DistributionStrategy::Equal => 1,
            DistributionStrategy::ByDifficulty => territory.difficulty.max(0),
            DistributionStrategy::BySize => territory.size.max(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Allocation {
    pub territory_id: Uuid,
    pub territory_number: String,
    pub group_id: Uuid,
    pub weight: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupLoad {
    pub group_id: Uuid,
    pub territory_count: usize,
    pub total_weight: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionPlan {
    pub strategy: DistributionStrategy,
    /// One entry per territory, in the order the territories were given
    pub allocations: Vec<Allocation>,
    /// One entry per group, in the order the groups were given
    pub loads: Vec<GroupLoad>,
}

/// Sort key that orders "2" before "10" and "12-1" before "12-2"
pub fn number_sort_key(number: &str) -> (u64, String) {
    let digits: String = number.chars().take_while(|c| c.is_ascii_digit()).collect();
    let rest = number[digits.len()..].to_string();
    (digits.parse().unwrap_or(u64::MAX), rest)
}

/// Compare territory numbers naturally
pub fn compare_numbers(a: &str, b: &str) -> Ordering {
    number_sort_key(a).cmp(&number_sort_key(b))
}

/// Partition `territories` across `group_ids`
///
/// * `Equal`: territory `i` goes to group `i % G`, so every group gets
///   `floor(N/G)` or `ceil(N/G)` territories.
/// * `ByDifficulty` / `BySize`: territories are taken heaviest first
///   (ties by territory number, then input order) and each is given to the
///   group with the smallest total weight. Groups tied on weight are
///   separated by fewer territories, then by their position in `group_ids`.
///
/// An empty territory list yields an empty plan. Territories with no
/// groups to receive them, or a repeated group or territory id, are
/// invalid input.
pub fn distribute(
    territories: &[Territory],
    group_ids: &[Uuid],
    strategy: DistributionStrategy,
) -> Result<DistributionPlan> {
    let mut seen = HashSet::new();
    for id in group_ids {
        if !seen.insert(id) {
            return Err(Error::InvalidInput(format!("group {} listed more than once", id)));
        }
    }
    let mut seen_territories = HashSet::new();
    for territory in territories {
        if !seen_territories.insert(territory.id) {
            return Err(Error::InvalidInput(format!(
                "territory {} listed more than once",
                territory.number
            )));
        }
    }

    let mut loads: Vec<GroupLoad> = group_ids
        .iter()
        .map(|&group_id| GroupLoad {
            group_id,
            territory_count: 0,
            total_weight: 0,
        })
        .collect();

    if territories.is_empty() {
        return Ok(DistributionPlan {
            strategy,
            allocations: Vec::new(),
            loads,
        });
    }
    if group_ids.is_empty() {
        return Err(Error::InvalidInput(
            "at least one group is required to distribute territories".to_string(),
        ));
    }

    let weights: Vec<i64> = territories.iter().map(|t| strategy.weight(t)).collect();
    let mut slots: Vec<Option<usize>> = vec![None; territories.len()];

    match strategy {
        DistributionStrategy::Equal => {
            for (index, slot) in slots.iter_mut().enumerate() {
                let target = index % group_ids.len();
                loads[target].total_weight = loads[target].total_weight.saturating_add(weights[index]);
                loads[target].territory_count += 1;
                *slot = Some(target);
            }
        }
        DistributionStrategy::ByDifficulty | DistributionStrategy::BySize => {
            let mut order: Vec<usize> = (0..territories.len()).collect();
            order.sort_by(|&a, &b| {
                weights[b]
                    .cmp(&weights[a])
                    .then_with(|| compare_numbers(&territories[a].number, &territories[b].number))
            });

            for index in order {
                let target = loads
                    .iter()
                    .enumerate()
                    .min_by_key(|(position, load)| (load.total_weight, load.territory_count, *position))
                    .map(|(position, _)| position)
                    .unwrap_or(0);

                loads[target].total_weight = loads[target].total_weight.saturating_add(weights[index]);
                loads[target].territory_count += 1;
                slots[index] = Some(target);
            }
        }
    }

    let allocations = territories
        .iter()
        .zip(slots)
        .zip(weights)
        .filter_map(|((territory, slot), weight)| {
            slot.map(|target| Allocation {
                territory_id: territory.id,
                territory_number: territory.number.clone(),
                group_id: group_ids[target],
                weight,
            })
        })
        .collect();

    Ok(DistributionPlan {
        strategy,
        allocations,
        loads,
    })
}

/// Number given to part `index` (1-based) of a divided territory
pub fn sub_territory_number(parent_number: &str, index: usize) -> String {
    format!("{}-{}", parent_number, index)
}

/// Split `parent` into `parts` sub-territories
///
/// Part `i` is numbered `"<number>-<i>"` and named `"<name> (<i>/<parts>)"`.
/// Difficulty, group and boundaries are inherited; the address count is
/// split as evenly as possible with the remainder going to the first
/// parts, so the sizes always add up to the parent's size.
pub fn divide(parent: &Territory, parts: usize) -> Result<Vec<Territory>> {
    if parts == 0 || parts > MAX_SUBDIVISIONS {
        return Err(Error::InvalidInput(format!(
            "a territory can be divided into 1 to {} parts (got {})",
            MAX_SUBDIVISIONS, parts
        )));
    }

    let size = parent.size.max(0);
    let base = size / parts as i64;
    let remainder = size % parts as i64;

    Ok((1..=parts)
        .map(|index| Territory {
            id: Uuid::new_v4(),
            number: sub_territory_number(&parent.number, index),
            name: format!("{} ({}/{})", parent.name, index, parts),
            boundaries: parent.boundaries.clone(),
            difficulty: parent.difficulty,
            size: base + if (index as i64) <= remainder { 1 } else { 0 },
            group_id: parent.group_id,
            parent_id: Some(parent.id),
            notes: Some(format!("Divided from territory {}", parent.number)),
        })
        .collect())
}

/// Open check-out older than `overdue_days`
pub fn is_overdue(assignment: &TerritoryAssignment, today: NaiveDate, overdue_days: i64) -> bool {
    assignment.returned_on.is_none() && days_between(assignment.assigned_on, today) > overdue_days
}

/// Check a return date against the open check-out
pub fn validate_return(assignment: &TerritoryAssignment, returned_on: NaiveDate) -> Result<()> {
    if assignment.returned_on.is_some() {
        return Err(Error::Conflict(format!(
            "territory {} has already been returned",
            assignment.territory_id
        )));
    }
    if returned_on < assignment.assigned_on {
        return Err(Error::InvalidInput(format!(
            "return date {} is before check-out date {}",
            returned_on, assignment.assigned_on
        )));
    }
    Ok(())
}
