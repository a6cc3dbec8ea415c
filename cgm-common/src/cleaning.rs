//! Cleaning schedule and inventory rules

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::{InventoryItem, TaskStatus, MAX_STOCK_QUANTITY};
use crate::time::week_start;
use crate::{Error, Result};

/// Default multiple of `min_threshold` a restock should bring stock up to
pub const DEFAULT_RESTOCK_FACTOR: i64 = 2;

/// Whether a cleaning task may move from `from` to `to`
pub fn can_transition(from: TaskStatus, to: TaskStatus) -> bool {
    use TaskStatus::*;
    matches!(
        (from, to),
        (Pending, InProgress)
            | (Pending, Completed)
            | (Pending, Skipped)
            | (InProgress, Completed)
            | (InProgress, Pending)
            | (Skipped, Pending)
            | (Completed, Pending)
    )
}

pub fn check_transition(from: TaskStatus, to: TaskStatus) -> Result<()> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "cleaning task cannot move from {} to {}",
            from, to
        )))
    }
}

/// One week of a generated cleaning rotation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RotationSlot {
    pub week_of: NaiveDate,
    pub group_id: Uuid,
}

/// Round-robin `groups` over `weeks` consecutive weeks from `start`
///
/// `start` is normalized to its Monday.
pub fn rotation(groups: &[Uuid], start: NaiveDate, weeks: usize) -> Result<Vec<RotationSlot>> {
    if groups.is_empty() {
        return Err(Error::InvalidInput(
            "at least one group is required for a cleaning rotation".to_string(),
        ));
    }
    if weeks == 0 || weeks > 104 {
        return Err(Error::InvalidInput(format!(
            "rotation length must be between 1 and 104 weeks (got {})",
            weeks
        )));
    }

    let first = week_start(start);
    Ok((0..weeks)
        .map(|i| RotationSlot {
            week_of: first + Duration::weeks(i as i64),
            group_id: groups[i % groups.len()],
        })
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockLevel {
    Ok,
    Low,
    Out,
}

pub fn stock_level(item: &InventoryItem) -> StockLevel {
    if item.quantity <= 0 {
        StockLevel::Out
    } else if item.quantity <= item.min_threshold {
        StockLevel::Low
    } else {
        StockLevel::Ok
    }
}

/// New quantity after applying `delta`; stock can't go negative
pub fn adjusted_quantity(item: &InventoryItem, delta: i64) -> Result<i64> {
    let quantity = item.quantity.checked_add(delta).ok_or_else(|| {
        Error::InvalidInput(format!("quantity adjustment {} overflows", delta))
    })?;
    if quantity < 0 {
        return Err(Error::InvalidInput(format!(
            "only {} {} of '{}' in stock",
            item.quantity, item.unit, item.name
        )));
    }
    if quantity > MAX_STOCK_QUANTITY {
        return Err(Error::InvalidInput(format!(
            "quantity of '{}' cannot exceed {}",
            item.name, MAX_STOCK_QUANTITY
        )));
    }
    Ok(quantity)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestockLine {
    pub item_id: Uuid,
    pub name: String,
    pub quantity: i64,
    pub level: StockLevel,
    /// Amount to buy to reach `min_threshold * factor`
    pub suggested: i64,
}

/// Items at or below their threshold with a suggested restock amount
pub fn restock_list(items: &[InventoryItem], factor: i64) -> Vec<RestockLine> {
    let factor = factor.max(1);
    let mut lines: Vec<RestockLine> = items
        .iter()
        .filter_map(|item| {
            let level = stock_level(item);
            if level == StockLevel::Ok {
                return None;
            }
            let target = item.min_threshold.saturating_mul(factor).max(1);
            Some(RestockLine {
                item_id: item.id,
                name: item.name.clone(),
                quantity: item.quantity,
                level,
                suggested: target.saturating_sub(item.quantity).max(0),
            })
        })
        .collect();

    // Out of stock first
    lines.sort_by(|a, b| {
        (b.level == StockLevel::Out)
            .cmp(&(a.level == StockLevel::Out))
            .then_with(|| a.name.cmp(&b.name))
    });
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, quantity: i64, min_threshold: i64) -> InventoryItem {
        InventoryItem {
            id: Uuid::new_v4(),
            name: name.to_string(),
            category: "cleaning".to_string(),
            quantity,
            min_threshold,
            unit: "bottles".to_string(),
        }
    }

    #[test]
    fn test_transitions() {
        use TaskStatus::*;
        assert!(can_transition(Pending, InProgress));
        assert!(can_transition(InProgress, Completed));
        assert!(can_transition(Completed, Pending));
        assert!(!can_transition(Completed, Skipped));
        assert!(!can_transition(Skipped, Completed));
        assert!(!can_transition(Pending, Pending));
        assert!(check_transition(Skipped, InProgress).is_err());
    }

    #[test]
    fn test_rotation_round_robin_from_monday() {
        let groups = vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        // Thursday 2025-03-06 -> Monday 2025-03-03
        let start = NaiveDate::from_ymd_opt(2025, 3, 6).unwrap();
        let slots = rotation(&groups, start, 4).unwrap();

        assert_eq!(slots.len(), 4);
        assert_eq!(slots[0].week_of, NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
        assert_eq!(slots[3].week_of, NaiveDate::from_ymd_opt(2025, 3, 24).unwrap());
        assert_eq!(slots[0].group_id, groups[0]);
        assert_eq!(slots[3].group_id, groups[0]);
        assert_eq!(slots[2].group_id, groups[2]);
    }

    #[test]
    fn test_rotation_rejects_empty_input() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        assert!(rotation(&[], start, 4).is_err());
        assert!(rotation(&[Uuid::new_v4()], start, 0).is_err());
    }

    #[test]
    fn test_stock_levels() {
        assert_eq!(stock_level(&item("Soap", 0, 2)), StockLevel::Out);
        assert_eq!(stock_level(&item("Soap", 2, 2)), StockLevel::Low);
        assert_eq!(stock_level(&item("Soap", 3, 2)), StockLevel::Ok);
    }

    #[test]
    fn test_adjusted_quantity_never_negative() {
        let soap = item("Soap", 3, 2);
        assert_eq!(adjusted_quantity(&soap, -3).unwrap(), 0);
        assert_eq!(adjusted_quantity(&soap, 5).unwrap(), 8);
        assert!(adjusted_quantity(&soap, -4).is_err());
    }

    #[test]
    fn test_restock_list_orders_out_first() {
        let items = vec![
            item("Paper towels", 1, 4),
            item("Bleach", 10, 2),
            item("Sponges", 0, 3),
        ];
        let list = restock_list(&items, 2);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "Sponges");
        assert_eq!(list[0].suggested, 6);
        assert_eq!(list[1].name, "Paper towels");
        assert_eq!(list[1].suggested, 7);
    }

    #[test]
    fn test_restock_list_huge_threshold_saturates() {
        let items = vec![item("Toner", 0, i64::MAX / 2 + 1)];
        let list = restock_list(&items, 2);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].suggested, i64::MAX);
    }

    #[test]
    fn test_adjusted_quantity_capped() {
        let gloves = item("Gloves", MAX_STOCK_QUANTITY - 1, 5);
        assert_eq!(adjusted_quantity(&gloves, 1).unwrap(), MAX_STOCK_QUANTITY);
        assert!(adjusted_quantity(&gloves, 2).is_err());
        assert!(adjusted_quantity(&gloves, i64::MAX).is_err());
    }
}
