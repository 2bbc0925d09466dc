//! Validation and pricing shared by every `OrderStore`.
//!
//! Both functions are pure: stores call them on rows they already hold locks
//! on, so the stock check and the decrement see the same quantities.
use bigdecimal::BigDecimal;
use std::collections::{BTreeMap, HashMap};

use crate::model::{OrderItemRequest, Variant};
use crate::OrderError;

#[derive(Debug, Clone)]
pub struct PlannedLine {
    pub variant: Variant,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

#[derive(Debug, Clone)]
pub struct OrderPlan {
    pub lines: Vec<PlannedLine>,
    pub total_price: BigDecimal,
}

/// Merge duplicate variants, keyed in ascending id order (the row lock order).
pub fn condense_items(items: &[OrderItemRequest]) -> Result<BTreeMap<i64, i32>, OrderError> {
    if items.is_empty() {
        return Err(OrderError::InvalidRequest("order must contain at least one product".into()));
    }
    let mut condensed: BTreeMap<i64, i32> = BTreeMap::new();
    for item in items {
        if item.quantity <= 0 {
            return Err(OrderError::InvalidRequest(format!(
                "quantity for product size {} must be greater than 0",
                item.variant_id
            )));
        }
        let entry = condensed.entry(item.variant_id).or_insert(0);
        *entry = entry.checked_add(item.quantity).ok_or_else(|| {
            OrderError::InvalidRequest(format!("quantity for product size {} is too large", item.variant_id))
        })?;
    }
    Ok(condensed)
}

/// Check every requested variant against `variants` and price the order.
///
/// Fails on the first problem without side effects: unknown ids first (all of
/// them, sorted), then the first line short on stock.
pub fn plan_order(requested: &BTreeMap<i64, i32>, variants: &[Variant]) -> Result<OrderPlan, OrderError> {
    let by_id: HashMap<i64, &Variant> = variants.iter().map(|v| (v.variant_id, v)).collect();

    let missing: Vec<i64> = requested.keys().filter(|id| !by_id.contains_key(id)).copied().collect();
    if !missing.is_empty() {
        return Err(OrderError::VariantsNotFound(missing));
    }

    let mut lines = Vec::with_capacity(requested.len());
    for (variant_id, quantity) in requested {
        let variant = by_id[variant_id];
        if variant.quantity_available < *quantity {
            return Err(OrderError::InsufficientStock {
                variant_id: *variant_id,
                requested: *quantity,
                available: variant.quantity_available,
            });
        }
        lines.push(PlannedLine {
            variant: variant.clone(),
            quantity: *quantity,
            unit_price: common_money::normalize_scale(variant.unit_price()),
        });
    }

    let total_price = common_money::sum_line_totals(lines.iter().map(|l| (&l.unit_price, l.quantity)));
    if !common_money::is_positive(&total_price) {
        return Err(OrderError::InvalidRequest("order total must be greater than 0".into()));
    }
    Ok(OrderPlan { lines, total_price })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::variant;
    use std::str::FromStr;

    fn items(pairs: &[(i64, i32)]) -> Vec<OrderItemRequest> {
        pairs.iter().map(|(v, q)| OrderItemRequest { variant_id: *v, quantity: *q }).collect()
    }

    #[test]
    fn duplicates_are_merged() {
        let condensed = condense_items(&items(&[(3, 1), (1, 2), (3, 2)])).unwrap();
        assert_eq!(condensed.into_iter().collect::<Vec<_>>(), vec![(1, 2), (3, 3)]);
    }

    #[test]
    fn empty_and_non_positive_rejected() {
        assert!(matches!(condense_items(&[]), Err(OrderError::InvalidRequest(_))));
        assert!(matches!(condense_items(&items(&[(1, 0)])), Err(OrderError::InvalidRequest(_))));
        assert!(matches!(condense_items(&items(&[(1, i32::MAX), (1, 1)])), Err(OrderError::InvalidRequest(_))));
    }

    #[test]
    fn missing_ids_reported_together() {
        let requested = condense_items(&items(&[(9, 1), (1, 1), (7, 1)])).unwrap();
        let err = plan_order(&requested, &[variant(1, "10.00", 5)]).unwrap_err();
        assert!(matches!(err, OrderError::VariantsNotFound(ids) if ids == vec![7, 9]));
    }

    #[test]
    fn merged_quantity_checked_against_stock() {
        let requested = condense_items(&items(&[(1, 1), (1, 2)])).unwrap();
        let err = plan_order(&requested, &[variant(1, "10.00", 2)]).unwrap_err();
        assert!(matches!(
            err,
            OrderError::InsufficientStock { variant_id: 1, requested: 3, available: 2 }
        ));
    }

    #[test]
    fn discount_price_used_and_total_exact() {
        let mut discounted = variant(2, "100.00", 10);
        discounted.discount_price = Some(BigDecimal::from_str("0.10").unwrap());
        let requested = condense_items(&items(&[(1, 2), (2, 3)])).unwrap();
        let plan = plan_order(&requested, &[variant(1, "0.20", 5), discounted]).unwrap();
        assert_eq!(plan.total_price, BigDecimal::from_str("0.70").unwrap());
        assert_eq!(plan.lines[1].unit_price, BigDecimal::from_str("0.10").unwrap());
    }

    #[test]
    fn zero_total_rejected() {
        let requested = condense_items(&items(&[(1, 1)])).unwrap();
        let err = plan_order(&requested, &[variant(1, "0.00", 1)]).unwrap_err();
        assert!(matches!(err, OrderError::InvalidRequest(_)));
    }
}
