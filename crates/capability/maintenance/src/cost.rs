//! 维修费用
//!
//! 未录入（None）与录入为 0 是两种不同的状态：
//! 两项都未录入时总费用为 None，录入为 0 时总费用为 0。

use rust_decimal::Decimal;

/// 人工费与配件费合计。
pub fn total_cost(labor_cost: Option<Decimal>, parts_cost: Option<Decimal>) -> Option<Decimal> {
    match (labor_cost, parts_cost) {
        (Some(labor), Some(parts)) => Some(labor + parts),
        (Some(labor), None) => Some(labor),
        (None, Some(parts)) => Some(parts),
        (None, None) => None,
    }
}

/// 多条维修措施的总费用之和；没有任何费用数据时为 0。
pub fn sum_costs<I>(totals: I) -> Decimal
where
    I: IntoIterator<Item = Option<Decimal>>,
{
    totals.into_iter().flatten().sum()
}
