//! Fleet assembly - turns the two-size vehicle pool into the ordered
//! capacity list the solver wants, with the priority block first.

use crate::config::VehiclePriority;

#[derive(Debug, Clone)]
pub struct Fleet {
    /// Effective capacities (buffer seats subtracted), fleet order.
    pub capacities: Vec<i64>,
    /// Display tags like "16-seater", aligned with `capacities`.
    pub vehicle_types: Vec<String>,
    /// How many leading vehicles get the low fixed cost. Zero means all.
    pub priority_count: usize,
}

pub fn build_fleet(
    num_small: u32,
    num_large: u32,
    small_capacity: u32,
    large_capacity: u32,
    buffer_seats: u32,
    priority: VehiclePriority,
) -> Fleet {
    let effective_small = small_capacity.saturating_sub(buffer_seats).max(1) as i64;
    let effective_large = large_capacity.saturating_sub(buffer_seats).max(1) as i64;
    let small_tag = format!("{small_capacity}-seater");
    let large_tag = format!("{large_capacity}-seater");

    let mut capacities = Vec::with_capacity((num_small + num_large) as usize);
    let mut vehicle_types = Vec::with_capacity(capacities.capacity());

    // Larger vehicles lead except under `small` priority; `auto` keeps the
    // large-first order but prices every vehicle the same.
    let (priority_count, blocks) = match priority {
        VehiclePriority::Small => (
            num_small as usize,
            [(num_small, effective_small, &small_tag), (num_large, effective_large, &large_tag)],
        ),
        VehiclePriority::Large => (
            num_large as usize,
            [(num_large, effective_large, &large_tag), (num_small, effective_small, &small_tag)],
        ),
        VehiclePriority::Auto => (
            0,
            [(num_large, effective_large, &large_tag), (num_small, effective_small, &small_tag)],
        ),
    };

    for (count, capacity, tag) in blocks {
        for _ in 0..count {
            capacities.push(capacity);
            vehicle_types.push(tag.clone());
        }
    }

    Fleet {
        capacities,
        vehicle_types,
        priority_count,
    }
}
