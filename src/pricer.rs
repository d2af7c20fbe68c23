use log::{debug, info};
use std::collections::HashMap;

use crate::models::{PriceModifier, Route, Segment, Vehicle};

pub const ROAD_TYPE: &str = "RoadType";
pub const REGION: &str = "Region";
pub const VEHICLE_CATEGORY: &str = "VehicleCategory";
pub const FUEL_TYPE: &str = "FuelType";

/// Percentage encoded by a modifier value: below 1.0 the value is a decrease
/// of `value * 100` percent, from 1.0 upwards an increase of
/// `value * 100 - 100` percent.
pub fn to_int_percent(value: f64) -> i32 {
    if value < 1.0 {
        (value * 100.0) as i32
    } else {
        (value * 100.0) as i32 - 100
    }
}

/// Multiplier for an increase of `percent`.
pub fn int_to_percent(percent: i32) -> f64 {
    (percent as f64 + 100.0) / 100.0
}

/// Mean modifier value over a set of candidate tags; unmatched tags count as
/// `default`, as does an empty tag set.
pub fn average_modifier<S: AsRef<str>>(
    tags: &[S],
    lookup: Option<&HashMap<String, f64>>,
    default: f64,
) -> f64 {
    if tags.is_empty() {
        return default;
    }
    let total: f64 = tags
        .iter()
        .map(|tag| {
            lookup
                .and_then(|values| values.get(tag.as_ref()))
                .copied()
                .unwrap_or(default)
        })
        .sum();
    total / tags.len() as f64
}

/// Price modifiers indexed by `(kind, name)`.
#[derive(Debug, Clone, Default)]
pub struct ModifierTable {
    by_kind: HashMap<String, HashMap<String, f64>>,
}

impl ModifierTable {
    pub fn new(modifiers: &[PriceModifier]) -> Self {
        let mut by_kind: HashMap<String, HashMap<String, f64>> = HashMap::new();
        for modifier in modifiers {
            by_kind
                .entry(modifier.kind.clone())
                .or_default()
                .insert(modifier.name.clone(), modifier.value);
        }
        Self { by_kind }
    }

    pub fn kind(&self, kind: &str) -> Option<&HashMap<String, f64>> {
        self.by_kind.get(kind)
    }

    pub fn average<S: AsRef<str>>(&self, kind: &str, tags: &[S], default: f64) -> f64 {
        average_modifier(tags, self.kind(kind), default)
    }
}

/// Combination formula for one segment's price.
pub trait PricingStrategy: Send + Sync {
    fn price(&self, segment: &Segment, vehicle: &Vehicle, modifiers: &ModifierTable) -> f64;
}

/// Legacy behaviour: every segment is free.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroPricing;

impl PricingStrategy for ZeroPricing {
    fn price(&self, _segment: &Segment, _vehicle: &Vehicle, _modifiers: &ModifierTable) -> f64 {
        0.0
    }
}

/// `base per km * km * road * region * vehicle category * fuel type`, each
/// factor being the averaged modifier value for the relevant tags.
#[derive(Debug, Clone)]
pub struct ModifierPricing {
    pub base_price_per_km: f64,
    pub regions: Vec<String>,
}

impl PricingStrategy for ModifierPricing {
    fn price(&self, segment: &Segment, vehicle: &Vehicle, modifiers: &ModifierTable) -> f64 {
        let road = modifiers.average(ROAD_TYPE, segment.way.pricing_classes(), 1.0);
        let region = modifiers.average(REGION, self.regions.as_slice(), 1.0);
        let category = modifiers.average(VEHICLE_CATEGORY, &[&vehicle.classification], 1.0);
        let fuel = modifiers.average(FUEL_TYPE, &[&vehicle.fuel_type], 1.0);

        debug!(
            "Way {}: road {:+}%, region {:+}%, category {:+}%, fuel {:+}%",
            segment.way.id,
            to_int_percent(road),
            to_int_percent(region),
            to_int_percent(category),
            to_int_percent(fuel)
        );

        let kilometers = segment.way.length_meters / 1000.0;
        self.base_price_per_km * kilometers * road * region * category * fuel
    }
}

/// Applies a pricing strategy to every segment of a route.
pub struct Pricer {
    strategy: Box<dyn PricingStrategy>,
}

impl Pricer {
    pub fn new(strategy: Box<dyn PricingStrategy>) -> Self {
        Self { strategy }
    }

    /// Prices each segment, mirrors the price onto its way and recomputes
    /// the route total.
    pub fn price(&self, mut route: Route, vehicle: &Vehicle, modifiers: &[PriceModifier]) -> Route {
        let table = ModifierTable::new(modifiers);

        for segment in route.segments.iter_mut() {
            let price = self.strategy.price(segment, vehicle, &table);
            segment.price = price;
            segment.way.price = Some(price);
        }
        route.recompute_total();

        info!(
            "Priced route {} for vehicle {}: {:.2} over {} segments",
            route.id,
            vehicle.id,
            route.total_price,
            route.segments.len()
        );
        route
    }
}

impl Default for Pricer {
    fn default() -> Self {
        Self::new(Box::new(ZeroPricing))
    }
}
