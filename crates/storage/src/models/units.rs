use std::fmt;
use std::marker::PhantomData;
use std::ops::Add;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Mass dimension, base unit kilograms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Mass {}

/// Distance dimension, base unit meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Distance {}

/// Time dimension, base unit seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Time {}

/// A user-facing unit belonging to exactly one dimension.
///
/// The dimension travels in the type: [`to_base`] yields a `Canonical<Self::Dimension>`
/// and [`from_base`] only accepts a canonical value of the same dimension, so
/// applying a distance unit to a mass value does not compile.
pub trait Unit: Copy {
    type Dimension;

    /// Number of base units in one of this unit.
    fn factor(self) -> Decimal;

    fn symbol(self) -> &'static str;
}

/// A value expressed in the base unit of dimension `D`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Canonical<D> {
    value: Decimal,
    dimension: PhantomData<D>,
}

impl<D> Canonical<D> {
    /// Wraps a value that is already in base units, e.g. one read back from storage.
    pub fn new(value: Decimal) -> Self {
        Self {
            value,
            dimension: PhantomData,
        }
    }

    pub fn value(self) -> Decimal {
        self.value
    }
}

impl<D> Add for Canonical<D> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Canonical::new(self.value + rhs.value)
    }
}

/// Converts a value entered in `unit` to its dimension's base unit.
pub fn to_base<U: Unit>(value: Decimal, unit: U) -> Canonical<U::Dimension> {
    Canonical::new(value * unit.factor())
}

/// Converts a canonical value back into `unit` for display.
pub fn from_base<U: Unit>(value: Canonical<U::Dimension>, unit: U) -> Decimal {
    value.value() / unit.factor()
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "mass_unit", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MassUnit {
    #[default]
    Kilograms,
    Pounds,
    Pood,
}

impl MassUnit {
    pub const ALL: [MassUnit; 3] = [MassUnit::Kilograms, MassUnit::Pounds, MassUnit::Pood];
}

impl Unit for MassUnit {
    type Dimension = Mass;

    fn factor(self) -> Decimal {
        match self {
            MassUnit::Kilograms => Decimal::ONE,
            MassUnit::Pounds => Decimal::new(45_359_237, 8),
            MassUnit::Pood => Decimal::new(163_807, 4),
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            MassUnit::Kilograms => "kg",
            MassUnit::Pounds => "lb",
            MassUnit::Pood => "pood",
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "distance_unit", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DistanceUnit {
    #[default]
    Meters,
    Kilometers,
    Miles,
    Yards,
    Feet,
}

impl DistanceUnit {
    pub const ALL: [DistanceUnit; 5] = [
        DistanceUnit::Meters,
        DistanceUnit::Kilometers,
        DistanceUnit::Miles,
        DistanceUnit::Yards,
        DistanceUnit::Feet,
    ];
}

impl Unit for DistanceUnit {
    type Dimension = Distance;

    fn factor(self) -> Decimal {
        match self {
            DistanceUnit::Meters => Decimal::ONE,
            DistanceUnit::Kilometers => Decimal::new(1000, 0),
            DistanceUnit::Miles => Decimal::new(1_609_344, 3),
            DistanceUnit::Yards => Decimal::new(9144, 4),
            DistanceUnit::Feet => Decimal::new(3048, 4),
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            DistanceUnit::Meters => "m",
            DistanceUnit::Kilometers => "km",
            DistanceUnit::Miles => "mi",
            DistanceUnit::Yards => "yd",
            DistanceUnit::Feet => "ft",
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "time_unit", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Seconds,
    #[default]
    Minutes,
}

impl Unit for TimeUnit {
    type Dimension = Time;

    fn factor(self) -> Decimal {
        match self {
            TimeUnit::Seconds => Decimal::ONE,
            TimeUnit::Minutes => Decimal::new(60, 0),
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "min",
        }
    }
}

impl TimeUnit {
    /// Renders a canonical duration the way an athlete reads it on a whiteboard.
    pub fn format(self, total_seconds: i32) -> String {
        match self {
            TimeUnit::Seconds => format!("{}s", total_seconds),
            TimeUnit::Minutes => format!("{}:{:02}", total_seconds / 60, total_seconds % 60),
        }
    }
}

impl fmt::Display for MassUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for DistanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Units a score was entered in, kept so values can be shown back the same way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UnitPreferences {
    #[serde(default)]
    pub mass_unit: MassUnit,
    #[serde(default)]
    pub distance_unit: DistanceUnit,
    #[serde(default)]
    pub time_unit: TimeUnit,
}
