//! Per-symbol market facts the engine keys on: pip geometry, contract
//! sizing, minimum lots and the structural thresholds that scale with the
//! instrument (minimum FVG size, stop-loss buffer).

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolClass {
    Forex,
    Metal,
    Index,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSpec {
    pub class: SymbolClass,
    /// Price distance of one pip (one point for indices)
    pub pip_size: Decimal,
    /// Quote-currency value of one pip per unit of the contract
    pub pip_value: Decimal,
    /// Units per standard lot
    pub contract_size: Decimal,
    /// Quote-currency value of one point for one lot (indices)
    pub point_value_per_lot: Decimal,
    pub min_lot: Decimal,
    /// Minimum FVG gap considered meaningful on this instrument
    pub min_gap_size: Decimal,
    /// Minimum stop-loss distance beyond the structural anchor
    pub sl_buffer: Decimal,
    /// Volatile instruments use the tighter ITF window for premium/discount
    pub volatile: bool,
}

impl SymbolSpec {
    pub fn is_index(&self) -> bool {
        self.class == SymbolClass::Index
    }

    /// Price distance expressed in pips (points for indices)
    pub fn to_pips(&self, distance: Decimal) -> Decimal {
        if self.pip_size <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        distance / self.pip_size
    }
}

/// Resolve the spec for a broker symbol. Unknown symbols fall back to
/// standard FX geometry.
pub fn spec_for(symbol: &str) -> SymbolSpec {
    match symbol.to_uppercase().as_str() {
        "XAUUSD" => SymbolSpec {
            class: SymbolClass::Metal,
            pip_size: dec!(0.1),
            pip_value: dec!(0.1),
            contract_size: dec!(100),
            point_value_per_lot: dec!(100),
            min_lot: dec!(0.01),
            min_gap_size: dec!(0.5),
            sl_buffer: dec!(1.0),
            volatile: true,
        },
        "XAGUSD" => SymbolSpec {
            class: SymbolClass::Metal,
            pip_size: dec!(0.01),
            pip_value: dec!(0.01),
            contract_size: dec!(5000),
            point_value_per_lot: dec!(50),
            min_lot: dec!(0.01),
            min_gap_size: dec!(0.02),
            sl_buffer: dec!(0.03),
            volatile: true,
        },
        "US30" | "DJ30" => SymbolSpec {
            class: SymbolClass::Index,
            pip_size: dec!(1.0),
            pip_value: dec!(1.0),
            contract_size: dec!(1),
            point_value_per_lot: dec!(1.0),
            min_lot: dec!(0.1),
            min_gap_size: dec!(5.0),
            sl_buffer: dec!(5.0),
            volatile: true,
        },
        "NAS100" | "USTEC" => SymbolSpec {
            class: SymbolClass::Index,
            pip_size: dec!(1.0),
            pip_value: dec!(1.0),
            contract_size: dec!(1),
            point_value_per_lot: dec!(1.0),
            min_lot: dec!(0.1),
            min_gap_size: dec!(3.0),
            sl_buffer: dec!(3.0),
            volatile: true,
        },
        _ => SymbolSpec {
            class: SymbolClass::Forex,
            pip_size: dec!(0.0001),
            pip_value: dec!(0.0001),
            contract_size: dec!(100000),
            point_value_per_lot: dec!(10),
            min_lot: dec!(0.01),
            min_gap_size: dec!(0.0001),
            sl_buffer: dec!(0.0001),
            volatile: false,
        },
    }
}
