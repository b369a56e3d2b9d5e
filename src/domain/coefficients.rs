//! Coefficient resolution: the access surcharge and the three-tier
//! precedence chain for the economic percentages (project override →
//! active table row → hardcoded default).

use super::entities::{CoefficientKind, CoefficientRow, EconomicRates, Project};

// Well-known coefficient-table row names.
pub const COEFF_SAFETY: &str = "oneri_sicurezza";
pub const COEFF_OVERHEAD: &str = "spese_generali";
pub const COEFF_MARGIN: &str = "utile_impresa";
pub const COEFF_CONTINGENCY: &str = "contingenze";
pub const COEFF_VAT: &str = "iva_agevolata";
pub const COEFF_NO_ELEVATOR: &str = "piano_no_ascensore";

pub const DEFAULT_SAFETY_PCT: f64 = 0.02;
pub const DEFAULT_OVERHEAD_PCT: f64 = 0.10;
pub const DEFAULT_MARGIN_PCT: f64 = 0.10;
pub const DEFAULT_CONTINGENCY_PCT: f64 = 0.07;
pub const DEFAULT_VAT_PCT: f64 = 0.10;
/// Flat amount covering CILA, works supervision and APE.
pub const DEFAULT_PAPERWORK_AMOUNT: f64 = 3200.0;
pub const DEFAULT_ACCESS_SURCHARGE: f64 = 1.060;

/// Second multiplicative factor on every line, reserved for future use.
pub const COMPLEXITY_COEFFICIENT: f64 = 1.000;

/// Floor number from which hauling materials by stairs is surcharged.
const SURCHARGED_FLOOR: i32 = 3;

fn table_value(rows: &[CoefficientRow], kind: CoefficientKind, name: &str) -> Option<f64> {
    rows.iter()
        .find(|row| row.active && row.kind == kind && row.name == name)
        .map(|row| row.value)
}

/// Multiplicative surcharge for carrying materials up stairs: the
/// active `piano_no_ascensore` value (default 1.060) when the project
/// has no elevator and sits on floor >= 3, otherwise exactly 1.000.
/// Computed once per calculation and reused for every eligible line.
pub fn access_coefficient(project: &Project, rows: &[CoefficientRow]) -> f64 {
    let surcharged = !project.has_elevator
        && project.floor.map_or(false, |floor| floor >= SURCHARGED_FLOOR);
    if !surcharged {
        return 1.000;
    }
    table_value(rows, CoefficientKind::Access, COEFF_NO_ELEVATOR)
        .unwrap_or(DEFAULT_ACCESS_SURCHARGE)
}

/// Resolve the six economic parameters, once per calculation.
/// Precedence per parameter: project override, then the active
/// percentage row of the matching name, then the hardcoded default.
pub fn resolve_rates(project: &Project, rows: &[CoefficientRow]) -> EconomicRates {
    let pct = |name: &str| table_value(rows, CoefficientKind::Percentage, name);

    EconomicRates {
        safety: project
            .safety_pct
            .or_else(|| pct(COEFF_SAFETY))
            .unwrap_or(DEFAULT_SAFETY_PCT),
        overhead: project
            .overhead_pct
            .or_else(|| pct(COEFF_OVERHEAD))
            .unwrap_or(DEFAULT_OVERHEAD_PCT),
        margin: project
            .margin_pct
            .or_else(|| pct(COEFF_MARGIN))
            .unwrap_or(DEFAULT_MARGIN_PCT),
        contingency: project
            .contingency_pct
            .or_else(|| pct(COEFF_CONTINGENCY))
            .unwrap_or(DEFAULT_CONTINGENCY_PCT),
        vat: project
            .vat_pct
            .or_else(|| pct(COEFF_VAT))
            .unwrap_or(DEFAULT_VAT_PCT),
        paperwork: project
            .paperwork_amount
            .unwrap_or(DEFAULT_PAPERWORK_AMOUNT),
    }
}

/// The seed coefficient table: the five percentage rows plus the
/// no-elevator access surcharge, all active at their default values.
pub fn default_coefficients() -> Vec<CoefficientRow> {
    let percentage = |name: &str, value: f64| CoefficientRow {
        kind: CoefficientKind::Percentage,
        name: name.to_string(),
        value,
        active: true,
    };

    vec![
        percentage(COEFF_SAFETY, DEFAULT_SAFETY_PCT),
        percentage(COEFF_OVERHEAD, DEFAULT_OVERHEAD_PCT),
        percentage(COEFF_MARGIN, DEFAULT_MARGIN_PCT),
        percentage(COEFF_CONTINGENCY, DEFAULT_CONTINGENCY_PCT),
        percentage(COEFF_VAT, DEFAULT_VAT_PCT),
        CoefficientRow {
            kind: CoefficientKind::Access,
            name: COEFF_NO_ELEVATOR.to_string(),
            value: DEFAULT_ACCESS_SURCHARGE,
            active: true,
        },
    ]
}
