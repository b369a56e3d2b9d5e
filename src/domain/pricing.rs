//! The pricing engine: per-line price resolution, category breakdown
//! and the economic formula cascade. Pure computation over snapshots
//! the caller has already fetched; no I/O, no shared state.

use std::collections::{BTreeMap, HashMap};

use super::coefficients::{access_coefficient, resolve_rates, COMPLEXITY_COEFFICIENT};
use super::entities::{
    Catalog, CoefficientRow, FinishTier, LineDetail, PriceOverride, Project, QuoteResult,
    Selection, Subcategory, SubcategoryId,
};

/// Unit of measure reported for flat-priced lines.
pub const LUMP_SUM_UNIT: &str = "a corpo";
/// Breakdown bucket for lines whose category has no usable name.
pub const FALLBACK_CATEGORY: &str = "Altro";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum QuoteError {
    #[error("no work items selected for this project")]
    NoSelections,
    #[error("none of the selected work items exists in the catalog")]
    NoPriceableLines,
}

/// Round a monetary value to 2 decimals, half away from zero.
/// Applied at the point values are stored into the result structure;
/// intermediate arithmetic stays at full precision.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Resolve one selection into a quote line.
///
/// Precedence, highest first: lump-sum amount (coefficients skipped),
/// per-project custom unit price, global override for the project's
/// tier, catalog tier price. The access coefficient applies only to
/// subcategories flagged for it; the complexity coefficient always.
pub fn price_line(
    selection: &Selection,
    subcategory: &Subcategory,
    category_name: &str,
    tier: FinishTier,
    global_override: Option<&PriceOverride>,
    access_coeff: f64,
    complexity_coeff: f64,
) -> LineDetail {
    let category = if category_name.trim().is_empty() {
        FALLBACK_CATEGORY
    } else {
        category_name
    };

    if let Some(amount) = selection.lump_sum() {
        return LineDetail {
            subcategory_id: selection.subcategory_id.clone(),
            code: subcategory.code.clone(),
            description: format!("{} ({LUMP_SUM_UNIT})", subcategory.name),
            quantity: 1.0,
            unit_price: round2(amount),
            base_unit_price: 0.0,
            subtotal: round2(amount),
            category: category.to_string(),
            unit: LUMP_SUM_UNIT.to_string(),
            applies_access_surcharge: false,
        };
    }

    let base_price = subcategory.tier_price(tier);

    let mut unsurcharged = base_price;
    if let Some(row) = global_override {
        if let Some(price) = row.for_tier(tier) {
            unsurcharged = price;
        }
    }
    if let Some(custom) = selection.custom_price() {
        unsurcharged = custom;
    }

    let mut final_price = unsurcharged;
    if subcategory.applies_access_surcharge {
        final_price *= access_coeff;
    }
    final_price *= complexity_coeff;

    let subtotal = selection.quantity * final_price;

    LineDetail {
        subcategory_id: selection.subcategory_id.clone(),
        code: subcategory.code.clone(),
        description: subcategory.name.clone(),
        quantity: round2(selection.quantity),
        unit_price: round2(final_price),
        base_unit_price: round2(base_price),
        subtotal: round2(subtotal),
        category: category.to_string(),
        unit: subcategory.unit.clone(),
        applies_access_surcharge: subcategory.applies_access_surcharge,
    }
}

/// Group line subtotals by category display name. Each category sum is
/// accumulated from the already-rounded line subtotals, then rounded
/// again independently.
pub fn category_breakdown(lines: &[LineDetail]) -> BTreeMap<String, f64> {
    let mut breakdown: BTreeMap<String, f64> = BTreeMap::new();
    for line in lines {
        *breakdown.entry(line.category.clone()).or_insert(0.0) += line.subtotal;
    }
    for total in breakdown.values_mut() {
        *total = round2(*total);
    }
    breakdown
}

/// Compute the full quote for a project's bill of quantities.
///
/// Deterministic and side-effect-free: identical inputs produce a
/// structurally identical `QuoteResult`. Selections referencing a
/// subcategory missing from the catalog are silently dropped; an empty
/// selection set, or one in which no line resolves, fails the whole
/// call with no partial result.
///
/// Quantities and prices are taken as given: negative values pass
/// through unvalidated, so callers holding untrusted input must
/// validate before invoking the engine.
pub fn compute_quote(
    project: &Project,
    selections: &[Selection],
    catalog: &Catalog,
    overrides: &HashMap<SubcategoryId, PriceOverride>,
    coefficients: &[CoefficientRow],
) -> Result<QuoteResult, QuoteError> {
    if selections.is_empty() {
        return Err(QuoteError::NoSelections);
    }

    let access = access_coefficient(project, coefficients);
    let complexity = COMPLEXITY_COEFFICIENT;

    let mut lines = Vec::with_capacity(selections.len());
    for selection in selections {
        let Some((category, subcategory)) = catalog.find(&selection.subcategory_id) else {
            continue;
        };
        lines.push(price_line(
            selection,
            subcategory,
            &category.name,
            project.finish_tier,
            overrides.get(&selection.subcategory_id),
            access,
            complexity,
        ));
    }

    if lines.is_empty() {
        return Err(QuoteError::NoPriceableLines);
    }

    // Lavori base: sum of the rounded line subtotals.
    let base_works: f64 = lines.iter().map(|line| line.subtotal).sum();
    let breakdown = category_breakdown(&lines);

    let rates = resolve_rates(project, coefficients);

    // The cascade runs on raw intermediates; each figure is rounded
    // only when stored below. Paperwork is a flat amount passed
    // through as given.
    let safety_charges = base_works * rates.safety;
    let overhead = base_works * rates.overhead;
    let contractor_margin = (base_works + overhead) * rates.margin;
    let paperwork = rates.paperwork;
    let contingency = (base_works + overhead + contractor_margin) * rates.contingency;

    let taxable_base =
        base_works + safety_charges + overhead + contractor_margin + paperwork + contingency;
    let vat = taxable_base * rates.vat;
    let grand_total = taxable_base + vat;

    Ok(QuoteResult {
        base_works: round2(base_works),
        safety_charges: round2(safety_charges),
        overhead: round2(overhead),
        contractor_margin: round2(contractor_margin),
        paperwork,
        contingency: round2(contingency),
        taxable_base: round2(taxable_base),
        vat: round2(vat),
        grand_total: round2(grand_total),
        category_breakdown: breakdown,
        access_coefficient: access,
        complexity_coefficient: complexity,
        lines,
    })
}

/// Read-only snapshot of the three collaborator datasets a calculation
/// needs. Fetched once by the caller and never mutated by the engine,
/// so repeated computations over the same context are independent.
#[derive(Clone, Debug, Default)]
pub struct PricingContext {
    pub catalog: Catalog,
    pub overrides: HashMap<SubcategoryId, PriceOverride>,
    pub coefficients: Vec<CoefficientRow>,
}

impl PricingContext {
    pub fn compute(
        &self,
        project: &Project,
        selections: &[Selection],
    ) -> Result<QuoteResult, QuoteError> {
        compute_quote(
            project,
            selections,
            &self.catalog,
            &self.overrides,
            &self.coefficients,
        )
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::domain::entities::{Category, FinishTier, Project};

    fn subcategory(id: &str, code: &str, standard: f64, access: bool) -> Subcategory {
        Subcategory {
            id: id.to_string(),
            code: code.to_string(),
            name: format!("Work {code}"),
            description: None,
            unit: "mq".to_string(),
            price_standard: standard,
            price_economy: None,
            price_premium: None,
            sort_order: 0,
            active: true,
            applies_access_surcharge: access,
        }
    }

    fn category(name: &str, subcategories: Vec<Subcategory>) -> Category {
        Category {
            id: format!("cat-{name}"),
            code: name.chars().take(3).collect(),
            name: name.to_string(),
            description: None,
            sort_order: 0,
            active: true,
            subcategories,
        }
    }

    fn catalog() -> Catalog {
        Catalog {
            categories: vec![
                category(
                    "Demolizioni",
                    vec![subcategory("s-demo", "D.01", 100.0, true)],
                ),
                category(
                    "Pavimenti",
                    vec![subcategory("s-pav", "P.01", 45.5, false)],
                ),
            ],
        }
    }

    fn selection(id: &str, quantity: f64) -> Selection {
        Selection {
            subcategory_id: id.to_string(),
            quantity,
            ..Selection::default()
        }
    }

    fn ground_floor_project() -> Project {
        Project {
            floor: Some(0),
            has_elevator: true,
            ..Project::draft("test")
        }
    }

    #[test]
    fn worked_cascade_example() {
        let catalog = Catalog {
            categories: vec![category(
                "Opere",
                vec![subcategory("s-1", "O.01", 1000.0, false)],
            )],
        };
        let quote = compute_quote(
            &ground_floor_project(),
            &[selection("s-1", 1.0)],
            &catalog,
            &HashMap::new(),
            &[],
        )
        .unwrap();

        assert_eq!(quote.base_works, 1000.0);
        assert_eq!(quote.safety_charges, 20.0);
        assert_eq!(quote.overhead, 100.0);
        assert_eq!(quote.contractor_margin, 110.0);
        assert_eq!(quote.paperwork, 3200.0);
        assert_eq!(quote.contingency, 84.7);
        assert_eq!(quote.taxable_base, 4514.7);
        assert_eq!(quote.vat, 451.47);
        assert_eq!(quote.grand_total, 4966.17);
        assert_eq!(quote.access_coefficient, 1.0);
        assert_eq!(quote.complexity_coefficient, 1.0);
    }

    #[test]
    fn empty_selection_set_is_fatal() {
        let err = compute_quote(
            &ground_floor_project(),
            &[],
            &catalog(),
            &HashMap::new(),
            &[],
        )
        .unwrap_err();
        assert_eq!(err, QuoteError::NoSelections);
    }

    #[test]
    fn missing_subcategories_are_dropped_silently() {
        let quote = compute_quote(
            &ground_floor_project(),
            &[selection("s-pav", 10.0), selection("s-vanished", 4.0)],
            &catalog(),
            &HashMap::new(),
            &[],
        )
        .unwrap();

        assert_eq!(quote.lines.len(), 1);
        assert_eq!(quote.base_works, 455.0);
    }

    #[test]
    fn all_selections_missing_is_fatal() {
        let err = compute_quote(
            &ground_floor_project(),
            &[selection("s-vanished", 4.0)],
            &catalog(),
            &HashMap::new(),
            &[],
        )
        .unwrap_err();
        assert_eq!(err, QuoteError::NoPriceableLines);
    }

    #[test]
    fn lump_sum_overrides_quantity_and_catalog_price() {
        let sel = Selection {
            subcategory_id: "s-demo".to_string(),
            quantity: 12.0,
            custom_unit_price: Some(77.0),
            lump_sum_price: Some(5000.0),
            use_lump_sum: true,
        };
        // Floor 5 without elevator: the surcharge would apply, but
        // lump-sum lines skip coefficients entirely.
        let project = Project {
            floor: Some(5),
            has_elevator: false,
            ..Project::draft("walk-up")
        };
        let quote =
            compute_quote(&project, &[sel], &catalog(), &HashMap::new(), &[]).unwrap();

        let line = &quote.lines[0];
        assert_eq!(line.quantity, 1.0);
        assert_eq!(line.unit, LUMP_SUM_UNIT);
        assert_eq!(line.unit_price, 5000.0);
        assert_eq!(line.base_unit_price, 0.0);
        assert_eq!(line.subtotal, 5000.0);
        assert_eq!(line.description, "Work D.01 (a corpo)");
        assert!(!line.applies_access_surcharge);
        assert_eq!(quote.base_works, 5000.0);
    }

    #[test]
    fn zero_lump_sum_falls_back_to_unit_pricing() {
        let sel = Selection {
            subcategory_id: "s-pav".to_string(),
            quantity: 2.0,
            lump_sum_price: Some(0.0),
            use_lump_sum: true,
            ..Selection::default()
        };
        let quote =
            compute_quote(&ground_floor_project(), &[sel], &catalog(), &HashMap::new(), &[])
                .unwrap();
        assert_eq!(quote.lines[0].unit, "mq");
        assert_eq!(quote.lines[0].subtotal, 91.0);
    }

    #[test]
    fn price_precedence_all_presence_combinations() {
        // Catalog P=100, global override G=90, project custom C=80.
        let sub = subcategory("s-x", "X.01", 100.0, false);
        let cat_name = "Opere";
        let tier = FinishTier::Standard;

        for (custom_set, override_set) in
            [(false, false), (false, true), (true, false), (true, true)]
        {
            let global = PriceOverride {
                subcategory_id: "s-x".to_string(),
                economy: None,
                standard: override_set.then_some(90.0),
                premium: None,
                note: None,
            };
            let sel = Selection {
                subcategory_id: "s-x".to_string(),
                quantity: 1.0,
                custom_unit_price: custom_set.then_some(80.0),
                ..Selection::default()
            };

            let expected = if custom_set {
                80.0
            } else if override_set {
                90.0
            } else {
                100.0
            };

            // With and without the override row present at all.
            let with_row = price_line(&sel, &sub, cat_name, tier, Some(&global), 1.0, 1.0);
            assert_eq!(with_row.unit_price, expected);

            let without_row = price_line(&sel, &sub, cat_name, tier, None, 1.0, 1.0);
            let expected_no_row = if custom_set { 80.0 } else { 100.0 };
            assert_eq!(without_row.unit_price, expected_no_row);
        }
    }

    #[test]
    fn override_row_without_matching_tier_field_keeps_catalog_price() {
        let sub = subcategory("s-x", "X.01", 100.0, false);
        let global = PriceOverride {
            subcategory_id: "s-x".to_string(),
            economy: Some(70.0),
            standard: None,
            premium: None,
            note: None,
        };
        let line = price_line(
            &selection("s-x", 1.0),
            &sub,
            "Opere",
            FinishTier::Standard,
            Some(&global),
            1.0,
            1.0,
        );
        assert_eq!(line.unit_price, 100.0);
    }

    #[test]
    fn tier_price_falls_back_to_standard_only_when_absent() {
        let mut sub = subcategory("s-x", "X.01", 100.0, false);
        assert_eq!(sub.tier_price(FinishTier::Economy), 100.0);
        assert_eq!(sub.tier_price(FinishTier::Premium), 100.0);

        sub.price_economy = Some(0.0);
        sub.price_premium = Some(130.0);
        // Zero is a real price, not "absent".
        assert_eq!(sub.tier_price(FinishTier::Economy), 0.0);
        assert_eq!(sub.tier_price(FinishTier::Premium), 130.0);
    }

    #[test]
    fn access_surcharge_hits_only_flagged_lines() {
        let project = Project {
            floor: Some(4),
            has_elevator: false,
            ..Project::draft("walk-up")
        };
        let quote = compute_quote(
            &project,
            &[selection("s-demo", 1.0), selection("s-pav", 1.0)],
            &catalog(),
            &HashMap::new(),
            &[],
        )
        .unwrap();

        assert_eq!(quote.access_coefficient, 1.06);
        let demo = quote.lines.iter().find(|l| l.code == "D.01").unwrap();
        let pav = quote.lines.iter().find(|l| l.code == "P.01").unwrap();
        assert_eq!(demo.unit_price, 106.0);
        assert_eq!(demo.base_unit_price, 100.0);
        assert_eq!(pav.unit_price, 45.5);
    }

    #[test]
    fn subtotal_rounds_the_full_precision_product() {
        let quote = compute_quote(
            &ground_floor_project(),
            &[selection("s-pav", 3.33)],
            &catalog(),
            &HashMap::new(),
            &[],
        )
        .unwrap();
        // 3.33 * 45.5 = 151.515 -> 151.52 (half away from zero)
        assert_eq!(quote.lines[0].subtotal, 151.52);
    }

    #[test]
    fn breakdown_sums_to_base_works() {
        let quote = compute_quote(
            &ground_floor_project(),
            &[selection("s-demo", 3.0), selection("s-pav", 7.5)],
            &catalog(),
            &HashMap::new(),
            &[],
        )
        .unwrap();

        let breakdown_total: f64 = quote.category_breakdown.values().sum();
        assert_eq!(round2(breakdown_total), quote.base_works);
        assert_eq!(quote.category_breakdown["Demolizioni"], 300.0);
        assert_eq!(quote.category_breakdown["Pavimenti"], 341.25);
    }

    #[test]
    fn unnamed_category_buckets_under_fallback_label() {
        let catalog = Catalog {
            categories: vec![category("", vec![subcategory("s-1", "A.01", 10.0, false)])],
        };
        let quote = compute_quote(
            &ground_floor_project(),
            &[selection("s-1", 2.0)],
            &catalog,
            &HashMap::new(),
            &[],
        )
        .unwrap();
        assert_eq!(quote.category_breakdown[FALLBACK_CATEGORY], 20.0);
    }

    #[test]
    fn identical_inputs_give_identical_results() {
        let context = PricingContext {
            catalog: catalog(),
            overrides: HashMap::new(),
            coefficients: crate::domain::coefficients::default_coefficients(),
        };
        let project = Project {
            floor: Some(3),
            has_elevator: false,
            finish_tier: FinishTier::Premium,
            ..Project::draft("repeat")
        };
        let selections = vec![selection("s-demo", 2.0), selection("s-pav", 4.0)];

        let first = context.compute(&project, &selections).unwrap();
        let second = context.compute(&project, &selections).unwrap();
        assert_eq!(first, second);
    }
}
