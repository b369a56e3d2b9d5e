use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identifier for catalog categories.
pub type CategoryId = String;
/// Identifier for catalog subcategories (billable work types).
pub type SubcategoryId = String;

/// Finish tier selecting which catalog price column applies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishTier {
    Economy,
    #[default]
    Standard,
    Premium,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Draft,
    Confirmed,
    Archived,
}

/// One renovation estimate. Read-only input during calculation; a new
/// version is created (see the store's duplicate operation) instead of
/// mutating an existing project in place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub floor_area_sqm: f64,
    pub floor: Option<i32>,
    pub has_elevator: bool,
    #[serde(default)]
    pub finish_tier: FinishTier,
    #[serde(default)]
    pub status: ProjectStatus,
    /// Per-project economic overrides. `None` falls back to the active
    /// coefficient-table row, then to the hardcoded default.
    #[serde(default)]
    pub safety_pct: Option<f64>,
    #[serde(default)]
    pub overhead_pct: Option<f64>,
    #[serde(default)]
    pub margin_pct: Option<f64>,
    #[serde(default)]
    pub paperwork_amount: Option<f64>,
    #[serde(default)]
    pub contingency_pct: Option<f64>,
    #[serde(default)]
    pub vat_pct: Option<f64>,
    /// Set when this project was cloned from another one.
    #[serde(default)]
    pub source_project_id: Option<String>,
    #[serde(default)]
    pub duplicated_from: Option<String>,
    /// Unix seconds; maintained by the store, drives newest-first
    /// project listing.
    #[serde(default)]
    pub updated_at: u64,
}

impl Project {
    /// A blank draft with the given name. Id and timestamp are assigned
    /// by the store on insert.
    pub fn draft(name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            floor_area_sqm: 0.0,
            floor: None,
            has_elevator: false,
            finish_tier: FinishTier::default(),
            status: ProjectStatus::Draft,
            safety_pct: None,
            overhead_pct: None,
            margin_pct: None,
            paperwork_amount: None,
            contingency_pct: None,
            vat_pct: None,
            source_project_id: None,
            duplicated_from: None,
            updated_at: 0,
        }
    }
}

/// Catalog category grouping related work types.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub sort_order: i32,
    pub active: bool,
    pub subcategories: Vec<Subcategory>,
}

/// One billable work type with its three list prices.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subcategory {
    pub id: SubcategoryId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    /// Unit of measure, e.g. "mq", "ml", "cad".
    pub unit: String,
    /// Standard list price, always present and non-negative.
    pub price_standard: f64,
    /// Optional tier prices. `None` means "use standard", never zero.
    pub price_economy: Option<f64>,
    pub price_premium: Option<f64>,
    pub sort_order: i32,
    pub active: bool,
    /// Whether the access surcharge applies to this work type
    /// (materials carried by hand on upper floors).
    pub applies_access_surcharge: bool,
}

impl Subcategory {
    /// Catalog list price for a finish tier. A missing economy/premium
    /// price falls back to the standard column; `Some(0.0)` is a valid
    /// price and does not fall back.
    pub fn tier_price(&self, tier: FinishTier) -> f64 {
        match tier {
            FinishTier::Economy => self.price_economy.unwrap_or(self.price_standard),
            FinishTier::Premium => self.price_premium.unwrap_or(self.price_standard),
            FinishTier::Standard => self.price_standard,
        }
    }
}

/// Ordered categories, each with its ordered subcategories.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub categories: Vec<Category>,
}

impl Catalog {
    /// Look up a subcategory together with its owning category.
    pub fn find(&self, subcategory_id: &str) -> Option<(&Category, &Subcategory)> {
        self.categories.iter().find_map(|category| {
            category
                .subcategories
                .iter()
                .find(|sub| sub.id == subcategory_id)
                .map(|sub| (category, sub))
        })
    }

    pub fn find_category(&self, category_id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == category_id)
    }
}

/// Global custom price for one subcategory, applied across all
/// projects. Each tier field is an independent optional override;
/// `None` means "no override for that tier", not zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceOverride {
    pub subcategory_id: SubcategoryId,
    pub economy: Option<f64>,
    pub standard: Option<f64>,
    pub premium: Option<f64>,
    pub note: Option<String>,
}

impl PriceOverride {
    pub fn for_tier(&self, tier: FinishTier) -> Option<f64> {
        match tier {
            FinishTier::Economy => self.economy,
            FinishTier::Standard => self.standard,
            FinishTier::Premium => self.premium,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoefficientKind {
    Percentage,
    Access,
}

/// One named constant from the coefficient table. Inactive rows are
/// ignored by the resolvers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoefficientRow {
    pub kind: CoefficientKind,
    pub name: String,
    pub value: f64,
    pub active: bool,
}

/// One line of a project's bill of quantities.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub subcategory_id: SubcategoryId,
    pub quantity: f64,
    /// Per-project custom unit price; wins over the global override and
    /// the catalog price.
    #[serde(default)]
    pub custom_unit_price: Option<f64>,
    /// Flat price for the whole line, used only with `use_lump_sum`.
    #[serde(default)]
    pub lump_sum_price: Option<f64>,
    #[serde(default)]
    pub use_lump_sum: bool,
}

impl Selection {
    /// Lump-sum amount when the line is both flagged and priced as one.
    /// A zero amount counts as unset and falls through to unit pricing.
    pub fn lump_sum(&self) -> Option<f64> {
        if !self.use_lump_sum {
            return None;
        }
        self.lump_sum_price.filter(|amount| *amount != 0.0)
    }

    /// Per-project custom unit price; zero counts as unset.
    pub fn custom_price(&self) -> Option<f64> {
        self.custom_unit_price.filter(|price| *price != 0.0)
    }
}

/// The six economic parameters after precedence resolution. All but
/// `paperwork` are fractions of the relevant base; `paperwork` is a
/// flat currency amount.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EconomicRates {
    pub safety: f64,
    pub overhead: f64,
    pub margin: f64,
    pub contingency: f64,
    pub vat: f64,
    pub paperwork: f64,
}

/// One resolved line of the quote detail.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineDetail {
    pub subcategory_id: SubcategoryId,
    pub code: String,
    pub description: String,
    pub quantity: f64,
    /// Unit price after coefficients (or the lump-sum amount).
    pub unit_price: f64,
    /// Catalog tier price before any override or coefficient.
    pub base_unit_price: f64,
    pub subtotal: f64,
    pub category: String,
    pub unit: String,
    pub applies_access_surcharge: bool,
}

/// Deterministic output of the pricing engine. Treated as an immutable
/// snapshot once persisted; recalculation always produces a new value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteResult {
    /// Lavori base: sum of all line subtotals.
    pub base_works: f64,
    pub safety_charges: f64,
    pub overhead: f64,
    pub contractor_margin: f64,
    pub paperwork: f64,
    pub contingency: f64,
    /// Imponibile: base works plus all surcharges, before VAT.
    pub taxable_base: f64,
    pub vat: f64,
    pub grand_total: f64,
    pub category_breakdown: BTreeMap<String, f64>,
    pub access_coefficient: f64,
    pub complexity_coefficient: f64,
    pub lines: Vec<LineDetail>,
}
