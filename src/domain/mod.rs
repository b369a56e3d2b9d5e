//! Domain model and the pure quote-calculation engine.

pub mod coefficients;
pub mod entities;
pub mod pricing;

pub use coefficients::{
    access_coefficient, default_coefficients, resolve_rates, COMPLEXITY_COEFFICIENT,
    DEFAULT_ACCESS_SURCHARGE, DEFAULT_PAPERWORK_AMOUNT,
};
pub use entities::{
    Catalog, Category, CategoryId, CoefficientKind, CoefficientRow, EconomicRates, FinishTier,
    LineDetail, PriceOverride, Project, ProjectStatus, QuoteResult, Selection, Subcategory,
    SubcategoryId,
};
pub use pricing::{
    category_breakdown, compute_quote, price_line, round2, PricingContext, QuoteError,
    FALLBACK_CATEGORY, LUMP_SUM_UNIT,
};
