pub mod store;

pub use store::{EstimateStore, NewSubcategory, QuoteRecord, StoreError, SubcategoryUpdate};
