//! Renovation cost estimator.
//!
//! A project's bill of quantities is priced against a catalog of work
//! items (three finish tiers per item), adjusted by surcharge
//! coefficients and a cascade of economic formulas (safety charges,
//! overheads, contractor margin, paperwork, contingencies, VAT), and
//! persisted as immutable quote snapshots.
//!
//! The [`domain`] module holds the data model and the pure calculation
//! engine; [`infra`] the JSON-file-backed storage collaborator.
//!
//! ```no_run
//! use reno_estimator::domain::{Project, Selection};
//! use reno_estimator::infra::EstimateStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut store = EstimateStore::open()?;
//! let project = store.insert_project(Project::draft("appartamento 90mq"))?;
//!
//! let selections: Vec<Selection> = vec![/* picked from store.catalog() */];
//! store.save_selections(&project.id, selections)?;
//!
//! let quote = store
//!     .pricing_context()
//!     .compute(&project, store.selections(&project.id))?;
//! store.save_quote(&project.id, &quote)?;
//! # Ok(())
//! # }
//! ```

pub mod domain;
pub mod infra;
pub mod util;
