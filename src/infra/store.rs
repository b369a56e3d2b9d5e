//! JSON-file-backed storage collaborator: catalog, coefficient table,
//! global price overrides, projects, per-project selections and quote
//! snapshots, one file per collection.
//!
//! The store never invokes the engine; calculation and persistence are
//! separate steps so a failed save never costs a recomputation.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use time::{format_description, OffsetDateTime};
use uuid::Uuid;

use crate::domain::coefficients::default_coefficients;
use crate::domain::entities::{
    Catalog, Category, CategoryId, CoefficientRow, PriceOverride, Project, ProjectStatus,
    QuoteResult, Selection, Subcategory, SubcategoryId,
};
use crate::domain::pricing::PricingContext;
use crate::util::persistence::{self, PersistError};

const CATALOG_FILE: &str = "catalog.json";
const COEFFICIENTS_FILE: &str = "coefficients.json";
const OVERRIDES_FILE: &str = "price_overrides.json";
const PROJECTS_FILE: &str = "projects.json";
const SELECTIONS_FILE: &str = "selections.json";
const QUOTES_FILE: &str = "quotes.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("no record found for {0}")]
    NotFound(String),
    #[error("category still owns {count} subcategories; delete them first or pass force")]
    CategoryNotEmpty { count: usize },
}

/// A persisted quote snapshot, tied to the project it was computed for.
/// Append-only: recalculating stores a new record, never an update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub id: String,
    pub project_id: String,
    /// Unix seconds when the snapshot was taken.
    pub created_at: u64,
    pub result: QuoteResult,
}

impl QuoteRecord {
    /// Creation timestamp as "YYYY-MM-DD HH:MM" (UTC).
    pub fn created_label(&self) -> String {
        let Ok(timestamp) = OffsetDateTime::from_unix_timestamp(self.created_at as i64) else {
            return self.created_at.to_string();
        };
        match format_description::parse("[year]-[month]-[day] [hour]:[minute]") {
            Ok(format) => timestamp
                .format(&format)
                .unwrap_or_else(|_| timestamp.to_string()),
            Err(_) => timestamp.to_string(),
        }
    }
}

/// Fields for a new catalog subcategory; id and sort order are assigned
/// by the store.
#[derive(Clone, Debug, Default)]
pub struct NewSubcategory {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub unit: String,
    pub price_standard: f64,
    pub price_economy: Option<f64>,
    pub price_premium: Option<f64>,
    pub applies_access_surcharge: bool,
}

/// Partial update for an existing subcategory; `None` leaves the field
/// untouched.
#[derive(Clone, Debug, Default)]
pub struct SubcategoryUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub price_standard: Option<f64>,
    pub price_economy: Option<f64>,
    pub price_premium: Option<f64>,
    pub applies_access_surcharge: Option<bool>,
    pub active: Option<bool>,
}

pub struct EstimateStore {
    dir: PathBuf,
    catalog: Catalog,
    coefficients: Vec<CoefficientRow>,
    overrides: Vec<PriceOverride>,
    projects: Vec<Project>,
    selections: HashMap<String, Vec<Selection>>,
    quotes: Vec<QuoteRecord>,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl EstimateStore {
    /// Open the store in the platform data directory.
    pub fn open() -> Result<Self, StoreError> {
        let dir = persistence::data_dir()
            .or_else(|| dirs::data_local_dir().map(|base| base.join("reno-estimator")))
            .ok_or(PersistError::StorageUnavailable)?;
        Self::open_at(dir)
    }

    /// Open the store in an explicit directory. Missing collections
    /// start empty; a missing coefficient table is seeded with the
    /// defaults.
    pub fn open_at(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(PersistError::from)?;

        let catalog: Catalog = persistence::load_json(&dir.join(CATALOG_FILE)).unwrap_or_default();
        let coefficients: Vec<CoefficientRow> =
            persistence::load_json(&dir.join(COEFFICIENTS_FILE)).unwrap_or_else(default_coefficients);
        let overrides: Vec<PriceOverride> =
            persistence::load_json(&dir.join(OVERRIDES_FILE)).unwrap_or_default();
        let projects: Vec<Project> =
            persistence::load_json(&dir.join(PROJECTS_FILE)).unwrap_or_default();
        let selections: HashMap<String, Vec<Selection>> =
            persistence::load_json(&dir.join(SELECTIONS_FILE)).unwrap_or_default();
        let quotes: Vec<QuoteRecord> =
            persistence::load_json(&dir.join(QUOTES_FILE)).unwrap_or_default();

        println!(
            "[store] opened {} ({} categories, {} projects, {} quotes)",
            dir.display(),
            catalog.categories.len(),
            projects.len(),
            quotes.len()
        );

        Ok(Self {
            dir,
            catalog,
            coefficients,
            overrides,
            projects,
            selections,
            quotes,
        })
    }

    fn persist<T: Serialize>(&self, file: &str, value: &T) -> Result<(), StoreError> {
        persistence::save_json(&self.dir.join(file), value)?;
        Ok(())
    }

    /// Snapshot the catalog, overrides and coefficient table for one
    /// calculation. The engine only ever sees this snapshot, never the
    /// store itself.
    pub fn pricing_context(&self) -> PricingContext {
        let overrides = self
            .overrides
            .iter()
            .map(|row| (row.subcategory_id.clone(), row.clone()))
            .collect();
        PricingContext {
            catalog: self.catalog.clone(),
            overrides,
            coefficients: self.coefficients.clone(),
        }
    }

    // --- catalog ---------------------------------------------------------

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn add_category(
        &mut self,
        code: &str,
        name: &str,
        description: Option<String>,
    ) -> Result<CategoryId, StoreError> {
        let sort_order = self
            .catalog
            .categories
            .iter()
            .map(|c| c.sort_order)
            .max()
            .unwrap_or(0)
            + 1;
        let id = Uuid::new_v4().to_string();
        self.catalog.categories.push(Category {
            id: id.clone(),
            code: code.to_string(),
            name: name.to_string(),
            description,
            sort_order,
            active: true,
            subcategories: Vec::new(),
        });
        self.persist(CATALOG_FILE, &self.catalog)?;
        Ok(id)
    }

    pub fn update_category(
        &mut self,
        category_id: &str,
        name: Option<String>,
        description: Option<String>,
        active: Option<bool>,
    ) -> Result<(), StoreError> {
        let category = self
            .catalog
            .categories
            .iter_mut()
            .find(|c| c.id == category_id)
            .ok_or_else(|| StoreError::NotFound(format!("category {category_id}")))?;
        if let Some(name) = name {
            category.name = name;
        }
        if let Some(description) = description {
            category.description = Some(description);
        }
        if let Some(active) = active {
            category.active = active;
        }
        self.persist(CATALOG_FILE, &self.catalog)
    }

    pub fn set_category_active(&mut self, category_id: &str, active: bool) -> Result<(), StoreError> {
        self.update_category(category_id, None, None, Some(active))
    }

    /// Delete a category. Refused while it still owns subcategories,
    /// unless `force` is set.
    pub fn delete_category(&mut self, category_id: &str, force: bool) -> Result<(), StoreError> {
        let category = self
            .catalog
            .find_category(category_id)
            .ok_or_else(|| StoreError::NotFound(format!("category {category_id}")))?;
        let count = category.subcategories.len();
        if count > 0 && !force {
            return Err(StoreError::CategoryNotEmpty { count });
        }
        self.catalog.categories.retain(|c| c.id != category_id);
        self.persist(CATALOG_FILE, &self.catalog)
    }

    pub fn add_subcategory(
        &mut self,
        category_id: &str,
        new: NewSubcategory,
    ) -> Result<SubcategoryId, StoreError> {
        let category = self
            .catalog
            .categories
            .iter_mut()
            .find(|c| c.id == category_id)
            .ok_or_else(|| StoreError::NotFound(format!("category {category_id}")))?;
        let sort_order = category
            .subcategories
            .iter()
            .map(|s| s.sort_order)
            .max()
            .unwrap_or(0)
            + 1;
        let id = Uuid::new_v4().to_string();
        category.subcategories.push(Subcategory {
            id: id.clone(),
            code: new.code,
            name: new.name,
            description: new.description,
            unit: new.unit,
            price_standard: new.price_standard,
            price_economy: new.price_economy,
            price_premium: new.price_premium,
            sort_order,
            active: true,
            applies_access_surcharge: new.applies_access_surcharge,
        });
        self.persist(CATALOG_FILE, &self.catalog)?;
        Ok(id)
    }

    pub fn update_subcategory(
        &mut self,
        subcategory_id: &str,
        update: SubcategoryUpdate,
    ) -> Result<(), StoreError> {
        let sub = self.subcategory_mut(subcategory_id)?;
        if let Some(name) = update.name {
            sub.name = name;
        }
        if let Some(description) = update.description {
            sub.description = Some(description);
        }
        if let Some(unit) = update.unit {
            sub.unit = unit;
        }
        if let Some(price) = update.price_standard {
            sub.price_standard = price;
        }
        if let Some(price) = update.price_economy {
            sub.price_economy = Some(price);
        }
        if let Some(price) = update.price_premium {
            sub.price_premium = Some(price);
        }
        if let Some(flag) = update.applies_access_surcharge {
            sub.applies_access_surcharge = flag;
        }
        if let Some(active) = update.active {
            sub.active = active;
        }
        self.persist(CATALOG_FILE, &self.catalog)
    }

    pub fn set_subcategory_active(
        &mut self,
        subcategory_id: &str,
        active: bool,
    ) -> Result<(), StoreError> {
        self.subcategory_mut(subcategory_id)?.active = active;
        self.persist(CATALOG_FILE, &self.catalog)
    }

    pub fn delete_subcategory(&mut self, subcategory_id: &str) -> Result<(), StoreError> {
        let category = self
            .catalog
            .categories
            .iter_mut()
            .find(|c| c.subcategories.iter().any(|s| s.id == subcategory_id))
            .ok_or_else(|| StoreError::NotFound(format!("subcategory {subcategory_id}")))?;
        category.subcategories.retain(|s| s.id != subcategory_id);
        self.persist(CATALOG_FILE, &self.catalog)
    }

    fn subcategory_mut(&mut self, subcategory_id: &str) -> Result<&mut Subcategory, StoreError> {
        self.catalog
            .categories
            .iter_mut()
            .flat_map(|c| c.subcategories.iter_mut())
            .find(|s| s.id == subcategory_id)
            .ok_or_else(|| StoreError::NotFound(format!("subcategory {subcategory_id}")))
    }

    // --- coefficients ----------------------------------------------------

    pub fn coefficients(&self) -> &[CoefficientRow] {
        &self.coefficients
    }

    pub fn replace_coefficients(&mut self, rows: Vec<CoefficientRow>) -> Result<(), StoreError> {
        self.coefficients = rows;
        self.persist(COEFFICIENTS_FILE, &self.coefficients)
    }

    // --- global price overrides ------------------------------------------

    pub fn price_overrides(&self) -> &[PriceOverride] {
        &self.overrides
    }

    /// Insert or replace the global custom price for a subcategory.
    pub fn set_price_override(&mut self, row: PriceOverride) -> Result<(), StoreError> {
        match self
            .overrides
            .iter_mut()
            .find(|o| o.subcategory_id == row.subcategory_id)
        {
            Some(slot) => *slot = row,
            None => self.overrides.push(row),
        }
        self.persist(OVERRIDES_FILE, &self.overrides)
    }

    /// Drop the global custom price, returning the subcategory to its
    /// catalog list prices. Removing an absent override is a no-op.
    pub fn remove_price_override(&mut self, subcategory_id: &str) -> Result<(), StoreError> {
        self.overrides.retain(|o| o.subcategory_id != subcategory_id);
        self.persist(OVERRIDES_FILE, &self.overrides)
    }

    // --- projects --------------------------------------------------------

    /// Insert a new project; the store assigns id and timestamp.
    pub fn insert_project(&mut self, mut project: Project) -> Result<Project, StoreError> {
        project.id = Uuid::new_v4().to_string();
        project.updated_at = unix_now();
        self.projects.push(project.clone());
        self.persist(PROJECTS_FILE, &self.projects)?;
        Ok(project)
    }

    pub fn project(&self, project_id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == project_id)
    }

    /// Projects most recently updated first.
    pub fn projects(&self, limit: Option<usize>) -> Vec<&Project> {
        let mut projects: Vec<&Project> = self.projects.iter().collect();
        projects.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        if let Some(limit) = limit {
            projects.truncate(limit);
        }
        projects
    }

    pub fn update_project(&mut self, mut project: Project) -> Result<(), StoreError> {
        project.updated_at = unix_now();
        let slot = self
            .projects
            .iter_mut()
            .find(|p| p.id == project.id)
            .ok_or_else(|| StoreError::NotFound(format!("project {}", project.id)))?;
        *slot = project;
        self.persist(PROJECTS_FILE, &self.projects)
    }

    /// Delete a project together with its selections and quote
    /// snapshots.
    pub fn delete_project(&mut self, project_id: &str) -> Result<(), StoreError> {
        let before = self.projects.len();
        self.projects.retain(|p| p.id != project_id);
        if self.projects.len() == before {
            return Err(StoreError::NotFound(format!("project {project_id}")));
        }
        self.selections.remove(project_id);
        self.quotes.retain(|q| q.project_id != project_id);
        self.persist(PROJECTS_FILE, &self.projects)?;
        self.persist(SELECTIONS_FILE, &self.selections)?;
        self.persist(QUOTES_FILE, &self.quotes)?;
        println!("[store] deleted project {project_id} and its dependents");
        Ok(())
    }

    /// Clone a project (and its selections) as a fresh draft. The copy
    /// records where it came from; the source is left untouched.
    pub fn duplicate_project(
        &mut self,
        project_id: &str,
        new_name: Option<&str>,
    ) -> Result<Project, StoreError> {
        let source = self
            .project(project_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("project {project_id}")))?;

        let mut copy = source.clone();
        copy.id = Uuid::new_v4().to_string();
        copy.name = new_name
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} (copia)", source.name));
        copy.status = ProjectStatus::Draft;
        copy.source_project_id = Some(source.id.clone());
        copy.duplicated_from = Some(source.name.clone());
        copy.updated_at = unix_now();

        self.projects.push(copy.clone());
        if let Some(rows) = self.selections.get(project_id).cloned() {
            self.selections.insert(copy.id.clone(), rows);
            self.persist(SELECTIONS_FILE, &self.selections)?;
        }
        self.persist(PROJECTS_FILE, &self.projects)?;
        Ok(copy)
    }

    // --- selections ------------------------------------------------------

    /// Replace a project's bill of quantities wholesale
    /// (delete-then-insert, never an incremental patch). Concurrent
    /// saves for the same project must be serialized by the caller.
    pub fn save_selections(
        &mut self,
        project_id: &str,
        rows: Vec<Selection>,
    ) -> Result<(), StoreError> {
        if self.project(project_id).is_none() {
            return Err(StoreError::NotFound(format!("project {project_id}")));
        }
        self.selections.insert(project_id.to_string(), rows);
        self.persist(SELECTIONS_FILE, &self.selections)
    }

    pub fn selections(&self, project_id: &str) -> &[Selection] {
        self.selections
            .get(project_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    // --- quote snapshots -------------------------------------------------

    /// Persist a computed quote as a new immutable snapshot.
    pub fn save_quote(
        &mut self,
        project_id: &str,
        result: &QuoteResult,
    ) -> Result<QuoteRecord, StoreError> {
        if self.project(project_id).is_none() {
            return Err(StoreError::NotFound(format!("project {project_id}")));
        }
        let record = QuoteRecord {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            created_at: unix_now(),
            result: result.clone(),
        };
        self.quotes.push(record.clone());
        self.persist(QUOTES_FILE, &self.quotes)?;
        println!("[store] saved quote {} for project {project_id}", record.id);
        Ok(record)
    }

    /// Snapshots for a project, newest first.
    pub fn quotes(&self, project_id: &str) -> Vec<&QuoteRecord> {
        let mut records: Vec<&QuoteRecord> = self
            .quotes
            .iter()
            .filter(|q| q.project_id == project_id)
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }
}
