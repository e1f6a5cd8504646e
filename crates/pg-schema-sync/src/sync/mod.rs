//! Reconciliation entry points.
//!
//! [`SchemaSync`] ties the catalog reader, the differ and the DDL emitter
//! together. Every engine call is awaited before the next one is issued.
//! Whether the statements share a transaction is up to the executor the
//! caller passes in.

use std::sync::Arc;

use tracing::{debug, info};

use crate::catalog::CatalogReader;
use crate::core::schema::TableDefinition;
use crate::core::traits::{Dialect, Executor};
use crate::diff::{diff, SchemaPlan};
use crate::error::{Result, SchemaError};

/// Schema reconciler for one engine dialect.
#[derive(Clone)]
pub struct SchemaSync {
    dialect: Arc<dyn Dialect>,
    catalog: CatalogReader,
}

impl SchemaSync {
    pub fn new(dialect: Arc<dyn Dialect>) -> Self {
        let catalog = CatalogReader::new(dialect.clone());
        Self { dialect, catalog }
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Read the live definition of `table`.
    pub async fn load(&self, exec: &dyn Executor, table: &str) -> Result<TableDefinition> {
        self.catalog.load(exec, table).await
    }

    /// Read the live table and diff it against `desired` without running
    /// any DDL. A missing table yields a plan that creates it.
    pub async fn plan(&self, exec: &dyn Executor, desired: &TableDefinition) -> Result<SchemaPlan> {
        desired.validate()?;
        let live = match self.load(exec, &desired.name).await {
            Ok(live) => Some(live),
            Err(SchemaError::TableNotFound(_)) => {
                debug!("{} does not exist yet", desired.name);
                None
            }
            Err(e) => return Err(e),
        };
        let plan = diff(self.dialect.as_ref(), live.as_ref(), desired)?;
        debug!("{}: planned {} operations", plan.table, plan.len());
        Ok(plan)
    }

    /// Render and run every operation of `plan`, in order.
    ///
    /// Stops at the first failing statement; the error carries its text.
    /// Returns the number of statements executed.
    pub async fn apply(&self, exec: &dyn Executor, plan: &SchemaPlan) -> Result<usize> {
        let statements = plan.statements(self.dialect.as_ref())?;
        for sql in &statements {
            info!("{}: {}", plan.table, sql);
            exec.execute(sql, &[]).await?;
        }
        Ok(statements.len())
    }

    /// Plan and apply in one call. Returns the applied plan.
    pub async fn reconcile(
        &self,
        exec: &dyn Executor,
        desired: &TableDefinition,
    ) -> Result<SchemaPlan> {
        let plan = self.plan(exec, desired).await?;
        if plan.is_empty() {
            info!("{} is up to date", desired.name);
        } else {
            self.apply(exec, &plan).await?;
        }
        Ok(plan)
    }

    /// Diff a caller-supplied live definition against `desired` and apply
    /// the result. The catalog is not read.
    pub async fn update_struct(
        &self,
        exec: &dyn Executor,
        live: &TableDefinition,
        desired: &TableDefinition,
    ) -> Result<SchemaPlan> {
        let plan = diff(self.dialect.as_ref(), Some(live), desired)?;
        self.apply(exec, &plan).await?;
        Ok(plan)
    }
}
