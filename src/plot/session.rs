use std::sync::Arc;

use log::{error, info};

use crate::density::{DensityEngine, DensityKernel, DensityRange};
use crate::error::PlotError;
use crate::plot::cache::PlotCache;
use crate::plot::catalog::{CycleDirection, DatasetCatalog};
use crate::plot::loader::DatasetSource;
use crate::plot::types::{DatasetId, RecordBuffer};
use crate::presentation::{Frame, PresentationSurface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Inactive,
    Loading,
    Computing,
    Presenting,
}

/// Drives dataset switching: load (or fetch from cache), compute densities,
/// present. Every call runs to completion before returning.
pub struct PlotSession<K, S> {
    catalog: DatasetCatalog,
    source: S,
    cache: PlotCache,
    engine: DensityEngine<K>,
    surface: PresentationSurface,
    state: SessionState,
    active: Option<DatasetId>,
}

impl<K: DensityKernel, S: DatasetSource> PlotSession<K, S> {
    pub fn new(catalog: DatasetCatalog, source: S, engine: DensityEngine<K>) -> Self {
        Self {
            catalog,
            source,
            cache: PlotCache::new(),
            engine,
            surface: PresentationSurface::new(),
            state: SessionState::Inactive,
            active: None,
        }
    }

    /// Activates whatever the catalog cursor points at.
    pub fn start(&mut self) -> Result<(), PlotError> {
        let id = self.catalog.current().clone();
        self.activate(&id)
    }

    /// Loads `id`, computes its densities and presents it. The catalog cursor
    /// follows, so the next switch cycles from `id`.
    ///
    /// Ids outside the catalog are rejected and leave the session untouched.
    /// Any other failure leaves it `Inactive` with its slots released.
    pub fn activate(&mut self, id: &DatasetId) -> Result<(), PlotError> {
        if self.catalog.select(id).is_none() {
            return Err(PlotError::UnknownDataset(id.to_string()));
        }

        self.state = SessionState::Loading;
        self.active = None;
        self.surface.release();

        let source = &self.source;
        let plot = match self.cache.get_or_load(id, |id| source.load(id)) {
            Ok(plot) => plot,
            Err(e) => return Err(self.deactivate(id, e)),
        };

        self.state = SessionState::Computing;
        if let Err(e) = self.present(&plot) {
            return Err(self.deactivate(id, e));
        }

        self.state = SessionState::Presenting;
        self.active = Some(id.clone());
        info!(
            "Presenting {id}: {} particles, radius {}",
            plot.len(),
            self.engine.radius()
        );
        Ok(())
    }

    /// Moves to the neighbouring dataset (wrapping) and activates it.
    pub fn switch_dataset(&mut self, direction: CycleDirection) -> Result<&DatasetId, PlotError> {
        let id = self.catalog.advance(direction).clone();
        self.activate(&id)?;
        Ok(self.catalog.current())
    }

    /// Doubles the neighbour radius and recomputes before returning.
    pub fn double_radius(&mut self) -> Result<bool, PlotError> {
        let changed = self.engine.double_radius();
        self.recompute_if(changed)?;
        Ok(changed)
    }

    /// Halves the neighbour radius and recomputes before returning.
    pub fn halve_radius(&mut self) -> Result<bool, PlotError> {
        let changed = self.engine.halve_radius();
        self.recompute_if(changed)?;
        Ok(changed)
    }

    pub fn render(&self) -> Result<Frame<'_>, PlotError> {
        self.surface.render()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn radius(&self) -> f32 {
        self.engine.radius()
    }

    pub fn active_dataset(&self) -> Option<&DatasetId> {
        self.active.as_ref()
    }

    pub fn catalog(&self) -> &DatasetCatalog {
        &self.catalog
    }

    pub fn cache(&self) -> &PlotCache {
        &self.cache
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn density_range(&self) -> Option<DensityRange> {
        self.surface.render().ok().map(|frame| frame.range)
    }

    fn present(&mut self, plot: &Arc<RecordBuffer>) -> Result<DensityRange, PlotError> {
        self.surface.acquire(plot);
        self.engine.refresh(&mut self.surface)
    }

    fn recompute_if(&mut self, changed: bool) -> Result<(), PlotError> {
        if !changed || self.state != SessionState::Presenting {
            return Ok(());
        }
        let Some(id) = self.active.clone() else {
            return Ok(());
        };

        self.state = SessionState::Computing;
        match self.engine.refresh(&mut self.surface) {
            Ok(_) => {
                self.state = SessionState::Presenting;
                Ok(())
            }
            Err(e) => Err(self.deactivate(&id, e)),
        }
    }

    fn deactivate(&mut self, id: &DatasetId, err: PlotError) -> PlotError {
        error!("Could not present {id}: {err}");
        self.surface.release();
        self.state = SessionState::Inactive;
        self.active = None;
        err
    }
}
