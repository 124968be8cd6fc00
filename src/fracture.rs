//! A fractured solid: its cell complex together with its link graph.

use std::collections::BTreeSet;

use tracing::debug;

use crate::complex::{BuildComplex, CellComplex};
use crate::error::Result;
use crate::links::{BuildLinks, ComponentChange, LinkGraph, ResistanceField};

/// Cell complex and link graph of one fracture, kept in sync under
/// deletion notifications.
#[derive(Debug, Clone)]
pub struct Fracture {
    complex: CellComplex,
    links: LinkGraph,
}

impl Fracture {
    /// Builds the complex, then the link graph over it.
    ///
    /// # Errors
    ///
    /// Returns an error if either construction fails.
    pub fn build(complex: &BuildComplex, field: impl ResistanceField) -> Result<Self> {
        let complex = complex.execute()?;
        Self::from_complex(complex, field)
    }

    /// Builds the link graph over an existing complex.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::LinkError::NoLinks`] if no link can be formed.
    pub fn from_complex(complex: CellComplex, field: impl ResistanceField) -> Result<Self> {
        let links = BuildLinks::new(&complex).with_field(field).execute()?;
        Ok(Self { complex, links })
    }

    /// The cell complex.
    #[must_use]
    pub fn complex(&self) -> &CellComplex {
        &self.complex
    }

    /// The link graph.
    #[must_use]
    pub fn links(&self) -> &LinkGraph {
        &self.links
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut CellComplex, &mut LinkGraph) {
        (&mut self.complex, &mut self.links)
    }

    /// Number of connected components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.links.component_count()
    }

    /// Adds cells to the deleted set.
    ///
    /// Returns the component change, or `None` if nothing changed.
    ///
    /// # Errors
    ///
    /// Returns an error, without changing anything, if an index is out of range.
    pub fn mark_deleted(&mut self, cells: &[usize]) -> Result<Option<ComponentChange>> {
        let mut deleted = self.complex.deleted().clone();
        deleted.extend(cells.iter().copied());
        self.sanitize(&deleted)
    }

    /// Makes `deleted` the full set of deleted cells.
    ///
    /// Cells not in the set that were deleted before are restored with
    /// their original state. Calling this twice with the same set changes
    /// nothing the second time.
    ///
    /// # Errors
    ///
    /// Returns an error, without changing anything, if an index is out of range.
    pub fn sanitize(&mut self, deleted: &BTreeSet<usize>) -> Result<Option<ComponentChange>> {
        let restore: Vec<usize> = self.complex.deleted().difference(deleted).copied().collect();
        let delete: Vec<usize> = deleted.difference(self.complex.deleted()).copied().collect();
        let removed = self.complex.mark_deleted(&delete)?;
        let restored = self.complex.restore_deleted(&restore)?;
        if !removed.is_empty() || !restored.is_empty() {
            debug!(deleted = removed.len(), restored = restored.len(), "cell presence changed");
            self.links.refresh_air(&self.complex);
        }
        Ok(self.links.sanitize(self.complex.deleted()))
    }
}
