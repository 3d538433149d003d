use crate::{now_millis, CellId, CellSelection, Connection, ConnectionId};
use dashmap::DashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOutcome {
    /// Cell the caller gave up by selecting, if it still owned one.
    pub released: Option<CellId>,
    pub selection: CellSelection,
}

/// Who occupies which cell.
///
/// `cells` is the source of truth. `owners` is an index from a connection to the
/// cell it last selected; it may point at a cell another connection has since
/// taken over, so every removal through it is compare-and-remove on `cells`.
pub struct CellOwnershipTable {
    cells: DashMap<CellId, CellSelection>,
    owners: DashMap<ConnectionId, CellId>,
}

impl CellOwnershipTable {
    pub fn new() -> Self {
        Self {
            cells: DashMap::new(),
            owners: DashMap::new(),
        }
    }

    /// Last writer wins: an occupied cell is taken over, never refused.
    /// Re-selecting the caller's own cell releases and re-inserts it.
    pub fn select(&self, cell_id: CellId, owner: &Connection) -> SelectOutcome {
        let owner_id = owner.connection_id;
        let previous = self.owners.get(&owner_id).map(|cell| cell.value().clone());
        let released = previous
            .and_then(|previous| self.release_cell(&previous, &owner_id))
            .map(|selection| selection.cell_id);

        let selection = CellSelection::new(cell_id.clone(), owner, now_millis());
        self.owners.insert(owner_id, cell_id.clone());
        self.cells.insert(cell_id, selection.clone());

        SelectOutcome {
            released,
            selection,
        }
    }

    pub fn deselect(&self, connection_id: &ConnectionId) -> Option<CellId> {
        let (_, cell_id) = self.owners.remove(connection_id)?;
        self.release_cell(&cell_id, connection_id)
            .map(|selection| selection.cell_id)
    }

    /// Removes `cell_id` only while `expected_owner` still holds it.
    pub fn release_cell(
        &self,
        cell_id: &CellId,
        expected_owner: &ConnectionId,
    ) -> Option<CellSelection> {
        self.owners
            .remove_if(expected_owner, |_, owned| owned == cell_id);
        self.cells
            .remove_if(cell_id, |_, selection| selection.user_id == *expected_owner)
            .map(|(_, selection)| selection)
    }

    pub fn owned_by(&self, connection_id: &ConnectionId) -> Option<CellSelection> {
        let cell_id = self.owners.get(connection_id).map(|cell| cell.value().clone())?;
        self.cells
            .get(&cell_id)
            .filter(|selection| selection.user_id == *connection_id)
            .map(|selection| selection.value().clone())
    }

    pub fn get(&self, cell_id: &CellId) -> Option<CellSelection> {
        self.cells.get(cell_id).map(|selection| selection.value().clone())
    }

    /// Owned copy of the occupancy, ordered by cell id.
    pub fn snapshot(&self) -> Vec<CellSelection> {
        let mut selections = self
            .cells
            .iter()
            .map(|entry| entry.value().clone())
            .collect::<Vec<_>>();
        selections.sort_by(|a, b| a.cell_id.cmp(&b.cell_id));
        selections
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Default for CellOwnershipTable {
    fn default() -> Self {
        Self::new()
    }
}
