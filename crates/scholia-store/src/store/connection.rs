//! Directed connections between papers of one thesis

use scholia_domain::{
    Connection, ConnectionId, ConnectionPatch, EntityKind, NewConnection, PaperId, ThesisId,
};

use super::refs::{require_paper_in, require_thesis};
use super::{take_where, EntityStore};
use crate::error::{Result, StoreError};
use crate::snapshot::scoped;

impl EntityStore {
    /// Connect two papers of the same thesis
    pub fn create_connection(&mut self, payload: NewConnection) -> Result<Connection> {
        payload.validate()?;
        self.commit(|state, now| {
            require_thesis(state, "thesisId", &payload.thesis_id)?;
            require_paper_in(state, "fromPaperId", &payload.from_paper_id, &payload.thesis_id)?;
            require_paper_in(state, "toPaperId", &payload.to_paper_id, &payload.thesis_id)?;

            let connection = Connection::from_new(state.fresh_id(), payload, now);
            if let Some(thesis) = state.thesis_mut(&connection.thesis_id) {
                thesis.connection_ids.push(connection.id.clone());
            }
            state.connections.push(connection.clone());
            Ok(connection)
        })
    }

    /// Endpoints may move, but only to papers of the connection's thesis
    pub fn update_connection(
        &mut self,
        id: &ConnectionId,
        patch: ConnectionPatch,
    ) -> Result<Connection> {
        self.commit(|state, now| {
            let current = state
                .connection(id)
                .ok_or_else(|| StoreError::not_found(EntityKind::Connection, id))?;
            patch.validate(current)?;
            let thesis = current.thesis_id.clone();
            if let Some(from) = &patch.from_paper_id {
                require_paper_in(state, "fromPaperId", from, &thesis)?;
            }
            if let Some(to) = &patch.to_paper_id {
                require_paper_in(state, "toPaperId", to, &thesis)?;
            }

            let connection = state
                .connections
                .iter_mut()
                .find(|c| &c.id == id)
                .ok_or_else(|| StoreError::not_found(EntityKind::Connection, id))?;
            patch.apply_to(connection);
            connection.updated_at = now;
            Ok(connection.clone())
        })
    }

    pub fn delete_connection(&mut self, id: &ConnectionId) -> Result<()> {
        self.commit(|state, _| {
            let connection = take_where(&mut state.connections, |c| &c.id == id)
                .ok_or_else(|| StoreError::not_found(EntityKind::Connection, id))?;
            if let Some(thesis) = state.thesis_mut(&connection.thesis_id) {
                thesis.connection_ids.retain(|c| c != id);
            }
            Ok(())
        })
    }

    pub fn get_connection(&self, id: &ConnectionId) -> Option<&Connection> {
        self.state.connection(id)
    }

    pub fn list_connections(&self, thesis: Option<&ThesisId>) -> Vec<&Connection> {
        scoped(&self.state.connections, thesis)
    }

    /// Connections with `paper` at either end
    pub fn connections_for_paper(&self, paper: &PaperId) -> Vec<&Connection> {
        self.index().connections_for_paper(paper)
    }
}
