//! Chat rooms as entities (name, description). The live feed is
//! [`chatx_room::RoomChannel`].

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use chatx_core::{LazyField, Result, RoomId};
use chatx_session::Session;

/// Known fields of a room.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoomFields {
    /// Room name.
    pub name: Option<String>,
    /// Room description.
    pub description: Option<String>,
}

/// A chat room, fetched from its info page on first read.
pub struct Room {
    id: RoomId,
    session: Arc<Session>,
    fields: RwLock<RoomFields>,
    info: LazyField,
}

impl Room {
    pub(crate) fn new(id: RoomId, session: Arc<Session>, seed: RoomFields) -> Self {
        Self {
            id,
            session,
            fields: RwLock::new(seed),
            info: LazyField::new(),
        }
    }

    /// Room id.
    pub fn id(&self) -> RoomId {
        self.id
    }

    /// Snapshot of what is known so far, without fetching.
    pub fn known_fields(&self) -> RoomFields {
        self.fields.read().clone()
    }

    /// Room name.
    pub async fn name(&self) -> Result<String> {
        self.info
            .resolve("name", || self.fields.read().name.clone(), || self.fetch_info())
            .await
    }

    /// Room description.
    pub async fn description(&self) -> Result<String> {
        self.info
            .resolve(
                "description",
                || self.fields.read().description.clone(),
                || self.fetch_info(),
            )
            .await
    }

    async fn fetch_info(&self) -> Result<()> {
        let url = self.session.host().chat(&format!("/rooms/info/{}", self.id));
        let page = self.session.get_page(&url).await?;
        let info = self.session.extractor().room_info(&page);
        debug!(room_id = %self.id, "fetched room info");

        let mut fields = self.fields.write();
        if info.name.is_some() {
            fields.name = info.name;
        }
        if info.description.is_some() {
            fields.description = info.description;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("fields", &*self.fields.read())
            .finish_non_exhaustive()
    }
}
