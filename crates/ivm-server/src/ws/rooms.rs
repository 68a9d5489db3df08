//! Room registry: named broadcast groups of user ids.
//!
//! Membership is per user, not per socket: every open tab of a member
//! receives room traffic. A room exists only while it has members.

use std::collections::{BTreeMap, HashSet};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ivm_protocol::{EntityId, Role, RoomId};

use crate::identity::UserIdentity;

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<RoomId, HashSet<EntityId>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member, creating the room if needed. Returns `true` if the user
    /// was not already a member.
    pub fn join(&self, user_id: &EntityId, room: RoomId) -> bool {
        let added = self
            .rooms
            .entry(room.clone())
            .or_default()
            .insert(user_id.clone());
        if added {
            tracing::debug!(%user_id, %room, "Joined room");
        }
        added
    }

    /// Remove a member, deleting the room once empty.
    pub fn leave(&self, user_id: &EntityId, room: &RoomId) -> bool {
        match self.rooms.entry(room.clone()) {
            Entry::Occupied(mut occ) => {
                let removed = occ.get_mut().remove(user_id);
                if occ.get().is_empty() {
                    occ.remove();
                }
                if removed {
                    tracing::debug!(%user_id, %room, "Left room");
                }
                removed
            }
            Entry::Vacant(_) => false,
        }
    }

    /// Remove the user from every room. Returns how many rooms they left.
    pub fn leave_all(&self, user_id: &EntityId) -> usize {
        let mut left = 0;
        self.rooms.retain(|_, members| {
            if members.remove(user_id) {
                left += 1;
            }
            !members.is_empty()
        });
        left
    }

    pub fn members(&self, room: &RoomId) -> Vec<EntityId> {
        self.rooms
            .get(room)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_member(&self, user_id: &EntityId, room: &RoomId) -> bool {
        self.rooms
            .get(room)
            .map(|m| m.contains(user_id))
            .unwrap_or(false)
    }

    /// Rooms the user belongs to, sorted.
    pub fn rooms_of(&self, user_id: &EntityId) -> Vec<RoomId> {
        let mut rooms: Vec<RoomId> = self
            .rooms
            .iter()
            .filter(|e| e.value().contains(user_id))
            .map(|e| e.key().clone())
            .collect();
        rooms.sort();
        rooms
    }

    pub fn room_sizes(&self) -> BTreeMap<String, usize> {
        self.rooms
            .iter()
            .map(|e| (e.key().to_string(), e.value().len()))
            .collect()
    }

    pub fn exists(&self, room: &RoomId) -> bool {
        self.rooms.contains_key(room)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

/// Rooms joined automatically when a user connects: `global`, the role
/// rooms, and for admins the rooms of the companies they administer.
pub fn default_rooms(identity: &UserIdentity, include_company_rooms: bool) -> Vec<RoomId> {
    let mut rooms = vec![RoomId::global()];
    if let Some(role) = identity.role_kind() {
        rooms.extend(role.default_rooms().iter().copied().map(RoomId::from));
        if include_company_rooms && role == Role::Admin {
            rooms.extend(identity.company_ids.iter().map(RoomId::company_admins));
        }
    }
    rooms
}

/// Reserved-room policy for client-requested joins, applied when
/// `realtime.restrict_room_joins` is on: role rooms and company admin rooms
/// need a matching identity; every other name is open.
pub fn may_join(identity: &UserIdentity, room: &RoomId) -> bool {
    if room.is_global() {
        return true;
    }
    let role = identity.role_kind();
    if let Some(room_role) = room.role() {
        return match room_role {
            Role::SuperAdmin => role == Some(Role::SuperAdmin),
            Role::Admin => matches!(role, Some(Role::Admin | Role::SuperAdmin)),
            Role::Investor => role == Some(Role::Investor),
        };
    }
    if let Some(company_id) = room.company_id() {
        return match role {
            Some(Role::SuperAdmin) => true,
            Some(Role::Admin) => identity.administers(&company_id),
            _ => false,
        };
    }
    true
}
