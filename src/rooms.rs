use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::auth::Identity;
use crate::errors::{ServerError, ServerResult};
use crate::util::random_string;

pub type RoomId = String;

const ROOM_ID_LENGTH: usize = 16;

/// A room's settings and lifecycle state. `active` flips to true exactly
/// once, when the room's game has been created.
#[derive(Debug, Clone, Serialize)]
pub struct RoomData {
    pub id: RoomId,
    pub name: String,
    pub max_players: u32,
    pub question_count: u32,
    pub time_per_question: u32,
    pub active: bool,
}

/// The settings a room is created with.
#[derive(Debug)]
pub struct NewRoom {
    pub name: String,
    pub max_players: u32,
    pub question_count: u32,
    pub time_per_question: u32,
}

/// A lobby of users waiting for (or playing) a game. The member list has its
/// own lock, so different rooms never contend with each other.
#[derive(Debug)]
pub struct Room {
    data: Mutex<RoomData>,
    members: RwLock<Vec<Identity>>,
}

impl Room {
    fn new(admin: Identity, data: RoomData) -> Self {
        Self {
            data: Mutex::new(data),
            members: RwLock::new(vec![admin]),
        }
    }

    /// Adds a user, enforcing the capacity bound and member uniqueness.
    pub fn add_member(&self, user: Identity) -> ServerResult<()> {
        let mut members = self.members.write();

        if members.len() >= self.data.lock().max_players as usize {
            return Err(ServerError::RoomFull);
        }

        if members.contains(&user) {
            return Err(ServerError::AlreadyExists(
                "User already in the room".to_string(),
            ));
        }

        members.push(user);
        Ok(())
    }

    pub fn remove_member(&self, user: &Identity) {
        self.members.write().retain(|member| member != user);
    }

    pub fn members(&self) -> Vec<Identity> {
        self.members.read().clone()
    }

    pub fn member_count(&self) -> usize {
        self.members.read().len()
    }

    /// Marks the room as having a running game. Only called after the game
    /// has actually been created.
    pub fn set_active(&self) {
        self.data.lock().active = true;
    }

    pub fn data(&self) -> RoomData {
        self.data.lock().clone()
    }

    pub fn id(&self) -> RoomId {
        self.data.lock().id.clone()
    }
}

/// Owns every open room. Insertions and deletions go through one lock, while
/// the contents of individual rooms are locked per room.
pub struct RoomManager {
    rooms: RwLock<HashMap<RoomId, Arc<Room>>>,
}

impl RoomManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            rooms: Default::default(),
        })
    }

    /// Creates a room with a fresh unique id. The admin is its first member.
    pub fn create(&self, admin: Identity, new_room: NewRoom) -> Arc<Room> {
        let id = self.generate_id();

        let room = Arc::new(Room::new(
            admin,
            RoomData {
                id: id.clone(),
                name: new_room.name,
                max_players: new_room.max_players,
                question_count: new_room.question_count,
                time_per_question: new_room.time_per_question,
                active: false,
            },
        ));

        self.rooms.write().insert(id, room.clone());

        room
    }

    pub fn room(&self, id: &str) -> ServerResult<Arc<Room>> {
        self.rooms
            .read()
            .get(id)
            .cloned()
            .ok_or(ServerError::NotFound { resource: "Room" })
    }

    pub fn delete(&self, id: &str) {
        self.rooms.write().remove(id);
    }

    /// A snapshot of every room's settings.
    pub fn list(&self) -> Vec<RoomData> {
        self.rooms.read().values().map(|room| room.data()).collect()
    }

    /// Removes a member from a room, deleting the room if it becomes empty.
    pub fn remove_member(&self, id: &str, user: &Identity) {
        let mut rooms = self.rooms.write();

        if let Some(room) = rooms.get(id) {
            room.remove_member(user);

            if room.member_count() == 0 {
                rooms.remove(id);
            }
        }
    }

    /// Generates ids until one doesn't collide with an existing room. With
    /// this much randomness the first try is essentially always free.
    fn generate_id(&self) -> RoomId {
        let rooms = self.rooms.read();

        loop {
            let id = random_string(ROOM_ID_LENGTH);

            if !rooms.contains_key(&id) {
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> NewRoom {
        NewRoom {
            name: "Quick quiz".to_string(),
            max_players: 2,
            question_count: 3,
            time_per_question: 10,
        }
    }

    #[test]
    fn rooms_are_created_with_their_admin_inside() {
        let manager = RoomManager::new();
        let room = manager.create(Identity::new("olive"), settings());

        assert_eq!(room.members(), vec![Identity::new("olive")]);
        assert!(!room.data().active);

        let found = manager.room(&room.id()).expect("room is registered");
        assert_eq!(found.id(), room.id());
    }

    #[test]
    fn membership_respects_capacity_and_uniqueness() {
        let manager = RoomManager::new();
        let room = manager.create(Identity::new("olive"), settings());

        let duplicate = room.add_member(Identity::new("olive"));
        assert!(matches!(duplicate, Err(ServerError::AlreadyExists(_))));

        room.add_member(Identity::new("remy"))
            .expect("second member fits");

        // max_players is 2, so a third member is rejected
        let overflow = room.add_member(Identity::new("basil"));
        assert!(matches!(overflow, Err(ServerError::RoomFull)));
        assert_eq!(room.member_count(), 2);
    }

    #[test]
    fn removing_the_last_member_deletes_the_room() {
        let manager = RoomManager::new();
        let admin = Identity::new("olive");
        let room = manager.create(admin.clone(), settings());
        let id = room.id();

        manager.remove_member(&id, &admin);

        let result = manager.room(&id);
        assert!(matches!(result, Err(ServerError::NotFound { .. })));
    }

    #[test]
    fn removing_an_absent_member_is_a_no_op() {
        let manager = RoomManager::new();
        let room = manager.create(Identity::new("olive"), settings());

        manager.remove_member(&room.id(), &Identity::new("stranger"));

        assert!(manager.room(&room.id()).is_ok());
        assert_eq!(room.member_count(), 1);
    }

    #[test]
    fn listing_returns_a_snapshot_of_all_rooms() {
        let manager = RoomManager::new();
        manager.create(Identity::new("olive"), settings());
        manager.create(Identity::new("remy"), settings());

        assert_eq!(manager.list().len(), 2);
    }
}
