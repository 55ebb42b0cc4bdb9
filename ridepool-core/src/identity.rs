use serde::{Deserialize, Serialize};

/// The authenticated caller of a reservation operation.
///
/// `user_id` is the opaque subject handed out by the external identity
/// provider; the reservation layer trusts it and performs no verification of
/// its own. Whether an actor counts as "driver" or "passenger" is decided per
/// operation by comparing the id against the ride/booking ownership fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Actor {
    pub user_id: String,
    pub display_name: String,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
        }
    }

    pub fn owns(&self, subject_id: &str) -> bool {
        self.user_id == subject_id
    }
}
