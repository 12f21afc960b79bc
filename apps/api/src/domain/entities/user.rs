use chrono::{DateTime, Utc};
use uuid::Uuid;
use verdant_types::{Role, UserDetails};

#[derive(Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Stored lowercased
    pub email: String,
    /// Argon2 PHC string
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn to_details(&self) -> UserDetails {
        UserDetails {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            created_at: Some(self.created_at),
        }
    }
}

// Keeps the password hash out of logs.
impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}
