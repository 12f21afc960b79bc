//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;
use verdant_types::{PaymentMethod, Role, SubscriptionStatus};

use crate::{
    application::password::hash_password,
    domain::entities::{plan::Plan, subscription::Subscription, user::User},
};

/// Password behind every `create_test_user` hash.
pub const TEST_PASSWORD: &str = "correct horse battery";

/// Create a test plan with sensible defaults.
pub fn create_test_plan(overrides: impl FnOnce(&mut Plan)) -> Plan {
    let mut plan = Plan {
        id: Uuid::new_v4(),
        name: "Monthly".to_string(),
        description: Some("Full access for 30 days".to_string()),
        price_paise: 49_900,
        currency: "INR".to_string(),
        duration_days: 30,
        features: vec!["All courses".to_string(), "Community".to_string()],
        is_active: true,
        display_order: 0,
        created_at: test_datetime(),
        updated_at: test_datetime(),
    };
    overrides(&mut plan);
    plan
}

/// Create a test user whose password is [`TEST_PASSWORD`].
pub fn create_test_user(overrides: impl FnOnce(&mut User)) -> User {
    let mut user = User {
        id: Uuid::new_v4(),
        name: "Asha Rao".to_string(),
        email: format!("user-{}@example.com", Uuid::new_v4().simple()),
        password_hash: hash_password(TEST_PASSWORD).unwrap(),
        role: Role::User,
        created_at: test_datetime(),
        updated_at: test_datetime(),
    };
    overrides(&mut user);
    user
}

pub fn create_test_admin(overrides: impl FnOnce(&mut User)) -> User {
    create_test_user(|u| {
        u.role = Role::Admin;
        u.email = format!("admin-{}@example.com", Uuid::new_v4().simple());
        overrides(u);
    })
}

/// Create an active subscription on `plan` that started a day ago.
pub fn create_test_subscription(
    user_id: Uuid,
    plan: &Plan,
    overrides: impl FnOnce(&mut Subscription),
) -> Subscription {
    let now = Utc::now();
    let mut sub = Subscription::new(
        user_id,
        plan,
        SubscriptionStatus::Active,
        now - Duration::days(1),
        PaymentMethod::Online,
        now,
    );
    overrides(&mut sub);
    sub
}

/// Helper for a fixed test datetime.
pub fn test_datetime() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}
