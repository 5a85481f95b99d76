use uuid::Uuid;

/// Public view of an account, safe to return from any endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}
