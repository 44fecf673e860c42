use serde::{Deserialize, Serialize};

/// Reserved owner of rows whose author account was deleted.
pub const DELETED_USER_ID: i64 = -1;

/// Group every self-registered account starts in.
pub const DEFAULT_GROUP_ID: i64 = 2;

/// Group the bootstrap administrator is placed in.
pub const ADMIN_GROUP_ID: i64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub groupid: i64,
    pub login: String,
    #[serde(skip)]
    pub password: String,
    pub name: String,
    pub email: String,
    pub created: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub manage_users: bool,
}

/// One line of the administrator's user list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserListing {
    pub id: i64,
    pub login: String,
    pub name: String,
    pub email: String,
    pub group_name: String,
}

