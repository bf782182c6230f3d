use crate::{Result, Row};

/// Database row types, decoded from the unified [`Row`](crate::Row) shape.
/// Distinct from the parley-types API models to keep this layer independent.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub profile_pic: Option<String>,
    pub usb_key: Option<String>,
}

impl UserRow {
    pub(crate) fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.i64("id")?,
            username: row.text("username")?,
            password: row.text("password")?,
            profile_pic: row.opt_text("profile_pic")?,
            usb_key: row.opt_text("usb_key")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub sender: String,
    pub message: String,
    pub timestamp: String,
}

impl MessageRow {
    pub(crate) fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.i64("id")?,
            sender: row.text("sender")?,
            message: row.text("message")?,
            timestamp: row.text("timestamp")?,
        })
    }
}
