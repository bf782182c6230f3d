use crate::models::{MessageRow, UserRow};
use crate::{Result, SqlValue, Store};

/// Typed queries over the unified layer. All SQL here is written once, in
/// the shared placeholder dialect, and runs against whichever backend is
/// active.
impl Store {
    // -- Users --

    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        profile_pic: Option<&str>,
        usb_key: Option<&str>,
    ) -> Result<()> {
        let params = [
            SqlValue::from(username),
            SqlValue::from(password),
            SqlValue::from(profile_pic),
            SqlValue::from(usb_key),
        ];
        self.execute(
            "INSERT INTO users (username, password, profile_pic, usb_key) VALUES (?, ?, ?, ?)",
            &params,
        )
        .await?;
        Ok(())
    }

    /// Credential lookup: both fields must match exactly, in the store.
    pub async fn find_user(&self, username: &str, password: &str) -> Result<Option<UserRow>> {
        let params = [SqlValue::from(username), SqlValue::from(password)];
        let rows = self
            .query(
                "SELECT id, username, password, profile_pic, usb_key FROM users \
                 WHERE username = ? AND password = ?",
                &params,
            )
            .await?;
        rows.first().map(UserRow::from_row).transpose()
    }

    // -- Messages --

    pub async fn insert_message(&self, sender: &str, body: &str) -> Result<()> {
        let params = [SqlValue::from(sender), SqlValue::from(body)];
        self.execute("INSERT INTO messages (sender, message) VALUES (?, ?)", &params)
            .await?;
        Ok(())
    }

    /// Full history, oldest first. `id` breaks ties between same-second
    /// timestamps so retrieval order always matches insertion order.
    pub async fn list_messages(&self) -> Result<Vec<MessageRow>> {
        let rows = self
            .query(
                "SELECT id, sender, message, timestamp FROM messages ORDER BY timestamp, id",
                &[],
            )
            .await?;
        rows.iter().map(MessageRow::from_row).collect()
    }
}
