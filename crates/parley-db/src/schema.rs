/// The two tables, in each backend's dialect. Semantically equivalent:
/// auto-incrementing integer key, unique username, store-assigned message
/// timestamp.

pub(crate) const SQLITE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        username    TEXT NOT NULL UNIQUE,
        password    TEXT NOT NULL,
        profile_pic TEXT,
        usb_key     TEXT
    );

    CREATE TABLE IF NOT EXISTS messages (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        sender      TEXT NOT NULL,
        message     TEXT NOT NULL,
        timestamp   DATETIME DEFAULT CURRENT_TIMESTAMP
    );
";

pub(crate) const POSTGRES_SCHEMA: [&str; 2] = [
    "CREATE TABLE IF NOT EXISTS users (
        id          SERIAL PRIMARY KEY,
        username    TEXT NOT NULL UNIQUE,
        password    TEXT NOT NULL,
        profile_pic TEXT,
        usb_key     TEXT
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        id          SERIAL PRIMARY KEY,
        sender      TEXT NOT NULL,
        message     TEXT NOT NULL,
        timestamp   TIMESTAMPTZ DEFAULT now()
    )",
];
