//! Embedded SQL migrations, applied in declaration order

pub struct Migration {
    pub id: &'static str,
    pub sql: &'static str,
}

pub fn get_migrations() -> Vec<Migration> {
    vec![
        Migration {
            id: "001_current_state",
            sql: include_str!("../../migrations/001_current_state.sql"),
        },
        Migration {
            id: "002_change_log",
            sql: include_str!("../../migrations/002_change_log.sql"),
        },
        Migration {
            id: "003_snapshot_summaries",
            sql: include_str!("../../migrations/003_snapshot_summaries.sql"),
        },
    ]
}
