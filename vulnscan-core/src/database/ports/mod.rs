//! Repository ports. Services depend on these traits; the PostgreSQL
//! adapters under `database::postgres` and the in-memory doubles under
//! `testing` implement them.

pub mod scans;
pub mod users;
pub mod verification_tokens;
