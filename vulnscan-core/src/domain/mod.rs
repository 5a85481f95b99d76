pub mod scans;
pub mod users;
pub mod verification;
