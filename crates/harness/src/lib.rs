pub mod fixture;

pub use fixture::{DUMMY_TABLE_SQL, TestDb};
