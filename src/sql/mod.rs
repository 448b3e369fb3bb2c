pub mod builder;
pub mod params;

pub use builder::{delete, insert, select_by_key, select_list, update, QueryBuf};
pub use params::PgBindValue;
