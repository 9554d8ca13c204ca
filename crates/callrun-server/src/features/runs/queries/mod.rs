pub mod get_counter;

pub use get_counter::GetCounterQuery;
