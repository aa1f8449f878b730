pub mod catalog;
pub mod clean;
pub mod coerce;
pub mod db;
pub mod errors;
pub mod facts;
pub mod lookup;
pub mod masters;
pub mod sources;
pub mod xlsx_to_pl;
