pub mod assert;
pub mod data_types;
pub mod ledger_utils;
