pub mod alert;
pub mod errors;
pub mod intents;
pub mod ports;
pub mod position;
pub mod symbol_spec;
pub mod trade_result;
pub mod vpvr;
