pub mod aggregate;
pub mod analyze;
pub mod client;
pub mod config;
pub mod detect;
pub mod labels;
pub mod lookup;
pub mod model;
pub mod report;
pub mod variants;
