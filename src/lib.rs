pub mod cli;
pub mod error;
pub mod figures;
pub mod parse;
pub mod phases;
pub mod plot;
pub mod report;
pub mod series;
