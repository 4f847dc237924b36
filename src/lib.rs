pub mod db;
pub mod geo;
pub mod opendata;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod routes;
pub mod schedule;
pub mod stats;
pub mod synth;
pub mod table;
