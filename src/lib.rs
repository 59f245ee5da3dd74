pub mod app;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod graphkb;
pub mod inference;
pub mod normalize;
pub mod notation;
pub mod output;
pub mod precedence;
pub mod record;
pub mod reference;
pub mod sources;
pub mod upsert;
pub mod variant;
