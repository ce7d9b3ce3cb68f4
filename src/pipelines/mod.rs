//! Render pipelines built for linked programs.

pub mod strip;
