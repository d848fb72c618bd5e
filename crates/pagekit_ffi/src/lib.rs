//! Flutter bridge for the PageKit editor core.

pub mod api;
