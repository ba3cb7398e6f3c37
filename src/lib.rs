//! Client core for exploring a four-dimensional delivery-delay cube.
//!
//! The crate keeps the query state (one level per dimension, row filters and
//! a drill path), turns it into requests for a remote aggregation service,
//! and derives slicer options and table views from the rows it returns.

pub mod catalog;
pub mod command;
pub mod error;
pub mod navigator;
pub mod record;
pub mod resolver;
pub mod service;
pub mod session;
pub mod settings;
pub mod slice;
pub mod state;
pub mod view;

pub use crate::{
    catalog::{BranchTag, Dimension, Level},
    error::{ServiceError, StateError},
    session::Explorer,
    state::{QueryState, Selection},
};
