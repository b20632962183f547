//! Weir Core Types and Definitions
//!
//! This crate provides the foundational types for the Weir BPMN authoring
//! and layout service. It includes:
//!
//! - **Geometry**: Basic geometric types ([`geometry`] module)
//! - **Elements**: The BPMN element and connection kinds with their typed
//!   defaults ([`element`] module)
//! - **Waypoints**: Polyline helpers for orthogonal connection routing
//!   ([`waypoint`] module)
//! - **Text**: Headless text-metric estimation ([`text`] module)

pub mod element;
pub mod geometry;
pub mod text;
pub mod waypoint;
