// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! Capacity bounds, trust subject matching, address allocation, and
//! deterministic synthesis.

mod address_allocation;
mod capacity_bounds;
mod synthesis;
mod trust_subjects;
