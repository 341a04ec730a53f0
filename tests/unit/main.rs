//! Integration tests for the fusion API.

mod fusion_scenario_tests;
mod logging_tests;
