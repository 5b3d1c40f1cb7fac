pub mod common;

mod fleet_tests;
