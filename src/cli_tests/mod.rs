//! CLI argument parsing tests.

mod cli;
