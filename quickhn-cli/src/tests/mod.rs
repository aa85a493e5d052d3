//! Shared test harness modules for the quickhn CLI.

use super::query::*;
use super::*;

mod helpers;
mod query_steps;
