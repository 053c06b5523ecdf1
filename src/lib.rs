//! awstools - CloudFormation and AutoScaling helpers
//!
//! Applications are described once in a YAML settings file. A stack name like
//! `tt-python-production` resolves to the properties of the application `tt`
//! in environment `production` and pool `python`, which become the parameters
//! of the stack's CloudFormation template. AutoScaling groups of a stack can be
//! resized or migrated to fresh instances without downtime.

pub mod application;
pub mod autoscale;
pub mod config;
pub mod display;
pub mod error;
pub mod provider;
pub mod template;

pub use error::{AwsToolsError, Result};
