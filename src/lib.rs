//! # MiniZinc driver
//!
//! Drives the `minizinc` command-line tool to solve constraint models. A [`Model`] is combined
//! with a [`Solver`] into an [`Instance`], which can be given parameter data and solved either
//! blocking ([`Instance::solve`]) or asynchronously, one solution at a time
//! ([`Instance::solutions`]).
//!
//! Instances can be branched: a branch inherits the model source and data of its parent and can
//! extend them without affecting the parent.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use minizinc_driver::Driver;
//! use minizinc_driver::Instance;
//! use minizinc_driver::Model;
//! use minizinc_driver::SolveOptions;
//! use minizinc_driver::Solver;
//!
//! # fn main() -> Result<(), minizinc_driver::Error> {
//! let mut driver = Driver::find(None)?;
//! let gecode = Solver::lookup("gecode", &mut driver, false)?;
//!
//! let model = Model::from_string("int: n; var 1..n: x; constraint x * x = n;");
//! let mut instance = Instance::new(Arc::new(driver), gecode, model);
//! instance.set("n", 9);
//!
//! let result = instance.solve(&SolveOptions::default())?;
//! println!("{}: {:?}", result.status, result.solution().map(|solution| &solution["x"]));
//! # Ok(())
//! # }
//! ```

pub mod driver;
mod error;
pub mod instance;
pub mod model;
pub mod results;
pub mod runner;
pub mod solver;
pub mod types;

#[cfg(test)]
mod tests;

pub use driver::Driver;
pub use driver::Version;
pub use driver::REQUIRED_VERSION;
pub use error::parse_error;
pub use error::ConfigurationError;
pub use error::Error;
pub use error::Location;
pub use error::MiniZincError;
pub use error::MiniZincErrorKind;
pub use instance::Instance;
pub use instance::SolveOptions;
pub use model::Fragment;
pub use model::Model;
pub use model::Value;
pub use results::SolveResult;
pub use results::Solution;
pub use results::Status;
pub use solver::Solver;
pub use solver::SolverConfiguration;
pub use types::Method;
pub use types::ModelInterface;
pub use types::ValueType;
