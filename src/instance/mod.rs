//! A [`Model`] bound to a solver, together with the parameter assignments needed to solve it.
//!
//! Instances form a hierarchy through [`Instance::branch`]. A branch sees every fragment and
//! assignment of its ancestors at the time it was created, and anything added to the branch
//! afterwards stays invisible to the ancestors and to its siblings. Internally each instance owns
//! a single mutable [`Layer`]; branching freezes the current layer and shares it between parent
//! and child.
//!
//! The layers are handed to MiniZinc in order, one data file per layer, and MiniZinc is always
//! invoked with `--allow-multiple-assignments`. Assigning a parameter that an ancestor already
//! assigned therefore adds a second assignment rather than replacing the first, whereas assigning
//! the same name twice on one instance keeps only the last value.

mod payload;
mod stream;

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use log::warn;
use once_cell::sync::OnceCell;
use tokio::io::AsyncReadExt;

use self::payload::Layer;
pub use self::payload::Payload;
pub use self::payload::PayloadFile;
pub use self::stream::SolutionStream;
use crate::model::Fragment;
use crate::model::Model;
use crate::model::Value;
use crate::results::OutputParser;
use crate::results::SolveResult;
use crate::types::Method;
use crate::types::ModelInterface;
use crate::types::ValueType;
use crate::ConfigurationError;
use crate::Driver;
use crate::Error;
use crate::Solver;

/// The flags every solve is started with; the output parser relies on them.
const OUTPUT_FLAGS: [&str; 5] = [
    "--output-mode",
    "json",
    "--output-time",
    "--output-objective",
    "--output-output-item",
];

/// Options which control a single solve.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SolveOptions {
    /// Report every solution of a satisfaction problem.
    pub all_solutions: bool,
    /// Report every improving solution of an optimisation problem.
    pub intermediate_solutions: bool,
    /// Stop after this many solutions.
    pub nr_solutions: Option<usize>,
    /// The number of threads the solver may use.
    pub processes: Option<usize>,
    pub random_seed: Option<i64>,
    /// Allow the solver to ignore the search annotations of the model.
    pub free_search: bool,
    /// The time MiniZinc is allowed to spend, including flattening.
    pub time_limit: Option<Duration>,
    /// The optimisation level passed to the compiler as `-O<level>`.
    pub optimisation_level: Option<u8>,
    /// Arguments passed to MiniZinc as is.
    pub extra_args: Vec<String>,
}

/// A model, a solver, and the data that make up a solvable problem.
#[derive(Debug)]
pub struct Instance {
    driver: Arc<Driver>,
    solver: Solver,
    model: Arc<Model>,
    ancestors: Vec<Arc<Layer>>,
    layer: Layer,
    interface: OnceCell<ModelInterface>,
}

impl Instance {
    pub fn new(driver: Arc<Driver>, solver: Solver, model: Model) -> Instance {
        Instance {
            driver,
            solver,
            model: Arc::new(model),
            ancestors: Vec::new(),
            layer: Layer::default(),
            interface: OnceCell::new(),
        }
    }

    pub fn solver(&self) -> &Solver {
        &self.solver
    }

    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    /// Assign a value to a parameter. Whether the name is declared, and whether the value fits its
    /// declaration, is only checked once the instance is solved.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let _ = self.layer.data.insert(name.into(), value.into());
    }

    /// The value assigned to `name` by this instance, or else by its nearest ancestor.
    pub fn get(&self, name: &str) -> Option<&Value> {
        std::iter::once(&self.layer)
            .chain(self.ancestors.iter().rev().map(Arc::as_ref))
            .find_map(|layer| layer.data.get(name))
    }

    /// Add inline MiniZinc source to this instance.
    pub fn add_to_model(&mut self, code: impl Into<String>) {
        self.layer.fragments.push(Fragment::Code(code.into()));
        self.interface = OnceCell::new();
    }

    /// Add a model (`.mzn`) or data (`.dzn`, `.json`) file to this instance.
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<(), ConfigurationError> {
        let fragment = Fragment::from_path(path.as_ref())?;
        if fragment.is_code() {
            self.interface = OnceCell::new();
        }
        self.layer.fragments.push(fragment);
        Ok(())
    }

    /// Create a child instance which inherits everything added to this instance so far.
    pub fn branch(&self) -> Instance {
        let mut ancestors = self.ancestors.clone();
        if !self.layer.is_empty() {
            ancestors.push(Arc::new(self.layer.clone()));
        }

        Instance {
            driver: Arc::clone(&self.driver),
            solver: self.solver.clone(),
            model: Arc::clone(&self.model),
            ancestors,
            layer: Layer::default(),
            interface: self.interface.clone(),
        }
    }

    /// The declared inputs and outputs of the model. The first call runs MiniZinc, after which the
    /// result is cached until more model source is added.
    pub fn interface(&self) -> Result<&ModelInterface, Error> {
        self.interface.get_or_try_init(|| self.analyse())
    }

    pub fn method(&self) -> Result<Method, Error> {
        Ok(self.interface()?.method)
    }

    /// Every parameter that still needs a value.
    pub fn input(&self) -> Result<&BTreeMap<String, ValueType>, Error> {
        Ok(&self.interface()?.input)
    }

    pub fn output(&self) -> Result<&BTreeMap<String, ValueType>, Error> {
        Ok(&self.interface()?.output)
    }

    /// The files MiniZinc would be started with to solve this instance.
    pub fn payload(&self) -> Result<Payload, ConfigurationError> {
        Payload::build(&self.model, self.layers(), true)
    }

    /// Solve the instance, blocking until MiniZinc has finished.
    pub fn solve(&self, options: &SolveOptions) -> Result<SolveResult, Error> {
        let interface = self.prepare()?;
        let directory = tempfile::Builder::new().prefix("mzn_").tempdir()?;
        let args = self.solve_args(options, interface, directory.path())?;

        let output = self.driver.run(&args, Some(&self.solver))?;

        let mut parser = OutputParser::new(interface.method, interface.output.clone());
        let mut solutions = Vec::new();
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            if let Some(solution) = parser.feed_line(line)? {
                solutions.push(solution);
            }
        }

        Ok(SolveResult {
            status: parser.status(),
            solutions,
            statistics: parser.into_statistics(),
        })
    }

    /// Solve the instance without blocking the executor. Dropping the future stops MiniZinc and
    /// its solver.
    pub async fn solve_async(&self, options: &SolveOptions) -> Result<SolveResult, Error> {
        let mut stream = self.solutions(options).await?;

        let mut solutions = Vec::new();
        while let Some(solution) = stream.next_solution().await? {
            solutions.push(solution);
        }

        Ok(stream.into_result(solutions))
    }

    /// Start solving the instance and report solutions as MiniZinc finds them.
    ///
    /// Dropping the stream stops the solve, including the solver MiniZinc started.
    pub async fn solutions(&self, options: &SolveOptions) -> Result<SolutionStream, Error> {
        let interface = self.prepare()?;
        let directory = tempfile::Builder::new().prefix("mzn_").tempdir()?;
        let args = self.solve_args(options, interface, directory.path())?;

        let configuration = self.solver.configuration()?;
        let mut child = self
            .driver
            .create_process(&args, Some(configuration.as_os_str()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Output("the standard output of MiniZinc is not piped".to_owned()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Output("the standard error of MiniZinc is not piped".to_owned()))?;

        let stderr = tokio::spawn(async move {
            let mut buffer = Vec::new();
            let _ = stderr.read_to_end(&mut buffer).await?;
            Ok::<_, std::io::Error>(buffer)
        });

        Ok(SolutionStream::new(
            child,
            stdout,
            stderr,
            OutputParser::new(interface.method, interface.output.clone()),
            configuration,
            directory,
        ))
    }

    fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.ancestors
            .iter()
            .map(Arc::as_ref)
            .chain(std::iter::once(&self.layer))
    }

    fn analyse(&self) -> Result<ModelInterface, Error> {
        let directory = tempfile::Builder::new().prefix("mzn_").tempdir()?;
        let files = Payload::build(&self.model, self.layers(), false)?.write_to(directory.path())?;

        let mut args = vec![OsString::from("--model-interface-only")];
        args.extend(files.into_iter().map(OsString::from));

        let output = self.driver.run(&args, Some(&self.solver))?;
        let interface = ModelInterface::from_json(&output.stdout)?;
        debug!(
            "Analysed model: {} input(s), {} output(s)",
            interface.input.len(),
            interface.output.len()
        );

        Ok(interface)
    }

    fn prepare(&self) -> Result<&ModelInterface, Error> {
        let interface = self.interface()?;
        self.validate(interface)?;
        Ok(interface)
    }

    /// Check every assignment against the declarations of the model. Mismatched element types are
    /// left for MiniZinc to report.
    fn validate(&self, interface: &ModelInterface) -> Result<(), ConfigurationError> {
        for (name, value) in self.layers().flat_map(|layer| layer.data.iter()) {
            let declared = interface
                .declaration(name)
                .ok_or_else(|| ConfigurationError::UnknownParameter(name.clone()))?;

            let expected = declared.dimensions();
            if !value.has_dimensions(expected) {
                return Err(ConfigurationError::ShapeMismatch {
                    name: name.clone(),
                    expected,
                    found: value.dimensions(),
                });
            }

            if !declared.accepts(value) {
                warn!("The value assigned to '{name}' does not match its declared type `{declared}`");
            }
        }

        Ok(())
    }

    /// The arguments for a solve, including the payload written into `directory`.
    fn solve_args(
        &self,
        options: &SolveOptions,
        interface: &ModelInterface,
        directory: &Path,
    ) -> Result<Vec<OsString>, Error> {
        let mut args: Vec<OsString> = OUTPUT_FLAGS.iter().map(OsString::from).collect();
        let mut flag = |name: &'static str, value: Option<String>| -> Result<(), ConfigurationError> {
            if !self.solver.supports(name) {
                return Err(ConfigurationError::UnsupportedFlag {
                    solver: self.solver.id.clone(),
                    flag: name,
                });
            }
            args.push(name.into());
            args.extend(value.map(OsString::from));
            Ok(())
        };

        if options.all_solutions {
            if interface.method != Method::Satisfy {
                return Err(ConfigurationError::AllOptimalSolutions.into());
            }
            flag("-a", None)?;
        } else if options.intermediate_solutions {
            if self.solver.supports("-i") {
                flag("-i", None)?;
            } else {
                flag("-a", None)?;
            }
        }
        if let Some(count) = options.nr_solutions {
            flag("-n", Some(count.to_string()))?;
        }
        if let Some(processes) = options.processes {
            flag("-p", Some(processes.to_string()))?;
        }
        if let Some(seed) = options.random_seed {
            flag("-r", Some(seed.to_string()))?;
        }
        if options.free_search {
            flag("-f", None)?;
        }

        if let Some(limit) = options.time_limit {
            args.push("--time-limit".into());
            args.push(limit.as_millis().to_string().into());
        }
        if let Some(level) = options.optimisation_level {
            args.push(format!("-O{level}").into());
        }
        if self.solver.supports("-s") {
            args.push("--statistics".into());
        }
        args.extend(options.extra_args.iter().map(OsString::from));

        let files = self.payload()?.write_to(directory)?;
        args.extend(files.into_iter().map(OsString::from));

        Ok(args)
    }
}
