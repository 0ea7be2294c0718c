//! The parameter-free description of a constraint model.

mod value;

use std::path::Path;
use std::path::PathBuf;

pub use value::Value;

use crate::ConfigurationError;

/// A single piece of source that makes up a [`Model`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fragment {
    /// A `.mzn` model file.
    ModelFile(PathBuf),
    /// A `.dzn` or `.json` data file.
    DataFile(PathBuf),
    /// Model source given inline.
    Code(String),
}

impl Fragment {
    /// Classify a file by its extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Fragment, ConfigurationError> {
        let path = path.into();

        match path.extension().and_then(|extension| extension.to_str()) {
            Some("mzn") => Ok(Fragment::ModelFile(path)),
            Some("dzn" | "json") => Ok(Fragment::DataFile(path)),
            _ => Err(ConfigurationError::UnsupportedFile(path)),
        }
    }

    pub(crate) fn is_code(&self) -> bool {
        matches!(self, Fragment::ModelFile(_) | Fragment::Code(_))
    }
}

/// Builds up the source of a model in the order in which it is given.
#[derive(Clone, Debug, Default)]
pub struct Model {
    fragments: Vec<Fragment>,
}

impl Model {
    pub fn new() -> Model {
        Model::default()
    }

    /// Create a model from a single file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Model, ConfigurationError> {
        let mut model = Model::new();
        model.add_file(path)?;
        Ok(model)
    }

    /// Create a model from inline source.
    pub fn from_string(code: impl Into<String>) -> Model {
        let mut model = Model::new();
        model.add_string(code);
        model
    }

    /// Add a model or data file to the model.
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<(), ConfigurationError> {
        let fragment = Fragment::from_path(path.as_ref())?;
        self.fragments.push(fragment);
        Ok(())
    }

    /// Add inline model source to the model.
    pub fn add_string(&mut self, code: impl Into<String>) {
        self.fragments.push(Fragment::Code(code.into()));
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}
