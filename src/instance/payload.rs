use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use crate::model::Fragment;
use crate::model::Model;
use crate::model::Value;
use crate::ConfigurationError;

/// Model fragments and parameter assignments owned by a single instance in a branch hierarchy.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Layer {
    pub(crate) data: BTreeMap<String, Value>,
    pub(crate) fragments: Vec<Fragment>,
}

impl Layer {
    pub(crate) fn is_empty(&self) -> bool {
        self.data.is_empty() && self.fragments.is_empty()
    }
}

/// A file passed to MiniZinc.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PayloadFile {
    /// A file given by the user, passed by path.
    Existing(PathBuf),
    /// A file generated from inline source or assignments, written before each invocation.
    Generated { name: String, contents: String },
}

/// The exact set of files MiniZinc is invoked with to solve an instance.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Payload {
    files: Vec<PayloadFile>,
}

impl Payload {
    /// Collect the model, followed by the data of each layer in the order in which the layers were
    /// created.
    pub(crate) fn build<'a>(
        model: &Model,
        layers: impl IntoIterator<Item = &'a Layer>,
        include_data: bool,
    ) -> Result<Payload, ConfigurationError> {
        let layers = layers.into_iter().collect::<Vec<_>>();

        let mut files = Vec::new();
        let mut code = Vec::new();

        let fragments = model
            .fragments()
            .iter()
            .chain(layers.iter().flat_map(|layer| layer.fragments.iter()))
            .filter(|fragment| include_data || fragment.is_code());
        for fragment in fragments {
            match fragment {
                Fragment::ModelFile(path) | Fragment::DataFile(path) => {
                    files.push(PayloadFile::Existing(path.clone()))
                }
                Fragment::Code(source) => code.push(source.as_str()),
            }
        }

        if !code.is_empty() {
            files.push(PayloadFile::Generated {
                name: "model.mzn".to_owned(),
                contents: code.join("\n"),
            });
        }

        if include_data {
            for (index, layer) in layers.iter().enumerate() {
                files.extend(data_files(index, &layer.data)?);
            }
        }

        Ok(Payload { files })
    }

    pub fn files(&self) -> &[PayloadFile] {
        &self.files
    }

    /// The contents of a generated file.
    pub fn generated(&self, name: &str) -> Option<&str> {
        self.files.iter().find_map(|file| match file {
            PayloadFile::Generated {
                name: generated,
                contents,
            } if generated == name => Some(contents.as_str()),
            _ => None,
        })
    }

    /// Write the generated files to `directory`, returning the paths of all files in order.
    pub(crate) fn write_to(&self, directory: &Path) -> std::io::Result<Vec<PathBuf>> {
        self.files
            .iter()
            .map(|file| match file {
                PayloadFile::Existing(path) => Ok(path.clone()),
                PayloadFile::Generated { name, contents } => {
                    let path = directory.join(name);
                    std::fs::write(&path, contents)?;
                    Ok(path)
                }
            })
            .collect()
    }
}

/// Assignments are written as MiniZinc JSON where possible; annotations can only be expressed in
/// DZN.
fn data_files(
    index: usize,
    data: &BTreeMap<String, Value>,
) -> Result<Vec<PayloadFile>, ConfigurationError> {
    let mut json = serde_json::Map::new();
    let mut dzn = Vec::new();

    for (name, value) in data {
        if !value.is_finite() {
            return Err(ConfigurationError::NonFiniteFloat(name.clone()));
        }

        match value.to_json() {
            Some(encoded) if !value.contains_annotation() => {
                let _ = json.insert(name.clone(), encoded);
            }
            _ => dzn.push(value.to_dzn_assignment(name)?),
        }
    }

    let mut files = Vec::new();
    if !json.is_empty() {
        files.push(PayloadFile::Generated {
            name: format!("data_{index}.json"),
            contents: serde_json::Value::Object(json).to_string(),
        });
    }
    if !dzn.is_empty() {
        files.push(PayloadFile::Generated {
            name: format!("data_{index}.dzn"),
            contents: dzn.join("\n"),
        });
    }

    Ok(files)
}
