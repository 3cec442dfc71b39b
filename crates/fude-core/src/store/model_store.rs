use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FudeError, Result};
use crate::store::{code_path, list_codes, read_json, write_json};
use crate::types::feature::FEATURE_DIMENSIONS;
use crate::types::{CharCode, CharacterModel, DiagonalGaussian, HmmParameters, Stage};

/// File extension of model parameter documents.
pub const MODEL_EXTENSION: &str = "hmm";

#[derive(Debug, Serialize, Deserialize)]
struct EmissionFile {
    mean: [f64; FEATURE_DIMENSIONS],
    /// Row-major covariance; off-diagonal entries must be zero.
    covariance: [f64; 4],
}

#[derive(Debug, Serialize, Deserialize)]
struct ModelFile {
    code: CharCode,
    stage: Stage,
    n_states: usize,
    dimensions: usize,
    initial: Vec<f64>,
    transitions: Vec<Vec<f64>>,
    emissions: Vec<EmissionFile>,
}

impl ModelFile {
    fn from_model(model: &CharacterModel, stage: Stage) -> Self {
        let params = &model.params;
        Self {
            code: model.code,
            stage,
            n_states: params.n_states(),
            dimensions: FEATURE_DIMENSIONS,
            initial: params.initial().to_vec(),
            transitions: params.transitions().to_vec(),
            emissions: params
                .emissions()
                .iter()
                .map(|g| EmissionFile {
                    mean: g.mean(),
                    covariance: g.covariance(),
                })
                .collect(),
        }
    }

    fn into_params(self) -> Result<HmmParameters> {
        if self.dimensions != FEATURE_DIMENSIONS {
            return Err(FudeError::InvalidModel(format!(
                "expected {FEATURE_DIMENSIONS}-dimensional emissions, found {}",
                self.dimensions
            )));
        }
        if self.n_states != self.initial.len() {
            return Err(FudeError::InvalidModel(format!(
                "declares {} states but has {} initial probabilities",
                self.n_states,
                self.initial.len()
            )));
        }

        let emissions = self
            .emissions
            .into_iter()
            .map(|e| {
                let [vx, cxy, cyx, vy] = e.covariance;
                if cxy != 0.0 || cyx != 0.0 {
                    return Err(FudeError::InvalidModel(
                        "only diagonal covariances are supported".into(),
                    ));
                }
                DiagonalGaussian::new(e.mean, [vx, vy])
            })
            .collect::<Result<Vec<_>>>()?;

        let params = HmmParameters::new(self.initial, self.transitions, emissions)?;
        if !params.is_left_to_right() {
            return Err(FudeError::InvalidModel(
                "transitions must only stay or advance to the next state".into(),
            ));
        }
        Ok(params)
    }
}

/// Per-character model parameters for the initial and trained stages.
#[derive(Debug, Clone)]
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    /// Store rooted at `<root>/hmms`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().join("hmms"),
        }
    }

    pub fn stage_dir(&self, stage: Stage) -> PathBuf {
        self.root.join(stage.dir_name())
    }

    pub fn path(&self, stage: Stage, code: CharCode) -> PathBuf {
        code_path(&self.stage_dir(stage), code, MODEL_EXTENSION)
    }

    /// Writes a model, replacing any previous one for the same character and stage.
    pub fn write(&self, stage: Stage, model: &CharacterModel) -> Result<()> {
        write_json(&self.path(stage, model.code), &ModelFile::from_model(model, stage))
    }

    /// Loads a model, or `None` if it was never written.
    pub fn load(&self, stage: Stage, code: CharCode) -> Result<Option<HmmParameters>> {
        let Some(file) = read_json::<ModelFile>(&self.path(stage, code))? else {
            return Ok(None);
        };
        if file.code != code {
            return Err(FudeError::InvalidModel(format!(
                "file for character {code} declares character {}",
                file.code
            )));
        }
        file.into_params().map(Some)
    }

    /// Sorted codes of all models stored for `stage`.
    pub fn codes(&self, stage: Stage) -> Result<Vec<CharCode>> {
        list_codes(&self.stage_dir(stage), MODEL_EXTENSION)
    }

    /// Loads every model of a stage, in code order.
    pub fn load_all(&self, stage: Stage) -> Result<Vec<CharacterModel>> {
        let mut models = Vec::new();
        for code in self.codes(stage)? {
            if let Some(params) = self.load(stage, code)? {
                models.push(CharacterModel::new(code, params));
            }
        }
        Ok(models)
    }
}
