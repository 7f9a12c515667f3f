use crate::errors::{MungError, Result};
use serde::{Deserialize, Serialize};

/// Latent parameter classes of the joint factorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamClass {
    /// sample codes (rows -> latent space)
    SampleCode,
    /// feature codes (columns -> latent space)
    FeatureCode,
    /// cross-terms coupling one modality's basis to another's
    CrossTerm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sharing {
    /// one parameter tied across every modality in the join
    All,
    /// a free parameter per modality
    Private,
}

/// Sharing declaration for one modality
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModalityTopology {
    pub name: Box<str>,
    pub sample_code: Sharing,
    pub feature_code: Sharing,
    pub cross_term: Sharing,
}

/// Which latent parameters are shared versus modality-private across
/// the join. Validated before fitting: a class marked `All` for one
/// modality must be `All` for every other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinTopology {
    pub modalities: Vec<ModalityTopology>,
}

impl JoinTopology {
    /// The default joint model: one sample code and one cross-term for
    /// everyone, feature codes private (each modality keeps its own
    /// vocabulary).
    pub fn fully_shared(names: &[Box<str>]) -> Self {
        Self {
            modalities: names
                .iter()
                .map(|name| ModalityTopology {
                    name: name.clone(),
                    sample_code: Sharing::All,
                    feature_code: Sharing::Private,
                    cross_term: Sharing::All,
                })
                .collect(),
        }
    }

    pub fn names(&self) -> Vec<Box<str>> {
        self.modalities.iter().map(|m| m.name.clone()).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.modalities.iter().position(|m| m.name.as_ref() == name)
    }

    pub fn sharing(&self, class: ParamClass, idx: usize) -> Sharing {
        let mm = &self.modalities[idx];
        match class {
            ParamClass::SampleCode => mm.sample_code,
            ParamClass::FeatureCode => mm.feature_code,
            ParamClass::CrossTerm => mm.cross_term,
        }
    }

    pub fn is_shared(&self, class: ParamClass) -> bool {
        !self.modalities.is_empty() && self.sharing(class, 0) == Sharing::All
    }

    /// Reject inconsistent declarations before any optimization starts
    pub fn validate(&self) -> Result<()> {
        if self.modalities.is_empty() {
            return Err(MungError::Topology("no modalities declared".into()));
        }

        let mut seen = std::collections::HashSet::new();
        for mm in &self.modalities {
            if !seen.insert(mm.name.clone()) {
                return Err(MungError::Topology(format!(
                    "modality '{}' declared twice",
                    mm.name
                )));
            }
        }

        for class in [
            ParamClass::SampleCode,
            ParamClass::FeatureCode,
            ParamClass::CrossTerm,
        ] {
            let any_all = (0..self.modalities.len()).any(|i| self.sharing(class, i) == Sharing::All);
            let all_all = (0..self.modalities.len()).all(|i| self.sharing(class, i) == Sharing::All);
            if any_all && !all_all {
                return Err(MungError::Topology(format!(
                    "{:?} marked 'all' for some modalities but not others",
                    class
                )));
            }
        }
        Ok(())
    }
}
