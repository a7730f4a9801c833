//! Binding report - the serializable view of a verified input set

use serde::Serialize;

use crate::binder::{AmbiguousMatch, InputBinder, InputKind};
use crate::error::BindError;
use crate::frame::FrameGroup;
use crate::input_set::InputSet;
use crate::params::ParameterSet;
use crate::recipe::{ProductName, Recipe};

#[derive(Debug, Clone, Serialize)]
pub struct BindingReport {
    pub recipe: String,
    pub params: ParameterSet,
    pub inputs: Vec<InputReport>,
    pub products: Vec<ProductName>,
    pub unclaimed: Vec<String>,
    pub warnings: Vec<AmbiguousMatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InputReport {
    pub name: String,
    pub kind: InputKind,
    pub title: String,
    pub group: FrameGroup,
    pub required: bool,
    pub frames: Vec<String>,
    pub params: ParameterSet,
}

impl BindingReport {
    pub fn build(recipe: &Recipe, set: &InputSet) -> Result<Self, BindError> {
        let inputs = set
            .iter()
            .map(|binder| InputReport {
                name: binder.name().to_string(),
                kind: binder.def().kind,
                title: binder.title(),
                group: binder.frame_group(),
                required: binder.required(),
                frames: binder.frames().iter().map(|f| f.path.clone()).collect(),
                params: binder.params().clone(),
            })
            .collect();

        Ok(Self {
            recipe: recipe.name.clone(),
            params: set.params(),
            inputs,
            products: recipe.product_names(set)?,
            unclaimed: set.unclaimed_frames().iter().map(|f| f.path.clone()).collect(),
            warnings: set.warnings().into_iter().cloned().collect(),
        })
    }

    pub fn to_json(&self) -> Result<String, BindError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{frame_set, FrameRecord};
    use crate::mixin::TraitRegistry;

    #[test]
    fn report_lists_inputs_in_declaration_order() {
        let yaml = r#"
recipe: det_dark
inputs:
  - name: raw
    kind: multi
    title: "{detector} raw darks"
    tag: "DARK_{detector}_RAW"
    group: raw
  - name: linearity
    kind: single
    title: linearity
    tag: "LINEARITY_{detector}"
    group: calib
    required: false
products:
  - name: master_dark
    tag: "MASTER_DARK_{detector}"
"#;
        let recipe = Recipe::from_yaml(yaml, &TraitRegistry::builtin()).unwrap();
        let frames = frame_set([
            FrameRecord::classified("a.fits", "DARK_GEO_RAW"),
            FrameRecord::classified("notes.txt", "README"),
        ]);
        let set = recipe.bind(&frames).unwrap();
        let report = BindingReport::build(&recipe, &set).unwrap();

        assert_eq!(report.inputs.len(), 2);
        assert_eq!(report.inputs[0].title, "GEO raw darks");
        assert_eq!(report.inputs[0].frames, vec!["a.fits"]);
        assert!(report.inputs[1].frames.is_empty());
        assert_eq!(report.products[0].filename, "MASTER_DARK_GEO.fits");
        assert_eq!(report.unclaimed, vec!["notes.txt"]);

        let json = report.to_json().unwrap();
        assert!(json.contains("\"kind\": \"multi\""));
        assert!(json.contains("\"detector\": \"GEO\""));
    }
}
