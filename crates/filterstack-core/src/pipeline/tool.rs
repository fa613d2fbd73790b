use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ProcessingError, ValidationError};
use crate::params::{ParamMap, ParamSet, ParamSpec};
use crate::raster::RasterImage;

/// A single configurable step in the processing pipeline.
///
/// A tool carries its own typed parameter state and is otherwise stateless:
/// `apply` is a pure function of the parameters and the input raster.
pub trait Tool: Send + Sync {
    /// Registry name of the tool type.
    fn name(&self) -> &str;

    fn params(&self) -> &ParamSet;

    fn params_mut(&mut self) -> &mut ParamSet;

    fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError>;

    fn box_clone(&self) -> Box<dyn Tool>;

    /// Cross-parameter constraints, run on the candidate set before it is
    /// stored.
    fn check(&self, _candidate: &ParamSet) -> Result<(), ValidationError> {
        Ok(())
    }

    fn get_parameters(&self) -> ParamMap {
        self.params().to_map()
    }

    /// Validate and apply a partial or full update. On error nothing is
    /// stored.
    fn update_parameters(&mut self, values: &ParamMap) -> Result<(), ValidationError> {
        let candidate = self.params().with_updates(values)?;
        self.check(&candidate)?;
        *self.params_mut() = candidate;
        Ok(())
    }

    fn get_valid_options(&self) -> BTreeMap<String, Vec<String>> {
        self.params().choice_options()
    }

    fn parameter_specs(&self) -> Vec<ParamSpec> {
        self.params().specs().cloned().collect()
    }
}

impl Clone for Box<dyn Tool> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

impl fmt::Debug for dyn Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name())
            .field("parameters", &self.get_parameters())
            .finish()
    }
}

/// Declare a tool type holding a [`ParamSet`] built from the given specs.
/// The type name doubles as the registry name.
macro_rules! declare_tool {
    ($(#[$meta:meta])* $ty:ident, [$($spec:expr),* $(,)?]) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $ty {
            params: $crate::params::ParamSet,
        }

        impl $ty {
            pub const NAME: &'static str = stringify!($ty);

            pub fn new() -> Self {
                Self {
                    params: $crate::params::ParamSet::new(vec![$($spec),*]),
                }
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

/// Accessors every [`Tool`] impl shares.
macro_rules! tool_state {
    () => {
        fn name(&self) -> &str {
            Self::NAME
        }

        fn params(&self) -> &$crate::params::ParamSet {
            &self.params
        }

        fn params_mut(&mut self) -> &mut $crate::params::ParamSet {
            &mut self.params
        }

        fn box_clone(&self) -> Box<dyn $crate::pipeline::tool::Tool> {
            Box::new(self.clone())
        }
    };
}

pub(crate) use declare_tool;
pub(crate) use tool_state;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamValue;
    use crate::raster::PixelLayout;

    declare_tool!(
        /// Adds `offset` to every sample; rejects `offset == 13`.
        Offset,
        [ParamSpec::int("offset", 0, -10, 20)]
    );

    impl Tool for Offset {
        tool_state!();

        fn check(&self, candidate: &ParamSet) -> Result<(), ValidationError> {
            if candidate.get_int("offset") == Ok(13) {
                return Err(ValidationError::Constraint("unlucky".into()));
            }
            Ok(())
        }

        fn apply(&self, image: &RasterImage) -> Result<RasterImage, ProcessingError> {
            let offset = self.params.get_int("offset")?;
            let mut lut = [0u8; 256];
            for (i, v) in lut.iter_mut().enumerate() {
                *v = (i as i64 + offset).clamp(0, 255) as u8;
            }
            Ok(image.map_lut(&lut))
        }
    }

    fn update(offset: i64) -> ParamMap {
        ParamMap::from([("offset".to_string(), ParamValue::Int(offset))])
    }

    #[test]
    fn name_comes_from_type() {
        assert_eq!(Offset::new().name(), "Offset");
    }

    #[test]
    fn update_then_apply() {
        let mut tool = Offset::new();
        tool.update_parameters(&update(5)).unwrap();
        let out = tool
            .apply(&RasterImage::filled(2, 2, PixelLayout::Gray, 10))
            .unwrap();
        assert!(out.data().iter().all(|&v| v == 15));
    }

    #[test]
    fn cross_check_failure_keeps_state() {
        let mut tool = Offset::new();
        tool.update_parameters(&update(4)).unwrap();
        let err = tool.update_parameters(&update(13)).unwrap_err();
        assert_eq!(err, ValidationError::Constraint("unlucky".into()));
        assert_eq!(tool.get_parameters()["offset"], ParamValue::Int(4));
    }

    #[test]
    fn boxed_clone_is_independent() {
        let original: Box<dyn Tool> = Box::new(Offset::new());
        let mut copy = original.clone();
        copy.update_parameters(&update(7)).unwrap();
        assert_eq!(original.get_parameters()["offset"], ParamValue::Int(0));
        assert_eq!(copy.get_parameters()["offset"], ParamValue::Int(7));
        assert_eq!(copy.name(), "Offset");
    }

    #[test]
    fn specs_exposed() {
        let specs = Offset::new().parameter_specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "offset");
        assert!(Offset::new().get_valid_options().is_empty());
    }
}
