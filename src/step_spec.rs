use anyhow::{Context, Result, bail};
use filterstack_core::{ParamMap, Tool};

/// One `-s` argument: a tool name plus raw `key=value` pairs.
///
/// ```text
/// GaussianBlur:kernel_size=7,sigma=2.5
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSpec {
    pub name: String,
    pub assignments: Vec<(String, String)>,
}

impl StepSpec {
    pub fn parse(text: &str) -> Result<Self> {
        let (name, rest) = match text.split_once(':') {
            Some((name, rest)) => (name.trim(), Some(rest)),
            None => (text.trim(), None),
        };
        if name.is_empty() {
            bail!("step `{text}` has no tool name");
        }

        let mut assignments = Vec::new();
        for pair in rest.into_iter().flat_map(|r| r.split(',')) {
            if pair.trim().is_empty() {
                continue;
            }
            let Some((key, value)) = pair.split_once('=') else {
                bail!("expected key=value in step `{text}`, got `{pair}`");
            };
            let key = key.trim();
            if key.is_empty() {
                bail!("empty parameter name in step `{text}`");
            }
            assignments.push((key.to_string(), value.trim().to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            assignments,
        })
    }

    /// Parse each value against the tool's declared parameter kinds.
    /// Cross-parameter checks are left to the tool itself.
    pub fn resolve(&self, tool: &dyn Tool) -> Result<ParamMap> {
        let mut values = ParamMap::new();
        for (key, text) in &self.assignments {
            let spec = tool.params().spec(key).with_context(|| {
                let known: Vec<&str> = tool.params().specs().map(|s| s.name).collect();
                format!(
                    "{} has no parameter `{key}` (known: {})",
                    tool.name(),
                    known.join(", ")
                )
            })?;
            let value = spec.kind.parse(key, text)?;
            values.insert(key.clone(), value);
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filterstack_core::{ParamValue, ToolRegistry, ValidationError};

    #[test]
    fn bare_name() {
        let step = StepSpec::parse("InvertColors").unwrap();
        assert_eq!(step.name, "InvertColors");
        assert!(step.assignments.is_empty());
        assert_eq!(StepSpec::parse("InvertColors:").unwrap(), step);
    }

    #[test]
    fn name_with_assignments() {
        let step = StepSpec::parse("GaussianBlur: kernel_size=7, sigma = 2.5").unwrap();
        assert_eq!(step.name, "GaussianBlur");
        assert_eq!(
            step.assignments,
            vec![
                ("kernel_size".to_string(), "7".to_string()),
                ("sigma".to_string(), "2.5".to_string()),
            ]
        );
    }

    #[test]
    fn malformed_steps() {
        assert!(StepSpec::parse("").is_err());
        assert!(StepSpec::parse(":sigma=1").is_err());
        assert!(StepSpec::parse("GaussianBlur:sigma").is_err());
        assert!(StepSpec::parse("GaussianBlur:=3").is_err());
    }

    #[test]
    fn resolve_against_tool() {
        let registry = ToolRegistry::with_builtins();
        let tool = registry.create("CannyEdgeDetection").unwrap();
        let step = StepSpec::parse("CannyEdgeDetection:threshold1=50,l2gradient=true").unwrap();
        let values = step.resolve(tool.as_ref()).unwrap();
        assert_eq!(values["threshold1"], ParamValue::Float(50.0));
        assert_eq!(values["l2gradient"], ParamValue::Bool(true));
    }

    #[test]
    fn resolve_rejects_unknown_and_unparseable() {
        let registry = ToolRegistry::with_builtins();
        let tool = registry.create("MedianBlur").unwrap();

        let unknown = StepSpec::parse("MedianBlur:radius=3").unwrap();
        let err = unknown.resolve(tool.as_ref()).unwrap_err();
        assert!(err.to_string().contains("kernel_size"), "{err}");

        let expr = StepSpec::parse("MedianBlur:kernel_size=2+1").unwrap();
        let err = expr.resolve(tool.as_ref()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ValidationError>(),
            Some(ValidationError::Unparseable { .. })
        ));
    }
}
