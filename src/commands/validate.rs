use crate::output::UserOutput;
use devdeck::dependency::ValidationResult;
use devdeck::Orchestrator;

pub fn run_validate(
    orchestrator: &Orchestrator,
    json: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let result = orchestrator.validate();

    if json {
        out.status(&serde_json::to_string_pretty(&result)?);
    } else {
        render_validation(&result, orchestrator.registry().len(), out);
    }

    if !result.valid {
        anyhow::bail!(
            "Dependency validation failed with {} error(s)",
            result.errors.len()
        );
    }
    Ok(())
}

fn render_validation(result: &ValidationResult, services: usize, out: &dyn UserOutput) {
    for error in &result.errors {
        out.error(&format!("error: {}", error));
    }
    for warning in &result.warnings {
        out.warning(&format!("warning: {}", warning));
    }

    if result.valid {
        out.status(&format!(
            "Dependency graph is valid ({} services, {} warnings)",
            services,
            result.warnings.len()
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::RecordingOutput;
    use devdeck::{Registry, ServiceDefinition, ServiceDependency};
    use std::sync::Arc;

    fn orchestrator(defs: Vec<ServiceDefinition>) -> Orchestrator {
        let registry = Registry::default();
        for def in defs {
            registry.insert(def).unwrap();
        }
        Orchestrator::builder().registry(Arc::new(registry)).build()
    }

    #[test]
    fn valid_graph_reports_counts() {
        let orch = orchestrator(vec![
            ServiceDefinition::new("config-server", "/srv/config"),
            ServiceDefinition::new("gateway", "/srv/gateway")
                .with_dependency(ServiceDependency::soft("cache")),
        ]);
        let out = RecordingOutput::default();

        run_validate(&orch, false, &out).unwrap();
        assert_eq!(out.count("warning"), 1);
        assert!(out.text().contains("valid (2 services, 1 warnings)"));
    }

    #[test]
    fn missing_hard_dependency_fails() {
        let orch = orchestrator(vec![ServiceDefinition::new("gateway", "/srv/gateway")
            .with_dependency(ServiceDependency::hard("eureka"))]);
        let out = RecordingOutput::default();

        assert!(run_validate(&orch, false, &out).is_err());
        assert_eq!(out.count("error"), 1);
        assert!(out.text().contains("'eureka'"));
    }

    #[test]
    fn json_output_is_the_validation_result() {
        let orch = orchestrator(vec![ServiceDefinition::new("gateway", "/srv/gateway")]);
        let out = RecordingOutput::default();

        run_validate(&orch, true, &out).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out.text()).unwrap();
        assert_eq!(parsed["valid"], true);
        assert!(parsed["errors"].as_array().unwrap().is_empty());
    }
}
