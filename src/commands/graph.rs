use crate::output::UserOutput;
use devdeck::config::format_duration;
use devdeck::Orchestrator;

pub fn run_order(orchestrator: &Orchestrator, out: &dyn UserOutput) -> anyhow::Result<()> {
    let order = orchestrator.startup_order()?;
    out.status(&format!("Startup order ({} services):", order.services));
    for (idx, name) in order.startup_order.iter().enumerate() {
        out.status(&format!("  {:>2}. {}", idx + 1, name));
    }
    Ok(())
}

pub fn run_deps(orchestrator: &Orchestrator, out: &dyn UserOutput) -> anyhow::Result<()> {
    let overview = orchestrator.dependency_overview();
    if overview.is_empty() {
        out.status("No services configured");
        return Ok(());
    }

    for (name, info) in &overview {
        if info.startup_delay.is_zero() {
            out.status(name);
        } else {
            out.status(&format!(
                "{} (startup delay {})",
                name,
                format_duration(info.startup_delay)
            ));
        }

        for dep in &info.dependencies {
            let gate = if dep.health_check { ", healthy" } else { "" };
            out.status(&format!(
                "  -> {} ({}{}, timeout {})",
                dep.service_name,
                dep.dependency_type,
                gate,
                format_duration(dep.timeout)
            ));
        }
        if !info.dependent_on.is_empty() {
            out.status(&format!("  <- {}", info.dependent_on.join(", ")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::RecordingOutput;
    use devdeck::{Registry, ServiceDefinition, ServiceDependency};
    use std::sync::Arc;

    fn fleet() -> Orchestrator {
        let registry = Registry::default();
        registry
            .insert(ServiceDefinition::new("eureka", "/srv/eureka"))
            .unwrap();
        registry
            .insert(
                ServiceDefinition::new("gateway", "/srv/gateway")
                    .with_dependency(ServiceDependency::hard("eureka").with_health_check(true)),
            )
            .unwrap();
        Orchestrator::builder().registry(Arc::new(registry)).build()
    }

    #[test]
    fn order_lists_dependencies_first() {
        let out = RecordingOutput::default();
        run_order(&fleet(), &out).unwrap();
        let text = out.text();
        assert!(text.find("1. eureka").unwrap() < text.find("2. gateway").unwrap());
    }

    #[test]
    fn deps_shows_both_directions() {
        let out = RecordingOutput::default();
        run_deps(&fleet(), &out).unwrap();
        let text = out.text();
        assert!(text.contains("-> eureka (hard, healthy, timeout 1m)"));
        assert!(text.contains("<- gateway"));
    }
}
