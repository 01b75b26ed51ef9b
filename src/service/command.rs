//! Launch command construction for Maven, Gradle and custom services.

use crate::config::{BuildSystem, ServiceDefinition};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Environment variable naming the service a process was launched for.
pub const SERVICE_ENV_VAR: &str = "DEVDECK_SERVICE";

/// A fully resolved process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: PathBuf,
    pub env: BTreeMap<String, String>,
}

impl LaunchCommand {
    /// One-line rendering for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// A tokio command with piped output in its own process group.
    ///
    /// The new group lets `stop` signal the build tool and the JVM it forks together.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.current_dir)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .process_group(0);
        cmd
    }
}

/// Build the launch command for a service.
///
/// `extra_env` (from the config store) overrides the definition's own `env`.
pub fn build_launch_command(
    def: &ServiceDefinition,
    extra_env: &BTreeMap<String, String>,
) -> Result<LaunchCommand> {
    let mut env = def.env.clone();
    env.extend(extra_env.iter().map(|(k, v)| (k.clone(), v.clone())));
    env.insert(SERVICE_ENV_VAR.to_string(), def.name.clone());

    if let Some(command) = &def.command {
        return Ok(LaunchCommand {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), command.clone()],
            current_dir: def.directory.clone(),
            env,
        });
    }

    let build_system = match def.build_system {
        BuildSystem::Auto => BuildSystem::detect(&def.directory).ok_or_else(|| {
            Error::Config(format!(
                "Cannot detect build system for '{}': no pom.xml or build.gradle in '{}'",
                def.name,
                def.directory.display()
            ))
        })?,
        explicit => explicit,
    };

    let app_args = app_arguments(def);
    let mut args = Vec::new();

    let program = match build_system {
        BuildSystem::Maven => {
            args.push("spring-boot:run".to_string());
            if !def.jvm_options.is_empty() {
                args.push(format!(
                    "-Dspring-boot.run.jvmArguments={}",
                    def.jvm_options.join(" ")
                ));
            }
            if !app_args.is_empty() {
                args.push(format!("-Dspring-boot.run.arguments={}", app_args.join(" ")));
            }
            launcher(def, "mvnw", "mvn")?
        }
        BuildSystem::Gradle | BuildSystem::Auto => {
            args.push("bootRun".to_string());
            if !app_args.is_empty() {
                args.push(format!("--args={}", app_args.join(" ")));
            }
            if !def.jvm_options.is_empty() {
                let opts = def.jvm_options.join(" ");
                let merged = match env.get("JAVA_TOOL_OPTIONS") {
                    Some(existing) if !existing.is_empty() => format!("{} {}", existing, opts),
                    _ => opts,
                };
                env.insert("JAVA_TOOL_OPTIONS".to_string(), merged);
            }
            launcher(def, "gradlew", "gradle")?
        }
    };

    Ok(LaunchCommand {
        program,
        args,
        current_dir: def.directory.clone(),
        env,
    })
}

/// Arguments passed through to the Spring Boot application.
fn app_arguments(def: &ServiceDefinition) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(port) = def.port {
        args.push(format!("--server.port={}", port));
    }
    if def.verbose {
        args.push("--debug".to_string());
    }
    args
}

/// Prefer the project's wrapper script, else the tool on PATH.
fn launcher(def: &ServiceDefinition, wrapper: &str, tool: &str) -> Result<String> {
    if def.directory.join(wrapper).exists() {
        return Ok(format!("./{}", wrapper));
    }
    if which::which(tool).is_err() {
        return Err(Error::ProcessSpawn {
            service: def.name.clone(),
            reason: format!(
                "Neither ./{} nor {} found. Add a {} wrapper to '{}' or install {} and add it to PATH.",
                wrapper,
                tool,
                wrapper,
                def.directory.display(),
                tool
            ),
        });
    }
    Ok(tool.to_string())
}
