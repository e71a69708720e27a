//! Dockerfile templating for agent and deployment images.

use std::path::Path;

use regex::Regex;

use crate::capability::{Capability, NormalizedCapabilities};

/// Render the Dockerfile for one incremental agent image layer.
///
/// `base_image` is the tag of the previous iteration's image (or the shared
/// base image for the first build). The resulting image is
/// `base_image + capabilities`.
pub fn render_agent_dockerfile(base_image: &str, capabilities: &NormalizedCapabilities) -> String {
    let mut out = format!("FROM {base_image}\n");

    if !capabilities.apt.is_empty() {
        let names = joined_names(&capabilities.apt);
        out.push_str(&format!(
            "RUN apt-get update && apt-get install -y --no-install-recommends {names} \\\n    && rm -rf /var/lib/apt/lists/*\n"
        ));
    }

    if !capabilities.pip.is_empty() {
        let names = joined_names(&capabilities.pip);
        out.push_str(&format!(
            "RUN (pip install --no-cache-dir --break-system-packages {names} \\\n    || pip install --no-cache-dir {names}) \\\n    && (/opt/venv/bin/pip install --no-cache-dir {names} || true)\n"
        ));
    }

    if !capabilities.npm.is_empty() {
        let names = joined_names(&capabilities.npm);
        out.push_str(&format!("RUN npm install -g {names}\n"));
    }

    for tool in &capabilities.tool {
        out.push_str(&format!(
            "COPY tools/{name} /usr/local/bin/{name}\nRUN chmod +x /usr/local/bin/{name}\n",
            name = tool.name
        ));
    }

    out
}

fn joined_names(capabilities: &[Capability]) -> String {
    capabilities
        .iter()
        .map(|c| match &c.version {
            Some(version) => format!("{}={}", c.name, version),
            None => c.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Packages inferred from an existing agent Dockerfile, used to seed a
/// deployment image with whatever the agent already had installed.
#[derive(Debug, Clone, Default)]
pub struct InferredPackages {
    pub apt: Vec<String>,
    pub pip: Vec<String>,
}

/// Scan an agent Dockerfile's text for `apt-get install` / `pip install`
/// invocations and recover the package names passed to them.
pub fn infer_packages_from_dockerfile(dockerfile_text: &str) -> InferredPackages {
    let apt_re = Regex::new(r"apt-get install[^\n]*?-y(?:\s+--no-install-recommends)?\s+([^\\\n]+)")
        .expect("static regex");
    let pip_re = Regex::new(r"pip install[^\n]*?(?:--break-system-packages\s+)?([^\\\n|]+)")
        .expect("static regex");

    let mut packages = InferredPackages::default();

    for capture in apt_re.captures_iter(dockerfile_text) {
        for name in capture[1].split_whitespace() {
            packages.apt.push(name.trim_end_matches('\\').to_string());
        }
    }

    for capture in pip_re.captures_iter(dockerfile_text) {
        for name in capture[1].split_whitespace() {
            let name = name.trim_end_matches('\\');
            if name.starts_with("--") || name == "\\" {
                continue;
            }
            packages.pip.push(name.to_string());
        }
    }

    packages.apt.sort();
    packages.apt.dedup();
    packages.pip.sort();
    packages.pip.dedup();
    packages
}

/// Characters that force `CMD` into shell form rather than JSON-array form.
const SHELL_METACHARACTERS: &[char] = &['|', '&', ';', '<', '>', '(', ')', '$', '`', '\\', '"', '\'', '\n'];

/// Render the minimal deployment image Dockerfile: a stock Python base,
/// whatever apt/pip packages the agent used, the packaged app directory, a
/// path-rewrite sweep, and the exposed entrypoint.
pub fn render_deployment_dockerfile(
    inferred: &InferredPackages,
    port: u16,
    entrypoint: &str,
) -> String {
    let mut out = String::from("FROM python:3.11-slim\n");

    if !inferred.apt.is_empty() {
        out.push_str(&format!(
            "RUN apt-get update && apt-get install -y --no-install-recommends {} \\\n    && rm -rf /var/lib/apt/lists/*\n",
            inferred.apt.join(" ")
        ));
    }

    if !inferred.pip.is_empty() {
        out.push_str(&format!(
            "RUN pip install --no-cache-dir {}\n",
            inferred.pip.join(" ")
        ));
    }

    out.push_str("COPY app/ /app/\n");
    out.push_str("WORKDIR /app\n");
    out.push_str(
        "RUN find /app -type f \\( -name '*.py' -o -name '*.txt' -o -name '*.json' -o -name '*.cfg' -o -name '*.ini' \\) \\\n    -exec sed -i 's|/workspace/|/app/|g' {} +\n",
    );
    out.push_str(&format!("EXPOSE {port}\n"));

    if entrypoint.chars().any(|c| SHELL_METACHARACTERS.contains(&c)) {
        out.push_str(&format!("CMD {entrypoint}\n"));
    } else {
        let args: Vec<String> = entrypoint
            .split_whitespace()
            .map(|arg| format!("\"{arg}\""))
            .collect();
        out.push_str(&format!("CMD [{}]\n", args.join(", ")));
    }

    out
}

/// Persist a versioned Dockerfile at `<agent-images-dir>/<task_id>/Dockerfile.v{N}`
/// and mirror it to `Dockerfile` in the same directory.
pub async fn persist_dockerfile(
    agent_images_dir: &Path,
    task_id: &str,
    version: u32,
    contents: &str,
) -> std::io::Result<std::path::PathBuf> {
    let task_dir = agent_images_dir.join(task_id);
    tokio::fs::create_dir_all(&task_dir).await?;

    let versioned_path = task_dir.join(format!("Dockerfile.v{version}"));
    tokio::fs::write(&versioned_path, contents).await?;
    tokio::fs::write(task_dir.join("Dockerfile"), contents).await?;

    Ok(versioned_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityKind;

    #[test]
    fn renders_incremental_layer_from_base() {
        let capabilities = NormalizedCapabilities {
            apt: vec![Capability {
                kind: CapabilityKind::AptPackage,
                name: "ffmpeg".to_string(),
                version: None,
            }],
            pip: vec![Capability {
                kind: CapabilityKind::PipPackage,
                name: "pandas".to_string(),
                version: None,
            }],
            npm: vec![],
            tool: vec![],
        };
        let rendered = render_agent_dockerfile("openclaw-agent-base:latest", &capabilities);
        assert!(rendered.starts_with("FROM openclaw-agent-base:latest\n"));
        assert!(rendered.contains("apt-get install"));
        assert!(rendered.contains("pandas"));
        assert!(rendered.contains("--break-system-packages"));
    }

    #[test]
    fn infers_packages_from_prior_dockerfile() {
        let dockerfile = "FROM base\nRUN apt-get update && apt-get install -y --no-install-recommends ffmpeg \\\n    && rm -rf /var/lib/apt/lists/*\nRUN pip install --no-cache-dir --break-system-packages pandas numpy\n";
        let inferred = infer_packages_from_dockerfile(dockerfile);
        assert_eq!(inferred.apt, vec!["ffmpeg".to_string()]);
        assert_eq!(inferred.pip, vec!["numpy".to_string(), "pandas".to_string()]);
    }

    #[test]
    fn deployment_entrypoint_uses_json_array_form_without_metacharacters() {
        let rendered = render_deployment_dockerfile(&InferredPackages::default(), 9100, "python app.py");
        assert!(rendered.contains("CMD [\"python\", \"app.py\"]"));
    }

    #[test]
    fn deployment_entrypoint_uses_shell_form_with_metacharacters() {
        let rendered =
            render_deployment_dockerfile(&InferredPackages::default(), 9100, "python app.py && echo done");
        assert!(rendered.contains("CMD python app.py && echo done"));
    }
}
