// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

use serde::{Deserialize, Serialize};

use crate::{Error, FuzzyReference, Kind, Result};

/// One entry of a project's `sources` list, tagged by `kind`.
///
/// Replaces dynamic dispatch with a plain tagged union: each variant
/// carries exactly the fields that kind of source needs, and
/// `Source::validate` enforces the invariants the design calls out
/// (archive/file need a digest, git needs a commit or a version).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Source {
    Archive {
        url: String,
        digest: Option<String>,
        name: Option<String>,
        #[serde(default)]
        patch: Vec<String>,
    },
    Git {
        url: String,
        commit: Option<String>,
        version: Option<String>,
        name: Option<String>,
        #[serde(default)]
        patch: Vec<String>,
    },
    File {
        url: String,
        digest: Option<String>,
        name: Option<String>,
    },
    Dsc {
        url: String,
        digest: Option<String>,
        name: Option<String>,
    },
}

impl Source {
    /// The name this source's working directory is placed under; falls
    /// back to a name derived from the url when not given explicitly.
    pub fn name(&self) -> String {
        let (name, url) = match self {
            Source::Archive { name, url, .. } => (name, url),
            Source::Git { name, url, .. } => (name, url),
            Source::File { name, url, .. } => (name, url),
            Source::Dsc { name, url, .. } => (name, url),
        };
        name.clone().unwrap_or_else(|| {
            url.rsplit('/')
                .next()
                .unwrap_or(url)
                .trim_end_matches(".git")
                .to_string()
        })
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Source::Archive { digest, .. } if digest.is_none() => {
                Err(Error::SourceMissingDigest { kind: "archive" })
            }
            Source::File { digest, .. } if digest.is_none() => {
                Err(Error::SourceMissingDigest { kind: "file" })
            }
            Source::Git { commit, version, .. } if commit.is_none() && version.is_none() => {
                Err(Error::GitSourceMissingRevision)
            }
            _ => Ok(()),
        }
    }
}

/// The shell script and options that produce a module's build output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildScript {
    pub script: String,
    #[serde(default)]
    pub skip_strip_symbols: bool,
}

/// A declared output module: a name plus an ordered list of install
/// rules (§4.3.1) that select files from the build output into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub files: Vec<String>,
}

/// The default install rules synthesized for a `develop` module when
/// the project does not declare one of its own.
pub fn default_develop_rules() -> Vec<String> {
    vec![
        r"^/include/.+".to_string(),
        r"^/lib/debug/.+".to_string(),
        r"^/lib/.+\.a$".to_string(),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMeta {
    pub id: String,
    pub kind: Kind,
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub architecture: Option<String>,
    pub channel: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AptExtensions {
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default, rename = "buildDepends")]
    pub build_depends: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildExtensions {
    #[serde(default)]
    pub apt: AptExtensions,
}

/// The parsed form of a project's `linglong.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub package: PackageMeta,
    pub base: FuzzyReference,
    pub runtime: Option<FuzzyReference>,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub modules: Vec<Module>,
    pub build: BuildScript,
    #[serde(default)]
    pub buildext: BuildExtensions,
    #[serde(default)]
    pub permissions: Option<serde_json::Value>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub include: Vec<String>,
}

impl Project {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let project: Project = serde_yaml::from_str(text)?;
        project.validate()?;
        Ok(project)
    }

    pub fn validate(&self) -> Result<()> {
        if self.package.kind == Kind::App && self.command.is_empty() {
            return Err(Error::AppMissingCommand);
        }
        for module in &self.modules {
            crate::validate_user_module_name(&module.name)?;
        }
        for source in &self.sources {
            source.validate()?;
        }
        Ok(())
    }

    /// The develop module rules that will actually be applied: the
    /// project's own declaration if present, otherwise the built-in
    /// default (§3, Module rule list).
    pub fn develop_module_rules(&self) -> Vec<String> {
        self.modules
            .iter()
            .find(|m| m.name == "develop")
            .map(|m| m.files.clone())
            .unwrap_or_else(default_develop_rules)
    }
}

#[cfg(test)]
mod manifest_test {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_archive_source_requires_digest() {
        let source = Source::Archive {
            url: "https://example.com/hello-1.0.tar.xz".into(),
            digest: None,
            name: None,
            patch: vec![],
        };
        assert!(source.validate().is_err());
    }

    #[rstest]
    fn test_git_source_requires_commit_or_version() {
        let source = Source::Git {
            url: "https://example.com/hello.git".into(),
            commit: None,
            version: None,
            name: None,
            patch: vec![],
        };
        assert!(source.validate().is_err());

        let source = Source::Git {
            url: "https://example.com/hello.git".into(),
            commit: Some("abc123".into()),
            version: None,
            name: None,
            patch: vec![],
        };
        assert!(source.validate().is_ok());
    }

    #[rstest]
    fn test_source_name_falls_back_to_url() {
        let source = Source::Archive {
            url: "https://example.com/hello-1.0.tar.xz".into(),
            digest: Some("abc".into()),
            name: None,
            patch: vec![],
        };
        assert_eq!(source.name(), "hello-1.0.tar.xz");
    }

    #[rstest]
    fn test_project_rejects_user_module_named_binary() {
        let yaml = r#"
package:
  id: org.test.hello
  kind: app
  version: 1.0.0.1
  name: hello
base: org.linyaps.base/1.0.0.1
command: [hello]
modules:
  - name: binary
    files: ["*"]
build:
  script: make && make install
"#;
        assert!(Project::from_yaml_str(yaml).is_err());
    }

    #[rstest]
    fn test_project_missing_command_rejected() {
        let yaml = r#"
package:
  id: org.test.hello
  kind: app
  version: 1.0.0.1
  name: hello
base: org.linyaps.base/1.0.0.1
build:
  script: make && make install
"#;
        assert!(Project::from_yaml_str(yaml).is_err());
    }

    #[rstest]
    fn test_project_parses_minimal_app() {
        let yaml = r#"
package:
  id: org.test.hello
  kind: app
  version: 1.0.0.1
  name: hello
base: org.linyaps.base/1.0.0.1
command: [hello]
sources:
  - kind: archive
    url: https://example.com/hello-1.0.tar.xz
    digest: deadbeef
build:
  script: make && make install PREFIX=$PREFIX
"#;
        let project = Project::from_yaml_str(yaml).expect("valid manifest");
        assert_eq!(project.package.id, "org.test.hello");
        assert_eq!(project.develop_module_rules(), default_develop_rules());
    }
}
