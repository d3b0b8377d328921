use serde::{Deserialize, Serialize};

use crate::ops::tree_ops::DEFAULT_MAX_DEPTH;

/// Configuration from tasktree.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub tree: TreeConfig,
    #[serde(default)]
    pub cascade: CascadeConfig,
    #[serde(default)]
    pub view: ViewConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Nesting deeper than this is cut and promoted to roots
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig {
            max_depth: default_max_depth(),
        }
    }
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

/// Which tasks a confirmed DONE → TODO transition resets along with the task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CascadeScope {
    /// Direct children only
    Children,
    /// Every descendant
    #[default]
    Descendants,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeConfig {
    #[serde(default)]
    pub scope: CascadeScope,
    /// Extra passes over child resets that failed
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        CascadeConfig {
            scope: CascadeScope::default(),
            retries: default_retries(),
        }
    }
}

fn default_retries() -> u32 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Start with every parent expanded instead of collapsed
    #[serde(default)]
    pub expand_all: bool,
}
