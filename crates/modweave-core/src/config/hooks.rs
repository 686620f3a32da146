//! Lifecycle hook scripts and profile-over-game inheritance.
//!
//! A game defines up to four scripts per operation. A profile may override
//! each one independently with three outcomes:
//!
//! - `None`: inherit the game's script
//! - `Some("")`: disable the inherited script
//! - `Some(path)`: run `path` instead

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookOperation {
    Install,
    Uninstall,
}

impl HookOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            HookOperation::Install => "install",
            HookOperation::Uninstall => "uninstall",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookStage {
    BeforeAll,
    BeforeEach,
    AfterEach,
    AfterAll,
}

impl HookStage {
    pub const ALL: [HookStage; 4] = [
        HookStage::BeforeAll,
        HookStage::BeforeEach,
        HookStage::AfterEach,
        HookStage::AfterAll,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HookStage::BeforeAll => "before_all",
            HookStage::BeforeEach => "before_each",
            HookStage::AfterEach => "after_each",
            HookStage::AfterAll => "after_all",
        }
    }

    /// Failures in `before_*` stages abort the rest of the batch.
    pub fn is_fatal(self) -> bool {
        matches!(self, HookStage::BeforeAll | HookStage::BeforeEach)
    }
}

/// Scripts for one operation. An empty string means no hook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookSet {
    pub before_all: String,
    pub before_each: String,
    pub after_each: String,
    pub after_all: String,
}

impl HookSet {
    pub fn get(&self, stage: HookStage) -> &str {
        match stage {
            HookStage::BeforeAll => &self.before_all,
            HookStage::BeforeEach => &self.before_each,
            HookStage::AfterEach => &self.after_each,
            HookStage::AfterAll => &self.after_all,
        }
    }

    fn slot_mut(&mut self, stage: HookStage) -> &mut String {
        match stage {
            HookStage::BeforeAll => &mut self.before_all,
            HookStage::BeforeEach => &mut self.before_each,
            HookStage::AfterEach => &mut self.after_each,
            HookStage::AfterAll => &mut self.after_all,
        }
    }

    pub fn set(&mut self, stage: HookStage, script: impl Into<String>) {
        *self.slot_mut(stage) = script.into();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameHooks {
    pub install: HookSet,
    pub uninstall: HookSet,
}

impl GameHooks {
    pub fn for_operation(&self, operation: HookOperation) -> &HookSet {
        match operation {
            HookOperation::Install => &self.install,
            HookOperation::Uninstall => &self.uninstall,
        }
    }

    pub fn for_operation_mut(&mut self, operation: HookOperation) -> &mut HookSet {
        match operation {
            HookOperation::Install => &mut self.install,
            HookOperation::Uninstall => &mut self.uninstall,
        }
    }
}

/// Per-stage profile overrides for one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before_all: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before_each: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_each: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_all: Option<String>,
}

impl HookOverrides {
    pub fn get(&self, stage: HookStage) -> Option<&str> {
        match stage {
            HookStage::BeforeAll => self.before_all.as_deref(),
            HookStage::BeforeEach => self.before_each.as_deref(),
            HookStage::AfterEach => self.after_each.as_deref(),
            HookStage::AfterAll => self.after_all.as_deref(),
        }
    }

    pub fn set(&mut self, stage: HookStage, value: Option<String>) {
        let slot = match stage {
            HookStage::BeforeAll => &mut self.before_all,
            HookStage::BeforeEach => &mut self.before_each,
            HookStage::AfterEach => &mut self.after_each,
            HookStage::AfterAll => &mut self.after_all,
        };
        *slot = value;
    }

    pub fn explicit(&self) -> HookFlags {
        HookFlags {
            before_all: self.before_all.is_some(),
            before_each: self.before_each.is_some(),
            after_each: self.after_each.is_some(),
            after_all: self.after_all.is_some(),
        }
    }

    /// Rebuild overrides from a plain value set plus explicit flags, the
    /// shape older profile records were persisted in.
    pub fn from_parts(values: &HookSet, explicit: &HookFlags) -> Self {
        let mut overrides = Self::default();
        for stage in HookStage::ALL {
            if explicit.get(stage) {
                overrides.set(stage, Some(values.get(stage).to_string()));
            }
        }
        overrides
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileHooks {
    pub install: HookOverrides,
    pub uninstall: HookOverrides,
}

impl ProfileHooks {
    pub fn for_operation(&self, operation: HookOperation) -> &HookOverrides {
        match operation {
            HookOperation::Install => &self.install,
            HookOperation::Uninstall => &self.uninstall,
        }
    }

    pub fn for_operation_mut(&mut self, operation: HookOperation) -> &mut HookOverrides {
        match operation {
            HookOperation::Install => &mut self.install,
            HookOperation::Uninstall => &mut self.uninstall,
        }
    }

    pub fn explicit(&self) -> HooksExplicit {
        HooksExplicit {
            install: self.install.explicit(),
            uninstall: self.uninstall.explicit(),
        }
    }

    pub fn from_parts(values: &GameHooks, explicit: &HooksExplicit) -> Self {
        Self {
            install: HookOverrides::from_parts(&values.install, &explicit.install),
            uninstall: HookOverrides::from_parts(&values.uninstall, &explicit.uninstall),
        }
    }
}

/// Which override fields were set for one operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookFlags {
    pub before_all: bool,
    pub before_each: bool,
    pub after_each: bool,
    pub after_all: bool,
}

impl HookFlags {
    pub fn get(&self, stage: HookStage) -> bool {
        match stage {
            HookStage::BeforeAll => self.before_all,
            HookStage::BeforeEach => self.before_each,
            HookStage::AfterEach => self.after_each,
            HookStage::AfterAll => self.after_all,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksExplicit {
    pub install: HookFlags,
    pub uninstall: HookFlags,
}

/// Effective scripts for one operation after inheritance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedHooks {
    pub operation: HookOperation,
    scripts: HookSet,
}

impl ResolvedHooks {
    pub fn none(operation: HookOperation) -> Self {
        Self {
            operation,
            scripts: HookSet::default(),
        }
    }

    /// The script to run at `stage`, if any.
    pub fn script(&self, stage: HookStage) -> Option<&str> {
        let script = self.scripts.get(stage);
        if script.is_empty() {
            None
        } else {
            Some(script)
        }
    }

    pub fn is_empty(&self) -> bool {
        HookStage::ALL.iter().all(|stage| self.script(*stage).is_none())
    }
}

/// Apply profile overrides on top of the game's hooks for `operation`.
pub fn resolve_hooks(
    game: &GameHooks,
    profile: Option<&ProfileHooks>,
    operation: HookOperation,
) -> ResolvedHooks {
    let base = game.for_operation(operation);
    let overrides = profile.map(|hooks| hooks.for_operation(operation));

    let mut scripts = HookSet::default();
    for stage in HookStage::ALL {
        let value = match overrides.and_then(|o| o.get(stage)) {
            Some(explicit) => explicit,
            None => base.get(stage),
        };
        scripts.set(stage, value);
    }

    ResolvedHooks { operation, scripts }
}
