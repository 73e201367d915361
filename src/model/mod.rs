//! Canonical menu item entity and its classification enums.
//!
//! A [`MenuItem`] is one toggleable context menu entry as found by the
//! scanner. Its enabled state is private: every write goes through
//! [`MenuItem::set_enabled`], which keeps `has_changes` equal to
//! `is_enabled != original_is_enabled`.

/// Working set ownership and change notification.
pub mod tracker;

use crate::store::Scope;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical context under which a family of items is registered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
pub enum Scenario {
    /// Right-click on a file
    File,
    /// Right-click on a folder
    Directory,
    /// Right-click on empty space inside a folder
    #[value(name = "background")]
    DirectoryBackground,
    /// Right-click on the desktop
    #[value(name = "desktop")]
    DesktopBackground,
}

impl Scenario {
    /// All scenarios in display order.
    pub const ALL: [Self; 4] = [
        Self::File,
        Self::Directory,
        Self::DirectoryBackground,
        Self::DesktopBackground,
    ];

    /// Class bases (relative to the merged view) this scenario reads from.
    #[must_use]
    pub const fn class_bases(self) -> &'static [&'static str] {
        match self {
            Self::File => &["*", "AllFilesystemObjects"],
            Self::Directory => &["Directory", "Folder"],
            Self::DirectoryBackground => &[r"Directory\Background"],
            Self::DesktopBackground => &["DesktopBackground"],
        }
    }

    /// Abstract label key for the localization layer.
    #[must_use]
    pub const fn label_key(self) -> &'static str {
        match self {
            Self::File => "scenario.file",
            Self::Directory => "scenario.directory",
            Self::DirectoryBackground => "scenario.directory_background",
            Self::DesktopBackground => "scenario.desktop_background",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::DirectoryBackground => "background",
            Self::DesktopBackground => "desktop",
        };
        f.write_str(name)
    }
}

/// Item family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemType {
    /// Verb with a command line under `shell`
    ShellCommand,
    /// Handler under `shellex\ContextMenuHandlers` pointing at a class
    ShellExtension,
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ShellCommand => "command",
            Self::ShellExtension => "extension",
        })
    }
}

/// How an item is suppressed without deleting its registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisableMethod {
    /// Sentinel marker value under the command key
    LegacyDisable,
    /// Class identifier listed in a blocked set
    BlockedClsid,
    /// Not toggleable
    Unknown,
}

/// Who registered the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemSource {
    /// Shipped with the operating system
    System,
    /// Installed by an application
    ThirdParty,
}

impl ItemSource {
    /// Abstract label key for the localization layer.
    #[must_use]
    pub const fn label_key(self) -> &'static str {
        match self {
            Self::System => "source.system",
            Self::ThirdParty => "source.third_party",
        }
    }
}

/// How risky it is to disable the item.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum RiskLevel {
    /// Safe to toggle
    #[default]
    Low,
    /// May hide functionality users rely on
    Medium,
    /// May break system features
    High,
}

impl RiskLevel {
    /// Abstract label key for the localization layer.
    #[must_use]
    pub const fn label_key(self) -> &'static str {
        match self {
            Self::Low => "risk.low",
            Self::Medium => "risk.medium",
            Self::High => "risk.high",
        }
    }
}

/// Identity of an item within one scan: unique per working set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey {
    /// Scenario bucket
    pub scenario: Scenario,
    /// Item family
    pub item_type: ItemType,
    /// Lowercased fully-qualified path
    pub registry_path: String,
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.scenario, self.item_type, self.registry_path)
    }
}

/// One configurable context menu entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    /// Subkey or handler name, compared case-insensitively
    pub id: String,
    /// Scenario bucket the item was found under
    pub scenario: Scenario,
    /// Item family
    pub item_type: ItemType,

    /// Name shown to the user
    pub display_name: String,
    /// Longer explanation, possibly empty
    pub description: String,
    /// Best-effort vendor attribution, possibly empty
    pub source_name: String,

    /// Who registered the item
    pub source: ItemSource,
    /// Risk of disabling it
    pub risk: RiskLevel,

    /// Fully-qualified path of the authoritative key
    pub registry_path: String,
    /// Scope of the authoritative key
    pub registry_scope: Scope,
    /// Mechanism used to toggle the item
    pub disable_method: DisableMethod,
    /// Class identifier, extensions only
    pub clsid: Option<String>,
    /// Command line, commands only
    pub command: Option<String>,
    /// Whether committing a change needs elevation
    pub requires_admin: bool,
    /// Shown only when Shift is held
    pub is_extended: bool,

    is_enabled: bool,
    original_is_enabled: bool,
    has_changes: bool,
}

impl MenuItem {
    /// Creates an item in its committed state with default presentation.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        scenario: Scenario,
        item_type: ItemType,
        registry_path: impl Into<String>,
        registry_scope: Scope,
        is_enabled: bool,
    ) -> Self {
        let id = id.into();
        let disable_method = match item_type {
            ItemType::ShellCommand => DisableMethod::LegacyDisable,
            ItemType::ShellExtension => DisableMethod::Unknown,
        };

        Self {
            display_name: id.clone(),
            id,
            scenario,
            item_type,
            description: String::new(),
            source_name: String::new(),
            source: ItemSource::ThirdParty,
            risk: RiskLevel::Low,
            registry_path: registry_path.into(),
            registry_scope,
            disable_method,
            clsid: None,
            command: None,
            requires_admin: registry_scope != Scope::UserScope,
            is_extended: false,
            is_enabled,
            original_is_enabled: is_enabled,
            has_changes: false,
        }
    }

    /// Key unique within one scan.
    #[must_use]
    pub fn key(&self) -> ItemKey {
        ItemKey {
            scenario: self.scenario,
            item_type: self.item_type,
            registry_path: self.registry_path.to_lowercase(),
        }
    }

    /// Desired state (possibly not yet committed).
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.is_enabled
    }

    /// Last known committed state.
    #[must_use]
    pub const fn original_is_enabled(&self) -> bool {
        self.original_is_enabled
    }

    /// Whether the desired state differs from the committed state.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        self.has_changes
    }

    /// Whether this item can be toggled at all.
    #[must_use]
    pub fn is_toggleable(&self) -> bool {
        self.disable_method != DisableMethod::Unknown
    }

    /// Case-insensitive id comparison.
    #[must_use]
    pub fn matches_id(&self, id: &str) -> bool {
        self.id.eq_ignore_ascii_case(id)
    }

    /// Sets the desired state. Returns `false` if the value was unchanged.
    pub fn set_enabled(&mut self, value: bool) -> bool {
        if self.is_enabled == value {
            return false;
        }
        self.is_enabled = value;
        self.has_changes = self.is_enabled != self.original_is_enabled;
        true
    }

    /// Records the desired state as committed to the store.
    pub fn mark_committed(&mut self) {
        self.original_is_enabled = self.is_enabled;
        self.has_changes = false;
    }

    /// Records that the store now holds `value`, regardless of desired state.
    pub(crate) fn force_committed(&mut self, value: bool) {
        self.is_enabled = value;
        self.mark_committed();
    }
}
