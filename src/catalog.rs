//! Static table of well-known menu entries.
//!
//! Supplies display names for entries whose labels are unresolved resource
//! references, plus descriptions, risk levels and source classification.

use crate::model::{ItemSource, ItemType, RiskLevel};
use std::collections::HashMap;
use std::sync::LazyLock;

/// A well-known entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownIdentity {
    /// Item family
    pub item_type: ItemType,
    /// Subkey or handler name
    pub id: &'static str,
    /// Name to show when the store only has a resource reference
    pub display_name: &'static str,
    /// What the entry does
    pub description: &'static str,
    /// Risk of disabling it
    pub risk: RiskLevel,
    /// Who ships it
    pub source: ItemSource,
    /// Vendor attribution
    pub vendor: &'static str,
}

const fn known(
    item_type: ItemType,
    id: &'static str,
    display_name: &'static str,
    description: &'static str,
    risk: RiskLevel,
    source: ItemSource,
    vendor: &'static str,
) -> KnownIdentity {
    KnownIdentity {
        item_type,
        id,
        display_name,
        description,
        risk,
        source,
        vendor,
    }
}

use ItemSource::{System, ThirdParty};
use ItemType::{ShellCommand, ShellExtension};
use RiskLevel::{High, Low, Medium};

const KNOWN_IDENTITIES: &[KnownIdentity] = &[
    known(ShellCommand, "cmd", "Open command window here", "Opens a Command Prompt in this folder.", Low, System, "Microsoft"),
    known(ShellCommand, "Powershell", "Open PowerShell window here", "Opens Windows PowerShell in this folder.", Low, System, "Microsoft"),
    known(ShellCommand, "WSL", "Open Linux shell here", "Opens the default WSL distribution in this folder.", Low, System, "Microsoft"),
    known(ShellCommand, "find", "Search", "Opens Windows Search scoped to this location.", Medium, System, "Microsoft"),
    known(ShellCommand, "runas", "Run as administrator", "Starts the program with elevated privileges.", High, System, "Microsoft"),
    known(ShellCommand, "AnyCode", "Open with Visual Studio", "Opens the folder in Visual Studio.", Low, ThirdParty, "Microsoft"),
    known(ShellCommand, "git_gui", "Git GUI Here", "Starts Git GUI in this repository.", Low, ThirdParty, "Git for Windows"),
    known(ShellCommand, "git_shell", "Git Bash Here", "Opens Git Bash in this folder.", Low, ThirdParty, "Git for Windows"),
    known(ShellCommand, "VSCode", "Open with Code", "Opens the location in Visual Studio Code.", Low, ThirdParty, "Microsoft"),
    known(ShellExtension, "Sharing", "Give access to", "Network sharing options.", Medium, System, "Microsoft"),
    known(ShellExtension, "ModernSharing", "Share", "Modern share sheet.", Low, System, "Microsoft"),
    known(ShellExtension, "SendTo", "Send to", "The Send to submenu.", Medium, System, "Microsoft"),
    known(ShellExtension, "Library Location", "Include in library", "Adds the folder to a library.", Low, System, "Microsoft"),
    known(ShellExtension, "PintoStartScreen", "Pin to Start", "Pins the item to the Start menu.", Low, System, "Microsoft"),
    known(ShellExtension, "EPP", "Scan with Microsoft Defender", "On-demand antivirus scan.", High, System, "Microsoft"),
    known(ShellExtension, "Open With", "Open with", "The Open with submenu.", High, System, "Microsoft"),
    known(ShellExtension, "WorkFolders", "Work Folders", "Work Folders sync options.", Low, System, "Microsoft"),
    known(ShellExtension, "7-Zip", "7-Zip", "Archive commands from 7-Zip.", Low, ThirdParty, "7-Zip"),
    known(ShellExtension, "WinRAR", "WinRAR", "Archive commands from WinRAR.", Low, ThirdParty, "win.rar GmbH"),
    known(ShellExtension, "gvim", "Edit with Vim", "Opens the file in gVim.", Low, ThirdParty, "Vim"),
];

static BY_IDENTITY: LazyLock<HashMap<(ItemType, String), &'static KnownIdentity>> =
    LazyLock::new(|| {
        KNOWN_IDENTITIES
            .iter()
            .map(|known| ((known.item_type, known.id.to_lowercase()), known))
            .collect()
    });

/// Looks up a known entry by family and case-insensitive id.
#[must_use]
pub fn lookup(item_type: ItemType, id: &str) -> Option<&'static KnownIdentity> {
    BY_IDENTITY.get(&(item_type, id.to_lowercase())).copied()
}

/// Every known entry.
#[must_use]
pub const fn all() -> &'static [KnownIdentity] {
    KNOWN_IDENTITIES
}
