//! Quick-pick menus offered by the surface toolbar

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMenuAction {
    New,
    Switch,
    Compact,
    ReviewPermissions,
    Todo,
    Diff,
    Command,
    Shell,
    AttachFile,
    AttachSymbol,
    AttachDiff,
    Rename,
    Fork,
    Share,
    Unshare,
    Stop,
    Delete,
}

impl SessionMenuAction {
    /// Menu order
    pub const ALL: [SessionMenuAction; 17] = [
        Self::New,
        Self::Switch,
        Self::Compact,
        Self::ReviewPermissions,
        Self::Todo,
        Self::Diff,
        Self::Command,
        Self::Shell,
        Self::AttachFile,
        Self::AttachSymbol,
        Self::AttachDiff,
        Self::Rename,
        Self::Fork,
        Self::Share,
        Self::Unshare,
        Self::Stop,
        Self::Delete,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::New => "New Session",
            Self::Switch => "Switch Session",
            Self::Compact => "Compact Session",
            Self::ReviewPermissions => "Review Pending Permissions",
            Self::Todo => "Show Session Todo",
            Self::Diff => "Show Session Diff",
            Self::Command => "Run Session Command",
            Self::Shell => "Run Session Shell",
            Self::AttachFile => "Attach File Context",
            Self::AttachSymbol => "Attach Symbol Context",
            Self::AttachDiff => "Attach Git Diff Context",
            Self::Rename => "Rename Session",
            Self::Fork => "Fork Session",
            Self::Share => "Share Session",
            Self::Unshare => "Unshare Session",
            Self::Stop => "Stop Session",
            Self::Delete => "Delete Session",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachMenuAction {
    Active,
    File,
    Symbol,
    Diff,
}

impl AttachMenuAction {
    pub const ALL: [AttachMenuAction; 4] = [Self::Active, Self::File, Self::Symbol, Self::Diff];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Active => "Attach Active File/Selection",
            Self::File => "Attach Workspace File",
            Self::Symbol => "Attach Workspace Symbol",
            Self::Diff => "Attach Git Diff",
        }
    }
}
