use std::fmt;

/// Link type as reported by the kernel's link-info kind attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LinkKind {
    /// No kind attribute: physical NICs, loopback
    Device,
    /// Virtual interface with no backing hardware
    Dummy,
    /// Any other virtual kind (bridge, veth, vlan, ...)
    Other(String),
}

impl LinkKind {
    /// Whether the link was created with the `dummy` driver
    pub fn is_dummy(&self) -> bool {
        matches!(self, LinkKind::Dummy)
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkKind::Device => f.write_str("device"),
            LinkKind::Dummy => f.write_str("dummy"),
            LinkKind::Other(kind) => f.write_str(kind),
        }
    }
}

/// A network interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Kernel-assigned interface index
    pub index: u32,
    /// Interface name
    pub name: String,
    /// Link type
    pub kind: LinkKind,
}

impl Link {
    /// Build a link record from its kernel index, name and kind
    pub fn new(index: u32, name: impl Into<String>, kind: LinkKind) -> Self {
        Self {
            index,
            name: name.into(),
            kind,
        }
    }
}
