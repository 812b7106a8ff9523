use crate::AgentId;

/// Read-only view of the host world a tree runs against.
///
/// The runtime never inspects the world itself; it only hands it to leaf
/// callbacks. Hosts extend it with whatever queries their leaves need.
pub trait WorldView {
    type Agent: AgentId;
}

/// Write access / effect sink for leaf callbacks.
pub trait WorldMut: WorldView {}
