//! Agent identity.

/// Stable agent identifier, an index into the simulation's agent arena.
///
/// Ordering matters: anything the round processes "in id order" uses this
/// `Ord`, which keeps a seeded run reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct AgentId(pub u32);

impl AgentId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u32 {
        self.0
    }
}

impl From<u32> for AgentId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_order_by_raw_value() {
        let mut ids = vec![AgentId(3), AgentId(1), AgentId(2)];
        ids.sort();
        assert_eq!(ids, vec![AgentId(1), AgentId(2), AgentId(3)]);
        assert_eq!(AgentId::from(5).raw(), 5);
        assert_eq!(AgentId::new(9).to_string(), "#9");
    }
}
