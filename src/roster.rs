//! The fixed set of upstream components (sensors/nodes) polled every cycle.
//!
//! The roster is built once at startup and is never mutated afterwards, so
//! concurrent fetches can borrow it freely.

/// A named upstream data source and its VoipMonitor sensor id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub name: String,
    pub sensor_id: String,
}

#[derive(Debug, Clone)]
pub struct Roster {
    components: Vec<Component>,
}

impl Roster {
    pub fn new<N, S>(entries: impl IntoIterator<Item = (N, S)>) -> Self
    where
        N: ToString,
        S: ToString,
    {
        Self {
            components: entries
                .into_iter()
                .map(|(name, sensor_id)| Component {
                    name: name.to_string(),
                    sensor_id: sensor_id.to_string(),
                })
                .collect(),
        }
    }

    /// The compiled-in production roster.
    pub fn builtin() -> Self {
        Self::new([
            ("audiocodes-eastus", "4"),
            ("audiocodes-auseast", "8"),
            ("audiocodes-uksouth", "9"),
            ("audiocodes-westgerc", "10"),
            ("audiocodes-transus", "15"),
            ("audiocodes-sanorth", "21"),
            ("opensips1", "14"),
            ("opensips2", "17"),
            ("fscc3", "12"),
            ("fscc4", "18"),
            ("fscc5", "19"),
            ("fscc6", "20"),
        ])
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}
