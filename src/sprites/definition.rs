//! How to draw an actor as a single icon, loadable from JSON:
//!
//! ```json
//! {
//!   "12": { "kind": "simple", "frame": 2, "force_opaque": true },
//!   "40": { "kind": "composite", "source_actor": 39,
//!           "layers": [ { "frame": 0 }, { "frame": 3, "offset_x": -4, "offset_y": 8 } ] },
//!   "77": { "kind": "crate", "crate_actor": 75, "contents_frame": 0 }
//! }
//! ```

use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaframeLayer {
    pub frame: usize,
    #[serde(default)]
    pub offset_x: i32,
    #[serde(default)]
    pub offset_y: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpriteDefinition {
    /// One of the actor's own frames.
    Simple {
        #[serde(default)]
        frame: usize,
        /// Draw masked-out pixels too.
        #[serde(default)]
        force_opaque: bool,
    },
    /// Frames layered at offsets, taken from `source_actor` when set.
    Composite {
        #[serde(default)]
        source_actor: Option<u16>,
        layers: Vec<MetaframeLayer>,
    },
    /// One of the actor's frames centred on a crate frame.
    Crate {
        crate_actor: u16,
        #[serde(default)]
        crate_frame: usize,
        #[serde(default)]
        contents_frame: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpriteDefinitions {
    definitions: BTreeMap<u16, SpriteDefinition>,
}

impl SpriteDefinitions {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn from_reader<R: Read>(reader: R) -> serde_json::Result<Self> {
        serde_json::from_reader(reader)
    }

    pub fn get(&self, actor_id: u16) -> Option<&SpriteDefinition> {
        self.definitions.get(&actor_id)
    }

    pub fn insert(&mut self, actor_id: u16, definition: SpriteDefinition) {
        self.definitions.insert(actor_id, definition);
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_kinds() {
        let json = r#"{
            "12": { "kind": "simple", "frame": 2, "force_opaque": true },
            "40": { "kind": "composite", "source_actor": 39,
                    "layers": [ { "frame": 0 }, { "frame": 3, "offset_x": -4, "offset_y": 8 } ] },
            "77": { "kind": "crate", "crate_actor": 75, "contents_frame": 1 }
        }"#;
        let defs = SpriteDefinitions::from_json(json).unwrap();

        assert_eq!(defs.len(), 3);
        assert_eq!(
            defs.get(12),
            Some(&SpriteDefinition::Simple {
                frame: 2,
                force_opaque: true
            })
        );
        let Some(SpriteDefinition::Composite {
            source_actor,
            layers,
        }) = defs.get(40)
        else {
            panic!("expected composite");
        };
        assert_eq!(*source_actor, Some(39));
        assert_eq!(
            layers[1],
            MetaframeLayer {
                frame: 3,
                offset_x: -4,
                offset_y: 8
            }
        );
        assert_eq!(
            defs.get(77),
            Some(&SpriteDefinition::Crate {
                crate_actor: 75,
                crate_frame: 0,
                contents_frame: 1
            })
        );
        assert!(defs.get(1).is_none());
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        assert!(SpriteDefinitions::from_json(r#"{ "1": { "kind": "sparkle" } }"#).is_err());
    }
}
